mod commands;
mod config;
mod logging;
mod output;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use commands::Outcome;
use config::Settings;

#[derive(Debug, Parser)]
#[command(name = "qhop")]
#[command(about = "qhop - move RabbitMQ classic queues to quorum or stream queues", long_about = None)]
#[command(version)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Connection and logging options accepted by every command.
#[derive(Debug, Args)]
pub(crate) struct GlobalArgs {
    #[arg(long, global = true, help = "YAML file with `broker:` and `migration:` sections")]
    pub(crate) config: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        help = "Management API base URL. Example: http://localhost:15672"
    )]
    pub(crate) management_url: Option<String>,

    #[arg(long, global = true, help = "AMQP URL used to move messages. Example: amqp://localhost:5672")]
    pub(crate) amqp_url: Option<String>,

    #[arg(long, global = true, help = "Broker user name")]
    pub(crate) user: Option<String>,

    #[arg(long, global = true, help = "Broker password")]
    pub(crate) password: Option<String>,

    #[arg(long, global = true, help = "Also append log lines to this file")]
    pub(crate) log_file: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List queues of a vhost with their type, durability and depth
    #[command(display_order = 1)]
    ListQueues(commands::list_queues::ListQueues),

    /// Check which queues can be migrated and what they would lose
    #[command(display_order = 2)]
    Planner(commands::planner::Planner),

    /// Migrate a single classic queue
    #[command(display_order = 3)]
    MigrateQueue(commands::migrate::MigrateQueue),

    /// Migrate every classic queue of a vhost
    #[command(display_order = 4)]
    MigrateAll(commands::migrate::MigrateAll),

    /// Restore a queue from its temp queue after a failed migration
    #[command(display_order = 5)]
    Rollback(commands::rollback::Rollback),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let _log_guard = match logging::init(cli.global.log_file.as_deref()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("error: {e:#}");
            return ExitCode::from(Outcome::ERROR_CODE);
        }
    };

    match run(cli).await {
        Ok(outcome) => outcome.into(),
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::from(Outcome::ERROR_CODE)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<Outcome> {
    let settings = Settings::resolve(&cli.global)?;

    match cli.command {
        Commands::ListQueues(cmd) => commands::list_queues::handle(cmd, &settings).await,
        Commands::Planner(cmd) => commands::planner::handle(cmd, &settings).await,
        Commands::MigrateQueue(cmd) => commands::migrate::handle_queue(cmd, &settings).await,
        Commands::MigrateAll(cmd) => commands::migrate::handle_all(cmd, &settings).await,
        Commands::Rollback(cmd) => commands::rollback::handle(cmd, &settings).await,
    }
}
