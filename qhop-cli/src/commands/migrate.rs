use anyhow::{Context, Result};
use clap::Args;
use qhop_core::{normalize_vhost, BrokerClient, QueueType};
use qhop_migrator::{FleetCoordinator, MigrationExecutor};
use tracing::info;

use super::{cancel_on_interrupt, connect, parse_target, print_json, Outcome};
use crate::config::Settings;
use crate::output;

#[derive(Debug, Args)]
#[command(after_help = MIGRATE_QUEUE_EXAMPLES)]
pub(crate) struct MigrateQueue {
    #[arg(long, default_value = "/", help = "Virtual host, raw (/) or encoded (%2f)")]
    vhost: String,

    #[arg(long, help = "Queue to migrate")]
    queue: String,

    #[arg(long = "type", value_parser = parse_target, help = "Target queue type: quorum or stream")]
    target: QueueType,

    #[arg(long, help = "Print the migration result as JSON")]
    json: bool,
}

#[derive(Debug, Args)]
#[command(after_help = MIGRATE_ALL_EXAMPLES)]
pub(crate) struct MigrateAll {
    #[arg(long, default_value = "/", help = "Virtual host, raw (/) or encoded (%2f)")]
    vhost: String,

    #[arg(long = "type", value_parser = parse_target, help = "Target queue type: quorum or stream")]
    target: QueueType,

    #[arg(long, help = "Queues migrated at the same time (default from config, else 1)")]
    concurrency: Option<usize>,

    #[arg(long, help = "Print the migration results as JSON")]
    json: bool,
}

const MIGRATE_QUEUE_EXAMPLES: &str = r#"
EXAMPLES:
    # Move "orders" on the default vhost to a quorum queue
    qhop migrate-queue --queue orders --type quorum

    # Same on vhost "billing", result as JSON
    qhop migrate-queue --vhost billing --queue invoices --type stream --json

EXIT CODES:
    0 migrated, 1 error, 2 bad usage, 3 blocked by plan, 4 migration failed
"#;

const MIGRATE_ALL_EXAMPLES: &str = r#"
EXAMPLES:
    # Every classic queue of the default vhost, one at a time
    qhop migrate-all --type quorum

    # Four queues at a time; Ctrl-C stops starting new ones
    qhop migrate-all --vhost billing --type quorum --concurrency 4

EXIT CODES:
    0 all migrated, 1 error, 2 bad usage, 3 some blocked, 4 some failed
"#;

pub(crate) async fn handle_queue(args: MigrateQueue, settings: &Settings) -> Result<Outcome> {
    let client = connect(settings)?;
    let vhost = normalize_vhost(&args.vhost);
    let descriptor = client
        .get_queue(&vhost, &args.queue)
        .await
        .with_context(|| format!("cannot read queue '{}' on vhost '{vhost}'", args.queue))?;

    let executor = MigrationExecutor::new(client, &settings.migration);
    cancel_on_interrupt(executor.cancellation().clone());
    let result = executor.execute(&descriptor, args.target).await;

    let results = [result];
    if args.json {
        print_json(&results[0])?;
    } else {
        print!("{}", output::result_table(&results));
    }
    Ok(Outcome::of(&results))
}

pub(crate) async fn handle_all(args: MigrateAll, settings: &Settings) -> Result<Outcome> {
    let client = connect(settings)?;
    let mut config = settings.migration.clone();
    if let Some(concurrency) = args.concurrency {
        config.concurrency = concurrency;
    }

    let coordinator = FleetCoordinator::new(client, &config);
    cancel_on_interrupt(coordinator.cancellation_token());
    let results = coordinator
        .migrate_all(&args.vhost, args.target)
        .await
        .with_context(|| format!("cannot migrate vhost '{}'", args.vhost))?;

    if args.json {
        print_json(&results)?;
    } else {
        print!("{}", output::result_table(&results));
    }
    let outcome = Outcome::of(&results);
    info!(outcome = ?outcome, "migrate-all done");
    Ok(outcome)
}
