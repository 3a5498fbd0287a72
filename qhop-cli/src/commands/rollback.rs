use anyhow::{Context, Result};
use clap::Args;
use qhop_core::QueueType;
use qhop_migrator::MigrationExecutor;

use super::{cancel_on_interrupt, connect, parse_queue_type, print_json, Outcome};
use crate::config::Settings;
use crate::output;

#[derive(Debug, Args)]
#[command(after_help = EXAMPLES_TEXT)]
pub(crate) struct Rollback {
    #[arg(long, default_value = "/", help = "Virtual host, raw (/) or encoded (%2f)")]
    vhost: String,

    #[arg(long, help = "Queue whose migration failed")]
    queue: String,

    #[arg(
        long = "type",
        default_value = "classic",
        value_parser = parse_queue_type,
        help = "Type the queue is restored to"
    )]
    original: QueueType,

    #[arg(long, help = "Print the rollback result as JSON")]
    json: bool,
}

const EXAMPLES_TEXT: &str = r#"
EXAMPLES:
    # "orders" failed while draining; put its messages back into a classic queue
    qhop rollback --queue orders

    # Rollback is refused if "orders" already exists as quorum: re-run the
    # refill by hand from orders_temp_migrated instead.
"#;

pub(crate) async fn handle(args: Rollback, settings: &Settings) -> Result<Outcome> {
    let executor = MigrationExecutor::new(connect(settings)?, &settings.migration);
    cancel_on_interrupt(executor.cancellation().clone());

    let result = executor
        .rollback(&args.vhost, &args.queue, args.original)
        .await
        .with_context(|| format!("cannot roll back queue '{}'", args.queue))?;

    let results = [result];
    if args.json {
        print_json(&results[0])?;
    } else {
        print!("{}", output::result_table(&results));
    }
    Ok(Outcome::of(&results))
}
