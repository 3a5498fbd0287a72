use anyhow::{Context, Result};
use clap::Args;
use qhop_core::{normalize_vhost, BrokerClient};

use super::{connect, print_json, Outcome};
use crate::config::Settings;
use crate::output;

#[derive(Debug, Args)]
#[command(after_help = EXAMPLES_TEXT)]
pub(crate) struct ListQueues {
    #[arg(long, help = "Only queues whose name contains this text")]
    name: Option<String>,

    #[arg(long, default_value = "/", help = "Virtual host, raw (/) or encoded (%2f)")]
    vhost: String,

    #[arg(long, help = "Print queue descriptors as JSON")]
    json: bool,
}

const EXAMPLES_TEXT: &str = r#"
EXAMPLES:
    # All queues of the default vhost
    qhop list-queues

    # Queues of vhost "billing" whose name contains "invoice", as JSON
    qhop list-queues --vhost billing --name invoice --json
"#;

pub(crate) async fn handle(args: ListQueues, settings: &Settings) -> Result<Outcome> {
    let client = connect(settings)?;
    let vhost = normalize_vhost(&args.vhost);
    let queues = client
        .list_queues(&vhost, args.name.as_deref())
        .await
        .with_context(|| format!("cannot list queues of vhost '{vhost}'"))?;

    if args.json {
        print_json(&queues)?;
    } else {
        print!("{}", output::queue_table(&queues));
    }
    Ok(Outcome::Success)
}
