use anyhow::{Context, Result};
use clap::{ArgGroup, Args};
use qhop_core::definitions::load_definitions;
use qhop_core::{normalize_vhost, MigrationPlan, QueueType};
use qhop_migrator::{plan_descriptors, PlanReport, Planner as LivePlanner, DEFAULT_REPORT_PATH};
use std::path::PathBuf;

use super::{connect, parse_target, print_json, Outcome};
use crate::config::Settings;

#[derive(Debug, Args)]
#[command(after_help = EXAMPLES_TEXT)]
#[command(group(ArgGroup::new("scope").required(true).args(["queue", "all", "file"])))]
pub(crate) struct Planner {
    #[arg(
        long,
        help = "Virtual host to plan (default /). With --file, only plan queues of this vhost"
    )]
    vhost: Option<String>,

    #[arg(long, help = "Plan a single queue")]
    queue: Option<String>,

    #[arg(long, help = "Plan every queue of the vhost")]
    all: bool,

    #[arg(long, help = "Plan from a definitions export instead of a live broker")]
    file: Option<PathBuf>,

    #[arg(
        long = "type",
        default_value = "quorum",
        value_parser = parse_target,
        help = "Target queue type: quorum or stream"
    )]
    target: QueueType,

    #[arg(long, help = "Print the plans as JSON instead of writing a report")]
    json: bool,

    #[arg(long, default_value = DEFAULT_REPORT_PATH, help = "Where the JSON report is written")]
    report: PathBuf,
}

const EXAMPLES_TEXT: &str = r#"
EXAMPLES:
    # Is "orders" ready for quorum?
    qhop planner --queue orders

    # Every queue of vhost "billing", towards streams
    qhop planner --vhost billing --all --type stream

    # Offline, from a definitions export; plans on stdout
    qhop planner --file definitions.json --json
"#;

/// Planning never fails the process because of blocked queues; the report
/// is the result.
pub(crate) async fn handle(args: Planner, settings: &Settings) -> Result<Outcome> {
    let plans = collect_plans(&args, settings).await?;

    if args.json {
        print_json(&plans)?;
        return Ok(Outcome::Success);
    }

    let report = PlanReport::new(args.target, plans);
    report
        .write_json(&args.report)
        .with_context(|| format!("cannot write report '{}'", args.report.display()))?;
    print!("{}", report.render_table());
    println!("Report written to {}", args.report.display());
    Ok(Outcome::Success)
}

async fn collect_plans(args: &Planner, settings: &Settings) -> Result<Vec<MigrationPlan>> {
    if let Some(path) = &args.file {
        let mut queues = load_definitions(path)
            .with_context(|| format!("cannot load definitions from '{}'", path.display()))?;
        if let Some(vhost) = &args.vhost {
            let vhost = normalize_vhost(vhost);
            queues.retain(|q| q.vhost == vhost);
        }
        return Ok(plan_descriptors(&queues, args.target));
    }

    let vhost = args.vhost.as_deref().unwrap_or("/");
    let planner = LivePlanner::new(connect(settings)?, &settings.migration);
    match &args.queue {
        Some(queue) => {
            let plan = planner
                .plan_queue(vhost, queue, args.target)
                .await
                .with_context(|| format!("cannot plan queue '{queue}'"))?;
            Ok(vec![plan])
        }
        None => planner
            .plan_vhost(vhost, None, args.target)
            .await
            .with_context(|| format!("cannot plan vhost '{vhost}'")),
    }
}
