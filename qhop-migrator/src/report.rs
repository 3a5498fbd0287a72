use qhop_core::{MigrationPlan, PlanStatus, QueueType, Result};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::Path;
use tracing::info;

/// Where `planner` writes its report unless told otherwise.
pub const DEFAULT_REPORT_PATH: &str = "migration_report.json";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total: usize,
    pub good: usize,
    pub warning: usize,
    pub blocked: usize,
}

/// One row of the summary table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportEntry {
    pub queue: String,
    pub vhost: String,
    pub status: PlanStatus,
    pub reason: String,
}

/// Plans for a set of queues plus their Good / Warning / Blocked tally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanReport {
    pub target_type: QueueType,
    pub summary: ReportSummary,
    pub entries: Vec<ReportEntry>,
    pub plans: Vec<MigrationPlan>,
}

impl PlanReport {
    pub fn new(target_type: QueueType, plans: Vec<MigrationPlan>) -> Self {
        let mut summary = ReportSummary {
            total: plans.len(),
            ..ReportSummary::default()
        };
        let entries = plans
            .iter()
            .map(|plan| {
                let status = plan.status();
                match status {
                    PlanStatus::Good => summary.good += 1,
                    PlanStatus::Warning => summary.warning += 1,
                    PlanStatus::Blocked => summary.blocked += 1,
                }
                ReportEntry {
                    queue: plan.queue_ref.name.clone(),
                    vhost: plan.queue_ref.vhost.clone(),
                    status,
                    reason: plan.reason(),
                }
            })
            .collect();
        Self {
            target_type,
            summary,
            entries,
            plans,
        }
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        info!(path = %path.display(), queues = self.summary.total, "migration report saved");
        Ok(())
    }

    /// Plain-text table with one row per queue and a totals line.
    pub fn render_table(&self) -> String {
        const HEADERS: [&str; 4] = ["Queue Name", "Vhost", "Status", "Reason"];

        let mut widths = HEADERS.map(str::len);
        for entry in &self.entries {
            widths[0] = widths[0].max(entry.queue.len());
            widths[1] = widths[1].max(entry.vhost.len());
            widths[2] = widths[2].max(entry.status.as_str().len());
        }

        let mut out = String::new();
        let _ = writeln!(
            out,
            "{:<w0$}  {:<w1$}  {:<w2$}  {}",
            HEADERS[0],
            HEADERS[1],
            HEADERS[2],
            HEADERS[3],
            w0 = widths[0],
            w1 = widths[1],
            w2 = widths[2],
        );
        let rule_len = widths[0] + widths[1] + widths[2] + HEADERS[3].len() + 6;
        let _ = writeln!(out, "{}", "-".repeat(rule_len));
        for entry in &self.entries {
            let _ = writeln!(
                out,
                "{:<w0$}  {:<w1$}  {:<w2$}  {}",
                entry.queue,
                entry.vhost,
                entry.status.as_str(),
                entry.reason,
                w0 = widths[0],
                w1 = widths[1],
                w2 = widths[2],
            );
        }
        let _ = writeln!(
            out,
            "\nTotal queues: {}  Good: {}  Warning: {}  Blocked: {}",
            self.summary.total, self.summary.good, self.summary.warning, self.summary.blocked
        );
        out
    }
}
