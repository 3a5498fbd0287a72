use serde::{Deserialize, Serialize};

use crate::queue::{QueueRef, QueueType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Blocker,
    Warning,
}

/// A rule that fired for a queue.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RuleMatch {
    pub id: String,
    pub severity: Severity,
    pub message: String,
    /// The argument or policy the match is about, when the rule is per-argument.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Go,
    Blocked,
}

/// Readiness of one queue for conversion to `target_type`.
///
/// Built fresh for every planning request and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationPlan {
    pub queue_ref: QueueRef,
    pub current_type: QueueType,
    pub target_type: QueueType,
    pub blockers: Vec<RuleMatch>,
    pub warnings: Vec<RuleMatch>,
    pub verdict: Verdict,
}

impl MigrationPlan {
    pub fn is_go(&self) -> bool {
        self.verdict == Verdict::Go
    }

    pub fn status(&self) -> PlanStatus {
        if !self.blockers.is_empty() {
            PlanStatus::Blocked
        } else if !self.warnings.is_empty() {
            PlanStatus::Warning
        } else {
            PlanStatus::Good
        }
    }

    /// Blocker and warning messages joined for one-line display.
    pub fn reason(&self) -> String {
        let matches = if self.blockers.is_empty() {
            &self.warnings
        } else {
            &self.blockers
        };
        if matches.is_empty() {
            return "-".to_string();
        }
        matches
            .iter()
            .map(|m| m.message.as_str())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Summary bucket used by the planner report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlanStatus {
    Good,
    Warning,
    Blocked,
}

impl PlanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanStatus::Good => "Good",
            PlanStatus::Warning => "Warning",
            PlanStatus::Blocked => "Blocked",
        }
    }
}
