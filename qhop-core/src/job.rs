use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::{ErrorKind, MigrationError, Result};
use crate::plan::{MigrationPlan, Verdict};
use crate::queue::{temp_queue_name, QueueRef, QueueType};

/// Phases of the temporary-queue swap.
///
/// A job walks the phases in declaration order; `failed` can be entered from any
/// non-terminal phase, and `rolled_back` only from `verifying` of a rollback run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationPhase {
    Pending,
    DrainingSource,
    SourceDrained,
    TargetCreated,
    RefillingTarget,
    Verifying,
    Completed,
    Failed,
    RolledBack,
}

impl MigrationPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            MigrationPhase::Pending => "pending",
            MigrationPhase::DrainingSource => "draining_source",
            MigrationPhase::SourceDrained => "source_drained",
            MigrationPhase::TargetCreated => "target_created",
            MigrationPhase::RefillingTarget => "refilling_target",
            MigrationPhase::Verifying => "verifying",
            MigrationPhase::Completed => "completed",
            MigrationPhase::Failed => "failed",
            MigrationPhase::RolledBack => "rolled_back",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            MigrationPhase::Completed | MigrationPhase::Failed | MigrationPhase::RolledBack
        )
    }

    pub fn can_advance_to(&self, next: MigrationPhase) -> bool {
        use MigrationPhase::*;
        match (self, next) {
            (from, Failed) => !from.is_terminal(),
            (Pending, DrainingSource)
            | (DrainingSource, SourceDrained)
            | (SourceDrained, TargetCreated)
            | (TargetCreated, RefillingTarget)
            | (RefillingTarget, Verifying)
            | (Verifying, Completed)
            | (Verifying, RolledBack) => true,
            _ => false,
        }
    }
}

impl fmt::Display for MigrationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Serializable record of why a job failed and where.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub kind: ErrorKind,
    /// Last phase the job reached before failing.
    pub phase: MigrationPhase,
    pub message: String,
    pub attempts: u32,
}

/// What the executor saw of the temp queue after a job stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TempQueueState {
    pub exists: bool,
    pub messages: Option<u64>,
}

impl TempQueueState {
    pub fn absent() -> Self {
        Self {
            exists: false,
            messages: None,
        }
    }

    pub fn holding(messages: u64) -> Self {
        Self {
            exists: true,
            messages: Some(messages),
        }
    }

    /// Whether the temp queue may still hold messages that never reached the target.
    pub fn holds_messages(&self) -> bool {
        self.exists && self.messages.map_or(true, |n| n > 0)
    }
}

/// Executor-owned state for one queue undergoing conversion.
#[derive(Debug, Clone)]
pub struct MigrationJob {
    pub source_queue: QueueRef,
    pub temp_queue: String,
    pub target_type: QueueType,
    pub phase: MigrationPhase,
    pub messages_moved_out: u64,
    pub messages_moved_in: u64,
    pub error: Option<ErrorRecord>,
    /// Non-fatal observations, e.g. verification count mismatches.
    pub advisories: Vec<String>,
}

impl MigrationJob {
    pub fn new(source_queue: QueueRef, target_type: QueueType) -> Self {
        let temp_queue = temp_queue_name(&source_queue.name);
        Self {
            source_queue,
            temp_queue,
            target_type,
            phase: MigrationPhase::Pending,
            messages_moved_out: 0,
            messages_moved_in: 0,
            error: None,
            advisories: Vec::new(),
        }
    }

    pub fn advance(&mut self, next: MigrationPhase) -> Result<()> {
        if !self.phase.can_advance_to(next) {
            return Err(MigrationError::InvalidTransition {
                from: self.phase,
                to: next,
            });
        }
        self.phase = next;
        Ok(())
    }

    /// Records `err` against the current phase and moves the job to `failed`.
    pub fn fail(&mut self, err: &MigrationError) {
        if self.phase.is_terminal() {
            return;
        }
        self.error = Some(ErrorRecord {
            kind: err.kind(),
            phase: self.phase,
            message: err.to_string(),
            attempts: err.attempts(),
        });
        self.phase = MigrationPhase::Failed;
    }

    pub fn into_result(self, plan: MigrationPlan, temp: TempQueueState) -> MigrationResult {
        MigrationResult {
            queue: self.source_queue.name,
            vhost: self.source_queue.vhost,
            target_type: self.target_type,
            verdict: plan.verdict,
            phase: self.phase,
            messages_moved_out: self.messages_moved_out,
            messages_moved_in: self.messages_moved_in,
            temp_queue: self.temp_queue,
            temp_queue_exists: temp.exists,
            temp_queue_messages: temp.messages,
            advisories: self.advisories,
            error: self.error,
            plan,
        }
    }
}

/// Terminal outcome of one queue, as reported to the coordinator and operator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationResult {
    pub queue: String,
    pub vhost: String,
    pub target_type: QueueType,
    pub verdict: Verdict,
    pub phase: MigrationPhase,
    pub messages_moved_out: u64,
    pub messages_moved_in: u64,
    pub temp_queue: String,
    pub temp_queue_exists: bool,
    pub temp_queue_messages: Option<u64>,
    pub plan: MigrationPlan,
    pub advisories: Vec<String>,
    pub error: Option<ErrorRecord>,
}

impl MigrationResult {
    /// Result for a queue the rule engine refused; nothing was touched on the broker.
    pub fn blocked(plan: MigrationPlan) -> Self {
        let job = MigrationJob::new(plan.queue_ref.clone(), plan.target_type);
        job.into_result(plan, TempQueueState::absent())
    }

    /// Result for a job that never left `pending` because of `err`.
    pub fn rejected(plan: MigrationPlan, err: &MigrationError) -> Self {
        let mut job = MigrationJob::new(plan.queue_ref.clone(), plan.target_type);
        job.fail(err);
        job.into_result(plan, TempQueueState::absent())
    }

    pub fn is_blocked(&self) -> bool {
        self.verdict == Verdict::Blocked
    }

    pub fn is_success(&self) -> bool {
        matches!(
            self.phase,
            MigrationPhase::Completed | MigrationPhase::RolledBack
        )
    }

    /// Phase reached before failure, or the final phase otherwise.
    pub fn last_phase(&self) -> MigrationPhase {
        self.error.as_ref().map_or(self.phase, |e| e.phase)
    }

    /// The failure as an error value, for callers that surface it to an operator.
    pub fn failure(&self) -> Option<MigrationError> {
        self.error
            .as_ref()
            .map(|e| MigrationError::PartialMigrationFailure {
                queue: self.queue.clone(),
                phase: e.phase,
                message: e.message.clone(),
            })
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod job_tests;
