use super::{MigrationJob, MigrationPhase, MigrationResult, TempQueueState};
use crate::errors::{ErrorKind, MigrationError};
use crate::queue::{QueueDescriptor, QueueRef, QueueType};
use crate::rules::evaluate;

const HAPPY_PATH: [MigrationPhase; 6] = [
    MigrationPhase::DrainingSource,
    MigrationPhase::SourceDrained,
    MigrationPhase::TargetCreated,
    MigrationPhase::RefillingTarget,
    MigrationPhase::Verifying,
    MigrationPhase::Completed,
];

fn job() -> MigrationJob {
    MigrationJob::new(QueueRef::new("/", "orders"), QueueType::Quorum)
}

/// What this test validates
///
/// - A job walks the phases strictly in order.
/// - Expectation: every forward step succeeds; skipping or going back is refused.
#[test]
fn phases_advance_in_order_only() {
    let mut job = job();
    assert_eq!(job.temp_queue, "orders_temp_migrated");

    for next in HAPPY_PATH {
        job.advance(next).unwrap();
    }
    assert_eq!(job.phase, MigrationPhase::Completed);

    let mut skipper = self::job();
    let err = skipper.advance(MigrationPhase::TargetCreated).unwrap_err();
    assert!(matches!(
        err,
        MigrationError::InvalidTransition {
            from: MigrationPhase::Pending,
            to: MigrationPhase::TargetCreated
        }
    ));
    assert_eq!(skipper.phase, MigrationPhase::Pending);
}

#[test]
fn terminal_phases_accept_no_transition() {
    for terminal in [
        MigrationPhase::Completed,
        MigrationPhase::Failed,
        MigrationPhase::RolledBack,
    ] {
        assert!(terminal.is_terminal());
        assert!(!terminal.can_advance_to(MigrationPhase::Failed));
        assert!(!terminal.can_advance_to(MigrationPhase::Pending));
    }
    assert!(MigrationPhase::Verifying.can_advance_to(MigrationPhase::RolledBack));
    assert!(!MigrationPhase::RefillingTarget.can_advance_to(MigrationPhase::RolledBack));
}

/// What this test validates
///
/// - Failing a job mid-way records the phase it had reached.
/// - Expectation: phase becomes `failed`, the record keeps kind, phase and attempts.
#[test]
fn fail_records_last_phase_and_attempts() {
    let mut job = job();
    job.advance(MigrationPhase::DrainingSource).unwrap();
    job.advance(MigrationPhase::SourceDrained).unwrap();
    job.advance(MigrationPhase::TargetCreated).unwrap();
    job.advance(MigrationPhase::RefillingTarget).unwrap();

    job.fail(&MigrationError::TransientBroker {
        message: "connection reset".into(),
        attempts: 4,
    });

    assert_eq!(job.phase, MigrationPhase::Failed);
    let record = job.error.clone().unwrap();
    assert_eq!(record.kind, ErrorKind::TransientBroker);
    assert_eq!(record.phase, MigrationPhase::RefillingTarget);
    assert_eq!(record.attempts, 4);

    // a second failure does not overwrite the first
    job.fail(&MigrationError::Cancelled);
    assert_eq!(job.error.unwrap().kind, ErrorKind::TransientBroker);
}

#[test]
fn failed_result_exposes_partial_failure() {
    let plan = evaluate(
        &QueueDescriptor::new("/", "orders", QueueType::Classic),
        QueueType::Quorum,
    );
    let mut job = job();
    job.advance(MigrationPhase::DrainingSource).unwrap();
    job.messages_moved_out = 2;
    job.fail(&MigrationError::NotFound("orders".into()));

    let result = job.into_result(plan, TempQueueState::holding(2));
    assert!(!result.is_success());
    assert_eq!(result.last_phase(), MigrationPhase::DrainingSource);
    assert!(result.temp_queue_exists);
    assert_eq!(result.temp_queue_messages, Some(2));

    let err = result.failure().unwrap();
    assert!(matches!(
        err,
        MigrationError::PartialMigrationFailure {
            phase: MigrationPhase::DrainingSource,
            ..
        }
    ));
}

#[test]
fn blocked_result_touches_nothing() {
    let plan = evaluate(
        &QueueDescriptor::new("/", "scratch", QueueType::Classic).with_durable(false),
        QueueType::Quorum,
    );
    let result = MigrationResult::blocked(plan);

    assert!(result.is_blocked());
    assert_eq!(result.phase, MigrationPhase::Pending);
    assert_eq!(result.messages_moved_out, 0);
    assert!(!result.temp_queue_exists);
    assert!(result.error.is_none());

    let value = serde_json::to_value(&result).unwrap();
    assert_eq!(value["verdict"], "blocked");
    assert_eq!(value["phase"], "pending");
}

#[test]
fn rejected_result_fails_at_pending() {
    let plan = evaluate(
        &QueueDescriptor::new("/", "orders", QueueType::Classic),
        QueueType::Quorum,
    );
    let result = MigrationResult::rejected(plan, &MigrationError::Cancelled);

    assert_eq!(result.phase, MigrationPhase::Failed);
    let record = result.error.unwrap();
    assert_eq!(record.phase, MigrationPhase::Pending);
    assert_eq!(record.kind, ErrorKind::Cancelled);
}

#[test]
fn temp_state_reports_leftovers() {
    assert!(!TempQueueState::absent().holds_messages());
    assert!(!TempQueueState::holding(0).holds_messages());
    assert!(TempQueueState::holding(3).holds_messages());
    let unknown = TempQueueState {
        exists: true,
        messages: None,
    };
    assert!(unknown.holds_messages());
}
