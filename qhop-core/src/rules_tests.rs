use serde_json::json;

use super::{evaluate, evaluate_with, removed_arguments, target_arguments, MigrationRule};
use crate::plan::{Severity, Verdict};
use crate::queue::{QueueArguments, QueueDescriptor, QueueType};

fn classic(name: &str) -> QueueDescriptor {
    QueueDescriptor::new("/", name, QueueType::Classic)
}

fn blocker_ids(d: &QueueDescriptor, target: QueueType) -> Vec<String> {
    evaluate(d, target)
        .blockers
        .into_iter()
        .map(|m| m.id)
        .collect()
}

/// What this test validates
///
/// - Scenario A: durable, non-exclusive, non-auto-delete queue with no arguments.
/// - Expectation: verdict `go` with no blockers and no warnings.
#[test]
fn plain_durable_queue_is_go_without_warnings() {
    let plan = evaluate(&classic("orders"), QueueType::Quorum);

    assert_eq!(plan.verdict, Verdict::Go);
    assert!(plan.blockers.is_empty());
    assert!(plan.warnings.is_empty());
    assert_eq!(plan.queue_ref.name, "orders");
    assert_eq!(plan.target_type, QueueType::Quorum);
}

/// What this test validates
///
/// - Scenario B: `x-queue-version: 2` declared on the source.
/// - Expectation: still `go`, exactly one warning and it names the argument.
#[test]
fn queue_version_argument_warns_once() {
    let d = classic("orders").with_argument("x-queue-version", 2);
    let plan = evaluate(&d, QueueType::Quorum);

    assert_eq!(plan.verdict, Verdict::Go);
    assert_eq!(plan.warnings.len(), 1);
    assert_eq!(plan.warnings[0].id, "dropped-argument");
    assert_eq!(plan.warnings[0].subject.as_deref(), Some("x-queue-version"));
    assert!(plan.warnings[0].message.contains("x-queue-version"));
}

/// What this test validates
///
/// - Scenario C: non-durable source.
/// - Expectation: `blocked` with the non-durable blocker and a message about durability.
#[test]
fn non_durable_queue_is_blocked() {
    let d = classic("scratch").with_durable(false);
    let plan = evaluate(&d, QueueType::Quorum);

    assert_eq!(plan.verdict, Verdict::Blocked);
    assert_eq!(plan.blockers.len(), 1);
    assert_eq!(plan.blockers[0].id, "non-durable");
    assert!(plan.blockers[0].message.contains("durable"));
}

/// What this test validates
///
/// - Every combination of the three property blockers, for both targets.
/// - Expectation: blocked whenever any of them holds, with each triggering rule id present.
///
/// Why this matters
/// - These are the hard limits of the target queue types; a miss here means a
///   migration that the broker will refuse half-way.
#[test]
fn property_blockers_cover_every_combination() {
    for target in [QueueType::Quorum, QueueType::Stream] {
        for bits in 0u8..8 {
            let exclusive = bits & 1 != 0;
            let auto_delete = bits & 2 != 0;
            let non_durable = bits & 4 != 0;
            let d = classic("q")
                .with_exclusive(exclusive)
                .with_auto_delete(auto_delete)
                .with_durable(!non_durable);

            let ids = blocker_ids(&d, target);
            assert_eq!(ids.contains(&"exclusive".to_string()), exclusive);
            assert_eq!(ids.contains(&"auto-delete".to_string()), auto_delete);
            assert_eq!(ids.contains(&"non-durable".to_string()), non_durable);

            let plan = evaluate(&d, target);
            let expected = if bits == 0 {
                Verdict::Go
            } else {
                Verdict::Blocked
            };
            assert_eq!(plan.verdict, expected, "bits={bits:03b} target={target}");
        }
    }
}

/// What this test validates
///
/// - A queue that is already of the target type, with otherwise valid or invalid properties.
/// - Expectation: the dedicated already-target-type blocker is always reported.
#[test]
fn already_target_type_is_blocked_regardless_of_properties() {
    let plain = QueueDescriptor::new("/", "q", QueueType::Quorum);
    let broken = QueueDescriptor::new("/", "q", QueueType::Quorum)
        .with_durable(false)
        .with_exclusive(true);

    for d in [plain, broken] {
        let plan = evaluate(&d, QueueType::Quorum);
        assert_eq!(plan.verdict, Verdict::Blocked);
        assert!(plan
            .blockers
            .iter()
            .any(|b| b.id == "already-target-type" && b.message.contains("already")));
    }
}

/// What this test validates
///
/// - A queue that hits blockers and warnings at the same time.
/// - Expectation: blocked, and warnings are still listed for the operator.
#[test]
fn blocked_plan_keeps_warnings() {
    let d = classic("q")
        .with_exclusive(true)
        .with_argument("x-max-priority", 10);
    let plan = evaluate(&d, QueueType::Quorum);

    assert_eq!(plan.verdict, Verdict::Blocked);
    assert_eq!(plan.warnings.len(), 1);
    assert_eq!(plan.warnings[0].subject.as_deref(), Some("x-max-priority"));
}

/// What this test validates
///
/// - Custom arguments outside the known sets, and supported ones like `x-message-ttl`.
/// - Expectation: passed through silently for quorum (no warning, no blocker).
#[test]
fn unknown_and_supported_arguments_are_silent() {
    let d = classic("q")
        .with_argument("x-custom-thing", "yes")
        .with_argument("x-message-ttl", 60000)
        .with_argument("x-dead-letter-exchange", "dlx");
    let plan = evaluate(&d, QueueType::Quorum);

    assert_eq!(plan.verdict, Verdict::Go);
    assert!(plan.warnings.is_empty());
}

/// What this test validates
///
/// - Stream targets drop more arguments than quorum targets.
/// - Expectation: `x-message-ttl` warns for stream only.
#[test]
fn stream_target_warns_about_stream_unsupported_arguments() {
    let d = classic("q").with_argument("x-message-ttl", 60000);

    assert!(evaluate(&d, QueueType::Quorum).warnings.is_empty());
    let plan = evaluate(&d, QueueType::Stream);
    assert_eq!(plan.warnings.len(), 1);
    assert_eq!(plan.warnings[0].subject.as_deref(), Some("x-message-ttl"));
}

/// What this test validates
///
/// - `x-queue-mode=lazy` and `x-overflow=reject-publish-dlx` on a quorum migration.
/// - Expectation: value-specific warnings, plus the drop warning for `x-queue-mode`.
#[test]
fn incompatible_argument_values_warn() {
    let d = classic("q")
        .with_argument("x-queue-mode", "lazy")
        .with_argument("x-overflow", "reject-publish-dlx");
    let plan = evaluate(&d, QueueType::Quorum);

    let messages: Vec<&str> = plan.warnings.iter().map(|w| w.message.as_str()).collect();
    assert_eq!(plan.warnings.len(), 3, "{messages:?}");
    assert!(messages
        .iter()
        .any(|m| m.contains("'x-queue-mode=lazy' is not compatible")));
    assert!(messages
        .iter()
        .any(|m| m.contains("'x-overflow=reject-publish-dlx' is not compatible")));
    assert!(messages
        .iter()
        .any(|m| m.contains("Setting 'x-queue-mode' will be removed")));
}

/// What this test validates
///
/// - A queue governed by a classic mirroring policy.
/// - Expectation: one warning naming the policy; the plan stays `go`.
#[test]
fn mirroring_policy_warns_with_policy_name() {
    let mut definition = QueueArguments::new();
    definition.insert("ha-mode".into(), json!("all"));
    definition.insert("ha-sync-mode".into(), json!("automatic"));
    let d = classic("q").with_policy("ha-all", definition);

    let plan = evaluate(&d, QueueType::Quorum);
    assert_eq!(plan.verdict, Verdict::Go);
    assert_eq!(plan.warnings.len(), 1);
    assert_eq!(plan.warnings[0].id, "mirroring-policy");
    assert!(plan.warnings[0].message.contains("'ha-all'"));
}

/// What this test validates
///
/// - Evaluating with the registry reversed and rotated.
/// - Expectation: identical blocker and warning lists every time.
///
/// Why this matters
/// - No rule may depend on another rule's outcome or on registration order.
#[test]
fn rule_order_does_not_change_the_plan() {
    let mut definition = QueueArguments::new();
    definition.insert("ha-mode".into(), json!("exactly"));
    let d = classic("q")
        .with_exclusive(true)
        .with_durable(false)
        .with_argument("x-max-priority", 5)
        .with_argument("x-queue-mode", "lazy")
        .with_argument("x-queue-version", 1)
        .with_policy("mirror", definition);

    let reference = evaluate(&d, QueueType::Quorum);
    let mut rules = MigrationRule::ALL.to_vec();
    rules.reverse();
    assert_eq!(evaluate_with(&rules, &d, QueueType::Quorum), reference);

    for shift in 1..rules.len() {
        let mut rotated = MigrationRule::ALL.to_vec();
        rotated.rotate_left(shift);
        assert_eq!(evaluate_with(&rotated, &d, QueueType::Quorum), reference);
    }
}

/// What this test validates
///
/// - Planning the same descriptor twice.
/// - Expectation: byte-identical JSON output.
#[test]
fn planning_is_idempotent() {
    let d = classic("q")
        .with_argument("x-queue-version", 2)
        .with_argument("x-max-priority", 9)
        .with_argument("x-custom", true);

    let first = serde_json::to_vec(&evaluate(&d, QueueType::Quorum)).unwrap();
    let second = serde_json::to_vec(&evaluate(&d, QueueType::Quorum)).unwrap();
    assert_eq!(first, second);
}

#[test]
fn plan_json_uses_documented_field_names() {
    let d = classic("q").with_durable(false);
    let value = serde_json::to_value(evaluate(&d, QueueType::Quorum)).unwrap();

    assert_eq!(value["verdict"], "blocked");
    assert_eq!(value["target_type"], "quorum");
    assert_eq!(value["queue_ref"]["name"], "q");
    assert_eq!(value["blockers"][0]["id"], "non-durable");
    assert_eq!(value["blockers"][0]["severity"], "blocker");
    assert!(value["warnings"].as_array().unwrap().is_empty());
}

#[test]
fn rule_severities_are_partitioned() {
    let blockers: Vec<_> = MigrationRule::ALL
        .iter()
        .filter(|r| r.severity() == Severity::Blocker)
        .map(|r| r.id())
        .collect();
    assert_eq!(
        blockers,
        vec!["exclusive", "auto-delete", "non-durable", "already-target-type"]
    );
}

#[test]
fn target_arguments_strip_warned_keys_and_set_type() {
    let d = classic("q")
        .with_argument("x-max-priority", 10)
        .with_argument("x-overflow", "reject-publish-dlx")
        .with_argument("x-message-ttl", 1000)
        .with_argument("x-queue-type", "classic");

    let args = target_arguments(&d, QueueType::Quorum);
    assert_eq!(args.get("x-queue-type"), Some(&json!("quorum")));
    assert_eq!(args.get("x-message-ttl"), Some(&json!(1000)));
    assert!(!args.contains_key("x-max-priority"));
    assert!(!args.contains_key("x-overflow"));

    let mut removed = removed_arguments(&d, QueueType::Quorum);
    removed.sort();
    assert_eq!(removed, vec!["x-max-priority", "x-overflow"]);
}
