//! Migration readiness rules.
//!
//! Every rule is a pure predicate over a [`QueueDescriptor`] and a target type.
//! Rules never look at each other's output, so the plan is the same whatever
//! order they are evaluated in.

use serde_json::Value;

use crate::plan::{MigrationPlan, RuleMatch, Severity, Verdict};
use crate::queue::{QueueArguments, QueueDescriptor, QueueType};

/// Argument and policy-key prefix used by classic queue mirroring.
const MIRRORING_PREFIX: &str = "ha-";

/// Argument naming the queue type, always rewritten for the target.
pub const QUEUE_TYPE_ARGUMENT: &str = "x-queue-type";

/// Classic-only arguments that neither quorum queues nor streams accept.
const CLASSIC_ONLY_ARGUMENTS: &[&str] = &[
    "x-queue-version",
    "x-queue-master-locator",
    "x-max-priority",
    "x-queue-mode",
];

/// Arguments streams reject on top of the classic-only ones.
const STREAM_UNSUPPORTED_ARGUMENTS: &[&str] = &[
    "x-message-ttl",
    "x-dead-letter-exchange",
    "x-dead-letter-routing-key",
    "x-max-length",
    "x-overflow",
    "x-expires",
    "x-single-active-consumer",
    "x-delivery-limit",
];

/// (target, argument, value) combinations the target type refuses to declare.
const INCOMPATIBLE_VALUES: &[(QueueType, &str, &str)] = &[
    (QueueType::Quorum, "x-queue-mode", "lazy"),
    (QueueType::Quorum, "x-overflow", "reject-publish-dlx"),
    (QueueType::Stream, "x-queue-mode", "lazy"),
];

/// The closed set of readiness rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MigrationRule {
    Exclusive,
    AutoDelete,
    NonDurable,
    AlreadyTargetType,
    DroppedArgument,
    IncompatibleArgumentValue,
    MirroringPolicy,
}

impl MigrationRule {
    /// The registry evaluated by [`evaluate`].
    pub const ALL: [MigrationRule; 7] = [
        MigrationRule::Exclusive,
        MigrationRule::AutoDelete,
        MigrationRule::NonDurable,
        MigrationRule::AlreadyTargetType,
        MigrationRule::DroppedArgument,
        MigrationRule::IncompatibleArgumentValue,
        MigrationRule::MirroringPolicy,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            MigrationRule::Exclusive => "exclusive",
            MigrationRule::AutoDelete => "auto-delete",
            MigrationRule::NonDurable => "non-durable",
            MigrationRule::AlreadyTargetType => "already-target-type",
            MigrationRule::DroppedArgument => "dropped-argument",
            MigrationRule::IncompatibleArgumentValue => "incompatible-argument-value",
            MigrationRule::MirroringPolicy => "mirroring-policy",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            MigrationRule::Exclusive
            | MigrationRule::AutoDelete
            | MigrationRule::NonDurable
            | MigrationRule::AlreadyTargetType => Severity::Blocker,
            MigrationRule::DroppedArgument
            | MigrationRule::IncompatibleArgumentValue
            | MigrationRule::MirroringPolicy => Severity::Warning,
        }
    }

    pub fn applies(&self, descriptor: &QueueDescriptor, target: QueueType) -> bool {
        !self.matches(descriptor, target).is_empty()
    }

    /// Every match this rule produces. Argument rules yield one match per argument.
    pub fn matches(&self, descriptor: &QueueDescriptor, target: QueueType) -> Vec<RuleMatch> {
        match self {
            MigrationRule::Exclusive => self.when(
                descriptor.exclusive,
                "Exclusive queues are not supported: their lifetime is tied to the declaring connection."
                    .to_string(),
            ),
            MigrationRule::AutoDelete => self.when(
                descriptor.auto_delete,
                "Auto-delete queues cannot be migrated: they have no stable identity to recreate."
                    .to_string(),
            ),
            MigrationRule::NonDurable => self.when(
                !descriptor.durable,
                format!(
                    "Non-durable queues cannot be migrated: {} queues must be durable.",
                    target
                ),
            ),
            MigrationRule::AlreadyTargetType => self.when(
                descriptor.current_type == target,
                format!("Queue is already of type {}.", target),
            ),
            MigrationRule::DroppedArgument => descriptor
                .arguments
                .keys()
                .filter(|key| is_dropped_argument(key, target))
                .map(|key| {
                    self.about(
                        key,
                        format!("Setting '{}' will be removed during migration.", key),
                    )
                })
                .collect(),
            MigrationRule::IncompatibleArgumentValue => descriptor
                .arguments
                .iter()
                .filter(|(key, value)| is_incompatible_value(key, value, target))
                .map(|(key, value)| {
                    self.about(
                        key,
                        format!(
                            "Argument '{}={}' is not compatible with {} queues and will be removed.",
                            key,
                            display_value(value),
                            target
                        ),
                    )
                })
                .collect(),
            MigrationRule::MirroringPolicy => {
                let mirrored = descriptor
                    .effective_policy
                    .keys()
                    .any(|key| key.starts_with(MIRRORING_PREFIX));
                if !mirrored || !target.is_migration_target() {
                    return Vec::new();
                }
                let policy = descriptor.policy.as_deref().unwrap_or("<unnamed>");
                vec![self.about(
                    policy,
                    format!(
                        "Classic mirroring policy '{}' will be ignored by {} queues.",
                        policy, target
                    ),
                )]
            }
        }
    }

    fn when(&self, triggered: bool, message: String) -> Vec<RuleMatch> {
        if !triggered {
            return Vec::new();
        }
        vec![RuleMatch {
            id: self.id().to_string(),
            severity: self.severity(),
            message,
            subject: None,
        }]
    }

    fn about(&self, subject: &str, message: String) -> RuleMatch {
        RuleMatch {
            id: self.id().to_string(),
            severity: self.severity(),
            message,
            subject: Some(subject.to_string()),
        }
    }
}

/// Plans the conversion of `descriptor` to `target` using the full rule registry.
pub fn evaluate(descriptor: &QueueDescriptor, target: QueueType) -> MigrationPlan {
    evaluate_with(&MigrationRule::ALL, descriptor, target)
}

/// Plans against an explicit rule list.
///
/// Matches are ordered by rule then subject, so the plan does not depend on the
/// order of `rules`.
pub fn evaluate_with(
    rules: &[MigrationRule],
    descriptor: &QueueDescriptor,
    target: QueueType,
) -> MigrationPlan {
    let mut hits: Vec<(MigrationRule, RuleMatch)> = rules
        .iter()
        .flat_map(|rule| {
            rule.matches(descriptor, target)
                .into_iter()
                .map(move |m| (*rule, m))
        })
        .collect();
    hits.sort_by(|(ra, a), (rb, b)| {
        ra.cmp(rb)
            .then_with(|| a.subject.cmp(&b.subject))
            .then_with(|| a.message.cmp(&b.message))
    });
    hits.dedup();

    let (blockers, warnings): (Vec<_>, Vec<_>) = hits
        .into_iter()
        .map(|(_, m)| m)
        .partition(|m| m.severity == Severity::Blocker);

    let verdict = if blockers.is_empty() {
        Verdict::Go
    } else {
        Verdict::Blocked
    };

    MigrationPlan {
        queue_ref: descriptor.queue_ref(),
        current_type: descriptor.current_type,
        target_type: target,
        blockers,
        warnings,
        verdict,
    }
}

/// Argument keys that will not be carried over to a `target` queue.
pub fn removed_arguments(descriptor: &QueueDescriptor, target: QueueType) -> Vec<String> {
    descriptor
        .arguments
        .iter()
        .filter(|(key, value)| {
            is_dropped_argument(key, target) || is_incompatible_value(key, value, target)
        })
        .map(|(key, _)| key.clone())
        .collect()
}

/// Arguments to declare a `target` queue with: the source's arguments minus
/// everything the plan warned about, with the queue type rewritten.
pub fn target_arguments(descriptor: &QueueDescriptor, target: QueueType) -> QueueArguments {
    let mut arguments: QueueArguments = descriptor
        .arguments
        .iter()
        .filter(|(key, value)| {
            !is_dropped_argument(key, target) && !is_incompatible_value(key, value, target)
        })
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    arguments.insert(
        QUEUE_TYPE_ARGUMENT.to_string(),
        Value::String(target.as_str().to_string()),
    );
    arguments
}

fn is_dropped_argument(key: &str, target: QueueType) -> bool {
    if !target.is_migration_target() {
        return false;
    }
    CLASSIC_ONLY_ARGUMENTS.contains(&key)
        || key.starts_with(MIRRORING_PREFIX)
        || (target == QueueType::Stream && STREAM_UNSUPPORTED_ARGUMENTS.contains(&key))
}

fn is_incompatible_value(key: &str, value: &Value, target: QueueType) -> bool {
    INCOMPATIBLE_VALUES
        .iter()
        .any(|(t, k, v)| *t == target && *k == key && value.as_str() == Some(*v))
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
#[path = "rules_tests.rs"]
mod rules_tests;
