//! qhop-core
//!
//! qhop-core -- queue model, migration readiness rules and the broker capability
//! shared by the qhop client, migrator and cli.

pub mod broker;
pub use broker::{
    BrokerClient, BrokerError, BrokerOp, DrainError, MemoryBroker, QueueDeclaration,
};

pub mod definitions;

pub mod errors;
pub use errors::{ErrorKind, MigrationError, Result};

pub mod job;
pub use job::{ErrorRecord, MigrationJob, MigrationPhase, MigrationResult, TempQueueState};

pub mod plan;
pub use plan::{MigrationPlan, PlanStatus, RuleMatch, Severity, Verdict};

pub mod queue;
pub use queue::{
    normalize_vhost, temp_queue_name, QueueArguments, QueueDescriptor, QueueRef, QueueType,
    TEMP_QUEUE_SUFFIX,
};

pub mod rules;
pub use rules::{evaluate, MigrationRule};
