//! qhop-migrator
//!
//! Drives the temporary-queue swap that converts classic queues to quorum or
//! stream queues, one queue at a time or across a whole vhost.

mod config;
pub use config::{MigratorConfig, RetryConfig};

mod executor;
pub use executor::MigrationExecutor;

mod fleet;
pub use fleet::FleetCoordinator;

mod planner;
pub use planner::{plan_descriptors, Planner};

mod report;
pub use report::{PlanReport, ReportEntry, ReportSummary, DEFAULT_REPORT_PATH};

mod retry;
pub use retry::{DrainFailure, RetryPolicy};
