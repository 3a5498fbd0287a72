use futures::stream::{self, StreamExt};
use qhop_core::rules;
use qhop_core::{
    normalize_vhost, BrokerClient, BrokerOp, MigrationError, MigrationResult, QueueDescriptor,
    QueueType, Result,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::MigratorConfig;
use crate::executor::MigrationExecutor;
use crate::retry::RetryPolicy;

/// Migrates every classic queue of a vhost.
///
/// Queues are taken in name order and results come back in that same order,
/// whatever the concurrency. A failed queue never stops the others.
pub struct FleetCoordinator<B: BrokerClient> {
    broker: Arc<B>,
    executor: MigrationExecutor<B>,
    retry: RetryPolicy,
    concurrency: usize,
    cancel: CancellationToken,
}

impl<B: BrokerClient> FleetCoordinator<B> {
    pub fn new(broker: Arc<B>, config: &MigratorConfig) -> Self {
        let cancel = CancellationToken::new();
        let executor =
            MigrationExecutor::new(Arc::clone(&broker), config).with_cancellation(cancel.clone());
        Self {
            broker,
            executor,
            retry: RetryPolicy::from_config(&config.retry),
            concurrency: config.concurrency.max(1),
            cancel,
        }
    }

    /// Token that aborts the run: queues not yet started are reported as
    /// cancelled, running jobs stop at their next phase boundary.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Plans and, where the plan allows it, migrates every classic queue in `vhost`.
    ///
    /// # Errors
    ///
    /// Only whole-run problems are errors: an invalid target or a vhost that
    /// cannot be listed. Per-queue outcomes are in the returned results.
    pub async fn migrate_all(&self, vhost: &str, target: QueueType) -> Result<Vec<MigrationResult>> {
        target.ensure_target()?;
        let vhost = normalize_vhost(vhost);

        let mut candidates: Vec<QueueDescriptor> = self
            .retry
            .run(BrokerOp::List, &vhost, || self.broker.list_queues(&vhost, None))
            .await?
            .into_iter()
            .filter(|q| q.current_type == QueueType::Classic)
            .collect();
        candidates.sort_by(|a, b| a.name.cmp(&b.name));

        info!(
            vhost = %vhost,
            target = %target,
            queues = candidates.len(),
            concurrency = self.concurrency,
            "starting fleet migration"
        );

        let results: Vec<MigrationResult> = stream::iter(candidates)
            .map(|descriptor| self.migrate_one(descriptor, target))
            .buffered(self.concurrency)
            .collect()
            .await;

        let completed = results.iter().filter(|r| r.is_success()).count();
        let blocked = results.iter().filter(|r| r.is_blocked()).count();
        let failed = results.iter().filter(|r| r.error.is_some()).count();
        info!(
            vhost = %vhost,
            total = results.len(),
            completed,
            blocked,
            failed,
            "fleet migration finished"
        );
        Ok(results)
    }

    async fn migrate_one(&self, descriptor: QueueDescriptor, target: QueueType) -> MigrationResult {
        if self.cancel.is_cancelled() {
            let plan = rules::evaluate(&descriptor, target);
            if !plan.is_go() {
                return MigrationResult::blocked(plan);
            }
            warn!(queue = %descriptor.name, "skipping queue, run cancelled");
            return MigrationResult::rejected(plan, &MigrationError::Cancelled);
        }
        self.executor.execute(&descriptor, target).await
    }
}

#[cfg(test)]
#[path = "fleet_tests.rs"]
mod fleet_tests;
