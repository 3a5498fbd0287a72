use qhop_core::{
    normalize_vhost, rules, BrokerClient, BrokerOp, MigrationPlan, QueueDescriptor, QueueType,
    Result, TEMP_QUEUE_SUFFIX,
};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::MigratorConfig;
use crate::retry::RetryPolicy;

/// Read-only readiness checks against a live broker.
pub struct Planner<B: BrokerClient> {
    broker: Arc<B>,
    retry: RetryPolicy,
}

impl<B: BrokerClient> Planner<B> {
    pub fn new(broker: Arc<B>, config: &MigratorConfig) -> Self {
        Self {
            broker,
            retry: RetryPolicy::from_config(&config.retry),
        }
    }

    pub async fn plan_queue(&self, vhost: &str, name: &str, target: QueueType) -> Result<MigrationPlan> {
        target.ensure_target()?;
        let vhost = normalize_vhost(vhost);
        let descriptor = self
            .retry
            .run(BrokerOp::Get, name, || self.broker.get_queue(&vhost, name))
            .await?;
        let plan = rules::evaluate(&descriptor, target);
        info!(
            queue = name,
            vhost = %vhost,
            verdict = ?plan.verdict,
            warnings = plan.warnings.len(),
            "planned queue"
        );
        Ok(plan)
    }

    /// Plans every queue of `vhost` (optionally only names containing
    /// `name_filter`), sorted by name.
    pub async fn plan_vhost(
        &self,
        vhost: &str,
        name_filter: Option<&str>,
        target: QueueType,
    ) -> Result<Vec<MigrationPlan>> {
        target.ensure_target()?;
        let vhost = normalize_vhost(vhost);
        let queues = self
            .retry
            .run(BrokerOp::List, &vhost, || {
                self.broker.list_queues(&vhost, name_filter)
            })
            .await?;
        Ok(plan_descriptors(&queues, target))
    }
}

/// Plans already-loaded descriptors, e.g. from a definitions export.
/// Results are sorted by vhost, then name.
pub fn plan_descriptors(descriptors: &[QueueDescriptor], target: QueueType) -> Vec<MigrationPlan> {
    let mut plans: Vec<MigrationPlan> = descriptors
        .iter()
        .inspect(|d| {
            if d.name.ends_with(TEMP_QUEUE_SUFFIX) {
                warn!(
                    queue = %d.name,
                    vhost = %d.vhost,
                    messages = d.message_count,
                    "leftover temporary queue from an earlier migration"
                );
            }
        })
        .map(|d| rules::evaluate(d, target))
        .collect();
    plans.sort_by(|a, b| a.queue_ref.cmp(&b.queue_ref));
    plans
}
