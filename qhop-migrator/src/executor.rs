use qhop_core::rules::{self, QUEUE_TYPE_ARGUMENT};
use qhop_core::{
    normalize_vhost, temp_queue_name, BrokerClient, BrokerError, BrokerOp, MigrationError,
    MigrationJob, MigrationPhase, MigrationPlan, MigrationResult, QueueDeclaration,
    QueueDescriptor, QueueRef, QueueType, Result, TempQueueState, Verdict,
};
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::MigratorConfig;
use crate::retry::{DrainFailure, RetryPolicy};

/// Converts one queue by swapping its messages through `<name>_temp_migrated`.
///
/// The protocol never deletes a queue that holds messages it still needs: every
/// delete uses the broker's if-empty guard, except for a stream temp queue whose
/// full contents were counted back into the final queue. Whatever a failure
/// leaves behind stays observable on the broker and is reported in the
/// [`MigrationResult`].
pub struct MigrationExecutor<B: BrokerClient> {
    broker: Arc<B>,
    retry: RetryPolicy,
    verify: bool,
    cancel: CancellationToken,
}

impl<B: BrokerClient> Clone for MigrationExecutor<B> {
    fn clone(&self) -> Self {
        Self {
            broker: Arc::clone(&self.broker),
            retry: self.retry.clone(),
            verify: self.verify,
            cancel: self.cancel.clone(),
        }
    }
}

impl<B: BrokerClient> MigrationExecutor<B> {
    pub fn new(broker: Arc<B>, config: &MigratorConfig) -> Self {
        Self {
            broker,
            retry: RetryPolicy::from_config(&config.retry),
            verify: config.verify,
            cancel: CancellationToken::new(),
        }
    }

    /// Jobs observe `cancel` between phases and stop with a `cancelled` error.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Migrates `descriptor` to `target`.
    ///
    /// Never returns an error: blocked plans, rejected input and mid-protocol
    /// failures are all reported through the result.
    pub async fn execute(&self, descriptor: &QueueDescriptor, target: QueueType) -> MigrationResult {
        let plan = rules::evaluate(descriptor, target);

        if let Err(err) = target.ensure_target().and_then(|_| descriptor.validate()) {
            warn!(queue = %descriptor.name, vhost = %descriptor.vhost, error = %err, "migration rejected");
            return MigrationResult::rejected(plan, &err);
        }
        if !plan.is_go() {
            info!(
                queue = %descriptor.name,
                vhost = %descriptor.vhost,
                blockers = plan.blockers.len(),
                "migration blocked: {}",
                plan.reason()
            );
            return MigrationResult::blocked(plan);
        }

        let mut job = MigrationJob::new(descriptor.queue_ref(), target);
        info!(
            queue = %descriptor.name,
            vhost = %descriptor.vhost,
            target = %target,
            temp_queue = %job.temp_queue,
            "starting migration"
        );

        match self.migrate(&mut job).await {
            Ok(()) => {
                info!(
                    queue = %job.source_queue.name,
                    vhost = %job.source_queue.vhost,
                    moved_out = job.messages_moved_out,
                    moved_in = job.messages_moved_in,
                    "migration completed"
                );
                job.into_result(plan, TempQueueState::absent())
            }
            Err(err) => self.finish_failed(job, plan, err).await,
        }
    }

    async fn migrate(&self, job: &mut MigrationJob) -> Result<()> {
        let vhost = job.source_queue.vhost.clone();
        let source = job.source_queue.name.clone();
        let temp = job.temp_queue.clone();
        let target = job.target_type;

        // pending: the listing may be stale, plan again against a fresh read
        self.checkpoint()?;
        let fresh = self
            .retry
            .run(BrokerOp::Get, &source, || self.broker.get_queue(&vhost, &source))
            .await?;
        let replan = rules::evaluate(&fresh, target);
        if !replan.is_go() {
            return Err(MigrationError::Validation(format!(
                "queue {} changed since planning: {}",
                job.source_queue,
                replan.reason()
            )));
        }
        self.ensure_absent(&vhost, &temp).await?;

        let arguments = rules::target_arguments(&fresh, target);
        for key in rules::removed_arguments(&fresh, target) {
            debug!(queue = %source, argument = %key, "argument not carried over");
        }

        job.advance(MigrationPhase::DrainingSource)?;
        self.create(
            &vhost,
            &QueueDeclaration {
                name: temp.clone(),
                queue_type: target,
                durable: fresh.durable,
                arguments: arguments.clone(),
            },
        )
        .await?;
        let drained = self.drain(&vhost, &source, fresh.current_type, &temp).await;
        job.messages_moved_out = moved(&drained);
        drained.map_err(|f| f.error)?;
        if job.messages_moved_out == 0 {
            info!(queue = %source, vhost = %vhost, "No messages found in source queue");
        }

        self.checkpoint()?;
        job.advance(MigrationPhase::SourceDrained)?;
        self.delete(&vhost, &source, true).await?;
        warn!(queue = %source, vhost = %vhost, "source queue deleted, its bindings are not recreated");
        self.create(
            &vhost,
            &QueueDeclaration {
                name: source.clone(),
                queue_type: target,
                durable: fresh.durable,
                arguments,
            },
        )
        .await?;
        job.advance(MigrationPhase::TargetCreated)?;

        // the source is gone: finishing the refill is the only safe way out
        job.advance(MigrationPhase::RefillingTarget)?;
        let refilled = self.drain(&vhost, &temp, target, &source).await;
        job.messages_moved_in = moved(&refilled);
        refilled.map_err(|f| f.error)?;

        job.advance(MigrationPhase::Verifying)?;
        let expected = job.messages_moved_out;
        self.verify(job, expected).await;
        self.remove_temp(job, target, expected).await?;
        job.advance(MigrationPhase::Completed)
    }

    /// Moves the contents of `<queue>_temp_migrated` back into `queue`, recreated
    /// as `original`.
    ///
    /// Refused with a validation error, before anything is touched, when there is
    /// nothing to roll back or when `queue` already exists with a type other than
    /// `original` and holds messages: putting the temp contents behind messages
    /// already refilled into the new queue would reorder them. An empty queue of
    /// the new type is deleted and replaced.
    pub async fn rollback(
        &self,
        vhost: &str,
        queue: &str,
        original: QueueType,
    ) -> Result<MigrationResult> {
        let vhost = normalize_vhost(vhost);
        let source_ref = QueueRef::new(vhost.clone(), queue);
        let temp = temp_queue_name(queue);

        let temp_queue = match self.lookup(&vhost, &temp).await? {
            Some(d) if d.message_count > 0 => d,
            Some(_) => {
                return Err(MigrationError::Validation(format!(
                    "nothing to roll back: temporary queue '{}' is empty",
                    temp
                )))
            }
            None => {
                return Err(MigrationError::Validation(format!(
                    "nothing to roll back: temporary queue '{}' does not exist",
                    temp
                )))
            }
        };
        let existing = self.lookup(&vhost, queue).await?;
        if let Some(current) = &existing {
            if current.current_type != original && current.message_count > 0 {
                return Err(MigrationError::Validation(format!(
                    "queue {} already exists as a {} queue; rolling back into it would reorder messages",
                    source_ref, current.current_type
                )));
            }
        }

        let plan = MigrationPlan {
            queue_ref: source_ref.clone(),
            current_type: temp_queue.current_type,
            target_type: original,
            blockers: Vec::new(),
            warnings: Vec::new(),
            verdict: Verdict::Go,
        };
        let mut job = MigrationJob::new(source_ref, original);
        info!(
            queue,
            vhost = %vhost,
            original = %original,
            temp_messages = temp_queue.message_count,
            "starting rollback"
        );

        match self.restore(&mut job, existing.as_ref(), &temp_queue).await {
            Ok(()) => {
                info!(queue, vhost = %vhost, moved_in = job.messages_moved_in, "rollback completed");
                Ok(job.into_result(plan, TempQueueState::absent()))
            }
            Err(err) => Ok(self.finish_failed(job, plan, err).await),
        }
    }

    async fn restore(
        &self,
        job: &mut MigrationJob,
        existing: Option<&QueueDescriptor>,
        temp_queue: &QueueDescriptor,
    ) -> Result<()> {
        let vhost = job.source_queue.vhost.clone();
        let source = job.source_queue.name.clone();
        let temp = job.temp_queue.clone();

        // only a queue still of the original type holds the tail of the sequence;
        // one of the new type was checked to be empty
        let remainder = existing.filter(|d| d.current_type == job.target_type);

        self.checkpoint()?;
        job.advance(MigrationPhase::DrainingSource)?;
        if let Some(current) = remainder {
            // the temp queue holds the head of the sequence; append the rest
            let drained = self.drain(&vhost, &source, current.current_type, &temp).await;
            job.messages_moved_out = moved(&drained);
            drained.map_err(|f| f.error)?;
        }

        self.checkpoint()?;
        job.advance(MigrationPhase::SourceDrained)?;
        if existing.is_some() {
            self.delete(&vhost, &source, true).await?;
        }
        let mut arguments = remainder.map_or_else(
            || temp_queue.arguments.clone(),
            |d| d.arguments.clone(),
        );
        arguments.insert(
            QUEUE_TYPE_ARGUMENT.to_string(),
            Value::from(job.target_type.as_str()),
        );
        self.create(
            &vhost,
            &QueueDeclaration {
                name: source.clone(),
                queue_type: job.target_type,
                durable: existing.map_or(true, |d| d.durable),
                arguments,
            },
        )
        .await?;
        job.advance(MigrationPhase::TargetCreated)?;

        job.advance(MigrationPhase::RefillingTarget)?;
        let refilled = self
            .drain(&vhost, &temp, temp_queue.current_type, &source)
            .await;
        job.messages_moved_in = moved(&refilled);
        refilled.map_err(|f| f.error)?;

        job.advance(MigrationPhase::Verifying)?;
        let expected = temp_queue.message_count + job.messages_moved_out;
        self.verify(job, expected).await;
        self.remove_temp(job, temp_queue.current_type, expected).await?;
        job.advance(MigrationPhase::RolledBack)
    }

    fn checkpoint(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            Err(MigrationError::Cancelled)
        } else {
            Ok(())
        }
    }

    async fn lookup(&self, vhost: &str, name: &str) -> Result<Option<QueueDescriptor>> {
        match self
            .retry
            .run(BrokerOp::Get, name, || self.broker.get_queue(vhost, name))
            .await
        {
            Ok(d) => Ok(Some(d)),
            Err(MigrationError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn ensure_absent(&self, vhost: &str, name: &str) -> Result<()> {
        match self.lookup(vhost, name).await? {
            Some(_) => Err(MigrationError::NameConflict(name.to_string())),
            None => Ok(()),
        }
    }

    async fn create(&self, vhost: &str, declaration: &QueueDeclaration) -> Result<()> {
        let broker = &self.broker;
        let mut attempts = 0u32;
        self.retry
            .run(BrokerOp::Create, &declaration.name, || {
                attempts += 1;
                let retried = attempts > 1;
                async move {
                    match broker.create_queue(vhost, declaration).await {
                        // an earlier attempt landed but its response was lost
                        Err(BrokerError::AlreadyExists(_)) if retried => Ok(()),
                        other => other,
                    }
                }
            })
            .await?;
        debug!(queue = %declaration.name, vhost, queue_type = %declaration.queue_type, "queue declared");
        Ok(())
    }

    async fn delete(&self, vhost: &str, name: &str, if_empty: bool) -> Result<()> {
        let broker = &self.broker;
        let mut attempts = 0u32;
        self.retry
            .run(BrokerOp::Delete, name, || {
                attempts += 1;
                let retried = attempts > 1;
                async move {
                    match broker.delete_queue(vhost, name, if_empty).await {
                        Err(BrokerError::NotFound(_)) if retried => Ok(()),
                        other => other,
                    }
                }
            })
            .await?;
        debug!(queue = name, vhost, if_empty, "queue deleted");
        Ok(())
    }

    async fn drain(
        &self,
        vhost: &str,
        from: &str,
        from_type: QueueType,
        to: &str,
    ) -> std::result::Result<u64, DrainFailure> {
        info!(vhost, from, to, "moving messages");
        let resumable = from_type != QueueType::Stream;
        self.retry
            .run_drain(from, resumable, || self.broker.drain_to(vhost, from, to))
            .await
    }

    /// Deletes the job's temp queue once its contents are back in the source.
    ///
    /// Reading a stream leaves its messages in place, so a stream temp queue can
    /// never pass the if-empty guard. It is deleted unguarded, and only when the
    /// refill moved exactly `expected` messages out of it.
    async fn remove_temp(
        &self,
        job: &MigrationJob,
        temp_type: QueueType,
        expected: u64,
    ) -> Result<()> {
        let vhost = &job.source_queue.vhost;
        if temp_type != QueueType::Stream {
            return self.delete(vhost, &job.temp_queue, true).await;
        }
        if job.messages_moved_in != expected {
            return Err(MigrationError::PartialMigrationFailure {
                queue: job.source_queue.name.clone(),
                phase: job.phase,
                message: format!(
                    "refilled {} of {} message(s) from stream '{}', keeping it",
                    job.messages_moved_in, expected, job.temp_queue
                ),
            });
        }
        self.delete(vhost, &job.temp_queue, false).await
    }

    /// Best-effort count check; mismatches become advisories, never failures.
    async fn verify(&self, job: &mut MigrationJob, expected: u64) {
        if !self.verify {
            return;
        }
        let queue = job.source_queue.name.clone();
        if job.messages_moved_in != expected {
            job.advisories.push(format!(
                "expected {} message(s) to be refilled into '{}' but moved {}",
                expected, queue, job.messages_moved_in
            ));
        }
        match self.broker.get_queue(&job.source_queue.vhost, &queue).await {
            Ok(d) if d.message_count != job.messages_moved_in => job.advisories.push(format!(
                "queue '{}' reports {} message(s) after {} were refilled",
                queue, d.message_count, job.messages_moved_in
            )),
            Ok(_) => {}
            Err(e) => job
                .advisories
                .push(format!("could not read back queue '{}': {}", queue, e)),
        }
        for advisory in &job.advisories {
            warn!(queue = %queue, "verification: {}", advisory);
        }
    }

    async fn finish_failed(
        &self,
        mut job: MigrationJob,
        plan: MigrationPlan,
        err: MigrationError,
    ) -> MigrationResult {
        job.fail(&err);
        let leftover = match err {
            // the name belongs to some other queue, not to this job
            MigrationError::NameConflict(_) => TempQueueState::absent(),
            _ => self.inspect_temp(&job.source_queue.vhost, &job.temp_queue).await,
        };
        let phase = job.error.as_ref().map_or(job.phase, |e| e.phase);
        error!(
            queue = %job.source_queue.name,
            vhost = %job.source_queue.vhost,
            phase = %phase,
            moved_out = job.messages_moved_out,
            moved_in = job.messages_moved_in,
            temp_queue = %job.temp_queue,
            temp_queue_exists = leftover.exists,
            temp_queue_messages = ?leftover.messages,
            error = %err,
            "migration failed"
        );
        if leftover.holds_messages() {
            warn!(
                temp_queue = %job.temp_queue,
                "temporary queue still holds messages; it is left in place for recovery"
            );
        }
        job.into_result(plan, leftover)
    }

    async fn inspect_temp(&self, vhost: &str, temp: &str) -> TempQueueState {
        match self.lookup(vhost, temp).await {
            Ok(Some(d)) => TempQueueState::holding(d.message_count),
            Ok(None) => TempQueueState::absent(),
            Err(e) => {
                warn!(temp_queue = temp, error = %e, "could not read temporary queue");
                // unknown contents, assume it may hold messages
                TempQueueState {
                    exists: true,
                    messages: None,
                }
            }
        }
    }
}

fn moved(outcome: &std::result::Result<u64, DrainFailure>) -> u64 {
    match outcome {
        Ok(n) => *n,
        Err(failure) => failure.moved,
    }
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod executor_tests;
