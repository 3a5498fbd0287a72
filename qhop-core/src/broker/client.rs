use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::errors::{DrainError, Result};
use crate::queue::{QueueArguments, QueueDescriptor, QueueType};

/// Everything needed to declare a queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueDeclaration {
    pub name: String,
    pub queue_type: QueueType,
    pub durable: bool,
    pub arguments: QueueArguments,
}

/// Broker operations, used to label calls in logs and fault injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BrokerOp {
    List,
    Get,
    Create,
    Delete,
    Drain,
}

impl fmt::Display for BrokerOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BrokerOp::List => "list_queues",
            BrokerOp::Get => "get_queue",
            BrokerOp::Create => "create_queue",
            BrokerOp::Delete => "delete_queue",
            BrokerOp::Drain => "drain_to",
        };
        f.write_str(name)
    }
}

/// Typed access to a broker's queues.
///
/// Implementations must be safe to share between concurrently running jobs.
#[async_trait]
pub trait BrokerClient: Send + Sync + 'static {
    /// Queues in `vhost`, optionally restricted to names containing `name_filter`.
    async fn list_queues(
        &self,
        vhost: &str,
        name_filter: Option<&str>,
    ) -> Result<Vec<QueueDescriptor>>;

    /// Fresh snapshot of one queue, or `NotFound`.
    async fn get_queue(&self, vhost: &str, name: &str) -> Result<QueueDescriptor>;

    /// Declares a new queue; `AlreadyExists` if the name is taken.
    async fn create_queue(&self, vhost: &str, declaration: &QueueDeclaration) -> Result<()>;

    /// Deletes a queue. With `if_empty` the broker refuses to drop a queue holding messages.
    async fn delete_queue(&self, vhost: &str, name: &str, if_empty: bool) -> Result<()>;

    /// Moves every message from `source` to `dest` in FIFO order, acknowledging each
    /// source message only after the broker confirmed its republish.
    ///
    /// A stream source is copied from its first offset and keeps its messages.
    async fn drain_to(
        &self,
        vhost: &str,
        source: &str,
        dest: &str,
    ) -> std::result::Result<u64, DrainError>;
}
