use async_trait::async_trait;
use dashmap::{mapref::entry::Entry, DashMap};
use std::collections::VecDeque;
use std::sync::Arc;

use super::client::{BrokerClient, BrokerOp, QueueDeclaration};
use super::errors::{BrokerError, DrainError, Result};
use crate::queue::{QueueDescriptor, QueueType};

type QueueKey = (String, String);

#[derive(Debug, Clone)]
struct MemoryQueue {
    descriptor: QueueDescriptor,
    messages: VecDeque<Vec<u8>>,
}

impl MemoryQueue {
    fn snapshot(&self) -> QueueDescriptor {
        let mut descriptor = self.descriptor.clone();
        descriptor.message_count = self.messages.len() as u64;
        descriptor
    }
}

#[derive(Debug, Clone)]
struct OpFault {
    error: BrokerError,
    // None fails every call
    remaining: Option<u32>,
}

#[derive(Debug, Clone)]
struct DrainFault {
    after: u64,
    moved: u64,
    error: BrokerError,
}

/// MemoryBroker is an in-memory broker that implements the BrokerClient trait.
/// SHOULD BE USED ONLY FOR TESTING PURPOSES
///
/// Faults can be injected per operation and queue to exercise retry and
/// partial-failure paths.
///
/// Stream queues behave like the real thing: draining one copies its log from
/// the first offset and leaves every message in place.
#[derive(Debug, Clone, Default)]
pub struct MemoryBroker {
    queues: Arc<DashMap<QueueKey, MemoryQueue>>,
    op_faults: Arc<DashMap<(BrokerOp, String), OpFault>>,
    drain_faults: Arc<DashMap<String, DrainFault>>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a queue as described; any `message_count` on the descriptor is ignored.
    pub fn declare(&self, descriptor: QueueDescriptor) {
        let key = (descriptor.vhost.clone(), descriptor.name.clone());
        self.queues.insert(
            key,
            MemoryQueue {
                descriptor,
                messages: VecDeque::new(),
            },
        );
    }

    pub fn publish(&self, vhost: &str, queue: &str, payload: impl Into<Vec<u8>>) -> Result<()> {
        match self.queues.get_mut(&key(vhost, queue)) {
            Some(mut q) => {
                q.messages.push_back(payload.into());
                Ok(())
            }
            None => Err(BrokerError::NotFound(queue.to_string())),
        }
    }

    /// Message payloads currently enqueued, head first.
    pub fn messages(&self, vhost: &str, queue: &str) -> Option<Vec<Vec<u8>>> {
        self.queues
            .get(&key(vhost, queue))
            .map(|q| q.messages.iter().cloned().collect())
    }

    pub fn contains(&self, vhost: &str, queue: &str) -> bool {
        self.queues.contains_key(&key(vhost, queue))
    }

    pub fn descriptor(&self, vhost: &str, queue: &str) -> Option<QueueDescriptor> {
        self.queues.get(&key(vhost, queue)).map(|q| q.snapshot())
    }

    /// Fails `op` on `queue` with `error`, for the next `times` calls or forever when `None`.
    ///
    /// For `List` the queue is the vhost; for `Drain` it is the drain source.
    pub fn fail_operation(&self, op: BrokerOp, queue: &str, error: BrokerError, times: Option<u32>) {
        self.op_faults.insert(
            (op, queue.to_string()),
            OpFault {
                error,
                remaining: times,
            },
        );
    }

    /// Lets drains out of `source` move `after` messages in total, then fails every drain call.
    pub fn fail_drain_after(&self, source: &str, after: u64, error: BrokerError) {
        self.drain_faults.insert(
            source.to_string(),
            DrainFault {
                after,
                moved: 0,
                error,
            },
        );
    }

    pub fn clear_faults(&self) {
        self.op_faults.clear();
        self.drain_faults.clear();
    }

    fn check_fault(&self, op: BrokerOp, queue: &str) -> Result<()> {
        let Some(mut fault) = self.op_faults.get_mut(&(op, queue.to_string())) else {
            return Ok(());
        };
        match fault.remaining {
            Some(0) => Ok(()),
            Some(n) => {
                fault.remaining = Some(n - 1);
                Err(fault.error.clone())
            }
            None => Err(fault.error.clone()),
        }
    }

    /// Reads the stream from the first offset up to the length seen on attach.
    fn copy_stream(
        &self,
        src: &QueueKey,
        dst: &QueueKey,
        source: &str,
        dest: &str,
    ) -> std::result::Result<u64, DrainError> {
        let log: Vec<Vec<u8>> = match self.queues.get(src) {
            Some(q) => q.messages.iter().cloned().collect(),
            None => return Err(BrokerError::NotFound(source.to_string()).into()),
        };

        let mut moved = 0u64;
        for payload in log {
            if let Some(error) = self.drain_blocked(source) {
                return Err(DrainError::new(moved, error));
            }
            match self.queues.get_mut(dst) {
                Some(mut q) => q.messages.push_back(payload),
                None => {
                    return Err(DrainError::new(
                        moved,
                        BrokerError::NotFound(dest.to_string()),
                    ))
                }
            }
            moved += 1;
            if let Some(mut fault) = self.drain_faults.get_mut(source) {
                fault.moved += 1;
            }
        }
        Ok(moved)
    }

    fn drain_blocked(&self, source: &str) -> Option<BrokerError> {
        self.drain_faults
            .get(source)
            .filter(|f| f.moved >= f.after)
            .map(|f| f.error.clone())
    }
}

fn key(vhost: &str, name: &str) -> QueueKey {
    (vhost.to_string(), name.to_string())
}

#[async_trait]
impl BrokerClient for MemoryBroker {
    async fn list_queues(
        &self,
        vhost: &str,
        name_filter: Option<&str>,
    ) -> Result<Vec<QueueDescriptor>> {
        self.check_fault(BrokerOp::List, vhost)?;

        let mut queues: Vec<QueueDescriptor> = self
            .queues
            .iter()
            .filter(|entry| entry.key().0 == vhost)
            .filter(|entry| name_filter.map_or(true, |f| entry.key().1.contains(f)))
            .map(|entry| entry.value().snapshot())
            .collect();
        queues.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(queues)
    }

    async fn get_queue(&self, vhost: &str, name: &str) -> Result<QueueDescriptor> {
        self.check_fault(BrokerOp::Get, name)?;
        self.descriptor(vhost, name)
            .ok_or_else(|| BrokerError::NotFound(name.to_string()))
    }

    async fn create_queue(&self, vhost: &str, declaration: &QueueDeclaration) -> Result<()> {
        self.check_fault(BrokerOp::Create, &declaration.name)?;

        match self.queues.entry(key(vhost, &declaration.name)) {
            Entry::Occupied(_) => Err(BrokerError::AlreadyExists(declaration.name.clone())),
            Entry::Vacant(slot) => {
                let mut descriptor =
                    QueueDescriptor::new(vhost, declaration.name.clone(), declaration.queue_type)
                        .with_durable(declaration.durable);
                descriptor.arguments = declaration.arguments.clone();
                slot.insert(MemoryQueue {
                    descriptor,
                    messages: VecDeque::new(),
                });
                Ok(())
            }
        }
    }

    async fn delete_queue(&self, vhost: &str, name: &str, if_empty: bool) -> Result<()> {
        self.check_fault(BrokerOp::Delete, name)?;

        let k = key(vhost, name);
        if if_empty {
            if let Some(q) = self.queues.get(&k) {
                if !q.messages.is_empty() {
                    return Err(BrokerError::Rejected {
                        status: 400,
                        reason: format!("queue '{}' is not empty", name),
                    });
                }
            }
        }
        match self.queues.remove(&k) {
            Some(_) => Ok(()),
            None => Err(BrokerError::NotFound(name.to_string())),
        }
    }

    async fn drain_to(
        &self,
        vhost: &str,
        source: &str,
        dest: &str,
    ) -> std::result::Result<u64, DrainError> {
        self.check_fault(BrokerOp::Drain, source)?;

        if source == dest {
            return Err(BrokerError::Protocol(format!(
                "cannot drain queue '{}' into itself",
                source
            ))
            .into());
        }
        let src = key(vhost, source);
        let dst = key(vhost, dest);
        let source_type = match self.queues.get(&src) {
            Some(q) => q.descriptor.current_type,
            None => return Err(BrokerError::NotFound(source.to_string()).into()),
        };
        if !self.queues.contains_key(&dst) {
            return Err(BrokerError::NotFound(dest.to_string()).into());
        }
        if source_type == QueueType::Stream {
            return self.copy_stream(&src, &dst, source, dest);
        }

        let mut moved = 0u64;
        loop {
            if let Some(error) = self.drain_blocked(source) {
                return Err(DrainError::new(moved, error));
            }

            let next = match self.queues.get_mut(&src) {
                Some(mut q) => q.messages.pop_front(),
                None => {
                    return Err(DrainError::new(
                        moved,
                        BrokerError::NotFound(source.to_string()),
                    ))
                }
            };
            let Some(payload) = next else {
                break;
            };

            let delivered = match self.queues.get_mut(&dst) {
                Some(mut q) => {
                    q.messages.push_back(payload);
                    None
                }
                None => Some(payload),
            };
            if let Some(payload) = delivered {
                // unacked: the message goes back to the head of the source
                if let Some(mut q) = self.queues.get_mut(&src) {
                    q.messages.push_front(payload);
                }
                return Err(DrainError::new(
                    moved,
                    BrokerError::NotFound(dest.to_string()),
                ));
            }

            moved += 1;
            if let Some(mut fault) = self.drain_faults.get_mut(source) {
                fault.moved += 1;
            }
        }
        Ok(moved)
    }
}

#[cfg(test)]
#[path = "memory_broker_tests.rs"]
mod memory_broker_tests;
