//! Queues from a RabbitMQ definitions export (`rabbitmqctl export_definitions`).

use regex::Regex;
use serde::Deserialize;
use std::path::Path;
use tracing::info;

use crate::errors::{MigrationError, Result};
use crate::queue::{normalize_vhost, QueueArguments, QueueDescriptor, QueueType};
use crate::rules::QUEUE_TYPE_ARGUMENT;

#[derive(Debug, Deserialize)]
struct Definitions {
    #[serde(default)]
    queues: Vec<DefinedQueue>,
    #[serde(default)]
    policies: Vec<DefinedPolicy>,
}

#[derive(Debug, Deserialize)]
struct DefinedQueue {
    name: String,
    #[serde(default = "default_vhost")]
    vhost: String,
    #[serde(rename = "type", default)]
    queue_type: Option<String>,
    #[serde(default = "default_durable")]
    durable: bool,
    #[serde(default)]
    auto_delete: bool,
    // exports never contain exclusive queues, but hand-written files might
    #[serde(default)]
    exclusive: bool,
    #[serde(default)]
    arguments: QueueArguments,
}

#[derive(Debug, Deserialize)]
struct DefinedPolicy {
    #[serde(default = "default_vhost")]
    vhost: String,
    name: String,
    pattern: String,
    #[serde(rename = "apply-to", default = "default_apply_to")]
    apply_to: String,
    #[serde(default)]
    definition: QueueArguments,
    #[serde(default)]
    priority: i64,
}

fn default_vhost() -> String {
    "/".to_string()
}

fn default_durable() -> bool {
    true
}

fn default_apply_to() -> String {
    "all".to_string()
}

struct CompiledPolicy {
    vhost: String,
    name: String,
    pattern: Regex,
    apply_to: String,
    definition: QueueArguments,
    priority: i64,
}

impl CompiledPolicy {
    fn applies_to(&self, queue: &QueueDescriptor) -> bool {
        let kind_matches = match self.apply_to.as_str() {
            "all" | "queues" => true,
            "classic_queues" => queue.current_type == QueueType::Classic,
            "quorum_queues" => queue.current_type == QueueType::Quorum,
            "streams" => queue.current_type == QueueType::Stream,
            _ => false,
        };
        kind_matches && self.vhost == queue.vhost && self.pattern.is_match(&queue.name)
    }
}

/// Reads a definitions export from disk.
pub fn load_definitions(path: impl AsRef<Path>) -> Result<Vec<QueueDescriptor>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| {
        MigrationError::Definitions(format!("cannot read '{}': {}", path.display(), e))
    })?;
    let queues = parse_definitions(&content)?;
    info!(
        count = queues.len(),
        file = %path.display(),
        "loaded queues from definitions file"
    );
    Ok(queues)
}

/// Parses a definitions export, resolving each queue's effective policy the way
/// the broker would: the highest-priority matching policy wins.
pub fn parse_definitions(content: &str) -> Result<Vec<QueueDescriptor>> {
    let definitions: Definitions = serde_json::from_str(content)
        .map_err(|e| MigrationError::Definitions(format!("invalid definitions JSON: {}", e)))?;

    let policies = definitions
        .policies
        .into_iter()
        .map(|p| {
            let pattern = Regex::new(&p.pattern).map_err(|e| {
                MigrationError::Definitions(format!(
                    "policy '{}' has an invalid pattern '{}': {}",
                    p.name, p.pattern, e
                ))
            })?;
            Ok(CompiledPolicy {
                vhost: normalize_vhost(&p.vhost),
                name: p.name,
                pattern,
                apply_to: p.apply_to,
                definition: p.definition,
                priority: p.priority,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    definitions
        .queues
        .into_iter()
        .map(|q| {
            let mut descriptor = into_descriptor(q)?;
            if let Some(policy) = policies
                .iter()
                .filter(|p| p.applies_to(&descriptor))
                .max_by_key(|p| p.priority)
            {
                descriptor.policy = Some(policy.name.clone());
                descriptor.effective_policy = policy.definition.clone();
            }
            Ok(descriptor)
        })
        .collect()
}

fn into_descriptor(queue: DefinedQueue) -> Result<QueueDescriptor> {
    let declared_type = queue.queue_type.clone().or_else(|| {
        queue
            .arguments
            .get(QUEUE_TYPE_ARGUMENT)
            .and_then(|v| v.as_str())
            .map(str::to_string)
    });
    let current_type = match declared_type {
        Some(t) => t.parse::<QueueType>().map_err(|_| {
            MigrationError::Definitions(format!(
                "queue '{}' has unknown type '{}'",
                queue.name, t
            ))
        })?,
        None => QueueType::Classic,
    };

    let mut descriptor = QueueDescriptor::new(normalize_vhost(&queue.vhost), queue.name, current_type)
        .with_durable(queue.durable)
        .with_exclusive(queue.exclusive)
        .with_auto_delete(queue.auto_delete);
    descriptor.arguments = queue.arguments;
    Ok(descriptor)
}

#[cfg(test)]
#[path = "definitions_tests.rs"]
mod definitions_tests;
