use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::errors::{MigrationError, Result};

/// Suffix appended to a source queue name to form its holding queue.
pub const TEMP_QUEUE_SUFFIX: &str = "_temp_migrated";

/// AMQP short strings (queue names) are limited to 255 bytes.
const MAX_QUEUE_NAME_LEN: usize = 255;

/// Broker-declared queue arguments, keyed in sorted order so plans serialize identically.
pub type QueueArguments = BTreeMap<String, Value>;

/// The RabbitMQ queue types qhop knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueType {
    Classic,
    Quorum,
    Stream,
}

impl QueueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueType::Classic => "classic",
            QueueType::Quorum => "quorum",
            QueueType::Stream => "stream",
        }
    }

    /// Whether classic queues can be converted into this type.
    pub fn is_migration_target(&self) -> bool {
        matches!(self, QueueType::Quorum | QueueType::Stream)
    }

    /// Rejects types that cannot be used as a migration target.
    pub fn ensure_target(self) -> Result<Self> {
        if self.is_migration_target() {
            Ok(self)
        } else {
            Err(MigrationError::Validation(format!(
                "'{}' is not a valid migration target, expected quorum or stream",
                self
            )))
        }
    }
}

impl fmt::Display for QueueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueueType {
    type Err = MigrationError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "classic" => Ok(QueueType::Classic),
            "quorum" => Ok(QueueType::Quorum),
            "stream" => Ok(QueueType::Stream),
            other => Err(MigrationError::Validation(format!(
                "unknown queue type '{}'",
                other
            ))),
        }
    }
}

/// Identity of a queue on the broker: unique per (vhost, name).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QueueRef {
    pub vhost: String,
    pub name: String,
}

impl QueueRef {
    pub fn new(vhost: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            vhost: vhost.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for QueueRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' in vhost '{}'", self.name, self.vhost)
    }
}

/// Point-in-time snapshot of one queue's declared and observed properties.
///
/// The snapshot may be stale by the time it is acted on; the executor re-reads the
/// queue before moving messages and never trusts `message_count` from here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueDescriptor {
    pub name: String,
    pub vhost: String,
    pub current_type: QueueType,
    pub durable: bool,
    pub exclusive: bool,
    pub auto_delete: bool,
    #[serde(default)]
    pub arguments: QueueArguments,
    #[serde(default)]
    pub message_count: u64,
    /// Name of the policy the broker applies to this queue, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy: Option<String>,
    /// Definition of the effective policy (e.g. `ha-mode`).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub effective_policy: QueueArguments,
}

impl QueueDescriptor {
    /// A durable, non-exclusive, non-auto-delete queue with no arguments,
    /// matching what the broker reports when a field is absent.
    pub fn new(vhost: impl Into<String>, name: impl Into<String>, current_type: QueueType) -> Self {
        Self {
            name: name.into(),
            vhost: vhost.into(),
            current_type,
            durable: true,
            exclusive: false,
            auto_delete: false,
            arguments: QueueArguments::new(),
            message_count: 0,
            policy: None,
            effective_policy: QueueArguments::new(),
        }
    }

    pub fn with_durable(mut self, durable: bool) -> Self {
        self.durable = durable;
        self
    }

    pub fn with_exclusive(mut self, exclusive: bool) -> Self {
        self.exclusive = exclusive;
        self
    }

    pub fn with_auto_delete(mut self, auto_delete: bool) -> Self {
        self.auto_delete = auto_delete;
        self
    }

    pub fn with_argument(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.arguments.insert(key.into(), value.into());
        self
    }

    pub fn with_message_count(mut self, message_count: u64) -> Self {
        self.message_count = message_count;
        self
    }

    pub fn with_policy(mut self, name: impl Into<String>, definition: QueueArguments) -> Self {
        self.policy = Some(name.into());
        self.effective_policy = definition;
        self
    }

    pub fn queue_ref(&self) -> QueueRef {
        QueueRef::new(self.vhost.clone(), self.name.clone())
    }

    pub fn temp_queue_name(&self) -> String {
        temp_queue_name(&self.name)
    }

    /// Checks the identity fields are something the broker will let us redeclare.
    pub fn validate(&self) -> Result<()> {
        if self.vhost.is_empty() {
            return Err(MigrationError::Validation(format!(
                "queue '{}' has an empty vhost",
                self.name
            )));
        }
        if self.name.is_empty() {
            return Err(MigrationError::Validation(
                "queue name must not be empty".to_string(),
            ));
        }
        // server-named and reserved queues cannot be redeclared by a client
        if self.name.starts_with("amq.") {
            return Err(MigrationError::Validation(format!(
                "queue '{}' uses the reserved 'amq.' prefix",
                self.name
            )));
        }
        if self.temp_queue_name().len() > MAX_QUEUE_NAME_LEN {
            return Err(MigrationError::Validation(format!(
                "queue name '{}' is too long to derive a temporary queue name",
                self.name
            )));
        }
        Ok(())
    }
}

/// Deterministic holding-queue name for `source`.
pub fn temp_queue_name(source: &str) -> String {
    format!("{}{}", source, TEMP_QUEUE_SUFFIX)
}

/// Accepts the default vhost either raw (`/`) or URL-encoded (`%2f`).
pub fn normalize_vhost(vhost: &str) -> String {
    vhost.replace("%2f", "/").replace("%2F", "/")
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod queue_tests;
