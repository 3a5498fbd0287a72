use serde::{Deserialize, Serialize};

/// Bounded retry of transient broker errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_backoff_ms: 300,
            max_backoff_ms: 5_000,
        }
    }
}

/// Settings for the executor and the fleet coordinator; the `migration:`
/// section of the YAML config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigratorConfig {
    pub retry: RetryConfig,
    /// Jobs run at once by `migrate_all`; 1 runs them one after another.
    pub concurrency: usize,
    /// Compare the final queue's message count against the messages moved.
    pub verify: bool,
}

impl Default for MigratorConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            concurrency: 1,
            verify: true,
        }
    }
}
