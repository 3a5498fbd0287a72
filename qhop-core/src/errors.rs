use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::broker::BrokerError;
use crate::job::MigrationPhase;

pub type Result<T> = std::result::Result<T, MigrationError>;

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("queue '{0}' not found")]
    NotFound(String),

    #[error("name conflict: queue '{0}' already exists")]
    NameConflict(String),

    #[error("transient broker error persisted after {attempts} attempt(s): {message}")]
    TransientBroker { message: String, attempts: u32 },

    #[error("broker error: {0}")]
    Broker(BrokerError),

    #[error("migration of '{queue}' failed in phase {phase}: {message}")]
    PartialMigrationFailure {
        queue: String,
        phase: MigrationPhase,
        message: String,
    },

    #[error("migration cancelled")]
    Cancelled,

    #[error("invalid phase transition from {from} to {to}")]
    InvalidTransition {
        from: MigrationPhase,
        to: MigrationPhase,
    },

    #[error("definitions file error: {0}")]
    Definitions(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl MigrationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MigrationError::Validation(_) | MigrationError::InvalidTransition { .. } => {
                ErrorKind::Validation
            }
            MigrationError::NotFound(_) => ErrorKind::NotFound,
            MigrationError::NameConflict(_) => ErrorKind::NameConflict,
            MigrationError::TransientBroker { .. } => ErrorKind::TransientBroker,
            MigrationError::Broker(_) => ErrorKind::Broker,
            MigrationError::PartialMigrationFailure { .. } => ErrorKind::PartialMigrationFailure,
            MigrationError::Cancelled => ErrorKind::Cancelled,
            MigrationError::Definitions(_)
            | MigrationError::Io(_)
            | MigrationError::Serialization(_) => ErrorKind::Input,
        }
    }

    /// Number of broker attempts made before the error surfaced.
    pub fn attempts(&self) -> u32 {
        match self {
            MigrationError::TransientBroker { attempts, .. } => *attempts,
            _ => 1,
        }
    }
}

impl From<BrokerError> for MigrationError {
    fn from(err: BrokerError) -> Self {
        match err {
            BrokerError::NotFound(name) => MigrationError::NotFound(name),
            BrokerError::AlreadyExists(name) => MigrationError::NameConflict(name),
            BrokerError::Transient(message) => MigrationError::TransientBroker {
                message,
                attempts: 1,
            },
            other => MigrationError::Broker(other),
        }
    }
}

/// Serializable classification of a [`MigrationError`], carried in job results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    NotFound,
    NameConflict,
    TransientBroker,
    Broker,
    PartialMigrationFailure,
    Cancelled,
    Input,
}
