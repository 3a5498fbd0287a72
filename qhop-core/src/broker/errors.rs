use thiserror::Error;

pub type Result<T> = std::result::Result<T, BrokerError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BrokerError {
    #[error("queue '{0}' not found")]
    NotFound(String),

    #[error("queue '{0}' already exists")]
    AlreadyExists(String),

    /// Timeouts, dropped connections and 5xx responses.
    #[error("transient broker error: {0}")]
    Transient(String),

    #[error("broker rejected the request ({status}): {reason}")]
    Rejected { status: u16, reason: String },

    #[error("authentication failed: {0}")]
    Unauthorized(String),

    #[error("protocol error: {0}")]
    Protocol(String),
}

impl BrokerError {
    /// Whether the call may succeed if repeated unchanged.
    pub fn is_transient(&self) -> bool {
        matches!(self, BrokerError::Transient(_))
    }
}

/// A drain that stopped part-way, with the number of messages it had already moved.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{error} (after moving {moved} message(s))")]
pub struct DrainError {
    pub moved: u64,
    #[source]
    pub error: BrokerError,
}

impl DrainError {
    pub fn new(moved: u64, error: BrokerError) -> Self {
        Self { moved, error }
    }
}

impl From<BrokerError> for DrainError {
    fn from(error: BrokerError) -> Self {
        DrainError { moved: 0, error }
    }
}
