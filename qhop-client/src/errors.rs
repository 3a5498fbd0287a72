use qhop_core::BrokerError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("amqp error: {0}")]
    Amqp(#[from] lapin::Error),

    #[error("request timeout")]
    Timeout,

    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unexpected response: {0}")]
    Decode(String),
}

impl ClientError {
    /// Classifies the error for the broker capability, naming `queue` where the
    /// broker reported it missing or already present.
    pub fn for_queue(self, queue: &str) -> BrokerError {
        match self {
            ClientError::Timeout => BrokerError::Transient("request timeout".to_string()),
            ClientError::Http(e) if e.is_timeout() || e.is_connect() || e.is_request() => {
                BrokerError::Transient(e.to_string())
            }
            ClientError::Http(e) => BrokerError::Protocol(e.to_string()),
            ClientError::Status { status, body } => status_error(status, body, queue),
            ClientError::Amqp(e) => amqp_error(e, queue),
            ClientError::Decode(msg) => BrokerError::Protocol(msg),
            ClientError::InvalidUrl { url, reason } => {
                BrokerError::Protocol(format!("invalid url '{}': {}", url, reason))
            }
        }
    }
}

impl From<ClientError> for BrokerError {
    fn from(err: ClientError) -> Self {
        err.for_queue("")
    }
}

/// Maps a non-success management API status to a broker error.
pub(crate) fn status_error(status: u16, body: String, queue: &str) -> BrokerError {
    match status {
        401 | 403 => BrokerError::Unauthorized(body),
        404 => BrokerError::NotFound(queue.to_string()),
        408 | 429 | 500..=599 => BrokerError::Transient(format!("status {}: {}", status, body)),
        _ => BrokerError::Rejected {
            status,
            reason: body,
        },
    }
}

pub(crate) fn amqp_error(err: lapin::Error, queue: &str) -> BrokerError {
    use lapin::protocol::{AMQPErrorKind, AMQPHardError, AMQPSoftError};

    match &err {
        lapin::Error::ProtocolError(amqp) => match amqp.kind() {
            AMQPErrorKind::Soft(AMQPSoftError::NOTFOUND) => BrokerError::NotFound(queue.to_string()),
            AMQPErrorKind::Soft(AMQPSoftError::ACCESSREFUSED) => {
                BrokerError::Unauthorized(amqp.to_string())
            }
            AMQPErrorKind::Hard(AMQPHardError::CONNECTIONFORCED) => {
                BrokerError::Transient(amqp.to_string())
            }
            _ => BrokerError::Protocol(amqp.to_string()),
        },
        lapin::Error::IOError(_)
        | lapin::Error::InvalidConnectionState(_)
        | lapin::Error::InvalidChannelState(_) => BrokerError::Transient(err.to_string()),
        _ => BrokerError::Protocol(err.to_string()),
    }
}
