use serde::Deserialize;

/// Connection settings for one RabbitMQ node.
///
/// `Default` reads `QHOP_MANAGEMENT_URL`, `QHOP_AMQP_URL`, `QHOP_USER` and
/// `QHOP_PASSWORD`, falling back to a local broker with the guest account.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub management_url: String,
    pub amqp_url: String,
    pub username: String,
    pub password: String,
    pub request_timeout_ms: u64,
    pub accept_invalid_certs: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            management_url: std::env::var("QHOP_MANAGEMENT_URL")
                .unwrap_or_else(|_| "http://localhost:15672".to_string()),
            amqp_url: std::env::var("QHOP_AMQP_URL")
                .unwrap_or_else(|_| "amqp://localhost:5672".to_string()),
            username: std::env::var("QHOP_USER").unwrap_or_else(|_| "guest".to_string()),
            password: std::env::var("QHOP_PASSWORD").unwrap_or_else(|_| "guest".to_string()),
            request_timeout_ms: 10_000,
            accept_invalid_certs: false,
        }
    }
}
