use async_trait::async_trait;
use qhop_core::{broker, BrokerClient, DrainError, QueueDeclaration, QueueDescriptor, QueueType};
use tracing::info;

use crate::config::ClientConfig;
use crate::errors::Result;
use crate::management::ManagementApi;
use crate::message_mover::MessageMover;

/// Client for one RabbitMQ node.
///
/// Queue metadata goes through the HTTP management API; message moves go over
/// AMQP. Each drain opens its own connection, so one client can be shared by
/// concurrently running migrations.
#[derive(Debug, Clone)]
pub struct RabbitClient {
    management: ManagementApi,
    mover: MessageMover,
}

impl RabbitClient {
    /// Initializes a new `RabbitClientBuilder` seeded from the environment
    /// (see [`ClientConfig`]).
    pub fn builder() -> RabbitClientBuilder {
        RabbitClientBuilder::default()
    }

    /// Builds a client from a complete configuration.
    ///
    /// # Errors
    ///
    /// Fails when either url cannot be parsed or the HTTP client cannot be built.
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let management = ManagementApi::new(config)?;
        let mover = MessageMover::new(config)?;
        info!(
            management_url = %config.management_url,
            user = %config.username,
            "rabbitmq client configured"
        );
        Ok(Self { management, mover })
    }
}

/// Builder for [`RabbitClient`].
///
/// Every setter overrides one field of the [`ClientConfig`] the builder
/// started from; unset fields keep their environment or default values.
#[derive(Debug, Clone, Default)]
pub struct RabbitClientBuilder {
    config: ClientConfig,
}

impl RabbitClientBuilder {
    /// Replaces the whole configuration, e.g. one loaded from a YAML file.
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Base url of the management API, such as `http://localhost:15672`.
    pub fn management_url(mut self, url: impl Into<String>) -> Self {
        self.config.management_url = url.into();
        self
    }

    /// AMQP url without a vhost path, such as `amqp://localhost:5672`.
    pub fn amqp_url(mut self, url: impl Into<String>) -> Self {
        self.config.amqp_url = url.into();
        self
    }

    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.config.username = username.into();
        self.config.password = password.into();
        self
    }

    pub fn request_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.config.request_timeout_ms = timeout_ms;
        self
    }

    pub fn accept_invalid_certs(mut self, accept: bool) -> Self {
        self.config.accept_invalid_certs = accept;
        self
    }

    /// Constructs the client.
    ///
    /// # Errors
    ///
    /// See [`RabbitClient::from_config`].
    pub fn build(self) -> Result<RabbitClient> {
        RabbitClient::from_config(&self.config)
    }
}

#[async_trait]
impl BrokerClient for RabbitClient {
    async fn list_queues(
        &self,
        vhost: &str,
        name_filter: Option<&str>,
    ) -> broker::Result<Vec<QueueDescriptor>> {
        self.management.list_queues(vhost, name_filter).await
    }

    async fn get_queue(&self, vhost: &str, name: &str) -> broker::Result<QueueDescriptor> {
        self.management.get_queue(vhost, name).await
    }

    async fn create_queue(&self, vhost: &str, declaration: &QueueDeclaration) -> broker::Result<()> {
        self.management.create_queue(vhost, declaration).await
    }

    async fn delete_queue(&self, vhost: &str, name: &str, if_empty: bool) -> broker::Result<()> {
        self.management.delete_queue(vhost, name, if_empty).await
    }

    async fn drain_to(
        &self,
        vhost: &str,
        source: &str,
        dest: &str,
    ) -> std::result::Result<u64, DrainError> {
        let descriptor = self.management.get_queue(vhost, source).await?;
        let stream_len = (descriptor.current_type == QueueType::Stream)
            .then_some(descriptor.message_count);
        self.mover.drain(vhost, source, dest, stream_len).await
    }
}
