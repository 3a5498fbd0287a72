use qhop_core::{
    normalize_vhost, BrokerError, QueueArguments, QueueDeclaration, QueueDescriptor, QueueType,
};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use crate::config::ClientConfig;
use crate::errors::{ClientError, Result};

/// Queue object as returned by `GET /api/queues/{vhost}[/{name}]`.
#[derive(Debug, Deserialize)]
struct ApiQueue {
    name: String,
    vhost: String,
    #[serde(rename = "type", default)]
    queue_type: Option<String>,
    #[serde(default = "default_true")]
    durable: bool,
    #[serde(default)]
    exclusive: bool,
    #[serde(default)]
    auto_delete: bool,
    #[serde(default)]
    arguments: QueueArguments,
    // absent until the node has collected stats for a new queue
    #[serde(default)]
    messages: Option<u64>,
    #[serde(default)]
    policy: Option<String>,
    // older nodes send `[]` when no policy applies
    #[serde(default)]
    effective_policy_definition: Value,
}

fn default_true() -> bool {
    true
}

impl ApiQueue {
    fn into_descriptor(self) -> Result<QueueDescriptor> {
        let current_type = match self.queue_type.as_deref() {
            Some(t) => t
                .parse::<QueueType>()
                .map_err(|e| ClientError::Decode(e.to_string()))?,
            None => QueueType::Classic,
        };
        let effective_policy = match self.effective_policy_definition {
            Value::Object(map) => map.into_iter().collect(),
            _ => QueueArguments::new(),
        };
        let mut descriptor = QueueDescriptor::new(self.vhost, self.name, current_type)
            .with_durable(self.durable)
            .with_exclusive(self.exclusive)
            .with_auto_delete(self.auto_delete)
            .with_message_count(self.messages.unwrap_or(0));
        descriptor.arguments = self.arguments;
        descriptor.policy = self.policy.filter(|p| !p.is_empty());
        descriptor.effective_policy = effective_policy;
        Ok(descriptor)
    }
}

/// Thin wrapper over the RabbitMQ HTTP management API.
#[derive(Debug, Clone)]
pub(crate) struct ManagementApi {
    http: Client,
    base: Url,
    username: String,
    password: String,
    timeout: Duration,
}

impl ManagementApi {
    pub(crate) fn new(config: &ClientConfig) -> Result<Self> {
        let base = Url::parse(&config.management_url).map_err(|e| ClientError::InvalidUrl {
            url: config.management_url.clone(),
            reason: e.to_string(),
        })?;
        if base.cannot_be_a_base() {
            return Err(ClientError::InvalidUrl {
                url: config.management_url.clone(),
                reason: "expected an http(s) base url".to_string(),
            });
        }
        let timeout = Duration::from_millis(config.request_timeout_ms);
        let http = Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()?;
        Ok(Self {
            http,
            base,
            username: config.username.clone(),
            password: config.password.clone(),
            timeout,
        })
    }

    /// `{base}/api/{segments...}` with every segment percent-encoded, so the
    /// default vhost `/` becomes `%2F`.
    pub(crate) fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidUrl {
                url: self.base.to_string(),
                reason: "expected an http(s) base url".to_string(),
            })?
            .pop_if_empty()
            .push("api")
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.http
            .request(method, url)
            .basic_auth(&self.username, Some(&self.password))
    }

    /// Helper: Execute request with timeout
    async fn execute_with_timeout(&self, request: RequestBuilder) -> Result<Response> {
        match tokio::time::timeout(self.timeout, request.send()).await {
            Err(_) => Err(ClientError::Timeout),
            Ok(Err(e)) => Err(ClientError::Http(e)),
            Ok(Ok(resp)) => Ok(resp),
        }
    }

    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ClientError::Status {
            status: status.as_u16(),
            body,
        })
    }

    pub(crate) async fn list_queues(
        &self,
        vhost: &str,
        name_filter: Option<&str>,
    ) -> std::result::Result<Vec<QueueDescriptor>, BrokerError> {
        let vhost = normalize_vhost(vhost);
        let url = self.url(&["queues", &vhost]).map_err(|e| e.for_queue(""))?;
        debug!(%url, "listing queues");

        let queues: Vec<ApiQueue> = self
            .get_json(url)
            .await
            // a 404 here means the vhost is missing
            .map_err(|e| match e.for_queue(&vhost) {
                BrokerError::NotFound(_) => BrokerError::NotFound(format!("vhost {}", vhost)),
                other => other,
            })?;

        let mut descriptors = queues
            .into_iter()
            .filter(|q| name_filter.map_or(true, |f| q.name.contains(f)))
            .map(ApiQueue::into_descriptor)
            .collect::<Result<Vec<_>>>()
            .map_err(|e| e.for_queue(""))?;
        descriptors.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(descriptors)
    }

    pub(crate) async fn get_queue(
        &self,
        vhost: &str,
        name: &str,
    ) -> std::result::Result<QueueDescriptor, BrokerError> {
        let vhost = normalize_vhost(vhost);
        let url = self
            .url(&["queues", &vhost, name])
            .map_err(|e| e.for_queue(name))?;
        let queue: ApiQueue = self.get_json(url).await.map_err(|e| e.for_queue(name))?;
        queue.into_descriptor().map_err(|e| e.for_queue(name))
    }

    pub(crate) async fn create_queue(
        &self,
        vhost: &str,
        declaration: &QueueDeclaration,
    ) -> std::result::Result<(), BrokerError> {
        let name = declaration.name.as_str();
        match self.get_queue(vhost, name).await {
            Ok(_) => return Err(BrokerError::AlreadyExists(name.to_string())),
            Err(BrokerError::NotFound(_)) => {}
            Err(e) => return Err(e),
        }

        let vhost = normalize_vhost(vhost);
        let url = self
            .url(&["queues", &vhost, name])
            .map_err(|e| e.for_queue(name))?;
        let body = declaration_body(declaration);
        let response = self
            .execute_with_timeout(self.request(Method::PUT, url).json(&body))
            .await
            .map_err(|e| e.for_queue(name))?;

        // PUT is idempotent: 204 means an equivalent queue appeared since our check
        if response.status() == StatusCode::NO_CONTENT {
            return Err(BrokerError::AlreadyExists(name.to_string()));
        }
        Self::check(response).await.map_err(|e| e.for_queue(name))?;
        debug!(queue = name, vhost = %vhost, queue_type = %declaration.queue_type, "queue created");
        Ok(())
    }

    pub(crate) async fn delete_queue(
        &self,
        vhost: &str,
        name: &str,
        if_empty: bool,
    ) -> std::result::Result<(), BrokerError> {
        let vhost = normalize_vhost(vhost);
        let mut url = self
            .url(&["queues", &vhost, name])
            .map_err(|e| e.for_queue(name))?;
        if if_empty {
            url.query_pairs_mut().append_pair("if-empty", "true");
        }
        let response = self
            .execute_with_timeout(self.request(Method::DELETE, url))
            .await
            .map_err(|e| e.for_queue(name))?;
        Self::check(response).await.map_err(|e| e.for_queue(name))?;
        debug!(queue = name, vhost = %vhost, if_empty, "queue deleted");
        Ok(())
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: Url) -> Result<T> {
        let response = self
            .execute_with_timeout(self.request(Method::GET, url))
            .await?;
        let response = Self::check(response).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))
    }
}

fn declaration_body(declaration: &QueueDeclaration) -> Value {
    json!({
        "durable": declaration.durable,
        "auto_delete": false,
        "arguments": declaration.arguments,
    })
}
