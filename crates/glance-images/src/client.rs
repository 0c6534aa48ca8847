//! Asynchronous Glance image client.

use crate::classify::{classify, NormalizedError};
use crate::models::{normalize_list, ImageRecord, WritePayload};
use crate::operation::Operation;
use crate::request::RequestBuilder;
use crate::upload::UploadChannel;
use crate::Result;
use glance_core::client::ClientConfig;
use glance_core::config::EndpointConfig;
use glance_core::transport::{ByteStream, ReqwestTransport, RequestOptions, Transport};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncRead;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

const USER_AGENT: &str = concat!("glance-images/", env!("CARGO_PKG_VERSION"));

/// Builder for [`ImageClient`].
pub struct ImageClientBuilder {
    endpoint: EndpointConfig,
    http_config: ClientConfig,
    transport: Option<Arc<dyn Transport>>,
}

impl ImageClientBuilder {
    /// Create a builder for the specified endpoint and token.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint URL is invalid.
    pub fn new(
        base_url: impl AsRef<str>,
        auth_token: impl Into<String>,
    ) -> glance_core::Result<Self> {
        Ok(Self::from_endpoint(EndpointConfig::new(base_url, auth_token)?))
    }

    /// Create a builder from an existing endpoint configuration.
    #[must_use]
    pub fn from_endpoint(endpoint: EndpointConfig) -> Self {
        Self {
            endpoint,
            http_config: ClientConfig::new().with_user_agent(USER_AGENT),
            transport: None,
        }
    }

    /// Override the per-call timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.endpoint = self.endpoint.with_timeout(timeout);
        self
    }

    /// Override the HTTP client configuration.
    #[must_use]
    pub fn with_http_config(mut self, config: ClientConfig) -> Self {
        self.http_config = config;
        self
    }

    /// Use a custom transport instead of the default `reqwest` one.
    #[must_use]
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Build the client.
    ///
    /// # Errors
    ///
    /// Returns an error if the default HTTP client cannot be constructed.
    pub fn build(self) -> glance_core::Result<ImageClient> {
        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new(&self.http_config)?),
        };
        let requests = RequestBuilder::new(Arc::new(self.endpoint));
        let uploads = UploadChannel::new(Arc::clone(&transport), requests.clone());

        Ok(ImageClient {
            transport,
            requests,
            uploads,
        })
    }
}

/// Asynchronous client for the Glance v2 image endpoints.
///
/// Cloning is cheap; clones share the endpoint and the transport.
#[derive(Clone)]
pub struct ImageClient {
    transport: Arc<dyn Transport>,
    requests: RequestBuilder,
    uploads: UploadChannel,
}

impl ImageClient {
    /// Construct a client directly from the endpoint URL and token.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the HTTP client cannot be built.
    pub fn new(
        base_url: impl AsRef<str>,
        auth_token: impl Into<String>,
    ) -> glance_core::Result<Self> {
        ImageClientBuilder::new(base_url, auth_token)?.build()
    }

    /// Start a builder.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint URL is invalid.
    pub fn builder(
        base_url: impl AsRef<str>,
        auth_token: impl Into<String>,
    ) -> glance_core::Result<ImageClientBuilder> {
        ImageClientBuilder::new(base_url, auth_token)
    }

    /// Return the base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.requests.endpoint().base_url()
    }

    /// List every image visible to the project, including shared ones.
    pub async fn list(&self) -> Result<Vec<ImageRecord>> {
        let body = self.execute(Operation::List, self.requests.list()).await?;
        Ok(body
            .get("images")
            .and_then(Value::as_array)
            .map(|images| normalize_list(images))
            .unwrap_or_default())
    }

    /// Fetch a single image.
    pub async fn get(&self, id: &str) -> Result<ImageRecord> {
        let body = self.execute(Operation::Get, self.requests.get(id)).await?;
        Ok(ImageRecord::from(body))
    }

    /// Register a new image record ready to receive data.
    pub async fn queue(&self, payload: &WritePayload) -> Result<ImageRecord> {
        let body = self
            .execute(Operation::Queue, self.requests.queue(payload))
            .await?;
        Ok(ImageRecord::from(body))
    }

    /// Stream image data from `source` and return Glance's raw response text.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection fails or `source` fails to read.
    pub async fn upload<R>(&self, id: &str, source: R) -> glance_core::Result<String>
    where
        R: AsyncRead + Send + 'static,
    {
        self.uploads.send(id, source).await
    }

    /// Stream an already chunked body and return Glance's raw response text.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection fails or the stream yields an error.
    pub async fn upload_stream(&self, id: &str, body: ByteStream) -> glance_core::Result<String> {
        self.uploads.send_stream(id, body).await
    }

    /// Apply the fields present in `payload` to an image.
    pub async fn update(&self, id: &str, payload: &WritePayload) -> Result<ImageRecord> {
        let body = self
            .execute(Operation::Update, self.requests.update(id, payload))
            .await?;
        Ok(ImageRecord::from(body))
    }

    /// Delete an image.
    pub async fn remove(&self, id: &str) -> Result<ImageRecord> {
        let body = self
            .execute(Operation::Remove, self.requests.remove(id))
            .await?;
        Ok(ImageRecord::from(body))
    }

    /// Delete an image in the background, discarding the outcome.
    ///
    /// The request is spawned on the current Tokio runtime. Failures are only
    /// logged. Returns `None` without sending anything when no runtime is
    /// running.
    pub fn remove_detached(&self, id: impl Into<String>) -> Option<JoinHandle<()>> {
        let id = id.into();
        let Ok(handle) = Handle::try_current() else {
            warn!(image_id = %id, "No Tokio runtime; detached remove not sent");
            return None;
        };

        let client = self.clone();
        Some(handle.spawn(async move {
            if let Err(err) = client.remove(&id).await {
                debug!(image_id = %id, error_code = err.error_code(), "Detached remove discarded failure");
            }
        }))
    }

    async fn execute(
        &self,
        operation: Operation,
        options: RequestOptions,
    ) -> std::result::Result<Value, NormalizedError> {
        let uri = options.uri.clone();
        let outcome = self.transport.send(operation.method(), options).await;

        classify(operation, outcome).map_err(|err| {
            warn!(
                operation = %operation,
                log_path = operation.log_path(),
                uri = %uri,
                status = ?err.status,
                body = ?err.body,
                error = %err,
                "Glance request failed"
            );
            err
        })
    }
}

impl std::fmt::Debug for ImageClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageClient")
            .field("base_url", &self.base_url())
            .finish_non_exhaustive()
    }
}
