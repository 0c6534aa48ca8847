//! Transport seam between the service clients and the HTTP stack.
//!
//! Service clients never talk to `reqwest` directly. They build
//! [`RequestOptions`] or a [`RawRequest`] and hand it to a [`Transport`], which
//! is injected at construction time. [`ReqwestTransport`] is the production
//! implementation.

use crate::client::ClientConfig;
use crate::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::StreamExt;
use reqwest::header::ACCEPT;
use reqwest::{Body, Client, ClientBuilder, Method, StatusCode};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

/// Header carrying the scoped identity token.
pub const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";

/// Chunked request body for raw uploads.
pub type ByteStream = BoxStream<'static, std::io::Result<Bytes>>;

/// How the JSON request path treats bodies.
#[derive(Debug, Clone, PartialEq)]
pub enum JsonBody {
    /// Parse the response as JSON but send no request body.
    Accept,
    /// Serialize this value as the request body and parse the response as JSON.
    Payload(Value),
}

impl JsonBody {
    /// The outgoing payload, if any.
    #[must_use]
    pub const fn payload(&self) -> Option<&Value> {
        match self {
            Self::Accept => None,
            Self::Payload(value) => Some(value),
        }
    }
}

/// A fully built JSON request, minus the method.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestOptions {
    /// Absolute request URI.
    pub uri: String,
    /// Request headers, including the auth token.
    pub headers: BTreeMap<String, String>,
    /// Body handling.
    pub json: JsonBody,
    /// Per-call timeout.
    pub timeout: Duration,
    /// Dotted name identifying the call site in logs and metrics.
    pub log_path: Option<&'static str>,
}

impl RequestOptions {
    /// Case-insensitive header lookup.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Status and decoded body of a JSON call.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
    /// HTTP status.
    pub status: StatusCode,
    /// Decoded body. `None` when the body was empty; a body that is not JSON is
    /// kept as [`Value::String`].
    pub body: Option<Value>,
}

impl TransportResponse {
    /// Build a response from a status and an already decoded body.
    #[must_use]
    pub const fn new(status: StatusCode, body: Option<Value>) -> Self {
        Self { status, body }
    }

    /// Decode a raw response body.
    #[must_use]
    pub fn from_text(status: StatusCode, text: &str) -> Self {
        let body = if text.trim().is_empty() {
            None
        } else {
            Some(
                serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string())),
            )
        };
        Self { status, body }
    }
}

/// A request on the raw streaming path.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRequest {
    /// Absolute request URI.
    pub uri: String,
    /// HTTP method.
    pub method: Method,
    /// Request headers.
    pub headers: BTreeMap<String, String>,
}

/// HTTP collaborator used by the service clients.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Execute a JSON request.
    ///
    /// Returns `Err` only for failures that prevented a response from being
    /// received; non-success statuses are returned as `Ok`.
    async fn send(&self, method: Method, options: RequestOptions) -> Result<TransportResponse>;

    /// Pipe `body` into a raw request and return the full response text.
    async fn stream(&self, request: RawRequest, body: ByteStream) -> Result<String>;
}

/// [`Transport`] backed by a pooled `reqwest` client.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http: Client,
}

impl ReqwestTransport {
    /// Build the underlying HTTP client from `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let mut builder = ClientBuilder::new()
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(config.pool_idle_timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .gzip(config.enable_compression);

        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.as_str());
        }

        let http = builder
            .build()
            .map_err(|err| Error::ConfigError(format!("Failed to build HTTP client: {err}")))?;

        Ok(Self { http })
    }

    /// Wrap an existing `reqwest` client.
    #[must_use]
    pub fn from_client(http: Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, method: Method, options: RequestOptions) -> Result<TransportResponse> {
        debug!(%method, uri = %options.uri, log_path = ?options.log_path, "Sending Glance request");

        let mut request = self
            .http
            .request(method, &options.uri)
            .timeout(options.timeout);

        if options.header(ACCEPT.as_str()).is_none() {
            request = request.header(ACCEPT, "application/json");
        }
        for (name, value) in &options.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        // Headers go first so an explicit Content-Type survives `json`.
        if let Some(payload) = options.json.payload() {
            request = request.json(payload);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        debug!(%status, log_path = ?options.log_path, "Received Glance response");
        Ok(TransportResponse::from_text(status, &text))
    }

    async fn stream(&self, request: RawRequest, body: ByteStream) -> Result<String> {
        debug!(method = %request.method, uri = %request.uri, "Opening raw Glance request");

        let mut builder = self.http.request(request.method, &request.uri);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder
            .body(Body::wrap_stream(body))
            .send()
            .await
            .map_err(body_error)?;
        let status = response.status();

        let mut received = Vec::new();
        let mut chunks = response.bytes_stream();
        while let Some(chunk) = chunks.next().await {
            received.extend_from_slice(&chunk.map_err(body_error)?);
        }

        debug!(%status, bytes = received.len(), "Raw Glance request finished");
        Ok(String::from_utf8_lossy(&received).into_owned())
    }
}

/// Map a failure on the raw path, surfacing an I/O error buried in the body.
///
/// reqwest wraps a failed body stream in its own error; the innermost
/// `std::io::Error` carries what the source reported. Connect and timeout
/// failures keep their usual mapping.
fn body_error(err: reqwest::Error) -> Error {
    if err.is_connect() || err.is_timeout() {
        return err.into();
    }

    let mut io_cause = None;
    let mut source = std::error::Error::source(&err);
    while let Some(cause) = source {
        if let Some(io) = cause.downcast_ref::<std::io::Error>() {
            io_cause = Some(io.to_string());
        }
        source = std::error::Error::source(cause);
    }

    match io_cause {
        Some(message) => Error::Io(message),
        None => err.into(),
    }
}
