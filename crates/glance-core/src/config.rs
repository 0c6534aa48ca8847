//! Configuration structures for Glance clients.
//!
//! [`EndpointConfig`] is the immutable per-client endpoint description handed to
//! the service clients. [`ClientSettings`] is its loadable, validated form for
//! applications that keep the endpoint in their own configuration files.

use crate::client::GLANCE_DEFAULT_TIMEOUT_MS;
use crate::Error;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;
use validator::Validate;

/// Endpoint, token and call timeout for one client instance.
///
/// The token is held as a [`SecretString`] and is redacted from `Debug` output.
#[derive(Debug)]
pub struct EndpointConfig {
    base_url: String,
    auth_token: SecretString,
    call_timeout: Duration,
}

impl EndpointConfig {
    /// Create an endpoint configuration.
    ///
    /// Every trailing slash is removed from `endpoint_url` so that request paths,
    /// which always begin with `/`, can be appended verbatim.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL cannot be parsed.
    pub fn new(endpoint_url: impl AsRef<str>, auth_token: impl Into<String>) -> Result<Self, Error> {
        let base_url = endpoint_url.as_ref().trim_end_matches('/');
        Url::parse(base_url)?;

        Ok(Self {
            base_url: base_url.to_string(),
            auth_token: SecretString::from(auth_token.into()),
            call_timeout: Duration::from_millis(GLANCE_DEFAULT_TIMEOUT_MS),
        })
    }

    /// Set the per-call timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Base URL without trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The `X-Auth-Token` value.
    #[must_use]
    pub fn auth_token(&self) -> &str {
        self.auth_token.expose_secret()
    }

    /// Timeout applied to every JSON call.
    #[must_use]
    pub const fn call_timeout(&self) -> Duration {
        self.call_timeout
    }

    /// Join a path beginning with `/` onto the base URL without normalization.
    #[must_use]
    pub fn url_for(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

/// Loadable settings for a Glance endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ClientSettings {
    /// Glance endpoint URL, usually taken from the identity service catalog
    #[validate(url)]
    pub endpoint_url: String,

    /// Per-call timeout in milliseconds; the default applies when omitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 1, max = 600_000))]
    pub call_timeout_ms: Option<u64>,
}

impl ClientSettings {
    /// Create settings for an endpoint with the default timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid.
    pub fn new(endpoint_url: impl Into<String>) -> Result<Self, Error> {
        let settings = Self {
            endpoint_url: endpoint_url.into(),
            call_timeout_ms: None,
        };

        settings.validate()?;
        Ok(settings)
    }

    /// Set the per-call timeout in milliseconds.
    #[must_use]
    pub const fn with_timeout_ms(mut self, millis: u64) -> Self {
        self.call_timeout_ms = Some(millis);
        self
    }

    /// Validate and combine with a token into an [`EndpointConfig`].
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails or the URL cannot be parsed.
    pub fn into_endpoint(self, auth_token: impl Into<String>) -> Result<EndpointConfig, Error> {
        self.validate()?;

        let config = EndpointConfig::new(&self.endpoint_url, auth_token)?;
        Ok(match self.call_timeout_ms {
            Some(millis) => config.with_timeout(Duration::from_millis(millis)),
            None => config,
        })
    }
}
