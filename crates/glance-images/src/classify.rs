//! Classification of transport outcomes into [`NormalizedError`]s.

use crate::models::is_truthy;
use crate::operation::Operation;
use glance_core::transport::TransportResponse;
use glance_core::Error;
use reqwest::StatusCode;
use serde_json::Value;

/// Why an operation failed.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum FailureKind {
    /// No response was received.
    #[error("{0}")]
    Transport(Error),
    /// Glance answered with a non-success status.
    #[error("HTTP status {0}")]
    Status(StatusCode),
    /// Success status, but the body lacks the expected field.
    #[error("response body has no `{0}` field")]
    MissingField(&'static str),
}

/// Uniform error value for every failed JSON operation.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[error("{operation} failed: {kind}")]
pub struct NormalizedError {
    /// Operation that failed.
    pub operation: Operation,
    /// Failure classification.
    pub kind: FailureKind,
    /// HTTP status, when a response was received.
    pub status: Option<StatusCode>,
    /// Raw response body, when one was received.
    pub body: Option<Value>,
}

impl NormalizedError {
    /// Build an error for a failure that produced no response.
    #[must_use]
    pub fn transport(operation: Operation, error: Error) -> Self {
        Self {
            operation,
            kind: FailureKind::Transport(error),
            status: None,
            body: None,
        }
    }

    /// The transport error, if the request never produced a response.
    #[must_use]
    pub const fn transport_error(&self) -> Option<&Error> {
        match &self.kind {
            FailureKind::Transport(error) => Some(error),
            FailureKind::Status(_) | FailureKind::MissingField(_) => None,
        }
    }

    /// Returns the error code for this failure.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match &self.kind {
            FailureKind::Transport(error) => error.error_code(),
            FailureKind::MissingField(_) => "UNEXPECTED_RESPONSE",
            FailureKind::Status(status) => match *status {
                StatusCode::NOT_FOUND => "NOT_FOUND",
                StatusCode::BAD_REQUEST => "BAD_REQUEST",
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => "UNAUTHORIZED",
                StatusCode::CONFLICT => "CONFLICT",
                StatusCode::PAYLOAD_TOO_LARGE => "PAYLOAD_TOO_LARGE",
                StatusCode::TOO_MANY_REQUESTS => "SERVICE_UNAVAILABLE",
                status if status.is_server_error() => "SERVICE_UNAVAILABLE",
                _ => "HTTP_ERROR",
            },
        }
    }
}

/// Decide whether a transport outcome is a failure for `operation`.
///
/// Returns the response body when the call succeeded and the body carries the
/// operation's discriminant field, ready for normalization. Any transport
/// error, non-2xx status, or missing discriminant yields a [`NormalizedError`].
///
/// # Errors
///
/// Returns the classified failure.
pub fn classify(
    operation: Operation,
    outcome: Result<TransportResponse, Error>,
) -> Result<Value, NormalizedError> {
    let response = outcome.map_err(|error| NormalizedError::transport(operation, error))?;

    let failure = |kind| NormalizedError {
        operation,
        kind,
        status: Some(response.status),
        body: response.body.clone(),
    };

    if !response.status.is_success() {
        return Err(failure(FailureKind::Status(response.status)));
    }

    if let Some(field) = operation.discriminant() {
        let present = response
            .body
            .as_ref()
            .and_then(|body| body.get(field))
            .is_some_and(|value| discriminant_present(operation, value));
        if !present {
            return Err(failure(FailureKind::MissingField(field)));
        }
    }

    Ok(response.body.unwrap_or(Value::Null))
}

fn discriminant_present(operation: Operation, value: &Value) -> bool {
    match operation {
        Operation::List => value.is_array(),
        _ => is_truthy(value),
    }
}
