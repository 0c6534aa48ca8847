//! Glance image client.
//!
//! Wraps the six image operations of the OpenStack Glance v2 API (list, get,
//! queue, upload, update and remove) behind an asynchronous client that
//! normalizes every image record and every failure into uniform shapes.

#![deny(missing_docs)]

pub mod classify;
pub mod client;
pub mod models;
pub mod operation;
pub mod request;
pub mod upload;

pub use classify::{classify, FailureKind, NormalizedError};
pub use client::{ImageClient, ImageClientBuilder};
pub use models::{normalize, normalize_list, ImageRecord, PatchOperation, WritePayload};
pub use operation::Operation;
pub use request::RequestBuilder;
pub use upload::UploadChannel;

/// Result of a JSON image operation.
pub type Result<T> = std::result::Result<T, NormalizedError>;
