//! # glance-core
//!
//! Core types and utilities for talking to an OpenStack Glance image registry.
//!
//! This crate provides the shared error type, endpoint configuration, HTTP client
//! settings and the transport seam used by the service crates.
//!
//! ## Modules
//!
//! - [`error`] - Error types and conversions from the HTTP stack
//! - [`config`] - Endpoint configuration and loadable client settings
//! - [`client`] - HTTP client settings and default timeouts
//! - [`transport`] - The injectable transport trait and its `reqwest` implementation

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod config;
pub mod error;
pub mod transport;

// Re-export commonly used types
pub use error::{Error, Result};
