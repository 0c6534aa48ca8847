//! The six image operations and their per-operation constants.

use reqwest::Method;
use std::fmt;

/// The operations exposed by [`crate::ImageClient`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// List images.
    List,
    /// Fetch one image.
    Get,
    /// Register a new image record.
    Queue,
    /// Upload image data.
    Upload,
    /// Patch an image.
    Update,
    /// Delete an image.
    Remove,
}

impl Operation {
    /// Name used to tag errors, e.g. `glance.get`.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::List => "glance.list",
            Self::Get => "glance.get",
            Self::Queue => "glance.queue",
            Self::Upload => "glance.upload",
            Self::Update => "glance.update",
            Self::Remove => "glance.remove",
        }
    }

    /// Dotted path attached to requests for logging and metrics.
    #[must_use]
    pub const fn log_path(self) -> &'static str {
        match self {
            Self::List => "api-calls.glance.images-list",
            Self::Get => "api-calls.glance.images-get",
            Self::Queue => "api-calls.glance.images-queue",
            Self::Upload => "api-calls.glance.images-upload",
            Self::Update => "api-calls.glance.images-update",
            Self::Remove => "api-calls.glance.images-remove",
        }
    }

    /// HTTP method.
    #[must_use]
    pub fn method(self) -> Method {
        match self {
            Self::List | Self::Get => Method::GET,
            Self::Queue => Method::POST,
            Self::Upload => Method::PUT,
            Self::Update => Method::PATCH,
            Self::Remove => Method::DELETE,
        }
    }

    /// Body field whose presence marks a successful response.
    ///
    /// `None` for the raw upload path, which is never classified.
    #[must_use]
    pub const fn discriminant(self) -> Option<&'static str> {
        match self {
            Self::List => Some("images"),
            Self::Upload => None,
            Self::Get | Self::Queue | Self::Update | Self::Remove => Some("id"),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
