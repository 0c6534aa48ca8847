//! Request construction for the image endpoints.
//!
//! Everything here is pure: the builder turns an operation and its arguments
//! into [`RequestOptions`] (or a [`RawRequest`] for uploads) without touching the
//! network.

use crate::models::{PatchOperation, WritePayload};
use crate::operation::Operation;
use glance_core::config::EndpointConfig;
use glance_core::transport::{JsonBody, RawRequest, RequestOptions, AUTH_TOKEN_HEADER};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Media type Glance expects on PATCH requests.
pub const PATCH_CONTENT_TYPE: &str = "application/openstack-images-v2.1-json-patch";

/// Media type of raw image data.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Fields forwarded when creating an image.
pub const CREATE_FIELDS: [&str; 5] = [
    "name",
    "visibility",
    "tags",
    "disk_format",
    "container_format",
];

/// Fields that become patch instructions, in emission order.
pub const PATCH_FIELDS: [&str; 6] = [
    "name",
    "visibility",
    "protected",
    "tags",
    "disk_format",
    "container_format",
];

const LIST_PATH: &str = "/images?member_status=all";

// Everything except RFC 3986 unreserved characters.
const ID_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Percent-encode an image identifier for use as one path segment.
#[must_use]
pub fn encode_id(id: &str) -> String {
    utf8_percent_encode(id, ID_ENCODE_SET).to_string()
}

/// Body of a create request: the allow-listed fields present in `payload`.
#[must_use]
pub fn create_body(payload: &WritePayload) -> Value {
    let body: Map<String, Value> = CREATE_FIELDS
        .iter()
        .filter_map(|field| {
            payload
                .field_value(field)
                .map(|value| ((*field).to_string(), value))
        })
        .collect();
    Value::Object(body)
}

/// Patch instructions for the fields present in `payload`.
#[must_use]
pub fn patch_operations(payload: &WritePayload) -> Vec<PatchOperation> {
    PATCH_FIELDS
        .iter()
        .filter_map(|field| {
            payload
                .field_value(field)
                .map(|value| PatchOperation::replace(field, value))
        })
        .collect()
}

/// Builds transport requests against one endpoint.
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    endpoint: Arc<EndpointConfig>,
}

impl RequestBuilder {
    /// Create a builder for `endpoint`.
    #[must_use]
    pub fn new(endpoint: Arc<EndpointConfig>) -> Self {
        Self { endpoint }
    }

    /// The endpoint configuration.
    #[must_use]
    pub fn endpoint(&self) -> &EndpointConfig {
        &self.endpoint
    }

    /// Assemble options for a JSON request.
    ///
    /// `path` must begin with `/` and is appended to the base URL verbatim.
    /// Each extra header is inserted under its name with its own value,
    /// replacing a default header of the same name.
    #[must_use]
    pub fn build_options(
        &self,
        path: &str,
        json: JsonBody,
        extra_headers: &[(&str, &str)],
    ) -> RequestOptions {
        let mut headers = BTreeMap::new();
        headers.insert(
            AUTH_TOKEN_HEADER.to_string(),
            self.endpoint.auth_token().to_string(),
        );
        for (name, value) in extra_headers {
            headers.retain(|existing: &String, _| !existing.eq_ignore_ascii_case(name));
            headers.insert((*name).to_string(), (*value).to_string());
        }

        RequestOptions {
            uri: self.endpoint.url_for(path),
            headers,
            json,
            timeout: self.endpoint.call_timeout(),
            log_path: None,
        }
    }

    /// `GET /images?member_status=all`
    #[must_use]
    pub fn list(&self) -> RequestOptions {
        self.tagged(Operation::List, LIST_PATH, JsonBody::Accept, &[])
    }

    /// `GET /images/{id}`
    #[must_use]
    pub fn get(&self, id: &str) -> RequestOptions {
        let path = image_path(id);
        self.tagged(Operation::Get, &path, JsonBody::Accept, &[])
    }

    /// `POST /images` with the allow-listed create fields.
    #[must_use]
    pub fn queue(&self, payload: &WritePayload) -> RequestOptions {
        let body = create_body(payload);
        self.tagged(Operation::Queue, "/images", JsonBody::Payload(body), &[])
    }

    /// `PATCH /images/{id}` with one replace instruction per present field.
    #[must_use]
    pub fn update(&self, id: &str, payload: &WritePayload) -> RequestOptions {
        let operations = patch_operations(payload)
            .into_iter()
            .map(|op| json!({ "replace": op.replace, "value": op.value }))
            .collect();
        let path = image_path(id);
        self.tagged(
            Operation::Update,
            &path,
            JsonBody::Payload(Value::Array(operations)),
            &[("Content-Type", PATCH_CONTENT_TYPE)],
        )
    }

    /// `DELETE /images/{id}`
    #[must_use]
    pub fn remove(&self, id: &str) -> RequestOptions {
        let path = image_path(id);
        self.tagged(Operation::Remove, &path, JsonBody::Accept, &[])
    }

    /// Raw `PUT /images/{id}/file` for streaming image data.
    #[must_use]
    pub fn upload(&self, id: &str) -> RawRequest {
        let mut headers = BTreeMap::new();
        headers.insert(
            AUTH_TOKEN_HEADER.to_string(),
            self.endpoint.auth_token().to_string(),
        );
        headers.insert("Content-Type".to_string(), OCTET_STREAM.to_string());
        headers.insert("Connection".to_string(), "close".to_string());

        RawRequest {
            uri: self
                .endpoint
                .url_for(&format!("{}/file", image_path(id))),
            method: Operation::Upload.method(),
            headers,
        }
    }

    fn tagged(
        &self,
        operation: Operation,
        path: &str,
        json: JsonBody,
        extra_headers: &[(&str, &str)],
    ) -> RequestOptions {
        let mut options = self.build_options(path, json, extra_headers);
        options.log_path = Some(operation.log_path());
        options
    }
}

fn image_path(id: &str) -> String {
    format!("/images/{}", encode_id(id))
}
