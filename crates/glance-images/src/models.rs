//! Glance image models and response normalization.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// Canonical representation of an image as returned by Glance.
///
/// The modeled fields are lifted out of the response object when they have the
/// expected JSON type. Everything else, including modeled keys carrying an
/// unexpected type, is kept verbatim in [`ImageRecord::extra`] and written back
/// unchanged on serialization.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct ImageRecord {
    /// Image identifier.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,
    /// Image name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Visibility (`public`, `private`, `shared`, `community`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility: Option<String>,
    /// Tags.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<BTreeSet<String>>,
    /// Disk format.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk_format: Option<String>,
    /// Container format.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container_format: Option<String>,
    /// Deletion protection flag.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protected: Option<bool>,
    /// Fields not modeled above.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ImageRecord {
    /// Lifecycle status (`queued`, `saving`, `active`, ...), when reported.
    #[must_use]
    pub fn status(&self) -> Option<&str> {
        self.extra.get("status").and_then(Value::as_str)
    }

    /// Look up a field that is not modeled explicitly.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }
}

impl From<Value> for ImageRecord {
    fn from(raw: Value) -> Self {
        let Value::Object(mut fields) = raw else {
            return Self::default();
        };

        Self {
            id: take(&mut fields, "id", as_string).unwrap_or_default(),
            name: take(&mut fields, "name", as_string),
            visibility: take(&mut fields, "visibility", as_string),
            tags: take(&mut fields, "tags", as_tag_set),
            disk_format: take(&mut fields, "disk_format", as_string),
            container_format: take(&mut fields, "container_format", as_string),
            protected: take(&mut fields, "protected", Value::as_bool),
            extra: fields,
        }
    }
}

impl<'de> Deserialize<'de> for ImageRecord {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Value::deserialize(deserializer).map(Self::from)
    }
}

/// Reshape one raw response object into an [`ImageRecord`].
///
/// A value that is not a JSON object yields an empty record.
#[must_use]
pub fn normalize(raw: &Value) -> ImageRecord {
    ImageRecord::from(raw.clone())
}

/// Reshape every element of an `images` array, preserving order.
#[must_use]
pub fn normalize_list(raw: &[Value]) -> Vec<ImageRecord> {
    raw.iter().map(normalize).collect()
}

fn take<T>(
    fields: &mut Map<String, Value>,
    key: &str,
    convert: impl FnOnce(&Value) -> Option<T>,
) -> Option<T> {
    let converted = fields.get(key).and_then(convert)?;
    fields.remove(key);
    Some(converted)
}

fn as_string(value: &Value) -> Option<String> {
    value.as_str().map(str::to_owned)
}

fn as_tag_set(value: &Value) -> Option<BTreeSet<String>> {
    value.as_array()?.iter().map(as_string).collect()
}

/// `null`, `false`, `0` and `""` are falsy; everything else is truthy.
pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Caller-supplied fields for creating or updating an image.
///
/// Only the fields listed here can ever reach Glance. Unknown keys in a source
/// object are dropped by [`WritePayload::from_value`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct WritePayload {
    /// Image name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Visibility.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<String>,
    /// Tags.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    /// Disk format.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disk_format: Option<String>,
    /// Container format.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_format: Option<String>,
    /// Deletion protection flag. `Some(false)` is an explicit request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protected: Option<bool>,
}

impl WritePayload {
    /// Create an empty payload.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the recognized keys from an arbitrary JSON object.
    ///
    /// Keys outside the field list, and recognized keys holding a value of the
    /// wrong type, are ignored. `protected` is the exception: any value present
    /// is coerced by truthiness, so `null` becomes `false`.
    #[must_use]
    pub fn from_value(raw: &Value) -> Self {
        let string = |key: &str| raw.get(key).and_then(as_string);
        Self {
            name: string("name"),
            visibility: string("visibility"),
            tags: raw
                .get("tags")
                .and_then(Value::as_array)
                .and_then(|tags| tags.iter().map(as_string).collect()),
            disk_format: string("disk_format"),
            container_format: string("container_format"),
            protected: raw.get("protected").map(is_truthy),
        }
    }

    /// Set the name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the visibility.
    #[must_use]
    pub fn with_visibility(mut self, visibility: impl Into<String>) -> Self {
        self.visibility = Some(visibility.into());
        self
    }

    /// Set the tags.
    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = Some(tags.into_iter().map(Into::into).collect());
        self
    }

    /// Set the disk format.
    #[must_use]
    pub fn with_disk_format(mut self, format: impl Into<String>) -> Self {
        self.disk_format = Some(format.into());
        self
    }

    /// Set the container format.
    #[must_use]
    pub fn with_container_format(mut self, format: impl Into<String>) -> Self {
        self.container_format = Some(format.into());
        self
    }

    /// Set the protected flag.
    #[must_use]
    pub const fn with_protected(mut self, protected: bool) -> Self {
        self.protected = Some(protected);
        self
    }

    /// JSON value of a recognized field, when it counts as provided.
    ///
    /// Empty strings count as absent. The protected flag counts as provided
    /// whenever it is set, including `false`.
    #[must_use]
    pub fn field_value(&self, field: &str) -> Option<Value> {
        let text = |value: &Option<String>| {
            value
                .as_deref()
                .filter(|s| !s.is_empty())
                .map(|s| Value::String(s.to_owned()))
        };

        match field {
            "name" => text(&self.name),
            "visibility" => text(&self.visibility),
            "disk_format" => text(&self.disk_format),
            "container_format" => text(&self.container_format),
            "tags" => self
                .tags
                .as_ref()
                .map(|tags| Value::Array(tags.iter().cloned().map(Value::String).collect())),
            "protected" => self.protected.map(Value::Bool),
            _ => None,
        }
    }
}

/// One `{"replace": "/field", "value": ...}` instruction of an update request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatchOperation {
    /// Target path, e.g. `/name`.
    pub replace: String,
    /// New value.
    pub value: Value,
}

impl PatchOperation {
    /// Build a replace instruction for a top-level field.
    #[must_use]
    pub fn replace(field: &str, value: Value) -> Self {
        Self {
            replace: format!("/{field}"),
            value,
        }
    }

    /// Field name without the leading slash.
    #[must_use]
    pub fn field(&self) -> &str {
        self.replace.trim_start_matches('/')
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalize_lifts_modeled_fields() {
        let record = normalize(&json!({
            "id": "8ab808ed-d2aa-471c-9af0-0d3287061670",
            "name": "cirros",
            "visibility": "public",
            "tags": ["beta", "alpha"],
            "disk_format": "qcow2",
            "container_format": "bare",
            "protected": false,
            "status": "active",
            "size": 13_267_968
        }));

        assert_eq!(record.id, "8ab808ed-d2aa-471c-9af0-0d3287061670");
        assert_eq!(record.name.as_deref(), Some("cirros"));
        assert_eq!(record.visibility.as_deref(), Some("public"));
        assert_eq!(
            record.tags,
            Some(BTreeSet::from(["alpha".to_string(), "beta".to_string()]))
        );
        assert_eq!(record.disk_format.as_deref(), Some("qcow2"));
        assert_eq!(record.container_format.as_deref(), Some("bare"));
        assert_eq!(record.protected, Some(false));
        assert_eq!(record.status(), Some("active"));
        assert_eq!(record.get("size"), Some(&json!(13_267_968)));
        assert_eq!(record.extra.len(), 2);
    }

    #[test]
    fn normalize_keeps_unexpected_types_verbatim() {
        let raw = json!({"id": "a", "name": null, "tags": ["x", 1], "protected": "yes"});
        let record = normalize(&raw);

        assert!(record.name.is_none());
        assert!(record.tags.is_none());
        assert!(record.protected.is_none());
        assert_eq!(serde_json::to_value(&record).unwrap(), raw);
    }

    #[test]
    fn normalize_non_object_is_empty() {
        assert_eq!(normalize(&json!("oops")), ImageRecord::default());
        assert_eq!(normalize(&Value::Null), ImageRecord::default());
    }

    #[test]
    fn normalize_is_idempotent() {
        let raw = json!({
            "id": "a",
            "name": "ubuntu",
            "tags": ["b", "a", "b"],
            "protected": true,
            "checksum": null,
            "properties": {"os_distro": "ubuntu"}
        });

        let once = normalize(&raw);
        let twice = normalize(&serde_json::to_value(&once).unwrap());
        assert_eq!(once, twice);
    }

    #[test]
    fn normalize_list_preserves_order() {
        let raw = vec![json!({"id": "b"}), json!({"id": "a"}), json!({"id": "b"})];
        let ids: Vec<String> = normalize_list(&raw).into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["b", "a", "b"]);
    }

    #[test]
    fn image_record_deserializes_through_normalize() {
        let record: ImageRecord =
            serde_json::from_str(r#"{"id": "a", "min_ram": 512, "visibility": "shared"}"#)
                .unwrap();
        assert_eq!(record.visibility.as_deref(), Some("shared"));
        assert_eq!(record.get("min_ram"), Some(&json!(512)));
    }

    #[test]
    fn write_payload_from_value_drops_unknown_keys() {
        let payload = WritePayload::from_value(&json!({
            "name": "img",
            "tags": ["a"],
            "protected": false,
            "owner": "someone-else",
            "id": "forged",
            "disk_format": 7
        }));

        assert_eq!(
            payload,
            WritePayload::new()
                .with_name("img")
                .with_tags(["a"])
                .with_protected(false)
        );
    }

    #[test]
    fn write_payload_from_value_coerces_protected() {
        let payload = WritePayload::from_value(&json!({"protected": null}));
        assert_eq!(payload.protected, Some(false));
        assert_eq!(payload.field_value("protected"), Some(json!(false)));

        let payload = WritePayload::from_value(&json!({"protected": "yes"}));
        assert_eq!(payload.protected, Some(true));

        let payload = WritePayload::from_value(&json!({"protected": 0}));
        assert_eq!(payload.protected, Some(false));

        assert!(WritePayload::from_value(&json!({})).protected.is_none());
    }

    #[test]
    fn write_payload_field_value_treats_empty_strings_as_absent() {
        let payload = WritePayload::new().with_name("").with_visibility("private");
        assert!(payload.field_value("name").is_none());
        assert_eq!(payload.field_value("visibility"), Some(json!("private")));
        assert!(payload.field_value("owner").is_none());
    }

    #[test]
    fn write_payload_deserialization_ignores_unknown_fields() {
        let payload: WritePayload =
            serde_json::from_str(r#"{"name": "img", "status": "active"}"#).unwrap();
        assert_eq!(payload, WritePayload::new().with_name("img"));
    }

    #[test]
    fn patch_operation_wire_shape() {
        let op = PatchOperation::replace("protected", Value::Bool(false));
        assert_eq!(op.field(), "protected");
        assert_eq!(
            serde_json::to_value(&op).unwrap(),
            json!({"replace": "/protected", "value": false})
        );
    }
}
