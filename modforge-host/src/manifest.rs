//! Descriptor validation
//!
//! Validation runs once per descriptor fetch, on the raw JSON, before the
//! typed [`PluginDescriptor`] is built. Cached descriptors are trusted and
//! not re-validated.

use modforge_plugin_api::PluginDescriptor;
use serde_json::Value;
use thiserror::Error;

/// Structural problems in a plugin descriptor.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("invalid plugin id `{0}`")]
    InvalidId(String),

    #[error("malformed dependency entry: {0}")]
    MalformedDependency(String),

    #[error("malformed descriptor: {0}")]
    Malformed(String),
}

const REQUIRED_FIELDS: [&str; 3] = ["id", "name", "version"];

fn non_empty_str<'a>(raw: &'a Value, field: &str) -> Option<&'a str> {
    raw.get(field).and_then(Value::as_str).filter(|s| !s.is_empty())
}

fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Validate a raw descriptor and produce the typed form.
///
/// Checks run in order: required fields, id pattern, dependency shape.
pub fn validate(raw: &Value) -> Result<PluginDescriptor, ValidationError> {
    for field in REQUIRED_FIELDS {
        if non_empty_str(raw, field).is_none() {
            return Err(ValidationError::MissingField(field));
        }
    }

    let Some(id) = non_empty_str(raw, "id") else {
        return Err(ValidationError::MissingField("id"));
    };
    if !is_valid_id(id) {
        return Err(ValidationError::InvalidId(id.to_string()));
    }

    if let Some(deps) = raw.get("dependencies") {
        let entries = deps
            .as_array()
            .ok_or_else(|| ValidationError::MalformedDependency(deps.to_string()))?;
        for entry in entries {
            let has_id = non_empty_str(entry, "id").is_some();
            let has_version = non_empty_str(entry, "version").is_some();
            if !has_id || !has_version {
                return Err(ValidationError::MalformedDependency(entry.to_string()));
            }
        }
    }

    serde_json::from_value(raw.clone()).map_err(|e| ValidationError::Malformed(e.to_string()))
}
