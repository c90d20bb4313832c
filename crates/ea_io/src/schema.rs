//! Embedded JSON Schemas (draft-07) for every snapshot file and the run manifest.
//!
//! Shape checks run on the raw `serde_json::Value` before typed
//! deserialization, so the first violation is reported with a JSON Pointer.
//! Semantic checks (duplicates, capacity consistency, cross references) are
//! left to the pipeline.

use serde_json::Value;

use crate::IoError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchemaKind {
    Students,
    Preferences,
    Offerings,
    Params,
    PriorAllotments,
    Manifest,
}

impl SchemaKind {
    pub fn file_name(self) -> &'static str {
        match self {
            SchemaKind::Students => "students.schema.json",
            SchemaKind::Preferences => "preferences.schema.json",
            SchemaKind::Offerings => "offerings.schema.json",
            SchemaKind::Params => "params.schema.json",
            SchemaKind::PriorAllotments => "allotments.schema.json",
            SchemaKind::Manifest => "manifest.schema.json",
        }
    }

    /// Raw schema text, compiled into the binary.
    pub fn text(self) -> &'static str {
        match self {
            SchemaKind::Students => include_str!("../schemas/students.schema.json"),
            SchemaKind::Preferences => include_str!("../schemas/preferences.schema.json"),
            SchemaKind::Offerings => include_str!("../schemas/offerings.schema.json"),
            SchemaKind::Params => include_str!("../schemas/params.schema.json"),
            SchemaKind::PriorAllotments => include_str!("../schemas/allotments.schema.json"),
            SchemaKind::Manifest => include_str!("../schemas/manifest.schema.json"),
        }
    }
}

/// Validate `value` against the embedded schema for `kind`.
#[cfg(feature = "schemaval")]
pub fn validate_value(kind: SchemaKind, value: &Value) -> Result<(), IoError> {
    use jsonschema::{Draft, JSONSchema};

    let schema_v: Value = serde_json::from_str(kind.text()).map_err(|e| IoError::Schema {
        pointer: "/".into(),
        msg: format!("invalid embedded {}: {e}", kind.file_name()),
    })?;
    let compiled = JSONSchema::options()
        .with_draft(Draft::Draft7)
        .compile(&schema_v)
        .map_err(|e| IoError::Schema {
            pointer: "/".into(),
            msg: format!("cannot compile {}: {e}", kind.file_name()),
        })?;

    if let Err(mut errors) = compiled.validate(value) {
        if let Some(err) = errors.next() {
            let ptr = err.instance_path.to_string();
            return Err(IoError::Schema {
                pointer: if ptr.is_empty() { "/".into() } else { ptr },
                msg: format!("{} ({})", err, kind.file_name()),
            });
        }
    }
    Ok(())
}

/// Schema validation compiled out: shape errors surface from serde instead.
#[cfg(not(feature = "schemaval"))]
pub fn validate_value(_kind: SchemaKind, _value: &Value) -> Result<(), IoError> {
    Ok(())
}
