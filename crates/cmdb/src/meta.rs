//! # Field Metadata
//!
//! A field's configuration is stored as JSON text in `field.meta` and parsed
//! on demand into a [`FieldMeta`]. The raw text is the source of truth;
//! `FieldMeta` is never persisted.
//!
//! ```text
//! {
//!     "type": {"name": "cmdb.types.IP", "option": {"prefix": "192.168"}},
//!     "nullable": true,
//!     "unique": false,
//!     "default": "",
//!     "multi": true,
//!     "reference": {
//!         "schema": "ippool",
//!         "field": "ip",
//!         "on_delete": "cascade|set_null|disable",
//!         "on_update": "cascade|disable"
//!     }
//! }
//! ```
//!
//! Without options the type may be written in short form: `"type": "IP"`.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::types::{Options, TypeRegistry, ValueType};
use crate::{Error, Result};

/// What happens to referencing values when the referenced row is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnDelete {
    #[default]
    Disable,
    Cascade,
    SetNull,
}

/// What happens to referencing values when the referenced value changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnUpdate {
    #[default]
    Disable,
    Cascade,
}

/// Foreign-key-like link from one virtual field to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub schema: String,
    pub field: String,
    #[serde(default)]
    pub on_delete: OnDelete,
    #[serde(default)]
    pub on_update: OnUpdate,
}

/// Parsed view of a field's raw configuration.
#[derive(Debug, Clone)]
pub struct FieldMeta {
    /// Shared instance from the type registry.
    pub value_type: Arc<dyn ValueType>,
    pub nullable: bool,
    pub unique: bool,
    pub default: Option<String>,
    pub multi: bool,
    pub reference: Option<Reference>,
}

#[derive(Deserialize)]
struct RawMeta {
    #[serde(rename = "type")]
    value_type: Option<RawType>,
    #[serde(default)]
    nullable: bool,
    #[serde(default = "default_unique")]
    unique: bool,
    #[serde(default)]
    default: Option<JsonValue>,
    #[serde(default)]
    multi: bool,
    #[serde(default)]
    reference: Option<Reference>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawType {
    Short(String),
    Long {
        name: String,
        #[serde(default)]
        option: Option<JsonValue>,
    },
}

fn default_unique() -> bool {
    true
}

impl FieldMeta {
    /// Parses a raw configuration, resolving its type through `registry`.
    pub fn parse(raw: &str, registry: &TypeRegistry) -> Result<Self> {
        let meta: RawMeta =
            serde_json::from_str(raw).map_err(|err| Error::InvalidMeta(err.to_string()))?;

        let (type_name, options) = match meta.value_type {
            None => return Err(Error::InvalidMeta("missing 'type'".to_string())),
            Some(RawType::Short(name)) => (name, Options::new()),
            Some(RawType::Long { name, option }) => (name, parse_options(option)?),
        };

        let value_type = registry
            .resolve_instance(&type_name, &options)
            .map_err(|err| match err {
                Error::UnknownType(name) => {
                    Error::InvalidMeta(format!("unknown value type '{name}'"))
                }
                other => other,
            })?;

        Ok(Self {
            value_type,
            nullable: meta.nullable,
            unique: meta.unique,
            default: parse_default(meta.default)?,
            multi: meta.multi,
            reference: meta.reference,
        })
    }

    /// The default value, treating an empty string as absent.
    pub fn effective_default(&self) -> Option<&str> {
        self.default.as_deref().filter(|value| !value.is_empty())
    }
}

fn parse_options(option: Option<JsonValue>) -> Result<Options> {
    match option {
        None | Some(JsonValue::Null) => Ok(Options::new()),
        Some(JsonValue::Object(map)) => Ok(Options::from(map)),
        Some(other) => Err(Error::InvalidMeta(format!(
            "'option' must be an object, got {other}"
        ))),
    }
}

fn parse_default(default: Option<JsonValue>) -> Result<Option<String>> {
    match default {
        None | Some(JsonValue::Null) => Ok(None),
        Some(JsonValue::String(value)) => Ok(Some(value)),
        Some(value @ (JsonValue::Number(_) | JsonValue::Bool(_))) => Ok(Some(value.to_string())),
        Some(other) => Err(Error::InvalidMeta(format!(
            "'default' must be a scalar, got {other}"
        ))),
    }
}
