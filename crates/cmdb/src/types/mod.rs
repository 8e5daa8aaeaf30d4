//! # Value Types
//!
//! A value type validates raw input for one scalar kind and turns it into the
//! canonical string that is stored in the `value` table. Every stored value is
//! a string; `stringify` and `destringify` are the only conversion boundary.
//!
//! ## Registration
//!
//! Variants are registered statically as [`TypeClass`] entries, each under a
//! short name (`Int`) and a fully-qualified name (`cmdb.types.Int`). There is
//! no runtime discovery; the [`TypeRegistry`] is built once and only its
//! instance cache changes afterwards.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value as JsonValue};

use crate::error::ValidationError;
use crate::{Error, Result};

mod int;
mod ip;
mod registry;

pub use int::IntType;
pub use ip::IpType;
pub use registry::{global, TypeRegistry, BUILTIN_TYPES};

/// Validation and (de)serialization contract for one scalar kind.
///
/// Implementations are immutable after construction and shared between every
/// field whose metadata resolves to the same (type, options) pair.
pub trait ValueType: fmt::Debug + Send + Sync {
    /// Fully-qualified type name.
    fn name(&self) -> &'static str;

    /// Options this instance was built with.
    fn options(&self) -> &Options;

    /// Validates `raw` and returns its canonical stored form.
    fn stringify(&self, raw: &str) -> std::result::Result<String, ValidationError>;

    /// Converts a stored string back to its semantic form.
    fn destringify(&self, stored: &str) -> String;
}

/// Builds a value type instance from its options.
pub type Constructor = fn(&Options) -> Result<Arc<dyn ValueType>>;

/// A registered value type variant.
#[derive(Clone, Copy)]
pub struct TypeClass {
    /// Fully-qualified name, used for cache keys.
    pub name: &'static str,
    /// Alias accepted by lookups.
    pub short_name: &'static str,
    construct: Constructor,
}

impl TypeClass {
    pub const fn new(name: &'static str, short_name: &'static str, construct: Constructor) -> Self {
        Self {
            name,
            short_name,
            construct,
        }
    }

    /// Builds a new, uncached instance.
    pub fn construct(&self, options: &Options) -> Result<Arc<dyn ValueType>> {
        (self.construct)(options)
    }
}

impl fmt::Debug for TypeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeClass")
            .field("name", &self.name)
            .field("short_name", &self.short_name)
            .finish_non_exhaustive()
    }
}

/// Options map attached to a value type (`min`, `max`, `prefix`, ...).
///
/// Keys are kept sorted so the cache key does not depend on the order the
/// caller wrote them in. A key mapped to JSON `null` reads as unset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Options {
    entries: BTreeMap<String, JsonValue>,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an option, builder style.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.entries.insert(key.into(), value.into());
        self
    }

    /// Returns the raw value of an option, `None` when unset or null.
    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.entries.get(key).filter(|value| !value.is_null())
    }

    /// Reads an integer option.
    pub fn get_i64(&self, key: &str) -> Result<Option<i64>> {
        match self.get(key) {
            None => Ok(None),
            Some(value) => value.as_i64().map(Some).ok_or_else(|| {
                Error::InvalidMeta(format!("option '{key}' must be an integer, got {value}"))
            }),
        }
    }

    /// Reads a string option.
    pub fn get_str(&self, key: &str) -> Result<Option<&str>> {
        match self.get(key) {
            None => Ok(None),
            Some(value) => value.as_str().map(Some).ok_or_else(|| {
                Error::InvalidMeta(format!("option '{key}' must be a string, got {value}"))
            }),
        }
    }

    /// Normalized instance cache key: the type name followed by every
    /// `key=value` pair in key order. Keys are JSON-quoted so a separator
    /// inside a key cannot make two different maps collide.
    pub fn cache_key(&self, type_name: &str) -> String {
        let mut key = String::from(type_name);
        for (name, value) in self.entries.iter().filter(|(_, value)| !value.is_null()) {
            key.push('|');
            key.push_str(&JsonValue::from(name.as_str()).to_string());
            key.push('=');
            key.push_str(&value.to_string());
        }
        key
    }
}

impl From<Map<String, JsonValue>> for Options {
    fn from(map: Map<String, JsonValue>) -> Self {
        Self {
            entries: map.into_iter().collect(),
        }
    }
}

impl<K: Into<String>, V: Into<JsonValue>> FromIterator<(K, V)> for Options {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
