//! # Store
//!
//! Rows of the four logical tables and the contract the schema-evolution
//! engine needs from persistence. [`SqliteStore`] is the embedded
//! implementation.
//!
//! ## Layout
//!
//! ```text
//! schemas ──< fields ──< field_values >── entities >── schemas
//!               │
//!               └── ref_id ──> fields (optional, one-directional)
//! ```

use crate::meta::FieldMeta;
use crate::types::TypeRegistry;
use crate::Result;

mod schema;
mod sqlite;

pub use schema::CMDB_SCHEMA_VERSION;
pub use sqlite::SqliteStore;

/// A virtual table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub deleted: bool,
}

/// A column of a virtual table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub id: i64,
    pub name: String,
    /// Raw JSON configuration, see [`FieldMeta`].
    pub meta: String,
    pub deleted: bool,
    pub schema_id: i64,
    /// Field this one references, if any.
    pub ref_id: Option<i64>,
}

impl Field {
    /// Parses the stored configuration.
    pub fn meta(&self, registry: &TypeRegistry) -> Result<FieldMeta> {
        FieldMeta::parse(&self.meta, registry)
    }
}

/// A row of a virtual table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entity {
    pub id: i64,
    pub key: String,
    pub deleted: bool,
    pub schema_id: i64,
}

/// One (entity, field) cell, always stored as a string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Value {
    pub id: i64,
    pub value: String,
    pub deleted: bool,
    pub entity_id: i64,
    pub field_id: i64,
}

/// A field that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewField {
    pub schema_id: i64,
    pub name: String,
    pub meta: String,
    pub ref_id: Option<i64>,
}

/// A value row staged for an existing entity when a field is added.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backfill {
    pub entity_id: i64,
    pub value: String,
}

/// Persistence operations used by [`SchemaEvolution`](crate::SchemaEvolution).
///
/// Lookups only see live (non-deleted) rows.
pub trait Store {
    /// Finds a live schema by name.
    fn find_schema(&self, name: &str) -> Result<Option<Schema>>;

    /// Finds a live field of a live schema.
    fn find_field(&self, schema_name: &str, field_name: &str) -> Result<Option<Field>>;

    /// Whether the schema has at least one live entity.
    fn schema_has_entities(&self, schema_id: i64) -> Result<bool>;

    /// Live entities of a schema, in insertion order.
    fn list_entities(&self, schema_id: i64) -> Result<Vec<Entity>>;

    /// Inserts the field and one value per backfill entry as a single unit.
    ///
    /// On failure nothing is committed.
    fn insert_field(&self, field: &NewField, backfill: &[Backfill]) -> Result<Field>;
}
