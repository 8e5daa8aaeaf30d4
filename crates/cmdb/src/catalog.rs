//! # Catalog
//!
//! [`Cmdb`] is the entry point for embedding applications. It ties a
//! [`SqliteStore`] to a [`TypeRegistry`] and exposes schema, field, entity and
//! value operations. Field additions go through [`SchemaEvolution`]; values are
//! validated by their field's value type before they are stored.

use std::sync::Arc;

use crate::config::CmdbConfig;
use crate::evolution::SchemaEvolution;
use crate::paginate::{Page, PageRequest};
use crate::store::{Entity, Field, Schema, SqliteStore, Store, Value};
use crate::types::{self, TypeRegistry};
use crate::{Error, Result};

/// An open configuration-management database.
#[derive(Debug)]
pub struct Cmdb {
    store: SqliteStore,
    registry: Arc<TypeRegistry>,
    config: CmdbConfig,
}

impl Cmdb {
    /// Opens the database named by `config` with the process-wide type registry.
    pub fn open(config: CmdbConfig) -> Result<Self> {
        let store = SqliteStore::open_with_config(&config)?;
        log::info!("opened cmdb at {}", config.database.display());
        Ok(Self {
            store,
            registry: types::global(),
            config,
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::open(CmdbConfig::in_memory())
    }

    /// Replaces the type registry, e.g. with one holding custom variants.
    pub fn with_registry(mut self, registry: Arc<TypeRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn store(&self) -> &SqliteStore {
        &self.store
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub fn config(&self) -> &CmdbConfig {
        &self.config
    }

    // =========================================================================
    // Schemas
    // =========================================================================

    pub fn add_schema(&self, name: &str, description: Option<&str>) -> Result<Schema> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidMeta("schema name must not be empty".to_string()));
        }

        let schema = self.store.create_schema(name, description)?;
        log::info!("Add a schema. id:{} name:{}", schema.id, schema.name);
        Ok(schema)
    }

    /// Live schema named `name`.
    pub fn get_schema(&self, name: &str) -> Result<Option<Schema>> {
        self.store.find_schema(name)
    }

    /// Soft-deletes a live schema and returns it.
    pub fn drop_schema(&self, id: i64) -> Result<Schema> {
        let schema = self
            .store
            .soft_delete_schema(id)?
            .ok_or_else(|| Error::NotFound(format!("schema {id}")))?;
        log::info!("Delete a schema. id:{} name:{}", schema.id, schema.name);
        Ok(schema)
    }

    pub fn list_schemas(&self, page: usize, size: usize, include_deleted: bool) -> Result<Page<Schema>> {
        let request = PageRequest::new(page, size, &self.config);
        let count = self.store.count_schemas(include_deleted)?;
        let items = self
            .store
            .list_schemas(request.limit(), request.offset(), include_deleted)?;
        Ok(Page::new(items, request, count))
    }

    /// Whether the schema has any live entity.
    pub fn schema_in_use(&self, schema_name: &str) -> Result<bool> {
        let schema = self.require_schema(schema_name)?;
        self.store.schema_has_entities(schema.id)
    }

    // =========================================================================
    // Fields
    // =========================================================================

    /// Live fields of a live schema in creation order.
    pub fn get_fields(&self, schema_name: &str) -> Result<Vec<Field>> {
        let schema = self.require_schema(schema_name)?;
        self.store.list_fields(schema.id, false)
    }

    pub fn get_field(&self, schema_name: &str, field_name: &str) -> Result<Option<Field>> {
        self.store.find_field(schema_name, field_name.trim())
    }

    /// Adds a field, backfilling existing entities when required.
    pub fn add_field(&self, schema_name: &str, field_name: &str, raw_meta: &str) -> Result<Field> {
        SchemaEvolution::new(&self.store, &self.registry).add_field(schema_name, field_name, raw_meta)
    }

    // =========================================================================
    // Entities
    // =========================================================================

    pub fn add_entity(&self, schema_name: &str, key: &str) -> Result<Entity> {
        let schema = self.require_schema(schema_name)?;
        let entity = self.store.insert_entity(schema.id, key)?;
        log::info!(
            "Add an entity. id:{} schema:{} key:{}",
            entity.id,
            schema.name,
            entity.key
        );
        Ok(entity)
    }

    /// Soft-deletes a live entity together with its values.
    pub fn drop_entity(&self, entity_id: i64) -> Result<()> {
        if !self.store.soft_delete_entity(entity_id)? {
            return Err(Error::NotFound(format!("entity {entity_id}")));
        }
        log::info!("Delete an entity. id:{entity_id}");
        Ok(())
    }

    // =========================================================================
    // Values
    // =========================================================================

    /// Validates `raw` with the field's value type and stores the canonical form.
    ///
    /// A unique field rejects a value another live entity already holds.
    /// Canonical forms are compared, so `2001:0db8::1` and `2001:db8::1`
    /// collide.
    pub fn set_value(&self, entity_id: i64, field_name: &str, raw: &str) -> Result<Value> {
        let (entity, field) = self.require_cell(entity_id, field_name)?;
        let meta = field.meta(&self.registry)?;
        let canonical = meta.value_type.stringify(raw)?;
        self.store
            .upsert_value(entity.id, field.id, &canonical, meta.unique)
            .inspect_err(|err| {
                if matches!(err, Error::Constraint(_)) {
                    log::warn!("rejected value for {}.{}: {}", entity.key, field.name, err);
                }
            })
    }

    /// Stored value of a cell in display form, `None` if the cell is empty.
    pub fn get_value(&self, entity_id: i64, field_name: &str) -> Result<Option<String>> {
        let (entity, field) = self.require_cell(entity_id, field_name)?;
        let Some(value) = self.store.find_value(entity.id, field.id)? else {
            return Ok(None);
        };
        let meta = field.meta(&self.registry)?;
        Ok(Some(meta.value_type.destringify(&value.value)))
    }

    fn require_schema(&self, schema_name: &str) -> Result<Schema> {
        self.store
            .find_schema(schema_name)?
            .ok_or_else(|| Error::NotFound(format!("schema '{}'", schema_name.trim())))
    }

    fn require_cell(&self, entity_id: i64, field_name: &str) -> Result<(Entity, Field)> {
        let entity = self
            .store
            .find_entity(entity_id)?
            .ok_or_else(|| Error::NotFound(format!("entity {entity_id}")))?;
        let field = self
            .store
            .find_field_by_schema_id(entity.schema_id, field_name.trim())?
            .ok_or_else(|| Error::NotFound(format!("field '{}' of entity {entity_id}", field_name.trim())))?;
        Ok((entity, field))
    }
}
