//! # SQLite Store
//!
//! [`Store`] on an embedded SQLite database, plus the catalog operations the
//! engine itself does not need (schema lifecycle, entities, values).
//!
//! The connection sits behind a mutex, so one store can be shared between
//! threads. Multi-row writes run in `BEGIN IMMEDIATE` and are rolled back on
//! any error.

use std::path::Path;
use std::time::Duration;

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::config::CmdbConfig;
use crate::{Error, Result};

use super::schema::init_schema;
use super::{Backfill, Entity, Field, NewField, Schema, Store, Value};

const SCHEMA_COLUMNS: &str = "id, name, description, deleted";
const FIELD_COLUMNS: &str = "id, name, meta, deleted, schema_id, ref_id";
const ENTITY_COLUMNS: &str = "id, key, deleted, schema_id";
const VALUE_COLUMNS: &str = "id, value, deleted, entity_id, field_id";

/// SQLite-backed store.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens (or creates) a store at `path` with default settings.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_config(&CmdbConfig::new(path.as_ref()))
    }

    /// Opens a private in-memory store.
    pub fn open_in_memory() -> Result<Self> {
        Self::open_with_config(&CmdbConfig::in_memory())
    }

    pub fn open_with_config(config: &CmdbConfig) -> Result<Self> {
        let conn = if config.is_in_memory() {
            Connection::open_in_memory()?
        } else {
            Connection::open(&config.database)?
        };
        conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))?;
        init_schema(&conn, config.is_in_memory())?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    // =========================================================================
    // Schemas
    // =========================================================================

    pub fn create_schema(&self, name: &str, description: Option<&str>) -> Result<Schema> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO schemas (name, description) VALUES (?, ?)",
            params![name, description],
        )?;

        Ok(Schema {
            id: conn.last_insert_rowid(),
            name: name.to_string(),
            description: description.map(str::to_string),
            deleted: false,
        })
    }

    /// Marks a live schema deleted. Returns `None` if there was none.
    pub fn soft_delete_schema(&self, id: i64) -> Result<Option<Schema>> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE schemas SET deleted = 1 WHERE id = ? AND deleted = 0",
            [id],
        )?;
        if changed == 0 {
            return Ok(None);
        }

        let sql = format!("SELECT {SCHEMA_COLUMNS} FROM schemas WHERE id = ?");
        Ok(Some(conn.query_row(&sql, [id], schema_from_row)?))
    }

    pub fn count_schemas(&self, include_deleted: bool) -> Result<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM schemas WHERE deleted = 0 OR ?",
            [include_deleted],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    pub fn list_schemas(&self, limit: usize, offset: usize, include_deleted: bool) -> Result<Vec<Schema>> {
        let conn = self.conn.lock();
        let sql = format!(
            "SELECT {SCHEMA_COLUMNS} FROM schemas
             WHERE deleted = 0 OR ?
             ORDER BY id
             LIMIT ? OFFSET ?"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params![include_deleted, to_sql_count(limit), to_sql_count(offset)],
            schema_from_row,
        )?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    // =========================================================================
    // Fields
    // =========================================================================

    /// Fields of a schema in creation order.
    pub fn list_fields(&self, schema_id: i64, include_deleted: bool) -> Result<Vec<Field>> {
        let conn = self.conn.lock();
        let sql = format!(
            "SELECT {FIELD_COLUMNS} FROM fields
             WHERE schema_id = ? AND (deleted = 0 OR ?)
             ORDER BY id"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![schema_id, include_deleted], field_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Finds a live field by schema id and name.
    pub fn find_field_by_schema_id(&self, schema_id: i64, name: &str) -> Result<Option<Field>> {
        let conn = self.conn.lock();
        let sql = format!(
            "SELECT {FIELD_COLUMNS} FROM fields WHERE schema_id = ? AND name = ? AND deleted = 0"
        );
        Ok(conn
            .query_row(&sql, params![schema_id, name], field_from_row)
            .optional()?)
    }

    // =========================================================================
    // Entities
    // =========================================================================

    pub fn insert_entity(&self, schema_id: i64, key: &str) -> Result<Entity> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO entities (key, schema_id) VALUES (?, ?)",
            params![key, schema_id],
        )?;

        Ok(Entity {
            id: conn.last_insert_rowid(),
            key: key.to_string(),
            deleted: false,
            schema_id,
        })
    }

    /// Finds a live entity by id.
    pub fn find_entity(&self, id: i64) -> Result<Option<Entity>> {
        let conn = self.conn.lock();
        let sql = format!("SELECT {ENTITY_COLUMNS} FROM entities WHERE id = ? AND deleted = 0");
        Ok(conn.query_row(&sql, [id], entity_from_row).optional()?)
    }

    /// Marks a live entity and its values deleted. Returns false if there was none.
    pub fn soft_delete_entity(&self, id: i64) -> Result<bool> {
        let conn = self.conn.lock();
        in_transaction(&conn, |conn| {
            let changed = conn.execute(
                "UPDATE entities SET deleted = 1 WHERE id = ? AND deleted = 0",
                [id],
            )?;
            if changed > 0 {
                conn.execute(
                    "UPDATE field_values SET deleted = 1 WHERE entity_id = ?",
                    [id],
                )?;
            }
            Ok(changed > 0)
        })
    }

    // =========================================================================
    // Values
    // =========================================================================

    /// Inserts or replaces the value of one (entity, field) cell.
    ///
    /// With `unique` set, the write fails with [`Error::Constraint`] when
    /// another live entity already holds `value` in the same field.
    pub fn upsert_value(&self, entity_id: i64, field_id: i64, value: &str, unique: bool) -> Result<Value> {
        let conn = self.conn.lock();
        in_transaction(&conn, |conn| {
            if unique {
                let taken: bool = conn.query_row(
                    "SELECT EXISTS (
                         SELECT 1 FROM field_values
                         WHERE field_id = ? AND value = ? AND entity_id != ? AND deleted = 0
                     )",
                    params![field_id, value, entity_id],
                    |row| row.get(0),
                )?;
                if taken {
                    return Err(Error::Constraint(format!(
                        "value '{value}' is already used by another entity in a unique field"
                    )));
                }
            }

            conn.execute(
                "INSERT INTO field_values (value, entity_id, field_id) VALUES (?, ?, ?)
                 ON CONFLICT(entity_id, field_id) DO UPDATE SET
                     value = excluded.value,
                     deleted = 0",
                params![value, entity_id, field_id],
            )?;

            let sql = format!("SELECT {VALUE_COLUMNS} FROM field_values WHERE entity_id = ? AND field_id = ?");
            Ok(conn.query_row(&sql, params![entity_id, field_id], value_from_row)?)
        })
    }

    /// Finds the live value of one (entity, field) cell.
    pub fn find_value(&self, entity_id: i64, field_id: i64) -> Result<Option<Value>> {
        let conn = self.conn.lock();
        let sql = format!(
            "SELECT {VALUE_COLUMNS} FROM field_values
             WHERE entity_id = ? AND field_id = ? AND deleted = 0"
        );
        Ok(conn
            .query_row(&sql, params![entity_id, field_id], value_from_row)
            .optional()?)
    }

    /// Live values of an entity ordered by field id.
    pub fn list_values(&self, entity_id: i64) -> Result<Vec<Value>> {
        let conn = self.conn.lock();
        let sql = format!(
            "SELECT {VALUE_COLUMNS} FROM field_values
             WHERE entity_id = ? AND deleted = 0
             ORDER BY field_id"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([entity_id], value_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Live values stored for a field ordered by entity id.
    pub fn list_field_values(&self, field_id: i64) -> Result<Vec<Value>> {
        let conn = self.conn.lock();
        let sql = format!(
            "SELECT {VALUE_COLUMNS} FROM field_values
             WHERE field_id = ? AND deleted = 0
             ORDER BY entity_id"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([field_id], value_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}

impl Store for SqliteStore {
    fn find_schema(&self, name: &str) -> Result<Option<Schema>> {
        let conn = self.conn.lock();
        let sql = format!("SELECT {SCHEMA_COLUMNS} FROM schemas WHERE name = ? AND deleted = 0");
        Ok(conn.query_row(&sql, [name.trim()], schema_from_row).optional()?)
    }

    fn find_field(&self, schema_name: &str, field_name: &str) -> Result<Option<Field>> {
        let conn = self.conn.lock();
        let sql = "SELECT f.id, f.name, f.meta, f.deleted, f.schema_id, f.ref_id
                   FROM fields f
                   JOIN schemas s ON s.id = f.schema_id
                   WHERE s.name = ? AND s.deleted = 0
                     AND f.name = ? AND f.deleted = 0";
        Ok(conn
            .query_row(sql, params![schema_name.trim(), field_name.trim()], field_from_row)
            .optional()?)
    }

    fn schema_has_entities(&self, schema_id: i64) -> Result<bool> {
        let conn = self.conn.lock();
        Ok(conn.query_row(
            "SELECT EXISTS (SELECT 1 FROM entities WHERE schema_id = ? AND deleted = 0)",
            [schema_id],
            |row| row.get(0),
        )?)
    }

    fn list_entities(&self, schema_id: i64) -> Result<Vec<Entity>> {
        let conn = self.conn.lock();
        let sql = format!(
            "SELECT {ENTITY_COLUMNS} FROM entities
             WHERE schema_id = ? AND deleted = 0
             ORDER BY id"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([schema_id], entity_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn insert_field(&self, field: &NewField, backfill: &[Backfill]) -> Result<Field> {
        let conn = self.conn.lock();
        let result = in_transaction(&conn, |conn| {
            conn.execute(
                "INSERT INTO fields (name, meta, schema_id, ref_id) VALUES (?, ?, ?, ?)",
                params![field.name, field.meta, field.schema_id, field.ref_id],
            )?;
            let field_id = conn.last_insert_rowid();

            let mut stmt = conn.prepare(
                "INSERT INTO field_values (value, entity_id, field_id) VALUES (?, ?, ?)",
            )?;
            for staged in backfill {
                stmt.execute(params![staged.value, staged.entity_id, field_id])?;
            }

            Ok(Field {
                id: field_id,
                name: field.name.clone(),
                meta: field.meta.clone(),
                deleted: false,
                schema_id: field.schema_id,
                ref_id: field.ref_id,
            })
        });

        if let Err(err) = &result {
            log::error!("failed to add field {}: {}", field.name, err);
        }
        result
    }
}

/// SQLite takes LIMIT/OFFSET as i64; anything larger is clamped.
fn to_sql_count(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

/// Runs `f` inside `BEGIN IMMEDIATE` / `COMMIT`, rolling back on any error.
fn in_transaction<T>(conn: &Connection, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
    conn.execute_batch("BEGIN IMMEDIATE")?;

    match f(conn).and_then(|value| {
        conn.execute_batch("COMMIT")?;
        Ok(value)
    }) {
        Ok(value) => Ok(value),
        Err(err) => {
            let _ = conn.execute_batch("ROLLBACK");
            Err(err)
        }
    }
}

fn schema_from_row(row: &Row<'_>) -> rusqlite::Result<Schema> {
    Ok(Schema {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        deleted: row.get(3)?,
    })
}

fn field_from_row(row: &Row<'_>) -> rusqlite::Result<Field> {
    Ok(Field {
        id: row.get(0)?,
        name: row.get(1)?,
        meta: row.get(2)?,
        deleted: row.get(3)?,
        schema_id: row.get(4)?,
        ref_id: row.get(5)?,
    })
}

fn entity_from_row(row: &Row<'_>) -> rusqlite::Result<Entity> {
    Ok(Entity {
        id: row.get(0)?,
        key: row.get(1)?,
        deleted: row.get(2)?,
        schema_id: row.get(3)?,
    })
}

fn value_from_row(row: &Row<'_>) -> rusqlite::Result<Value> {
    Ok(Value {
        id: row.get(0)?,
        value: row.get(1)?,
        deleted: row.get(2)?,
        entity_id: row.get(3)?,
        field_id: row.get(4)?,
    })
}
