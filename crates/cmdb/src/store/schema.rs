//! # CMDB SQLite Schema
//!
//! Tables for virtual schemas, their fields, entities and values.
//!
//! Names are unique among live rows only: the unique indexes on `schemas` and
//! `fields` are partial (`WHERE deleted = 0`), so a soft-deleted name can be
//! created again and deleted again any number of times.

use rusqlite::{params, Connection};

use crate::error::PersistenceError;
use crate::Result;

pub const CMDB_SCHEMA_VERSION: i32 = 1;

const CREATE_SCHEMAS: &str = r#"
CREATE TABLE IF NOT EXISTS schemas (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    name        TEXT NOT NULL,
    description TEXT,
    deleted     INTEGER NOT NULL DEFAULT 0
);

CREATE UNIQUE INDEX IF NOT EXISTS schemas_live_name
ON schemas(name) WHERE deleted = 0;
"#;

const CREATE_FIELDS: &str = r#"
CREATE TABLE IF NOT EXISTS fields (
    id        INTEGER PRIMARY KEY AUTOINCREMENT,
    name      TEXT NOT NULL,
    meta      TEXT NOT NULL,
    deleted   INTEGER NOT NULL DEFAULT 0,
    schema_id INTEGER NOT NULL REFERENCES schemas(id),
    ref_id    INTEGER REFERENCES fields(id)
);

CREATE UNIQUE INDEX IF NOT EXISTS fields_live_name
ON fields(schema_id, name) WHERE deleted = 0;
"#;

const CREATE_ENTITIES: &str = r#"
CREATE TABLE IF NOT EXISTS entities (
    id        INTEGER PRIMARY KEY AUTOINCREMENT,
    key       TEXT NOT NULL,
    deleted   INTEGER NOT NULL DEFAULT 0,
    schema_id INTEGER NOT NULL REFERENCES schemas(id)
);

CREATE INDEX IF NOT EXISTS entities_schema
ON entities(schema_id, deleted);
"#;

const CREATE_VALUES: &str = r#"
CREATE TABLE IF NOT EXISTS field_values (
    id        INTEGER PRIMARY KEY AUTOINCREMENT,
    value     TEXT NOT NULL,
    deleted   INTEGER NOT NULL DEFAULT 0,
    entity_id INTEGER NOT NULL REFERENCES entities(id),
    field_id  INTEGER NOT NULL REFERENCES fields(id),
    UNIQUE (entity_id, field_id)
);

CREATE INDEX IF NOT EXISTS field_values_field
ON field_values(field_id);
"#;

const CREATE_METADATA: &str = r#"
CREATE TABLE IF NOT EXISTS cmdb_metadata (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
"#;

pub fn init_schema(conn: &Connection, in_memory: bool) -> Result<()> {
    if !in_memory {
        conn.execute_batch("PRAGMA journal_mode = WAL")?;
    }
    conn.execute_batch("PRAGMA synchronous = NORMAL")?;
    conn.execute_batch("PRAGMA foreign_keys = ON")?;
    conn.execute_batch(CREATE_SCHEMAS)?;
    conn.execute_batch(CREATE_FIELDS)?;
    conn.execute_batch(CREATE_ENTITIES)?;
    conn.execute_batch(CREATE_VALUES)?;
    conn.execute_batch(CREATE_METADATA)?;

    ensure_schema_version(conn)
}

const SCHEMA_VERSION_KEY: &str = "schema_version";

/// Stamps a fresh database with [`CMDB_SCHEMA_VERSION`] and checks that an
/// existing one carries the same stamp.
fn ensure_schema_version(conn: &Connection) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO cmdb_metadata (key, value) VALUES (?, ?)",
        params![SCHEMA_VERSION_KEY, CMDB_SCHEMA_VERSION.to_string()],
    )?;
    let stamped: String = conn.query_row(
        "SELECT value FROM cmdb_metadata WHERE key = ?",
        [SCHEMA_VERSION_KEY],
        |row| row.get(0),
    )?;

    match stamped.trim().parse::<i32>() {
        Ok(CMDB_SCHEMA_VERSION) => Ok(()),
        _ => Err(PersistenceError::SchemaVersion {
            found: stamped,
            expected: CMDB_SCHEMA_VERSION,
        }
        .into()),
    }
}
