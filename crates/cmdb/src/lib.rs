//! # cmdb
//!
//! An embedded configuration-management database built on virtual tables.
//!
//! Schemas, fields, entities and values are ordinary rows (an
//! entity-attribute-value layout), so tables and columns can be created at
//! runtime. Every field carries a JSON configuration naming a [`ValueType`]
//! that validates and canonicalizes what is stored in it.
//!
//! ```no_run
//! use cmdb::{Cmdb, CmdbConfig};
//!
//! # fn main() -> cmdb::Result<()> {
//! let db = Cmdb::open(CmdbConfig::from_env())?;
//! db.add_schema("host", Some("physical hosts"))?;
//! db.add_field("host", "ip", r#"{"type": "IP", "unique": true}"#)?;
//!
//! let web = db.add_entity("host", "web-1")?;
//! db.set_value(web.id, "ip", "10.0.0.7")?;
//!
//! // Populated tables only accept required fields with a default.
//! db.add_field(
//!     "host",
//!     "status",
//!     r#"{"type": "Int", "nullable": false, "unique": false, "default": "1"}"#,
//! )?;
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod config;
pub mod error;
pub mod evolution;
pub mod meta;
pub mod paginate;
pub mod store;
pub mod types;

pub use catalog::Cmdb;
pub use config::CmdbConfig;
pub use error::{Error, PersistenceError, RangeBound, Result, ValidationError};
pub use evolution::{Admission, SchemaEvolution};
pub use meta::{FieldMeta, OnDelete, OnUpdate, Reference};
pub use paginate::{Page, PageRequest};
pub use store::{Backfill, Entity, Field, NewField, Schema, SqliteStore, Store, Value};
pub use types::{IntType, IpType, Options, TypeClass, TypeRegistry, ValueType};
