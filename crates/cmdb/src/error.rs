//! # Error Types
//!
//! One error enum for the whole crate. Each variant is a failure kind callers
//! are expected to branch on: registry misses, value validation, malformed
//! field configuration, dangling references, schema-evolution rule
//! violations, missing rows and store failures.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the registry, the metadata parser, the schema-evolution
/// engine and the store.
#[derive(Debug, Error)]
pub enum Error {
    /// A value type name that was never registered.
    #[error("unknown value type '{0}'")]
    UnknownType(String),

    /// A value was rejected by its value type.
    #[error("invalid value: {0}")]
    Validation(#[from] ValidationError),

    /// A field configuration that cannot be parsed.
    #[error("invalid field meta: {0}")]
    InvalidMeta(String),

    /// A field references a (schema, field) pair that does not exist.
    #[error("wrong reference {schema}.{field}")]
    InvalidReference { schema: String, field: String },

    /// The field cannot be added to the schema in its current state.
    #[error("constraint violated: {0}")]
    Constraint(String),

    /// A schema, field or entity that does not exist or is deleted.
    #[error("{0} not found")]
    NotFound(String),

    /// The store rejected or failed the operation. Nothing was committed.
    #[error("persistence error: {0}")]
    Persistence(#[from] PersistenceError),
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Persistence(PersistenceError::Sqlite(err))
    }
}

/// Rejection reasons from [`ValueType::stringify`](crate::types::ValueType::stringify).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The input could not be parsed as the expected kind.
    #[error("'{value}' is not a valid {expected}")]
    Format { value: String, expected: &'static str },

    /// The input is outside the configured bounds.
    #[error("{value} is {bound}, limit is {limit}")]
    Range {
        value: i64,
        bound: RangeBound,
        limit: i64,
    },

    /// The canonical form does not start with the configured prefix.
    #[error("{value} must start with {prefix}")]
    Prefix { value: String, prefix: String },
}

/// Which side of a range check failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeBound {
    TooSmall,
    TooBig,
}

impl std::fmt::Display for RangeBound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RangeBound::TooSmall => write!(f, "too small"),
            RangeBound::TooBig => write!(f, "too big"),
        }
    }
}

/// Store-layer failures.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// SQLite error, including unique-constraint violations.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// The database file was written by an incompatible version.
    #[error(
        "cmdb schema version mismatch: database has version {found}, but this version requires {expected}"
    )]
    SchemaVersion { found: String, expected: i32 },
}

impl Error {
    /// Returns true when SQLite rejected the write with a constraint violation (unique, foreign key, not null).
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            Error::Persistence(PersistenceError::Sqlite(rusqlite::Error::SqliteFailure(err, _)))
                if err.code == rusqlite::ErrorCode::ConstraintViolation
        )
    }
}
