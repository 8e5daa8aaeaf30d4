//! Engine configuration.

use std::path::PathBuf;

/// Environment variable that overrides [`CmdbConfig::database`].
pub const DATABASE_ENV: &str = "CMDB_DATABASE";

/// Path that selects an in-memory database.
pub const IN_MEMORY: &str = ":memory:";

/// Configuration for a [`Cmdb`](crate::Cmdb) instance.
#[derive(Debug, Clone)]
pub struct CmdbConfig {
    /// SQLite database file, or `:memory:`.
    pub database: PathBuf,

    /// How long a writer waits on a locked database before failing.
    pub busy_timeout_ms: u64,

    /// Page size used when a requested size is out of range.
    pub default_page_size: usize,

    /// Exclusive upper bound for requested page sizes.
    pub max_page_size: usize,
}

impl CmdbConfig {
    pub fn new(database: impl Into<PathBuf>) -> Self {
        Self {
            database: database.into(),
            ..Self::default()
        }
    }

    /// Configuration for a private in-memory database.
    pub fn in_memory() -> Self {
        Self::new(IN_MEMORY)
    }

    /// Default configuration with `database` taken from `CMDB_DATABASE` when set.
    pub fn from_env() -> Self {
        match std::env::var_os(DATABASE_ENV) {
            Some(path) if !path.is_empty() => Self::new(path),
            _ => Self::default(),
        }
    }

    pub fn is_in_memory(&self) -> bool {
        self.database.as_os_str() == IN_MEMORY
    }
}

impl Default for CmdbConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from("cmdb.db"),
            busy_timeout_ms: 5_000,
            default_page_size: 20,
            max_page_size: 100,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_config_is_detected() {
        assert!(CmdbConfig::in_memory().is_in_memory());
        assert!(!CmdbConfig::default().is_in_memory());
    }

    #[test]
    fn new_keeps_other_defaults() {
        let config = CmdbConfig::new("/tmp/x.db");
        assert_eq!(config.database, PathBuf::from("/tmp/x.db"));
        assert_eq!(config.default_page_size, 20);
        assert_eq!(config.max_page_size, 100);
    }
}
