//! Schema synchronization settings.

use std::path::PathBuf;

use serde::Deserialize;

use crate::error::{SequencerError, SequencerResult};

/// Schema configuration loaded from environment variables.
///
/// Environment variables are prefixed with `SCHEMA_`:
/// - `SCHEMA_MIGRATIONS_DIR`: Directory of `<version>_<name>.sql` files (default: "migrations")
/// - `SCHEMA_HISTORY_TABLE`: Table recording applied migrations (default: "schema_migrations")
/// - `SCHEMA_LOCK_KEY`: PostgreSQL advisory lock key held while migrating
#[derive(Debug, Clone, Deserialize)]
pub struct SchemaConfig {
    /// Migration files directory
    #[serde(default = "default_migrations_dir")]
    pub migrations_dir: PathBuf,

    /// History table, optionally schema-qualified
    #[serde(default = "default_history_table")]
    pub history_table: String,

    /// Advisory lock key
    #[serde(default = "default_lock_key")]
    pub lock_key: i64,
}

fn default_migrations_dir() -> PathBuf {
    PathBuf::from("migrations")
}

fn default_history_table() -> String {
    "schema_migrations".to_string()
}

fn default_lock_key() -> i64 {
    0x7265_6369_7065
}

impl SchemaConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::prefixed("SCHEMA_").from_env::<SchemaConfig>()
    }

    /// History table name, checked to be a plain (optionally qualified) identifier.
    ///
    /// The name is interpolated into SQL, so anything beyond
    /// `[A-Za-z_][A-Za-z0-9_]*` with at most one `.` is rejected.
    pub fn history_table(&self) -> SequencerResult<&str> {
        let table = self.history_table.as_str();
        let parts: Vec<&str> = table.split('.').collect();
        let valid = parts.len() <= 2
            && parts.iter().all(|part| {
                let mut chars = part.chars();
                matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
                    && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
            });

        if valid {
            Ok(table)
        } else {
            Err(SequencerError::Schema(format!(
                "invalid history table name '{}'",
                table
            )))
        }
    }
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            migrations_dir: default_migrations_dir(),
            history_table: default_history_table(),
            lock_key: default_lock_key(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SchemaConfig::default();
        assert_eq!(config.migrations_dir, PathBuf::from("migrations"));
        assert_eq!(config.history_table().unwrap(), "schema_migrations");
    }

    #[test]
    fn test_qualified_table_is_accepted() {
        let config = SchemaConfig {
            history_table: "app.schema_migrations".to_string(),
            ..SchemaConfig::default()
        };
        assert_eq!(config.history_table().unwrap(), "app.schema_migrations");
    }

    #[test]
    fn test_injection_is_rejected() {
        for bad in ["x; DROP TABLE users", "a.b.c", "1table", ""] {
            let config = SchemaConfig {
                history_table: bad.to_string(),
                ..SchemaConfig::default()
            };
            assert!(config.history_table().is_err(), "accepted {bad:?}");
        }
    }
}
