//! Migration history model.
//!
//! One row per applied schema migration, keyed by its version.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A migration recorded as applied in the history table.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AppliedMigration {
    /// Monotonic version taken from the file name
    pub version: i64,

    /// Descriptive part of the file name
    pub name: String,

    /// SHA-256 of the SQL text at the time it was applied
    pub checksum: String,

    /// When the migration committed
    pub applied_at: DateTime<Utc>,
}
