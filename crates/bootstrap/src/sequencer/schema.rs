//! Schema synchronization.
//!
//! Migrations are plain SQL files named `<version>_<name>.sql`. Pending
//! ones are applied in ascending version order, each in its own
//! transaction together with its history record. A failure stops the run
//! and leaves earlier migrations applied.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use sqlx::pool::PoolConnection;
use sqlx::{Connection, Postgres};

use super::{Stage, StartupContext, Step};
use crate::db::models::AppliedMigration;
use crate::db::queries::migration as queries;
use crate::db::DbPool;
use crate::error::{SequencerError, SequencerResult};
use crate::result_ext::ResultExt;

/// One schema change loaded from disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migration {
    pub version: i64,
    pub name: String,
    pub sql: String,
    pub checksum: String,
}

impl Migration {
    pub fn new(version: i64, name: impl Into<String>, sql: impl Into<String>) -> Self {
        let sql = sql.into();
        let checksum = hex::encode(Sha256::digest(sql.as_bytes()));
        Self {
            version,
            name: name.into(),
            sql,
            checksum,
        }
    }
}

/// Split `0003_add_recipe_tags.sql` into `(3, "add_recipe_tags")`.
pub fn parse_file_name(file_name: &str) -> Option<(i64, String)> {
    let stem = file_name.strip_suffix(".sql")?;
    let (version, name) = stem.split_once('_')?;
    if version.is_empty() || !version.bytes().all(|b| b.is_ascii_digit()) || name.is_empty() {
        return None;
    }
    let version: i64 = version.parse().ok()?;
    (version > 0).then(|| (version, name.to_string()))
}

/// Load and order every migration in `dir`.
///
/// Files without a `.sql` extension and hidden files are ignored. A `.sql`
/// file whose name does not parse, or two files with the same version,
/// are errors.
pub fn load_migrations(dir: &Path) -> SequencerResult<Vec<Migration>> {
    let entries = fs::read_dir(dir).map_err(|e| SequencerError::filesystem(dir, e))?;
    let mut by_version: BTreeMap<i64, Migration> = BTreeMap::new();

    for entry in entries {
        let entry = entry.map_err(|e| SequencerError::filesystem(dir, e))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if file_name.starts_with('.') || !file_name.ends_with(".sql") {
            continue;
        }

        let (version, name) = parse_file_name(file_name).ok_or_else(|| {
            SequencerError::Schema(format!(
                "migration file '{}' does not match <version>_<name>.sql",
                file_name
            ))
        })?;
        let sql = fs::read_to_string(&path).map_err(|e| SequencerError::filesystem(&path, e))?;

        if let Some(existing) = by_version.insert(version, Migration::new(version, name, sql)) {
            return Err(SequencerError::Schema(format!(
                "duplicate migration version {} ({} and {})",
                version, existing.name, file_name
            )));
        }
    }

    Ok(by_version.into_values().collect())
}

/// Where applied migrations are recorded and new ones executed.
#[async_trait]
pub trait SchemaStore: Send {
    /// Applied migrations, in any order.
    async fn applied(&mut self) -> Result<Vec<AppliedMigration>, sqlx::Error>;

    /// Apply one migration and record it, atomically.
    async fn apply(&mut self, migration: &Migration) -> Result<(), sqlx::Error>;
}

/// Result of one synchronization run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Versions applied by this run, ascending
    pub applied: Vec<i64>,
    /// Migrations that were already recorded
    pub already_applied: usize,
}

/// Bring `store` up to date with `migrations` (sorted ascending).
pub async fn synchronize<S>(store: &mut S, migrations: &[Migration]) -> SequencerResult<SyncReport>
where
    S: SchemaStore + ?Sized,
{
    let applied = store
        .applied()
        .await
        .map_err(|e| SequencerError::Schema(format!("cannot read migration history: {e}")))?;

    let recorded: HashMap<i64, &AppliedMigration> =
        applied.iter().map(|m| (m.version, m)).collect();
    let highest_applied = applied.iter().map(|m| m.version).max();

    for migration in migrations {
        if let Some(record) = recorded.get(&migration.version) {
            if record.checksum != migration.checksum {
                return Err(SequencerError::SchemaDrift {
                    version: migration.version,
                    expected: record.checksum.clone(),
                    found: migration.checksum.clone(),
                });
            }
        }
    }

    for record in &applied {
        if !migrations.iter().any(|m| m.version == record.version) {
            tracing::warn!(
                version = record.version,
                name = %record.name,
                "Applied migration has no file on disk"
            );
        }
    }

    let mut report = SyncReport {
        applied: Vec::new(),
        already_applied: migrations
            .iter()
            .filter(|m| recorded.contains_key(&m.version))
            .count(),
    };

    for migration in migrations
        .iter()
        .filter(|m| !recorded.contains_key(&m.version))
    {
        if highest_applied.is_some_and(|high| migration.version < high) {
            tracing::warn!(
                version = migration.version,
                name = %migration.name,
                "Applying migration older than the latest applied one"
            );
        }

        tracing::info!(version = migration.version, name = %migration.name, "Applying migration");
        store
            .apply(migration)
            .await
            .map_err(|source| SequencerError::SchemaApply {
                version: migration.version,
                name: migration.name.clone(),
                source,
            })?;
        report.applied.push(migration.version);
    }

    Ok(report)
}

/// PostgreSQL-backed store holding an advisory lock on a dedicated connection.
pub struct PgSchemaStore {
    conn: PoolConnection<Postgres>,
    table: String,
    lock_key: i64,
}

impl PgSchemaStore {
    /// Acquire a connection, take the advisory lock and create the history table.
    pub async fn open(pool: &DbPool, table: &str, lock_key: i64) -> Result<Self, sqlx::Error> {
        let mut conn = pool.acquire().await?;

        queries::advisory_lock(&mut *conn, lock_key).await?;
        let mut store = Self {
            conn,
            table: table.to_string(),
            lock_key,
        };

        if let Err(e) = store.prepare().await {
            store.release().await;
            return Err(e);
        }
        Ok(store)
    }

    async fn prepare(&mut self) -> Result<(), sqlx::Error> {
        if let Some((schema, _)) = self.table.split_once('.') {
            queries::ensure_schema(&mut *self.conn, schema).await?;
        }
        queries::ensure_history_table(&mut *self.conn, &self.table).await
    }

    /// Release the advisory lock. If that fails the connection is closed
    /// instead of going back to the pool, which drops the lock too.
    pub async fn release(mut self) {
        let unlocked = queries::advisory_unlock(&mut *self.conn, self.lock_key)
            .await
            .log("releasing migration lock");
        if unlocked.is_err() {
            self.conn.close_on_drop();
        }
    }
}

#[async_trait]
impl SchemaStore for PgSchemaStore {
    async fn applied(&mut self) -> Result<Vec<AppliedMigration>, sqlx::Error> {
        queries::list_applied(&mut *self.conn, &self.table).await
    }

    async fn apply(&mut self, migration: &Migration) -> Result<(), sqlx::Error> {
        let mut tx = Connection::begin(&mut *self.conn).await?;
        sqlx::Executor::execute(&mut *tx, sqlx::raw_sql(&migration.sql)).await?;
        queries::record_applied(
            &mut *tx,
            &self.table,
            migration.version,
            &migration.name,
            &migration.checksum,
        )
        .await?;
        tx.commit().await
    }
}

/// Step 3: apply pending migrations from `SCHEMA_MIGRATIONS_DIR`.
#[derive(Debug, Default)]
pub struct SynchronizeSchema;

#[async_trait]
impl Step for SynchronizeSchema {
    fn name(&self) -> &'static str {
        "migrate"
    }

    fn stage(&self) -> Stage {
        Stage::SynchronizingSchema
    }

    async fn run(self: Box<Self>, ctx: &mut StartupContext) -> SequencerResult<()> {
        let config = &ctx.settings.schema;
        let table = config.history_table()?;
        let migrations = load_migrations(&config.migrations_dir)?;
        let pool = ctx.pool()?;

        tracing::info!(
            dir = %config.migrations_dir.display(),
            table,
            known = migrations.len(),
            "Synchronizing schema"
        );

        let mut store = PgSchemaStore::open(pool, table, config.lock_key)
            .await
            .map_err(|e| SequencerError::Schema(format!("cannot prepare migration history: {e}")))?;
        let result = synchronize(&mut store, &migrations).await;
        store.release().await;

        let report = result?;
        if report.applied.is_empty() {
            tracing::info!(already_applied = report.already_applied, "No migrations to apply");
        } else {
            tracing::info!(
                applied = ?report.applied,
                already_applied = report.already_applied,
                "Schema synchronized"
            );
        }
        Ok(())
    }
}
