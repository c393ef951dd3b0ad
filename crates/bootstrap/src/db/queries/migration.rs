//! Migration history queries.
//!
//! The history table name is configurable, so statements are formatted
//! with a name already validated by `SchemaConfig::history_table`.

use sqlx::PgExecutor;

use crate::db::models::AppliedMigration;

/// Create the history table if it does not exist yet.
pub async fn ensure_history_table<'e, E>(executor: E, table: &str) -> Result<(), sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {table} (
            version BIGINT PRIMARY KEY,
            name TEXT NOT NULL,
            checksum TEXT NOT NULL,
            applied_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#
    ))
    .execute(executor)
    .await?;

    Ok(())
}

/// Create the schema part of a qualified table name.
pub async fn ensure_schema<'e, E>(executor: E, schema: &str) -> Result<(), sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query(&format!("CREATE SCHEMA IF NOT EXISTS {schema}"))
        .execute(executor)
        .await?;

    Ok(())
}

/// Whether the history table exists.
pub async fn history_table_exists<'e, E>(executor: E, table: &str) -> Result<bool, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_scalar("SELECT to_regclass($1::text) IS NOT NULL")
        .bind(table)
        .fetch_one(executor)
        .await
}

/// List applied migrations in ascending version order.
pub async fn list_applied<'e, E>(
    executor: E,
    table: &str,
) -> Result<Vec<AppliedMigration>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, AppliedMigration>(&format!(
        r#"
        SELECT version, name, checksum, applied_at
        FROM {table}
        ORDER BY version
        "#
    ))
    .fetch_all(executor)
    .await
}

/// Record a migration as applied.
pub async fn record_applied<'e, E>(
    executor: E,
    table: &str,
    version: i64,
    name: &str,
    checksum: &str,
) -> Result<(), sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query(&format!(
        r#"
        INSERT INTO {table} (version, name, checksum)
        VALUES ($1, $2, $3)
        "#
    ))
    .bind(version)
    .bind(name)
    .bind(checksum)
    .execute(executor)
    .await?;

    Ok(())
}

/// Block until the session-level advisory lock `key` is held.
pub async fn advisory_lock<'e, E>(executor: E, key: i64) -> Result<(), sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query("SELECT pg_advisory_lock($1)")
        .bind(key)
        .execute(executor)
        .await?;

    Ok(())
}

/// Release the session-level advisory lock `key`.
pub async fn advisory_unlock<'e, E>(executor: E, key: i64) -> Result<(), sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query("SELECT pg_advisory_unlock($1)")
        .bind(key)
        .execute(executor)
        .await?;

    Ok(())
}
