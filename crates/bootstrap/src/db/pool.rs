//! Database connection pool management.

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;

use crate::config::DatabaseConfig;
use crate::error::SequencerResult;

/// Type alias for the PostgreSQL connection pool.
pub type DbPool = PgPool;

/// Create a pool that opens connections on first use.
///
/// The readiness wait has already proven the datastore reachable by the
/// time this pool is used, so no connection is made here.
///
/// # Errors
///
/// Returns `ConfigurationMissing` if host, name or user is unset.
pub fn create_lazy_pool(config: &DatabaseConfig) -> SequencerResult<DbPool> {
    let options = config.connect_options()?;

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_secs.max(1) * 6))
        .connect_lazy_with(options);

    tracing::info!(
        url = %config.display_url(),
        max_connections = config.max_connections,
        "Database connection pool created"
    );

    Ok(pool)
}

/// Check if the database connection is healthy.
///
/// # Arguments
///
/// * `pool` - Database connection pool
///
/// # Returns
///
/// `true` if the database is reachable, `false` otherwise.
pub async fn health_check(pool: &DbPool) -> bool {
    sqlx::query("SELECT 1").execute(pool).await.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SequencerError;

    #[test]
    fn test_pool_requires_host() {
        let err = create_lazy_pool(&DatabaseConfig::default()).unwrap_err();
        assert!(matches!(err, SequencerError::ConfigurationMissing("DB_HOST")));
    }

    #[tokio::test]
    async fn test_lazy_pool_does_not_connect() {
        let config = DatabaseConfig {
            host: Some("127.0.0.1".to_string()),
            port: 1,
            name: Some("devdb".to_string()),
            user: Some("devuser".to_string()),
            ..DatabaseConfig::default()
        };

        let pool = create_lazy_pool(&config).unwrap();
        assert_eq!(pool.size(), 0);
    }
}
