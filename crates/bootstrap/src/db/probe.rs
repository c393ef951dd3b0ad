//! Single-shot datastore reachability probes.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::Connection;
use thiserror::Error;

/// Outcome of a failed probe.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProbeError {
    /// Worth trying again: the server is down, starting or saturated
    #[error("{0}")]
    Transient(String),

    /// Retrying cannot help, e.g. rejected credentials
    #[error("{0}")]
    Fatal(String),
}

/// Something that can tell whether the datastore accepts connections.
#[async_trait]
pub trait DatastoreProbe: Send + Sync {
    /// Make exactly one connection attempt.
    async fn probe(&self) -> Result<(), ProbeError>;
}

/// Probe that opens and closes one PostgreSQL connection per attempt.
#[derive(Debug, Clone)]
pub struct PgProbe {
    options: PgConnectOptions,
    timeout: Duration,
}

impl PgProbe {
    pub fn new(options: PgConnectOptions, timeout: Duration) -> Self {
        Self { options, timeout }
    }
}

#[async_trait]
impl DatastoreProbe for PgProbe {
    async fn probe(&self) -> Result<(), ProbeError> {
        let conn = tokio::time::timeout(self.timeout, PgConnection::connect_with(&self.options))
            .await
            .map_err(|_| {
                ProbeError::Transient(format!("connect timed out after {:?}", self.timeout))
            })?
            .map_err(classify)?;

        if let Err(e) = conn.close().await {
            tracing::debug!(error = %e, "Probe connection did not close cleanly");
        }
        Ok(())
    }
}

/// Sort a connect error into transient or fatal.
///
/// Configuration errors and SQLSTATE class 28 (invalid authorization) are
/// fatal. Everything else, including "the database system is starting up"
/// (57P03), "too many connections" (53300) and a database that does not
/// exist yet (3D000), is retried.
pub fn classify(err: sqlx::Error) -> ProbeError {
    match &err {
        sqlx::Error::Configuration(_) => ProbeError::Fatal(err.to_string()),
        sqlx::Error::Database(db_err) => {
            if db_err.code().is_some_and(|code| is_fatal_sqlstate(&code)) {
                ProbeError::Fatal(err.to_string())
            } else {
                ProbeError::Transient(err.to_string())
            }
        }
        _ => ProbeError::Transient(err.to_string()),
    }
}

/// SQLSTATE codes a readiness wait must not retry: class 28, invalid
/// authorization specification.
pub fn is_fatal_sqlstate(code: &str) -> bool {
    code.starts_with("28")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_errors_are_transient() {
        let err = sqlx::Error::Io(std::io::Error::from(std::io::ErrorKind::ConnectionRefused));
        assert!(matches!(classify(err), ProbeError::Transient(_)));
    }

    #[test]
    fn test_pool_timeout_is_transient() {
        assert!(matches!(
            classify(sqlx::Error::PoolTimedOut),
            ProbeError::Transient(_)
        ));
    }

    #[test]
    fn test_configuration_error_is_fatal() {
        let err = sqlx::Error::Configuration("bad sslmode".into());
        assert!(matches!(classify(err), ProbeError::Fatal(_)));
    }

    #[test]
    fn test_authorization_sqlstates_are_fatal() {
        // invalid_authorization_specification, invalid_password
        assert!(is_fatal_sqlstate("28000"));
        assert!(is_fatal_sqlstate("28P01"));
    }

    #[test]
    fn test_startup_and_capacity_sqlstates_are_retried() {
        // cannot_connect_now, too_many_connections, invalid_catalog_name
        assert!(!is_fatal_sqlstate("57P03"));
        assert!(!is_fatal_sqlstate("53300"));
        assert!(!is_fatal_sqlstate("3D000"));
        assert!(!is_fatal_sqlstate("08006"));
    }

    #[tokio::test]
    async fn test_closed_port_is_transient() {
        // Bind then drop to get a port nothing listens on.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let options = PgConnectOptions::new()
            .host("127.0.0.1")
            .port(port)
            .username("devuser")
            .database("devdb");
        let probe = PgProbe::new(options, Duration::from_secs(2));

        assert!(matches!(probe.probe().await, Err(ProbeError::Transient(_))));
    }
}
