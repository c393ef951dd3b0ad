//! Error types for the recipe API bootstrap.
//!
//! [`SequencerError`] is the fatal error taxonomy of the startup sequence;
//! every variant maps to a process exit code. [`AppError`] is the error type
//! of the serving gateway and implements `IntoResponse` for Axum handlers.

use std::path::PathBuf;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Fatal startup errors. None of them is recovered from inside the process.
#[derive(Error, Debug)]
pub enum SequencerError {
    /// A required environment variable is absent or empty
    #[error("Missing configuration: {0} is not set")]
    ConfigurationMissing(&'static str),

    /// An environment variable is present but could not be parsed
    #[error("Configuration error: {0}")]
    Configuration(#[from] envy::Error),

    /// The datastore did not accept a connection within the attempt budget
    #[error("Datastore unavailable after {attempts} attempt(s): {last_error}")]
    DatastoreUnavailable { attempts: u32, last_error: String },

    /// Filesystem failure while preparing static assets
    #[error("Filesystem error at {}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The set of migration files is malformed
    #[error("Schema error: {0}")]
    Schema(String),

    /// An applied migration no longer matches its file
    #[error("Migration {version} was modified after it was applied (recorded checksum {expected}, file checksum {found})")]
    SchemaDrift {
        version: i64,
        expected: String,
        found: String,
    },

    /// A migration failed to apply; earlier ones stay applied
    #[error("Migration {version} ({name}) failed to apply: {source}")]
    SchemaApply {
        version: i64,
        name: String,
        #[source]
        source: sqlx::Error,
    },

    /// The serving gateway could not start or stopped with an error
    #[error("Serve error: {0}")]
    Serve(String),

    /// A step ran before an earlier step produced what it needs
    #[error("Startup step ran before {0} was available")]
    NotReady(&'static str),
}

impl SequencerError {
    /// Build a filesystem error for `path`.
    pub fn filesystem(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SequencerError::Filesystem {
            path: path.into(),
            source,
        }
    }

    /// Process exit status for this error (sysexits.h values).
    pub fn exit_code(&self) -> u8 {
        match self {
            SequencerError::ConfigurationMissing(_) | SequencerError::Configuration(_) => 78,
            SequencerError::DatastoreUnavailable { .. } => 69,
            SequencerError::Filesystem { .. } => 74,
            SequencerError::Schema(_)
            | SequencerError::SchemaDrift { .. }
            | SequencerError::SchemaApply { .. } => 65,
            SequencerError::Serve(_) => 71,
            SequencerError::NotReady(_) => 70,
        }
    }
}

/// Result type alias using SequencerError.
pub type SequencerResult<T> = Result<T, SequencerError>;

/// Gateway errors returned from HTTP handlers and middleware.
#[derive(Error, Debug)]
pub enum AppError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Bad request error
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AppError::Database(e) => {
                tracing::error!(error = %e, "Database error");
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg.clone())
            }
        };

        let body = Json(json!({
            "error": error_message,
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

/// Result type alias using AppError.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_missing_message() {
        let err = SequencerError::ConfigurationMissing("DB_HOST");
        assert_eq!(err.to_string(), "Missing configuration: DB_HOST is not set");
        assert_eq!(err.exit_code(), 78);
    }

    #[test]
    fn test_exit_codes_are_non_zero_and_distinct_per_class() {
        let errors = [
            SequencerError::ConfigurationMissing("STATIC_ROOT"),
            SequencerError::DatastoreUnavailable {
                attempts: 3,
                last_error: "refused".to_string(),
            },
            SequencerError::filesystem(
                "/vol/web/static",
                std::io::Error::from(std::io::ErrorKind::PermissionDenied),
            ),
            SequencerError::Schema("duplicate version 2".to_string()),
            SequencerError::Serve("address in use".to_string()),
        ];

        let codes: Vec<u8> = errors.iter().map(SequencerError::exit_code).collect();
        assert!(codes.iter().all(|c| *c != 0));
        let mut unique = codes.clone();
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(unique.len(), codes.len());
    }

    #[test]
    fn test_filesystem_error_names_path() {
        let err = SequencerError::filesystem(
            "/missing/src",
            std::io::Error::from(std::io::ErrorKind::NotFound),
        );
        assert!(err.to_string().contains("/missing/src"));
    }

    #[test]
    fn test_bad_request_status() {
        let response = AppError::BadRequest("Invalid Host header".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
