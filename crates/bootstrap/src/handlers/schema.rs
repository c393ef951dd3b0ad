//! Schema status API handler.
//!
//! Reports which migrations the history table records as applied.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::db::models::AppliedMigration;
use crate::db::queries::migration as queries;
use crate::error::{AppError, AppResult};
use crate::result_ext::ResultExt;
use crate::state::AppState;

/// Response for the schema status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct SchemaStatusResponse {
    /// Operation status.
    pub status: String,

    /// History table that was read.
    pub history_table: String,

    /// Latest applied version, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_version: Option<i64>,

    /// Applied migrations in ascending version order.
    pub applied: Vec<AppliedMigration>,
}

/// List applied migrations.
///
/// GET /api/schema
///
/// An absent history table reads as "nothing applied".
pub async fn list_applied(
    State(state): State<AppState>,
) -> AppResult<Json<SchemaStatusResponse>> {
    let table = state
        .settings
        .schema
        .history_table()
        .map_err(|e| AppError::Internal(e.to_string()))?;

    let exists = queries::history_table_exists(&state.db, table)
        .await
        .log("checking migration history table")?;

    let applied = if exists {
        queries::list_applied(&state.db, table)
            .await
            .log("listing applied migrations")?
    } else {
        Vec::new()
    };

    Ok(Json(SchemaStatusResponse {
        status: "ok".to_string(),
        history_table: table.to_string(),
        current_version: applied.last().map(|m| m.version),
        applied,
    }))
}
