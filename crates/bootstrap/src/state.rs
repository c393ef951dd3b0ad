//! Application state for the serving gateway.
//!
//! This module defines the shared application state that is
//! passed to all handlers via Axum's state management.

use std::sync::Arc;
use std::time::Instant;

use crate::config::Settings;
use crate::db::DbPool;

/// Shared application state.
///
/// Cloned into every handler; the settings are the same immutable value
/// the startup steps ran with.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: DbPool,

    /// Process settings
    pub settings: Arc<Settings>,

    /// Server start time for uptime calculation
    pub start_time: Instant,
}

impl AppState {
    /// Create a new application state.
    pub fn new(db: DbPool, settings: Arc<Settings>) -> Self {
        Self {
            db,
            settings,
            start_time: Instant::now(),
        }
    }

    /// Get the server uptime in seconds.
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
