//! Database module for the recipe API bootstrap.
//!
//! This module provides PostgreSQL connectivity, readiness probes and the
//! migration history queries, using SQLx.

pub mod models;
pub mod pool;
pub mod probe;
pub mod queries;

pub use pool::{create_lazy_pool, DbPool};
pub use probe::{DatastoreProbe, PgProbe, ProbeError};
