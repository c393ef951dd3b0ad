//! HTTP handlers for the serving gateway.
//!
//! Only the endpoints the bootstrap itself owns live here.

pub mod health;
pub mod schema;

pub use health::{api_health, health_check};
