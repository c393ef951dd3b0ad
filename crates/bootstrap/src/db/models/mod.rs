//! Database models for the recipe API bootstrap.
//!
//! SQLx-compatible definitions of the rows the bootstrap owns.

pub mod migration;

pub use migration::*;
