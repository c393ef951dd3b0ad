//! Database queries for the recipe API bootstrap.

pub mod migration;
