//! Configuration module for the recipe API bootstrap.
//!
//! Everything is read from environment variables using the `envy` crate
//! for type-safe parsing. [`Settings`] is built once at process start and
//! never mutated afterwards; no other module reads the environment.

mod assets;
mod database;
mod gateway;
mod schema;

use serde::Deserialize;

pub use assets::StaticConfig;
pub use database::{DatabaseConfig, RetryPolicy};
pub use gateway::GatewayConfig;
pub use schema::SchemaConfig;

/// Log output format, from `LOG_FORMAT`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Logging configuration (`LOG_` prefix).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogConfig {
    /// Output format
    #[serde(default)]
    pub format: LogFormat,
}

/// Process-wide settings, one section per startup concern.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub database: DatabaseConfig,
    pub assets: StaticConfig,
    pub schema: SchemaConfig,
    pub gateway: GatewayConfig,
    pub log: LogConfig,
}

impl Settings {
    /// Load settings from the process environment.
    pub fn from_env() -> Result<Self, envy::Error> {
        Self::from_vars(std::env::vars())
    }

    /// Load settings from an explicit set of variables.
    pub fn from_vars<I>(vars: I) -> Result<Self, envy::Error>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let vars: Vec<(String, String)> = vars.into_iter().collect();

        Ok(Self {
            database: envy::prefixed("DB_").from_iter(vars.clone())?,
            assets: envy::prefixed("STATIC_").from_iter(vars.clone())?,
            schema: envy::prefixed("SCHEMA_").from_iter(vars.clone())?,
            gateway: envy::prefixed("GATEWAY_").from_iter(vars.clone())?,
            log: envy::prefixed("LOG_").from_iter(vars)?,
        })
    }
}
