//! Static asset collection settings.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{SequencerError, SequencerResult};

/// Static asset configuration loaded from environment variables.
///
/// Environment variables are prefixed with `STATIC_`:
/// - `STATIC_ROOT`: Destination directory (required by asset collection)
/// - `STATIC_SOURCES`: Comma-separated source directories, earlier wins
/// - `STATIC_CLEAR`: Empty the destination before collecting (default: false)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StaticConfig {
    /// Destination directory
    #[serde(default)]
    pub root: Option<PathBuf>,

    /// Source directories in precedence order
    #[serde(default)]
    pub sources: Vec<String>,

    /// Remove destination contents before collecting
    #[serde(default)]
    pub clear: bool,
}

impl StaticConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::prefixed("STATIC_").from_env::<StaticConfig>()
    }

    /// Destination directory, or `ConfigurationMissing` when unset.
    pub fn destination(&self) -> SequencerResult<&Path> {
        self.root
            .as_deref()
            .filter(|p| !p.as_os_str().is_empty())
            .ok_or(SequencerError::ConfigurationMissing("STATIC_ROOT"))
    }

    /// Source directories with blank entries dropped.
    pub fn source_dirs(&self) -> Vec<PathBuf> {
        self.sources
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .collect()
    }
}
