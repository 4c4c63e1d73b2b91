//! Engine configuration with TOML persistence.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Tunables for link validation and propagation.
///
/// All fields have serde defaults so a partial config file (or none at all)
/// yields a working engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum number of child edges one batch may leave on a single parent.
    /// Bounds both validation and propagation fan-out cost.
    #[serde(default = "default_max_links_per_batch")]
    pub max_links_per_batch: usize,

    /// Safety bound on propagation traversal. The DAG invariant makes the
    /// walk terminate on its own; exceeding this bound means the stored
    /// graph is corrupt and the operation fails as an integrity fault.
    #[serde(default = "default_max_propagation_nodes")]
    pub max_propagation_nodes: usize,

    /// Recency window for the client-side propagated-vs-user fallback
    /// heuristic, applied only to events that carry no explicit cause tag.
    #[serde(default = "default_recency_window_ms")]
    pub propagation_recency_window_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_links_per_batch: default_max_links_per_batch(),
            max_propagation_nodes: default_max_propagation_nodes(),
            propagation_recency_window_ms: default_recency_window_ms(),
        }
    }
}

const fn default_max_links_per_batch() -> usize {
    20
}

const fn default_max_propagation_nodes() -> usize {
    4096
}

const fn default_recency_window_ms() -> u64 {
    5_000
}

impl EngineConfig {
    /// Load config from a TOML file, falling back to defaults when the file
    /// does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read config file {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("parse config file {}", path.display()))
    }

    /// Write the config back out as TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save(&self, path: &Path) -> Result<()> {
        let rendered = toml::to_string_pretty(self).context("serialize config")?;
        std::fs::write(path, rendered)
            .with_context(|| format!("write config file {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::EngineConfig;

    #[test]
    fn defaults_are_sane() {
        let config = EngineConfig::default();
        assert_eq!(config.max_links_per_batch, 20);
        assert!(config.max_propagation_nodes >= 1024);
        assert_eq!(config.propagation_recency_window_ms, 5_000);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("missing.toml");
        let config = EngineConfig::load_or_default(&path).expect("load");
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn save_load_roundtrip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("skein.toml");

        let config = EngineConfig {
            max_links_per_batch: 5,
            max_propagation_nodes: 128,
            propagation_recency_window_ms: 250,
        };
        config.save(&path).expect("save");

        let loaded = EngineConfig::load_or_default(&path).expect("load");
        assert_eq!(loaded, config);
    }

    #[test]
    fn partial_file_uses_field_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("partial.toml");
        std::fs::write(&path, "max_links_per_batch = 3\n").expect("write");

        let loaded = EngineConfig::load_or_default(&path).expect("load");
        assert_eq!(loaded.max_links_per_batch, 3);
        assert_eq!(
            loaded.propagation_recency_window_ms,
            EngineConfig::default().propagation_recency_window_ms
        );
    }
}
