//! Configuration management for the layervault storage engine
//!
//! This module handles all engine settings with defaults matching the
//! production strategy policy. Configuration loading itself is owned by an
//! external collaborator; the engine only consumes the resolved values.

use crate::core::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// One mebibyte, the unit the strategy thresholds are expressed in.
const MIB: u64 = 1024 * 1024;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Author recorded in commit records
    pub author: String,

    /// Strategy selection policy
    pub strategy: StrategyConfig,

    /// Background optimization settings
    pub optimize: OptimizeConfig,
}

/// Strategy selection policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    /// Maximum delta-chain length before the next commit is forced to a
    /// full snapshot
    pub max_chain_length: u32,

    /// Staged-file size above which a commit is always a full snapshot
    pub full_snapshot_threshold: u64,

    /// Staged-file size above which a delta is strongly preferred; crossing
    /// it is logged but does not change routing
    pub delta_candidate_threshold: u64,

    /// A delta whose compressed/original ratio exceeds this is discarded
    /// and the commit re-done as a full snapshot
    pub delta_accept_ratio: f64,

    /// A snapshot whose output grows past this multiple of its input is
    /// rejected as expanded
    pub snapshot_expansion_limit: f64,

    /// Extensions (lowercase, no dot) treated as layered-document formats
    pub layered_extensions: Vec<String>,
}

/// Background optimization settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizeConfig {
    /// Whether snapshots are re-encoded in the background at all
    pub enabled: bool,

    /// Delay before a scheduled optimization starts, letting the user's
    /// interactive operation complete cleanly
    pub delay_ms: u64,

    /// zstd compression level for optimized copies (1-21)
    pub zstd_level: i32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            author: "unknown".to_string(),
            strategy: StrategyConfig::default(),
            optimize: OptimizeConfig::default(),
        }
    }
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            max_chain_length: 5,
            full_snapshot_threshold: 100 * MIB,
            delta_candidate_threshold: 50 * MIB,
            delta_accept_ratio: 0.95,
            snapshot_expansion_limit: 1.2,
            layered_extensions: vec![
                "psd".to_string(),
                "ai".to_string(),
                "sketch".to_string(),
            ],
        }
    }
}

impl Default for OptimizeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            delay_ms: 3_000,
            zstd_level: 19,
        }
    }
}

impl EngineConfig {
    /// Load configuration from the repository config document and
    /// environment variables
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let mut config = if path.as_ref().is_file() {
            Self::from_file(path)?
        } else {
            EngineConfig::default()
        };

        // Override with environment variables
        config.apply_env_overrides()?;

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse config file: {}", e)))
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) -> Result<()> {
        use std::env;

        if let Ok(author) = env::var("LV_AUTHOR") {
            self.author = author;
        }

        if let Ok(max_chain) = env::var("LV_MAX_CHAIN_LENGTH") {
            self.strategy.max_chain_length = max_chain
                .parse()
                .map_err(|e| Error::Config(format!("Invalid max chain length: {}", e)))?;
        }

        if let Ok(enabled) = env::var("LV_OPTIMIZE_ENABLED") {
            self.optimize.enabled = enabled
                .parse()
                .map_err(|e| Error::Config(format!("Invalid optimize flag: {}", e)))?;
        }

        if let Ok(delay) = env::var("LV_OPTIMIZE_DELAY_MS") {
            self.optimize.delay_ms = delay
                .parse()
                .map_err(|e| Error::Config(format!("Invalid optimize delay: {}", e)))?;
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.strategy.max_chain_length == 0 {
            return Err(Error::Config(
                "max_chain_length must be at least 1".to_string(),
            ));
        }

        if self.strategy.full_snapshot_threshold < self.strategy.delta_candidate_threshold {
            return Err(Error::Config(
                "full_snapshot_threshold must not be below delta_candidate_threshold".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.strategy.delta_accept_ratio) {
            return Err(Error::Config(
                "delta_accept_ratio must be between 0 and 1".to_string(),
            ));
        }

        if self.strategy.snapshot_expansion_limit < 1.0 {
            return Err(Error::Config(
                "snapshot_expansion_limit must be at least 1.0".to_string(),
            ));
        }

        if !(1..=21).contains(&self.optimize.zstd_level) {
            return Err(Error::Config(
                "zstd_level must be between 1 and 21".to_string(),
            ));
        }

        Ok(())
    }
}
