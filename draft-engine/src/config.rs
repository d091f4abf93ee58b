// Engine configuration loading and parsing (engine.toml).

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::roster::Position;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },
}

// ---------------------------------------------------------------------------
// Engine config
// ---------------------------------------------------------------------------

/// Tunable engine settings. Everything here has a sensible default so the
/// engine can run without a config file at all.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct EngineConfig {
    #[serde(default)]
    pub recommendation: RecommendationConfig,
}

/// Recommendation scoring knobs.
///
/// The composite score is a weighted sum of value-over-ADP, positional
/// need, and positional scarcity; weights are configuration so strategy can
/// be tuned without touching the algorithm.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RecommendationConfig {
    pub value_weight: f64,
    pub need_weight: f64,
    pub scarcity_weight: f64,
    /// How many suggestions to return.
    pub top_n: usize,
    /// Tie-break order between equally-scored positions, as position
    /// strings ("QB", "RB", ...). Earlier is preferred.
    pub position_priority: Vec<String>,
}

impl Default for RecommendationConfig {
    fn default() -> Self {
        RecommendationConfig {
            value_weight: 0.40,
            need_weight: 0.35,
            scarcity_weight: 0.25,
            top_n: 10,
            position_priority: ["QB", "RB", "WR", "TE", "K", "DST"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl RecommendationConfig {
    /// Tie-break index for a position: lower is preferred. Positions not
    /// listed in the priority order sort after all listed ones.
    pub fn priority_index(&self, pos: Position) -> usize {
        self.position_priority
            .iter()
            .position(|s| Position::from_str_pos(s) == Some(pos))
            .unwrap_or(self.position_priority.len())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, w) in [
            ("recommendation.value_weight", self.value_weight),
            ("recommendation.need_weight", self.need_weight),
            ("recommendation.scarcity_weight", self.scarcity_weight),
        ] {
            if w < 0.0 || !w.is_finite() {
                return Err(ConfigError::ValidationError {
                    field: field.to_string(),
                    message: format!("weight must be a non-negative number, got {w}"),
                });
            }
        }
        if self.value_weight + self.need_weight + self.scarcity_weight <= 0.0 {
            return Err(ConfigError::ValidationError {
                field: "recommendation".to_string(),
                message: "at least one scoring weight must be positive".to_string(),
            });
        }
        if self.top_n == 0 {
            return Err(ConfigError::ValidationError {
                field: "recommendation.top_n".to_string(),
                message: "top_n must be at least 1".to_string(),
            });
        }
        for entry in &self.position_priority {
            match Position::from_str_pos(entry) {
                Some(pos) if !pos.is_meta_slot() => {}
                _ => {
                    return Err(ConfigError::ValidationError {
                        field: "recommendation.position_priority".to_string(),
                        message: format!("`{entry}` is not a concrete position"),
                    });
                }
            }
        }
        Ok(())
    }
}

impl EngineConfig {
    /// Load and validate an engine config from a TOML file.
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let raw = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
            path: path.to_path_buf(),
        })?;
        let config: EngineConfig =
            toml::from_str(&raw).map_err(|source| ConfigError::ParseError {
                path: path.to_path_buf(),
                source,
            })?;
        config.recommendation.validate()?;
        Ok(config)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
