//! Engine configuration, persisted as TOML.
//!
//! Acceptance thresholds and blend weights are calibration points, not policy
//! baked into the matchers. `EngineConfig::default()` carries the shipped
//! calibration; `load` reads overrides from a TOML file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Path to the product registry JSON. `None` means the registry is
    /// supplied programmatically.
    pub registry_path: Option<PathBuf>,
    /// Path for the unmatched-suggestion log (JSONL). `None` keeps the log
    /// in memory only.
    pub suggestion_log: Option<PathBuf>,
    #[serde(rename = "match")]
    pub matching: MatchConfig,
    pub synthesis: SynthesisConfig,
    pub aggregation: AggregationConfig,
    pub embed: EmbedConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            registry_path: None,
            suggestion_log: None,
            matching: MatchConfig::default(),
            synthesis: SynthesisConfig::default(),
            aggregation: AggregationConfig::default(),
            embed: EmbedConfig::default(),
        }
    }
}

/// Per-stage acceptance thresholds for the match cascade.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    /// Stage 1 short-circuits when its score exceeds this.
    pub exact_accept: f64,
    /// Stage 2 engages below `exact_accept` and accepts above this.
    pub fuzzy_accept: f64,
    /// Stage 3 engages below `fuzzy_accept` and accepts above this.
    pub semantic_accept: f64,
    /// Ranked runners-up retained per match.
    pub max_alternatives: usize,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            exact_accept: 0.8,
            fuzzy_accept: 0.6,
            semantic_accept: 0.5,
            max_alternatives: 3,
        }
    }
}

/// Weights blending match score and sentiment confidence into an atom's
/// confidence score.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    pub match_weight: f64,
    pub sentiment_weight: f64,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            match_weight: 0.7,
            sentiment_weight: 0.3,
        }
    }
}

/// Ego-network aggregation parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    /// Hop bound for the ego-network around a product node.
    pub max_hops: usize,
    /// Number of tags reported by `top_tags`.
    pub top_tags: usize,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            max_hops: 2,
            top_tags: 5,
        }
    }
}

/// Embedding provider selection for the semantic match stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbedConfig {
    /// Provider name: "none", "hash", or "http".
    pub provider: String,
    /// Endpoint for the "http" provider.
    pub url: Option<String>,
    /// Deadline for one embedding request.
    pub timeout_ms: u64,
    /// Vector dimension for the deterministic hash provider.
    pub dimension: usize,
}

impl Default for EmbedConfig {
    fn default() -> Self {
        Self {
            provider: "none".into(),
            url: None,
            timeout_ms: 2000,
            dimension: 256,
        }
    }
}

impl EngineConfig {
    /// Load from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check threshold ranges and ordering.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let thresholds = [
            ("match.exact_accept", self.matching.exact_accept),
            ("match.fuzzy_accept", self.matching.fuzzy_accept),
            ("match.semantic_accept", self.matching.semantic_accept),
            ("synthesis.match_weight", self.synthesis.match_weight),
            ("synthesis.sentiment_weight", self.synthesis.sentiment_weight),
        ];
        for (name, value) in thresholds {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::InvalidThreshold {
                    name: name.into(),
                    value,
                });
            }
        }
        if self.matching.fuzzy_accept > self.matching.exact_accept {
            return Err(ConfigError::InvalidThreshold {
                name: "match.fuzzy_accept".into(),
                value: self.matching.fuzzy_accept,
            });
        }
        if self.matching.semantic_accept > self.matching.fuzzy_accept {
            return Err(ConfigError::InvalidThreshold {
                name: "match.semantic_accept".into(),
                value: self.matching.semantic_accept,
            });
        }
        let weight_sum = self.synthesis.match_weight + self.synthesis.sentiment_weight;
        if (weight_sum - 1.0).abs() > 1e-9 {
            return Err(ConfigError::InvalidThreshold {
                name: "synthesis.match_weight + synthesis.sentiment_weight".into(),
                value: weight_sum,
            });
        }
        Ok(())
    }
}
