use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Tunables of the extraction pipeline. Defaults mirror the shipped
/// behavior; a TOML file can override individual fields.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Detections below this confidence are dropped at the variant stage.
    pub confidence_floor: f32,
    /// Vertical pixel tolerance when grouping detections into lines.
    pub line_tolerance: f32,
    /// Two-digit years below the pivot expand to 20xx, the rest to 19xx.
    pub year_pivot: u32,
    /// Upper bound (exclusive) for the bare-integer amount fallback.
    pub fallback_amount_cap: f64,
    /// Laplacian-variance divisor when normalizing sharpness to [0, 1].
    pub sharpness_norm: f64,
    /// Intensity-stddev divisor when normalizing contrast to [0, 1].
    pub contrast_norm: f64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        ExtractionConfig {
            confidence_floor: 0.2,
            line_tolerance: 10.0,
            year_pivot: 50,
            fallback_amount_cap: 10_000.0,
            sharpness_norm: 100.0,
            contrast_norm: 50.0,
        }
    }
}

impl ExtractionConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Self::from_toml_str(&std::fs::read_to_string(path)?)
    }
}
