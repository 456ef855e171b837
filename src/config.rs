use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Knobs for one preprocessing + detection run. Every component receives its
/// own copy at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// First working hour (inclusive).
    pub working_hours_start: u32,
    /// Last working hour (exclusive).
    pub working_hours_end: u32,
    /// Expected share of anomalous rows; calibrates the forest's decision threshold.
    pub contamination: f64,
    pub random_seed: u64,
    pub n_estimators: usize,
    pub max_samples: usize,
    /// Quantile of the batch's access frequency above which a row counts as high frequency.
    pub high_frequency_quantile: f64,
    pub min_batch_size: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            working_hours_start: 9,
            working_hours_end: 17,
            contamination: 0.1,
            random_seed: 42,
            n_estimators: 100,
            max_samples: 256,
            high_frequency_quantile: 0.95,
            min_batch_size: 2,
        }
    }
}

impl DetectorConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let cfg: DetectorConfig = serde_json::from_str(&text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.working_hours_start > 23 {
            return Err(Error::InvalidConfig(format!("working_hours_start must be 0..=23, got {}", self.working_hours_start)));
        }
        if self.working_hours_end > 24 || self.working_hours_end <= self.working_hours_start {
            return Err(Error::InvalidConfig(format!(
                "working_hours_end must be in ({}, 24], got {}",
                self.working_hours_start, self.working_hours_end
            )));
        }
        if !(self.contamination > 0.0 && self.contamination <= 0.5) {
            return Err(Error::InvalidConfig(format!("contamination must be in (0, 0.5], got {}", self.contamination)));
        }
        if self.n_estimators == 0 { return Err(Error::InvalidConfig("n_estimators must be positive".into())); }
        if self.max_samples < 2 { return Err(Error::InvalidConfig("max_samples must be at least 2".into())); }
        if !(0.0..=1.0).contains(&self.high_frequency_quantile) {
            return Err(Error::InvalidConfig(format!("high_frequency_quantile must be in [0, 1], got {}", self.high_frequency_quantile)));
        }
        // an empty or single-row batch can never be scored
        if self.min_batch_size < 2 { return Err(Error::InvalidConfig("min_batch_size must be at least 2".into())); }
        Ok(())
    }
}
