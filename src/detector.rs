use crate::config::DetectorConfig;
use crate::error::{Error, Result};
use crate::forest::{IsolationForest, OutlierModel};
use crate::record::{AnomalyResult, AnomalyType, EnrichedRecord, FeatureVector, ScoredRecord};
use crate::scaler::StandardScaler;
use crate::stats;
use log::{debug, info};

/// Scores a batch of enriched records against itself.
///
/// The detector only holds configuration. Scaler and forest are built fresh
/// inside every call, so each batch is judged relative to its own
/// distribution and concurrent calls share nothing mutable.
#[derive(Debug, Clone)]
pub struct AnomalyDetector {
    config: DetectorConfig,
}

impl AnomalyDetector {
    pub fn new(config: DetectorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Flagged rows only, in input order.
    pub fn detect(&self, records: &[EnrichedRecord]) -> Result<Vec<AnomalyResult>> {
        let scored = self.classify(records)?;
        let out: Vec<AnomalyResult> = scored
            .into_iter()
            .filter(|s| s.anomaly_type.is_anomaly())
            .map(AnomalyResult::from)
            .collect();
        info!("flagged {} of {} rows", out.len(), records.len());
        Ok(out)
    }

    /// Every row with its normalized score and category ("Normal" included).
    pub fn classify(&self, records: &[EnrichedRecord]) -> Result<Vec<ScoredRecord>> {
        let required = self.config.min_batch_size;
        if records.len() < required {
            return Err(Error::InsufficientData { rows: records.len(), required });
        }

        let features = self.prepare_features(records);
        let mut forest = IsolationForest::new()
            .with_n_estimators(self.config.n_estimators)
            .with_max_samples(self.config.max_samples)
            .with_contamination(self.config.contamination)
            .with_random_state(self.config.random_seed);
        let labels = forest.fit_predict(&features)?;
        let raw = forest.score_samples(&features);
        let scores = normalize_scores(&raw);

        let high_frequency = high_frequency_cutoff(records, self.config.high_frequency_quantile);
        debug!(
            "batch of {}: decision threshold {:.4}, high frequency above {:.2}",
            records.len(),
            forest.threshold(),
            high_frequency
        );

        Ok(records
            .iter()
            .zip(labels)
            .zip(scores)
            .map(|((record, label), anomaly_score)| {
                let anomaly_type = if label == -1 { categorize(record, high_frequency) } else { AnomalyType::Normal };
                ScoredRecord { record: record.clone(), anomaly_score, anomaly_type }
            })
            .collect())
    }

    fn prepare_features(&self, records: &[EnrichedRecord]) -> Vec<FeatureVector> {
        let raw: Vec<FeatureVector> = records.iter().map(EnrichedRecord::features).collect();
        StandardScaler::new().fit_transform(&raw)
    }
}

impl Default for AnomalyDetector {
    fn default() -> Self { Self { config: DetectorConfig::default() } }
}

/// Min-max normalizes native forest scores (lower = more anomalous) into
/// [0,1] where higher = more anomalous. A zero-width range maps to 0.
pub fn normalize_scores(raw: &[f64]) -> Vec<f64> {
    let (min, max) = raw.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &s| (lo.min(s), hi.max(s)));
    let range = max - min;
    if !(range > 0.0) || !range.is_finite() {
        return vec![0.0; raw.len()];
    }
    raw.iter().map(|s| ((max - s) / range).clamp(0.0, 1.0)).collect()
}

/// Access frequency a row must strictly exceed to count as high frequency:
/// quantile `q` of the batch's per-row frequencies.
pub fn high_frequency_cutoff(records: &[EnrichedRecord], q: f64) -> f64 {
    let freqs: Vec<f64> = records.iter().map(|r| r.access_frequency as f64).collect();
    stats::quantile(&freqs, q)
}

/// Category of a row already judged anomalous. Off-hours wins over high
/// frequency, which wins over the IP/location catch-all.
pub fn categorize(record: &EnrichedRecord, high_frequency: f64) -> AnomalyType {
    if record.is_working_hours == 0 {
        AnomalyType::OutsideWorkingHours
    } else if record.access_frequency as f64 > high_frequency {
        AnomalyType::HighAccessFrequency
    } else {
        AnomalyType::UnusualIpLocation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_flips_direction() {
        let out = normalize_scores(&[-0.7, -0.5, -0.4]);
        assert_eq!(out[0], 1.0);
        assert_eq!(out[2], 0.0);
        assert!((out[1] - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn normalization_of_flat_scores_is_zero() {
        assert_eq!(normalize_scores(&[-0.5; 4]), vec![0.0; 4]);
        assert!(normalize_scores(&[]).is_empty());
    }

    #[test]
    fn invalid_config_is_rejected_at_construction() {
        let cfg = DetectorConfig { contamination: 0.9, ..Default::default() };
        assert!(matches!(AnomalyDetector::new(cfg), Err(Error::InvalidConfig(_))));
    }
}
