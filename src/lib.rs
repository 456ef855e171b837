pub mod config;
pub mod detector;
pub mod error;
pub mod forest;
pub mod parser;
pub mod preprocessor;
pub mod reader;
pub mod record;
pub mod report;
pub mod scaler;
pub mod stats;

pub use config::DetectorConfig;
pub use detector::AnomalyDetector;
pub use error::{Error, Result};
pub use preprocessor::LogPreprocessor;
pub use record::{AnomalyResult, AnomalyType, EnrichedRecord, RawRow, ScoredRecord};

/// Preprocess and score one batch. Nothing is returned unless every row
/// parsed and the batch was large enough to score.
pub fn detect_anomalies(rows: &[RawRow], config: &DetectorConfig) -> Result<Vec<AnomalyResult>> {
    let detector = AnomalyDetector::new(config.clone())?;
    let records = LogPreprocessor::new(config).process(rows)?;
    detector.detect(&records)
}
