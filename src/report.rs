use crate::error::{Error, Result};
use crate::record::AnomalyResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const CSV_COLUMNS: [&str; 7] = ["user_id", "timestamp", "action", "resource", "ip_address", "anomaly_type", "anomaly_score"];

/// Rows listed in a summary's `most_anomalous`.
pub const SUMMARY_TOP: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total_rows: usize,
    pub anomalies_count: usize,
    pub by_type: BTreeMap<String, usize>,
    pub mean_score: f64,
    pub most_anomalous: Vec<AnomalyResult>,
}

pub fn summarize(total_rows: usize, results: &[AnomalyResult]) -> BatchSummary {
    let mut by_type = BTreeMap::new();
    for r in results {
        *by_type.entry(r.anomaly_type.to_string()).or_insert(0) += 1;
    }
    let mean_score = if results.is_empty() {
        0.0
    } else {
        results.iter().map(|r| r.anomaly_score).sum::<f64>() / results.len() as f64
    };
    let most_anomalous = ranked(results).into_iter().take(SUMMARY_TOP).cloned().collect();
    BatchSummary { total_rows, anomalies_count: results.len(), by_type, mean_score, most_anomalous }
}

pub fn to_json(results: &[AnomalyResult]) -> Result<String> {
    Ok(serde_json::to_string_pretty(results)?)
}

/// CSV export with a header row. Timestamps are written as `%Y-%m-%d %H:%M:%S`.
pub fn to_csv(results: &[AnomalyResult]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    wtr.write_record(CSV_COLUMNS)?;
    for r in results {
        let ts = r.timestamp.format("%Y-%m-%d %H:%M:%S").to_string();
        let score = r.anomaly_score.to_string();
        wtr.write_record([
            r.user_id.as_str(),
            ts.as_str(),
            r.action.as_str(),
            r.resource.as_str(),
            r.ip_address.as_str(),
            r.anomaly_type.as_str(),
            score.as_str(),
        ])?;
    }
    let bytes = wtr.into_inner().map_err(|e| Error::Io(e.into_error()))?;
    String::from_utf8(bytes).map_err(|e| Error::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
}

/// Results ordered most anomalous first; ties keep input order.
pub fn ranked(results: &[AnomalyResult]) -> Vec<&AnomalyResult> {
    let mut v: Vec<&AnomalyResult> = results.iter().collect();
    v.sort_by(|a, b| b.anomaly_score.total_cmp(&a.anomaly_score));
    v
}
