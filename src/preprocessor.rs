use crate::config::DetectorConfig;
use crate::error::{Error, Result};
use crate::parser;
use crate::record::{EnrichedRecord, FeatureVector, RawRow};
use crate::scaler::StandardScaler;
use chrono::{Datelike, Timelike};
use log::debug;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::hash::BuildHasher;

// Fixed seeds keep ip hashes identical across batches and processes.
static IP_HASHER: Lazy<ahash::RandomState> = Lazy::new(|| {
    ahash::RandomState::with_seeds(0x243f_6a88_85a3_08d3, 0x1319_8a2e_0370_7344, 0xa409_3822_299f_31d0, 0x082e_fa98_ec4e_6c89)
});

/// Numeric stand-in for the identity of a source IP.
pub fn ip_hash(ip: &str) -> i64 {
    BuildHasher::hash_one(&*IP_HASHER, ip) as i64
}

/// Turns raw access-log rows into records carrying time, frequency and
/// identity features.
#[derive(Debug, Clone)]
pub struct LogPreprocessor {
    working_hours_start: u32,
    working_hours_end: u32,
}

impl LogPreprocessor {
    pub fn new(config: &DetectorConfig) -> Self {
        Self {
            working_hours_start: config.working_hours_start,
            working_hours_end: config.working_hours_end,
        }
    }

    /// Enriches a whole batch. The first row missing a user, IP or parseable
    /// timestamp aborts the batch; per-user frequencies are only meaningful
    /// over complete input.
    pub fn process(&self, rows: &[RawRow]) -> Result<Vec<EnrichedRecord>> {
        let mut parsed = Vec::with_capacity(rows.len());
        for (i, row) in rows.iter().enumerate() {
            let n = i + 1;
            let user_id = row.user_id.trim();
            if user_id.is_empty() { return Err(Error::malformed(n, "UserID", "is missing")); }
            let ip = row.ip.trim();
            if ip.is_empty() { return Err(Error::malformed(n, "IP", "is missing")); }
            let ts = parser::parse_timestamp(&row.timestamp)
                .ok_or_else(|| Error::malformed(n, "Timestamp", format!("cannot be parsed: {:?}", row.timestamp)))?;
            parsed.push((user_id, ip, ts, row));
        }

        let mut counts: HashMap<&str, usize> = HashMap::new();
        for (user_id, ..) in parsed.iter() {
            *counts.entry(*user_id).or_insert(0) += 1;
        }

        let out: Vec<EnrichedRecord> = parsed
            .iter()
            .map(|(user_id, ip, ts, row)| {
                let hour = ts.hour();
                let day_of_week = ts.weekday().num_days_from_monday();
                EnrichedRecord {
                    user_id: user_id.to_string(),
                    timestamp: *ts,
                    action: row.action.clone(),
                    resource: row.resource.clone(),
                    ip: ip.to_string(),
                    hour,
                    day_of_week,
                    is_working_hours: self.is_working_hours(hour, day_of_week),
                    access_frequency: counts.get(user_id).copied().unwrap_or(0),
                    ip_hash: ip_hash(ip),
                }
            })
            .collect();
        debug!("preprocessed {} rows from {} users", out.len(), counts.len());
        Ok(out)
    }

    /// 1 inside `[start, end)` on Monday through Friday, else 0.
    pub fn is_working_hours(&self, hour: u32, day_of_week: u32) -> u8 {
        let in_window = hour >= self.working_hours_start && hour < self.working_hours_end;
        u8::from(in_window && day_of_week < 5)
    }

    /// Feature matrix standardized with this batch's mean and sample
    /// standard deviation. Columns without spread become 0.
    pub fn extract_features(&self, records: &[EnrichedRecord]) -> Vec<FeatureVector> {
        let raw: Vec<FeatureVector> = records.iter().map(EnrichedRecord::features).collect();
        StandardScaler::sample().fit_transform(&raw)
    }
}

impl Default for LogPreprocessor {
    fn default() -> Self { Self::new(&DetectorConfig::default()) }
}
