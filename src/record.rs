use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One access-log row as it arrives from a file or caller, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRow {
    #[serde(rename = "UserID")]
    pub user_id: String,
    #[serde(rename = "Timestamp")]
    pub timestamp: String,
    #[serde(rename = "Action", default)]
    pub action: String,
    #[serde(rename = "Resource", default)]
    pub resource: String,
    #[serde(rename = "IP")]
    pub ip: String,
}

impl RawRow {
    pub fn new(user_id: &str, timestamp: &str, action: &str, resource: &str, ip: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            timestamp: timestamp.to_string(),
            action: action.to_string(),
            resource: resource.to_string(),
            ip: ip.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichedRecord {
    pub user_id: String,
    pub timestamp: NaiveDateTime,
    pub action: String,
    pub resource: String,
    pub ip: String,
    pub hour: u32,
    /// 0 = Monday
    pub day_of_week: u32,
    pub is_working_hours: u8,
    /// Rows sharing this user id in the batch.
    pub access_frequency: usize,
    pub ip_hash: i64,
}

pub type FeatureVector = [f64; 5];

impl EnrichedRecord {
    /// Unscaled features in fixed column order: hour, day of week, working-hours
    /// flag, access frequency, ip hash.
    pub fn features(&self) -> FeatureVector {
        [
            self.hour as f64,
            self.day_of_week as f64,
            self.is_working_hours as f64,
            self.access_frequency as f64,
            self.ip_hash as f64,
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnomalyType {
    #[serde(rename = "Outside Working Hours")]
    OutsideWorkingHours,
    #[serde(rename = "High Access Frequency")]
    HighAccessFrequency,
    #[serde(rename = "Unusual IP/Location")]
    UnusualIpLocation,
    Normal,
}

impl AnomalyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnomalyType::OutsideWorkingHours => "Outside Working Hours",
            AnomalyType::HighAccessFrequency => "High Access Frequency",
            AnomalyType::UnusualIpLocation => "Unusual IP/Location",
            AnomalyType::Normal => "Normal",
        }
    }

    pub fn is_anomaly(&self) -> bool { *self != AnomalyType::Normal }
}

impl fmt::Display for AnomalyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every row of a batch after scoring, normal ones included.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredRecord {
    pub record: EnrichedRecord,
    pub anomaly_score: f64,
    pub anomaly_type: AnomalyType,
}

/// Storage/export shape of a flagged row. Field names are a contract with
/// downstream persistence and reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyResult {
    pub user_id: String,
    pub timestamp: NaiveDateTime,
    pub action: String,
    pub resource: String,
    pub ip_address: String,
    pub anomaly_type: AnomalyType,
    pub anomaly_score: f64,
}

impl From<ScoredRecord> for AnomalyResult {
    fn from(s: ScoredRecord) -> Self {
        let r = s.record;
        AnomalyResult {
            user_id: r.user_id,
            timestamp: r.timestamp,
            action: r.action,
            resource: r.resource,
            ip_address: r.ip,
            anomaly_type: s.anomaly_type,
            anomaly_score: s.anomaly_score,
        }
    }
}
