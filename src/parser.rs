use crate::error::{Error, Result};
use crate::record::RawRow;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use csv::StringRecord;
use serde_json::Value;
use std::collections::BTreeMap;

const USER_KEYS: &[&str] = &["userid", "user_id", "user"];
const TIMESTAMP_KEYS: &[&str] = &["timestamp", "time", "ts"];
const ACTION_KEYS: &[&str] = &["action"];
const RESOURCE_KEYS: &[&str] = &["resource"];
const IP_KEYS: &[&str] = &["ip", "ip_address", "source_ip"];

/// Parses a timestamp to its wall-clock value. Offsets are kept as local time,
/// so `2024-01-01T09:00:00+05:00` is hour 9.
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if s.is_empty() { return None; }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_local());
    }
    let fmts = [
        "%Y-%m-%d %H:%M:%S%.f%:z",
        "%Y-%m-%d %H:%M:%S%:z",
        "%Y-%m-%dT%H:%M:%S%.f%:z",
        "%Y-%m-%dT%H:%M:%S%:z",
    ];
    for f in fmts.iter() {
        if let Ok(dt) = DateTime::parse_from_str(s, f) {
            return Some(dt.naive_local());
        }
    }
    let naive_fmts = [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y/%m/%d %H:%M:%S",
        "%m/%d/%Y %H:%M:%S",
        "%m/%d/%Y %H:%M",
    ];
    for f in naive_fmts.iter() {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(s, f) {
            return Some(ndt);
        }
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return d.and_hms_opt(0, 0, 0);
    }
    parse_epoch(s)
}

fn parse_epoch(s: &str) -> Option<NaiveDateTime> {
    if !s.chars().all(|c| c.is_ascii_digit()) { return None; }
    let n = s.parse::<i64>().ok()?;
    match s.len() {
        10 => DateTime::<Utc>::from_timestamp(n, 0).map(|d| d.naive_utc()),
        13 => DateTime::<Utc>::from_timestamp_millis(n).map(|d| d.naive_utc()),
        _ => None,
    }
}

/// Parses one JSON-lines entry. Nested objects are flattened with dotted keys
/// and matched case-insensitively against the known column aliases.
pub fn parse_json_row(line: &str, row: usize) -> Result<RawRow> {
    let v: Value = serde_json::from_str(line).map_err(|e| Error::malformed(row, "line", format!("is not valid JSON: {e}")))?;
    if !v.is_object() {
        return Err(Error::malformed(row, "line", "is not a JSON object"));
    }
    let mut flat = BTreeMap::new();
    flatten_json("", &v, &mut flat);
    let get = |keys: &[&str]| -> Option<String> {
        keys.iter().find_map(|k| flat.get(*k).cloned())
    };
    Ok(RawRow {
        user_id: get(USER_KEYS).unwrap_or_default(),
        timestamp: get(TIMESTAMP_KEYS).unwrap_or_default(),
        action: get(ACTION_KEYS).unwrap_or_default(),
        resource: get(RESOURCE_KEYS).unwrap_or_default(),
        ip: get(IP_KEYS).unwrap_or_default(),
    })
}

fn flatten_json(prefix: &str, v: &Value, out: &mut BTreeMap<String, String>) {
    match v {
        Value::Object(map) => {
            for (k, v) in map.iter() {
                let k = k.to_ascii_lowercase();
                let key = if prefix.is_empty() { k } else { format!("{prefix}.{k}") };
                flatten_json(&key, v, out);
            }
        }
        // arrays carry nothing a row needs
        Value::Array(_) | Value::Null => {}
        Value::Bool(b) => {
            out.insert(prefix.to_string(), b.to_string());
        }
        Value::Number(n) => {
            out.insert(prefix.to_string(), n.to_string());
        }
        Value::String(s) => {
            out.insert(prefix.to_string(), s.clone());
        }
    }
}

/// Positions of the known columns inside a CSV header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Columns {
    user_id: usize,
    timestamp: usize,
    action: Option<usize>,
    resource: Option<usize>,
    ip: usize,
}

impl Columns {
    pub fn from_header(header: &StringRecord) -> Result<Self> {
        let find = |keys: &[&str]| {
            header.iter().position(|h| {
                let h = h.trim().to_ascii_lowercase();
                keys.iter().any(|k| *k == h)
            })
        };
        let missing = |field: &'static str| Error::malformed(0, field, "column is missing from the header");
        Ok(Columns {
            user_id: find(USER_KEYS).ok_or_else(|| missing("UserID"))?,
            timestamp: find(TIMESTAMP_KEYS).ok_or_else(|| missing("Timestamp"))?,
            action: find(ACTION_KEYS),
            resource: find(RESOURCE_KEYS),
            ip: find(IP_KEYS).ok_or_else(|| missing("IP"))?,
        })
    }

    pub fn row(&self, record: &StringRecord) -> RawRow {
        let at = |i: usize| record.get(i).map(|s| s.trim().to_string()).unwrap_or_default();
        RawRow {
            user_id: at(self.user_id),
            timestamp: at(self.timestamp),
            action: self.action.map(at).unwrap_or_default(),
            resource: self.resource.map(at).unwrap_or_default(),
            ip: at(self.ip),
        }
    }
}
