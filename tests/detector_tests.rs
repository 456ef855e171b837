use access_anomaly::detector::{categorize, high_frequency_cutoff};
use access_anomaly::{AnomalyDetector, AnomalyType, DetectorConfig, EnrichedRecord, Error, LogPreprocessor, RawRow};
use chrono::NaiveDate;

/// 45 office-hours reads by three regular users plus five Sunday-night
/// intruders, each on its own IP.
fn office_batch() -> Vec<RawRow> {
    let users = ["alice", "bob", "carol"];
    let ips = ["10.0.0.1", "10.0.0.2", "10.0.0.3"];
    let mut rows = Vec::new();
    for i in 0..45usize {
        let day = 1 + (i % 5);
        let hour = 10 + (i % 6);
        let u = i % 3;
        let ts = format!("2024-01-{:02} {:02}:{:02}:00", day, hour, (i * 7) % 60);
        rows.push(RawRow::new(users[u], &ts, "read", "/reports", ips[u]));
    }
    for (j, h) in [1u32, 2, 3, 4, 23].iter().enumerate() {
        let ts = format!("2024-01-07 {:02}:15:00", h);
        rows.push(RawRow::new(&format!("intruder{j}"), &ts, "delete", "/admin", &format!("203.0.113.{}", 10 + j)));
    }
    rows
}

fn enrich(rows: &[RawRow]) -> Vec<EnrichedRecord> {
    LogPreprocessor::default().process(rows).unwrap()
}

fn record(is_working_hours: u8, access_frequency: usize) -> EnrichedRecord {
    EnrichedRecord {
        user_id: "u".into(),
        timestamp: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(12, 0, 0).unwrap(),
        action: "read".into(),
        resource: "/".into(),
        ip: "10.0.0.1".into(),
        hour: 12,
        day_of_week: 0,
        is_working_hours,
        access_frequency,
        ip_hash: 0,
    }
}

#[test]
fn empty_and_single_row_batches_are_insufficient() {
    let det = AnomalyDetector::default();
    assert!(matches!(det.detect(&[]), Err(Error::InsufficientData { rows: 0, required: 2 })));
    let one = enrich(&[RawRow::new("alice", "2024-01-01 10:00:00", "read", "/", "10.0.0.1")]);
    assert!(matches!(det.detect(&one), Err(Error::InsufficientData { rows: 1, .. })));
}

#[test]
fn min_batch_size_is_configurable() {
    let det = AnomalyDetector::new(DetectorConfig { min_batch_size: 10, ..Default::default() }).unwrap();
    let records = enrich(&office_batch()[..5]);
    assert!(matches!(det.classify(&records), Err(Error::InsufficientData { rows: 5, required: 10 })));
}

#[test]
fn scores_are_bounded() {
    let det = AnomalyDetector::default();
    let scored = det.classify(&enrich(&office_batch())).unwrap();
    assert_eq!(scored.len(), 50);
    assert!(scored.iter().all(|s| (0.0..=1.0).contains(&s.anomaly_score)));
    assert!(scored.iter().any(|s| s.anomaly_score == 1.0));
    assert!(scored.iter().any(|s| s.anomaly_score == 0.0));
}

#[test]
fn intruders_are_flagged_as_off_hours() {
    let det = AnomalyDetector::default();
    let records = enrich(&office_batch());
    let scored = det.classify(&records).unwrap();
    let top = scored
        .iter()
        .max_by(|a, b| a.anomaly_score.total_cmp(&b.anomaly_score))
        .unwrap();
    assert!(top.record.user_id.starts_with("intruder"), "top row was {}", top.record.user_id);

    let results = det.detect(&records).unwrap();
    assert!(!results.is_empty());
    assert!(results.len() <= records.len() / 4, "flagged {} rows", results.len());
    assert!(results.iter().any(|r| r.user_id.starts_with("intruder")));
    for r in results.iter().filter(|r| r.user_id.starts_with("intruder")) {
        assert_eq!(r.anomaly_type, AnomalyType::OutsideWorkingHours);
    }
}

#[test]
fn off_hours_category_matches_working_hours_flag() {
    let det = AnomalyDetector::default();
    for s in det.classify(&enrich(&office_batch())).unwrap() {
        if !s.anomaly_type.is_anomaly() { continue; }
        assert_eq!(s.anomaly_type == AnomalyType::OutsideWorkingHours, s.record.is_working_hours == 0);
    }
}

#[test]
fn off_hours_beats_high_frequency() {
    assert_eq!(categorize(&record(0, 500), 10.0), AnomalyType::OutsideWorkingHours);
    assert_eq!(categorize(&record(1, 500), 10.0), AnomalyType::HighAccessFrequency);
    assert_eq!(categorize(&record(1, 10), 10.0), AnomalyType::UnusualIpLocation);
    assert_eq!(categorize(&record(0, 1), 10.0), AnomalyType::OutsideWorkingHours);
}

#[test]
fn count_equal_to_cutoff_is_not_high_frequency() {
    let mut rows: Vec<RawRow> = (0..5)
        .map(|i| RawRow::new("alice", &format!("2024-01-0{} 10:00:00", i + 1), "read", "/", "10.0.0.1"))
        .collect();
    rows.push(RawRow::new("bob", "2024-01-03 11:00:00", "read", "/", "10.0.0.2"));
    let records = enrich(&rows);
    let cutoff = high_frequency_cutoff(&records, 0.95);
    assert_eq!(cutoff, 5.0);
    for r in &records {
        assert_eq!(categorize(r, cutoff), AnomalyType::UnusualIpLocation, "{}", r.user_id);
    }
}

#[test]
fn dominant_user_sets_its_own_cutoff() {
    // half the batch is one user, so p95 equals that user's count
    let mut rows: Vec<RawRow> = (0..30)
        .map(|i| RawRow::new("alice", &format!("2024-01-02 {:02}:{:02}:00", 9 + i % 8, i), "read", "/", "10.0.0.1"))
        .collect();
    rows.extend((0..30).map(|i| RawRow::new(&format!("user{i}"), "2024-01-02 12:00:00", "read", "/", &format!("10.0.1.{i}"))));
    let records = enrich(&rows);
    let cutoff = high_frequency_cutoff(&records, 0.95);
    assert_eq!(cutoff, 30.0);
    assert!(records.iter().all(|r| categorize(r, cutoff) != AnomalyType::HighAccessFrequency));
}

#[test]
fn priority_holds_against_batch_cutoff() {
    let mut rows: Vec<RawRow> = (0..40)
        .map(|i| RawRow::new(&format!("user{i}"), "2024-01-01 10:00:00", "read", "/", &format!("10.0.0.{i}")))
        .collect();
    rows.push(RawRow::new("heavy", "2024-01-01 11:00:00", "read", "/", "10.9.0.1"));
    rows.push(RawRow::new("heavy", "2024-01-01 12:00:00", "read", "/", "10.9.0.1"));
    rows.push(RawRow::new("heavy", "2024-01-01 23:00:00", "read", "/", "10.9.0.1"));
    let records = enrich(&rows);
    // 40 ones and 3 threes: rank 39.9 interpolates to 2.8
    let cutoff = high_frequency_cutoff(&records, 0.95);
    assert!((cutoff - 2.8).abs() < 1e-9, "cutoff {cutoff}");

    assert_eq!(categorize(&records[0], cutoff), AnomalyType::UnusualIpLocation);
    assert_eq!(categorize(&records[40], cutoff), AnomalyType::HighAccessFrequency);
    assert_eq!(categorize(&records[41], cutoff), AnomalyType::HighAccessFrequency);
    // off-hours wins even for the heavy user
    assert_eq!(records[42].is_working_hours, 0);
    assert_eq!(categorize(&records[42], cutoff), AnomalyType::OutsideWorkingHours);
}

#[test]
fn classify_uses_the_batch_cutoff() {
    let records = enrich(&office_batch());
    let cutoff = high_frequency_cutoff(&records, DetectorConfig::default().high_frequency_quantile);
    for s in AnomalyDetector::default().classify(&records).unwrap() {
        if s.anomaly_type.is_anomaly() {
            assert_eq!(s.anomaly_type, categorize(&s.record, cutoff));
        }
    }
}

#[test]
fn detection_is_deterministic() {
    let records = enrich(&office_batch());
    let a = AnomalyDetector::default().detect(&records).unwrap();
    let det = AnomalyDetector::default();
    let b = det.detect(&records).unwrap();
    let c = det.detect(&records).unwrap();
    assert_eq!(a, b);
    assert_eq!(b, c);
}

#[test]
fn seed_is_part_of_the_config() {
    let records = enrich(&office_batch());
    let a = AnomalyDetector::new(DetectorConfig { random_seed: 1, ..Default::default() }).unwrap();
    let b = AnomalyDetector::new(DetectorConfig { random_seed: 1, ..Default::default() }).unwrap();
    assert_eq!(a.classify(&records).unwrap(), b.classify(&records).unwrap());
}

#[test]
fn identical_rows_degrade_to_zero_scores() {
    let rows = vec![RawRow::new("alice", "2024-01-01 10:00:00", "read", "/", "10.0.0.1"); 8];
    let scored = AnomalyDetector::default().classify(&enrich(&rows)).unwrap();
    assert!(scored.iter().all(|s| s.anomaly_score == 0.0));
    assert!(scored.iter().all(|s| s.anomaly_type == AnomalyType::Normal));
    assert!(AnomalyDetector::default().detect(&enrich(&rows)).unwrap().is_empty());
}

#[test]
fn uniform_access_frequency_does_not_raise() {
    // every user appears exactly twice
    let rows: Vec<RawRow> = (0..20)
        .map(|i| {
            let ts = format!("2024-01-{:02} {:02}:00:00", 1 + i % 7, (i * 5) % 24);
            RawRow::new(&format!("user{}", i / 2), &ts, "read", "/", &format!("10.0.{}.1", i))
        })
        .collect();
    let records = enrich(&rows);
    assert!(records.iter().all(|r| r.access_frequency == 2));
    let scored = AnomalyDetector::default().classify(&records).unwrap();
    assert!(scored.iter().all(|s| s.anomaly_score.is_finite()));
    // p95 of a flat column equals the column, so nothing is "high frequency"
    assert!(scored.iter().all(|s| s.anomaly_type != AnomalyType::HighAccessFrequency));
}

#[test]
fn concurrent_batches_do_not_interfere() {
    let det = AnomalyDetector::default();
    let batch_a = enrich(&office_batch());
    let batch_b = enrich(&office_batch()[..30]);
    let expected_a = det.classify(&batch_a).unwrap();
    let expected_b = det.classify(&batch_b).unwrap();
    let (got_a, got_b) = std::thread::scope(|s| {
        let ha = s.spawn(|| det.classify(&batch_a).unwrap());
        let hb = s.spawn(|| det.classify(&batch_b).unwrap());
        (ha.join().unwrap(), hb.join().unwrap())
    });
    assert_eq!(got_a, expected_a);
    assert_eq!(got_b, expected_b);
}

#[test]
fn results_keep_the_storage_shape() {
    let det = AnomalyDetector::default();
    let records = enrich(&office_batch());
    for r in det.detect(&records).unwrap() {
        let src = records.iter().find(|e| e.user_id == r.user_id && e.timestamp == r.timestamp).unwrap();
        assert_eq!(r.ip_address, src.ip);
        assert_eq!(r.action, src.action);
        assert_eq!(r.resource, src.resource);
    }
}
