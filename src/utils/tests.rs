use super::*;
use crate::types::ChatGroupSummary;
use chrono::TimeZone;

#[test]
fn test_format_score() {
    let options = DisplayOptions::default();
    assert_eq!(format_score(0.123456, &options), "0.123");
    assert_eq!(format_score(1.0, &options), "1.000");

    let options = DisplayOptions {
        decimal_places: 1,
        use_utc: true,
    };
    assert_eq!(format_score(0.26, &options), "0.3");
}

#[test]
fn test_format_event_time_utc() {
    let options = DisplayOptions {
        decimal_places: 3,
        use_utc: true,
    };
    let millis = Utc
        .with_ymd_and_hms(2025, 5, 15, 9, 30, 5)
        .unwrap()
        .timestamp_millis();

    assert_eq!(format_event_time(millis, &options), "09:30:05");
    assert_eq!(format_event_time(i64::MAX, &options), "--:--:--");
}

#[test]
fn test_format_start_time_utc() {
    let options = DisplayOptions {
        decimal_places: 3,
        use_utc: true,
    };
    let start = Utc.with_ymd_and_hms(2025, 3, 1, 14, 5, 0).unwrap();
    assert_eq!(format_start_time(&start, &options), "3/1/2025 14:05");
}

#[test]
fn test_format_date_for_display() {
    let date = NaiveDate::from_ymd_opt(2023, 1, 15).unwrap();
    assert_eq!(format_date_for_display(&date), "1/15/2023");

    let today = Local::now().date_naive();
    assert!(format_date_for_display(&today).ends_with('*'));
}

#[test]
fn test_hash_text() {
    let hash = hash_text("hello world");
    assert_eq!(hash.len(), 64);
    assert_eq!(
        hash,
        "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
    );
}

#[test]
fn test_generate_id_shape() {
    let id = generate_id("2025-05-15T10:00");
    assert_eq!(id.len(), 16);
    assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn test_flexible_timestamp_accepts_rfc3339_and_millis() {
    let mut from_string = br#"{"id":"a","start_timestamp":"2025-05-15T09:00:00Z"}"#.to_vec();
    let parsed: ChatGroupSummary = simd_json::from_slice(&mut from_string).unwrap();
    assert_eq!(
        parsed.start_timestamp,
        Utc.with_ymd_and_hms(2025, 5, 15, 9, 0, 0).unwrap()
    );

    let millis = Utc
        .with_ymd_and_hms(2025, 5, 15, 9, 0, 0)
        .unwrap()
        .timestamp_millis();
    let mut from_millis = format!(r#"{{"id":"b","start_timestamp":{millis}}}"#).into_bytes();
    let parsed: ChatGroupSummary = simd_json::from_slice(&mut from_millis).unwrap();
    assert_eq!(parsed.start_timestamp.timestamp_millis(), millis);
}

#[test]
fn test_flexible_timestamp_rejects_garbage() {
    let mut bad = br#"{"id":"a","start_timestamp":"yesterday-ish"}"#.to_vec();
    let parsed: Result<ChatGroupSummary, _> = simd_json::from_slice(&mut bad);
    assert!(parsed.is_err());
}
