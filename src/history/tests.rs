use super::*;
use chrono::{FixedOffset, Utc};

fn summary(id: &str, rfc3339: &str) -> ChatGroupSummary {
    ChatGroupSummary {
        id: id.to_string(),
        start_timestamp: DateTime::parse_from_rfc3339(rfc3339)
            .unwrap()
            .with_timezone(&Utc),
    }
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 5, 15, 12, 0, 0).unwrap()
}

fn ids(groups: &[ChatGroupSummary]) -> Vec<&str> {
    groups.iter().map(|g| g.id.as_str()).collect()
}

#[test]
fn empty_input_yields_empty_buckets() {
    let buckets = bucketize(&[], &now());
    assert!(buckets.today.is_empty());
    assert!(buckets.yesterday.is_empty());
    assert!(buckets.last_7_days.is_empty());
    assert!(buckets.last_30_days.is_empty());
    assert!(buckets.months.is_empty());
    assert!(buckets.is_empty());
    assert_eq!(buckets.len(), 0);
}

#[test]
fn classifies_each_relative_bucket() {
    let input = vec![
        summary("today", "2025-05-15T09:00:00Z"),
        summary("yesterday", "2025-05-14T23:59:00Z"),
        summary("week", "2025-05-10T08:00:00Z"),
        summary("month", "2025-04-20T08:00:00Z"),
        summary("march", "2025-03-01T08:00:00Z"),
    ];

    let buckets = bucketize(&input, &now());

    assert_eq!(ids(&buckets.today), vec!["today"]);
    assert_eq!(ids(&buckets.yesterday), vec!["yesterday"]);
    assert_eq!(ids(&buckets.last_7_days), vec!["week"]);
    assert_eq!(ids(&buckets.last_30_days), vec!["month"]);
    assert_eq!(buckets.months.len(), 1);
    assert_eq!(ids(&buckets.months["2025-03"]), vec!["march"]);
}

#[test]
fn boundaries_are_inclusive_of_window_start() {
    let input = vec![
        // today - 2: first day of the 7-day window after yesterday
        summary("d2", "2025-05-13T00:00:00Z"),
        // today - 7: last day still in the 7-day window
        summary("d7", "2025-05-08T23:00:00Z"),
        // today - 8: first day of the 30-day window
        summary("d8", "2025-05-07T12:00:00Z"),
        // today - 30: last day of the 30-day window
        summary("d30", "2025-04-15T01:00:00Z"),
        // today - 31: falls into its month bucket
        summary("d31", "2025-04-14T22:00:00Z"),
    ];

    let buckets = bucketize(&input, &now());

    assert_eq!(ids(&buckets.last_7_days), vec!["d2", "d7"]);
    assert_eq!(ids(&buckets.last_30_days), vec!["d8", "d30"]);
    assert_eq!(ids(&buckets.months["2025-04"]), vec!["d31"]);
}

#[test]
fn compares_by_date_not_time_of_day() {
    // 00:00:01 today and 23:59:59 today are both "today" even though `now` is noon.
    let input = vec![
        summary("early", "2025-05-15T00:00:01Z"),
        summary("late", "2025-05-15T23:59:59Z"),
        summary("just-before-midnight", "2025-05-14T23:59:59Z"),
    ];

    let buckets = bucketize(&input, &now());
    assert_eq!(ids(&buckets.today), vec!["early", "late"]);
    assert_eq!(ids(&buckets.yesterday), vec!["just-before-midnight"]);
}

#[test]
fn future_dates_count_as_today() {
    let input = vec![summary("skewed", "2025-05-16T03:00:00Z")];
    let buckets = bucketize(&input, &now());
    assert_eq!(ids(&buckets.today), vec!["skewed"]);
}

#[test]
fn uses_the_time_zone_of_now() {
    // 2025-05-14T23:30Z is already May 15 at UTC+2.
    let input = vec![summary("late-utc", "2025-05-14T23:30:00Z")];
    let berlin = FixedOffset::east_opt(2 * 3600).unwrap();
    let now_berlin = berlin.with_ymd_and_hms(2025, 5, 15, 10, 0, 0).unwrap();

    let buckets = bucketize(&input, &now_berlin);
    assert_eq!(ids(&buckets.today), vec!["late-utc"]);

    let buckets = bucketize(&input, &now());
    assert_eq!(ids(&buckets.yesterday), vec!["late-utc"]);
}

#[test]
fn preserves_input_order_within_buckets() {
    let input = vec![
        summary("b", "2025-05-15T08:00:00Z"),
        summary("old-1", "2025-01-20T08:00:00Z"),
        summary("a", "2025-05-15T10:00:00Z"),
        summary("old-2", "2025-01-03T08:00:00Z"),
        summary("c", "2025-05-15T09:00:00Z"),
    ];

    let buckets = bucketize(&input, &now());
    assert_eq!(ids(&buckets.today), vec!["b", "a", "c"]);
    assert_eq!(ids(&buckets.months["2025-01"]), vec!["old-1", "old-2"]);
}

#[test]
fn months_iterate_most_recent_first() {
    let input = vec![
        summary("feb", "2025-02-10T08:00:00Z"),
        summary("dec", "2024-12-10T08:00:00Z"),
        summary("mar", "2025-03-10T08:00:00Z"),
    ];

    let buckets = bucketize(&input, &now());
    let keys: Vec<&str> = buckets.months_descending().map(|(k, _)| k.as_str()).collect();
    assert_eq!(keys, vec!["2025-03", "2025-02", "2024-12"]);
}

#[test]
fn bucketize_is_idempotent() {
    let input = vec![
        summary("a", "2025-05-15T08:00:00Z"),
        summary("b", "2025-05-01T08:00:00Z"),
        summary("c", "2024-11-01T08:00:00Z"),
    ];

    let first = bucketize(&input, &now());
    let second = bucketize(&input, &now());
    assert_eq!(first, second);
    assert_eq!(first.len(), 3);
}

#[test]
fn sections_skip_empty_relative_buckets() {
    let input = vec![
        summary("y", "2025-05-14T08:00:00Z"),
        summary("jan", "2025-01-10T08:00:00Z"),
        summary("feb", "2025-02-10T08:00:00Z"),
    ];

    let buckets = bucketize(&input, &now());
    let keys: Vec<BucketKey> = buckets.sections().into_iter().map(|(k, _)| k).collect();
    assert_eq!(
        keys,
        vec![
            BucketKey::Yesterday,
            BucketKey::Month("2025-02".to_string()),
            BucketKey::Month("2025-01".to_string()),
        ]
    );
}

#[test]
fn sort_newest_first_orders_descending() {
    let mut input = vec![
        summary("old", "2025-01-01T08:00:00Z"),
        summary("new", "2025-05-15T08:00:00Z"),
        summary("mid", "2025-03-01T08:00:00Z"),
    ];
    sort_newest_first(&mut input);
    assert_eq!(ids(&input), vec!["new", "mid", "old"]);
}

#[test]
fn bucket_labels() {
    assert_eq!(BucketKey::Today.label(), "Today");
    assert_eq!(BucketKey::Last7Days.label(), "Previous 7 Days");
    assert_eq!(BucketKey::Month("2025-03".to_string()).label(), "March 2025");
    assert_eq!(BucketKey::Month("garbage".to_string()).label(), "garbage");
}

#[test]
fn bucket_keys_round_trip_through_strings() {
    for key in [
        BucketKey::Today,
        BucketKey::Yesterday,
        BucketKey::Last7Days,
        BucketKey::Last30Days,
        BucketKey::Month("2024-11".to_string()),
    ] {
        assert_eq!(BucketKey::from_key(&key.as_key()), Some(key));
    }
    assert_eq!(BucketKey::from_key("2024-13"), None);
    assert_eq!(BucketKey::from_key("someday"), None);
}

#[test]
fn collapse_state_defaults_to_expanded_and_toggles_independently() {
    let mut state = CollapseState::default();
    assert!(state.is_expanded(&BucketKey::Today));
    assert!(state.is_expanded(&BucketKey::Month("2025-01".to_string())));

    assert!(!state.toggle(&BucketKey::Today));
    assert!(!state.is_expanded(&BucketKey::Today));
    assert!(state.is_expanded(&BucketKey::Yesterday));

    assert!(state.toggle(&BucketKey::Today));
    assert!(state.is_expanded(&BucketKey::Today));
}

#[test]
fn collapse_state_loads_from_persisted_keys() {
    let keys = vec![
        "last30days".to_string(),
        "2025-01".to_string(),
        "nonsense".to_string(),
    ];
    let state = CollapseState::from_keys(&keys);
    assert!(!state.is_expanded(&BucketKey::Last30Days));
    assert!(!state.is_expanded(&BucketKey::Month("2025-01".to_string())));
    assert!(state.is_expanded(&BucketKey::Today));
    assert_eq!(state.collapsed_keys(), vec!["last30days", "2025-01"]);
}
