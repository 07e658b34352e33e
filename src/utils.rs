use std::collections::HashSet;
use std::fmt;
use std::sync::{Mutex, OnceLock};

use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};
use serde::Deserializer;
use serde::de::{self, Visitor};
use sha2::{Digest, Sha256};

static WARNED_MESSAGES: OnceLock<Mutex<HashSet<String>>> = OnceLock::new();

pub fn warn_once(message: impl Into<String>) {
    let message = message.into();
    let cache = WARNED_MESSAGES.get_or_init(|| Mutex::new(HashSet::new()));

    if let Ok(mut warned) = cache.lock()
        && warned.insert(message.clone())
    {
        eprintln!("{message}");
    }
}

#[derive(Clone)]
pub struct DisplayOptions {
    pub decimal_places: usize,
    /// Render times in UTC instead of the local time zone.
    pub use_utc: bool,
}

impl Default for DisplayOptions {
    fn default() -> Self {
        Self {
            decimal_places: 3,
            use_utc: false,
        }
    }
}

pub fn format_score(score: f64, options: &DisplayOptions) -> String {
    format!("{:.prec$}", score, prec = options.decimal_places)
}

/// Format an epoch-millisecond event time as a wall-clock time.
pub fn format_event_time(timestamp_millis: i64, options: &DisplayOptions) -> String {
    match Utc.timestamp_millis_opt(timestamp_millis).single() {
        Some(dt) if options.use_utc => dt.format("%H:%M:%S").to_string(),
        Some(dt) => dt.with_timezone(&Local).format("%H:%M:%S").to_string(),
        None => "--:--:--".to_string(),
    }
}

pub fn format_start_time(start: &DateTime<Utc>, options: &DisplayOptions) -> String {
    if options.use_utc {
        start.format("%-m/%-d/%Y %H:%M").to_string()
    } else {
        start
            .with_timezone(&Local)
            .format("%-m/%-d/%Y %H:%M")
            .to_string()
    }
}

pub fn format_date_for_display(date: &NaiveDate) -> String {
    let formatted = date.format("%-m/%-d/%Y").to_string();
    if *date == Local::now().date_naive() {
        format!("{formatted}*")
    } else {
        formatted
    }
}

pub fn hash_text(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text);
    format!("{:x}", hasher.finalize())
}

/// Short identifier for locally stored records, derived from their content and
/// creation instant.
pub fn generate_id(seed: &str) -> String {
    let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    hash_text(&format!("{seed}:{nanos}"))[..16].to_string()
}

/// Deserialize a timestamp given either as an RFC 3339 string or as epoch
/// milliseconds.
pub fn deserialize_flexible_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    struct TimestampVisitor;

    impl Visitor<'_> for TimestampVisitor {
        type Value = DateTime<Utc>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("an RFC 3339 timestamp string or epoch milliseconds")
        }

        fn visit_str<E: de::Error>(self, s: &str) -> Result<Self::Value, E> {
            DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(E::custom)
        }

        fn visit_i64<E: de::Error>(self, millis: i64) -> Result<Self::Value, E> {
            Utc.timestamp_millis_opt(millis)
                .single()
                .ok_or_else(|| E::custom(format!("timestamp out of range: {millis}")))
        }

        fn visit_u64<E: de::Error>(self, millis: u64) -> Result<Self::Value, E> {
            let millis = i64::try_from(millis)
                .map_err(|_| E::custom(format!("timestamp out of range: {millis}")))?;
            self.visit_i64(millis)
        }
    }

    deserializer.deserialize_any(TimestampVisitor)
}

#[cfg(test)]
mod tests;
