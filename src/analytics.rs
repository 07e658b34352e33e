use anyhow::{Context, Result};
use chrono::{Datelike, Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::sports;
use crate::store::JsonStore;
use crate::types::{EmotionScore, MetricValue, Outcome, SessionAnalytics, SessionResult};
use crate::utils::{generate_id, warn_once};

pub const RESULTS_FILE: &str = "results.json";

/// Emotions kept from each pre/post-session conversation when recording a result.
pub const SESSION_EMOTION_COUNT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum TimePeriod {
    Week,
    Month,
    Season,
    Year,
}

impl TimePeriod {
    pub fn label(&self) -> &'static str {
        match self {
            TimePeriod::Week => "Past Week",
            TimePeriod::Month => "Past Month",
            TimePeriod::Season => "This Season",
            TimePeriod::Year => "Past Year",
        }
    }

    /// First date included in the period ending on `today`.
    pub fn start_date(&self, today: NaiveDate) -> NaiveDate {
        let days_back = |n: u64| {
            today
                .checked_sub_days(Days::new(n - 1))
                .unwrap_or(NaiveDate::MIN)
        };
        match self {
            TimePeriod::Week => days_back(7),
            TimePeriod::Month => days_back(30),
            TimePeriod::Year => days_back(365),
            TimePeriod::Season => NaiveDate::from_ymd_opt(today.year(), 1, 1).unwrap_or(today),
        }
    }

    pub fn contains(&self, date: NaiveDate, today: NaiveDate) -> bool {
        date >= self.start_date(today) && date <= today
    }
}

impl fmt::Display for TimePeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TimePeriod::Week => "week",
            TimePeriod::Month => "month",
            TimePeriod::Season => "season",
            TimePeriod::Year => "year",
        };
        f.write_str(name)
    }
}

impl FromStr for TimePeriod {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "week" => Ok(TimePeriod::Week),
            "month" => Ok(TimePeriod::Month),
            "season" => Ok(TimePeriod::Season),
            "year" => Ok(TimePeriod::Year),
            _ => anyhow::bail!("Invalid period '{s}'. Use week, month, season or year"),
        }
    }
}

/// Which results to include in a summary.
#[derive(Debug, Clone, Default)]
pub struct AnalyticsFilter {
    pub period: Option<TimePeriod>,
    /// Sport slug.
    pub sport: Option<String>,
}

impl AnalyticsFilter {
    pub fn matches(&self, result: &SessionResult, today: NaiveDate) -> bool {
        if let Some(period) = self.period
            && !period.contains(result.date, today)
        {
            return false;
        }
        match &self.sport {
            Some(sport) => result.sport == *sport,
            None => true,
        }
    }
}

/// Parse a `Name=value` metric argument.
pub fn parse_metric(arg: &str) -> Result<MetricValue> {
    let (name, value) = arg
        .split_once('=')
        .with_context(|| format!("Invalid metric '{arg}'. Use Name=value"))?;
    let name = name.trim();
    if name.is_empty() {
        anyhow::bail!("Invalid metric '{arg}'. Metric name is empty");
    }
    let value: f64 = value
        .trim()
        .parse()
        .with_context(|| format!("Invalid metric value in '{arg}'"))?;
    if !value.is_finite() {
        anyhow::bail!("Invalid metric value in '{arg}'");
    }

    Ok(MetricValue {
        name: name.to_string(),
        value,
    })
}

/// Fields supplied when recording a session result.
#[derive(Debug, Clone)]
pub struct NewSessionResult {
    pub schedule_id: Option<String>,
    pub sport: String,
    pub date: NaiveDate,
    pub outcome: Outcome,
    pub metrics: Vec<MetricValue>,
    pub pre_session: Vec<EmotionScore>,
    pub post_session: Vec<EmotionScore>,
    pub notes: Option<String>,
}

pub struct ResultsStore {
    store: JsonStore<SessionResult>,
}

impl ResultsStore {
    pub fn open() -> Result<Self> {
        Ok(Self {
            store: JsonStore::open(RESULTS_FILE)?,
        })
    }

    pub fn record(&self, new: NewSessionResult) -> Result<SessionResult> {
        let sport = sports::get_sport(&new.sport)
            .with_context(|| format!("Unknown sport: {}", new.sport))?;

        for metric in &new.metrics {
            if !sport.metrics.contains(&metric.name.as_str()) {
                warn_once(format!(
                    "Metric '{}' is not a standard {} metric",
                    metric.name, sport.name
                ));
            }
        }

        let result = SessionResult {
            id: generate_id(&format!("{}-{}", sport.slug, new.date)),
            schedule_id: new.schedule_id,
            sport: sport.slug.to_string(),
            date: new.date,
            outcome: new.outcome,
            metrics: new.metrics,
            pre_session: new.pre_session,
            post_session: new.post_session,
            notes: new.notes.filter(|n| !n.trim().is_empty()),
        };

        self.store.append(result.clone())?;
        Ok(result)
    }

    /// All recorded results, oldest first.
    pub fn list(&self) -> Result<Vec<SessionResult>> {
        let mut results = self.store.load()?;
        results.sort_by_key(|r| r.date);
        Ok(results)
    }
}

/// Win/loss record, metric averages and pre→post emotion shifts over the
/// results that pass `filter`.
pub fn summarize(
    results: &[SessionResult],
    filter: &AnalyticsFilter,
    today: NaiveDate,
) -> SessionAnalytics {
    let mut analytics = SessionAnalytics::default();
    let mut metric_sums: BTreeMap<String, (f64, u32)> = BTreeMap::new();
    let mut shift_sums: BTreeMap<String, (f64, u32)> = BTreeMap::new();

    for result in results.iter().filter(|r| filter.matches(r, today)) {
        analytics.sessions += 1;
        match result.outcome {
            Outcome::Win => analytics.wins += 1,
            Outcome::Loss => analytics.losses += 1,
        }

        for metric in &result.metrics {
            let entry = metric_sums.entry(metric.name.clone()).or_default();
            entry.0 += metric.value;
            entry.1 += 1;
        }

        for post in &result.post_session {
            if let Some(pre) = result.pre_session.iter().find(|p| p.name == post.name) {
                let entry = shift_sums.entry(post.name.clone()).or_default();
                entry.0 += post.score - pre.score;
                entry.1 += 1;
            }
        }
    }

    analytics.metric_averages = averages(metric_sums);
    analytics.emotion_shifts = averages(shift_sums);
    analytics
}

fn averages(sums: BTreeMap<String, (f64, u32)>) -> BTreeMap<String, f64> {
    sums.into_iter()
        .map(|(name, (sum, count))| (name, sum / count as f64))
        .collect()
}

impl SessionAnalytics {
    /// Fraction of sessions won, or `None` with no sessions.
    pub fn win_rate(&self) -> Option<f64> {
        (self.sessions > 0).then(|| self.wins as f64 / self.sessions as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::set_test_data_dir;
    use tempfile::TempDir;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn result(sport: &str, day: &str, outcome: Outcome) -> SessionResult {
        SessionResult {
            id: format!("{sport}-{day}"),
            schedule_id: None,
            sport: sport.to_string(),
            date: date(day),
            outcome,
            metrics: Vec::new(),
            pre_session: Vec::new(),
            post_session: Vec::new(),
            notes: None,
        }
    }

    fn metric(name: &str, value: f64) -> MetricValue {
        MetricValue {
            name: name.to_string(),
            value,
        }
    }

    #[test]
    fn period_boundaries() {
        let today = date("2025-05-15");

        assert!(TimePeriod::Week.contains(date("2025-05-09"), today));
        assert!(!TimePeriod::Week.contains(date("2025-05-08"), today));
        assert!(TimePeriod::Month.contains(date("2025-04-16"), today));
        assert!(!TimePeriod::Month.contains(date("2025-04-15"), today));
        assert!(TimePeriod::Season.contains(date("2025-01-01"), today));
        assert!(!TimePeriod::Season.contains(date("2024-12-31"), today));
        assert!(TimePeriod::Year.contains(date("2024-05-16"), today));
        assert!(!TimePeriod::Year.contains(date("2024-05-15"), today));
        assert!(!TimePeriod::Week.contains(date("2025-05-16"), today));
    }

    #[test]
    fn period_parsing() {
        assert_eq!("Season".parse::<TimePeriod>().unwrap(), TimePeriod::Season);
        assert_eq!(TimePeriod::Week.to_string(), "week");
        assert_eq!(TimePeriod::Year.label(), "Past Year");
        assert!("decade".parse::<TimePeriod>().is_err());
    }

    #[test]
    fn summarize_counts_and_averages() {
        let mut a = result("tennis", "2025-05-14", Outcome::Win);
        a.metrics = vec![metric("Winners", 10.0), metric("First Serve %", 60.0)];
        a.pre_session = vec![
            EmotionScore::new("Anxiety", 0.6),
            EmotionScore::new("Focus", 0.3),
        ];
        a.post_session = vec![
            EmotionScore::new("Anxiety", 0.2),
            EmotionScore::new("Joy", 0.7),
        ];

        let mut b = result("tennis", "2025-05-10", Outcome::Loss);
        b.metrics = vec![metric("Winners", 20.0)];
        b.pre_session = vec![EmotionScore::new("Anxiety", 0.4)];
        b.post_session = vec![EmotionScore::new("Anxiety", 0.6)];

        let analytics = summarize(&[a, b], &AnalyticsFilter::default(), date("2025-05-15"));

        assert_eq!(analytics.sessions, 2);
        assert_eq!(analytics.wins, 1);
        assert_eq!(analytics.losses, 1);
        assert_eq!(analytics.win_rate(), Some(0.5));
        assert_eq!(analytics.metric_averages["Winners"], 15.0);
        assert_eq!(analytics.metric_averages["First Serve %"], 60.0);

        // (0.2 - 0.6) and (0.6 - 0.4) average to -0.1; Joy and Focus lack a pair.
        assert!((analytics.emotion_shifts["Anxiety"] + 0.1).abs() < 1e-9);
        assert_eq!(analytics.emotion_shifts.len(), 1);
    }

    #[test]
    fn summarize_applies_filters() {
        let results = vec![
            result("tennis", "2025-05-14", Outcome::Win),
            result("tennis", "2025-03-01", Outcome::Win),
            result("baseball-batter", "2025-05-13", Outcome::Loss),
        ];
        let today = date("2025-05-15");

        let filter = AnalyticsFilter {
            period: Some(TimePeriod::Week),
            sport: Some("tennis".to_string()),
        };
        let analytics = summarize(&results, &filter, today);
        assert_eq!((analytics.sessions, analytics.wins), (1, 1));

        let filter = AnalyticsFilter {
            period: Some(TimePeriod::Season),
            sport: None,
        };
        assert_eq!(summarize(&results, &filter, today).sessions, 3);
    }

    #[test]
    fn empty_summary() {
        let analytics = summarize(&[], &AnalyticsFilter::default(), date("2025-05-15"));
        assert_eq!(analytics.sessions, 0);
        assert_eq!(analytics.win_rate(), None);
        assert!(analytics.metric_averages.is_empty());
    }

    #[test]
    fn parse_metric_arguments() {
        let m = parse_metric("First Serve % = 64.5").unwrap();
        assert_eq!(m.name, "First Serve %");
        assert_eq!(m.value, 64.5);

        assert!(parse_metric("Winners").is_err());
        assert!(parse_metric("=3").is_err());
        assert!(parse_metric("Winners=lots").is_err());
        assert!(parse_metric("Winners=NaN").is_err());
    }

    #[test]
    fn record_and_list_results() {
        let dir = TempDir::new().unwrap();
        set_test_data_dir(dir.path().to_path_buf());
        let store = ResultsStore::open().unwrap();

        let later = store
            .record(NewSessionResult {
                schedule_id: None,
                sport: "Tennis".to_string(),
                date: date("2025-05-14"),
                outcome: Outcome::Win,
                metrics: vec![metric("Winners", 12.0)],
                pre_session: Vec::new(),
                post_session: Vec::new(),
                notes: Some("  ".to_string()),
            })
            .unwrap();
        store
            .record(NewSessionResult {
                schedule_id: Some("s1".to_string()),
                sport: "tennis".to_string(),
                date: date("2025-05-01"),
                outcome: Outcome::Loss,
                metrics: Vec::new(),
                pre_session: Vec::new(),
                post_session: Vec::new(),
                notes: None,
            })
            .unwrap();

        assert_eq!(later.sport, "tennis");
        assert_eq!(later.notes, None);

        let listed = store.list().unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].date, date("2025-05-01"));
        assert_eq!(listed[1].id, later.id);

        let err = store
            .record(NewSessionResult {
                schedule_id: None,
                sport: "curling".to_string(),
                date: date("2025-05-01"),
                outcome: Outcome::Loss,
                metrics: Vec::new(),
                pre_session: Vec::new(),
                post_session: Vec::new(),
                notes: None,
            })
            .unwrap_err();
        assert!(format!("{err}").contains("Unknown sport"));
    }
}
