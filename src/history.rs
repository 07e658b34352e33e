use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Datelike, Days, NaiveDate, TimeZone};
use serde::{Deserialize, Serialize};

use crate::types::ChatGroupSummary;

/// Relative-time partition of the chat history sidebar.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BucketKey {
    Today,
    Yesterday,
    Last7Days,
    Last30Days,
    /// "YYYY-MM"
    Month(String),
}

impl BucketKey {
    pub fn label(&self) -> String {
        match self {
            BucketKey::Today => "Today".to_string(),
            BucketKey::Yesterday => "Yesterday".to_string(),
            BucketKey::Last7Days => "Previous 7 Days".to_string(),
            BucketKey::Last30Days => "Previous 30 Days".to_string(),
            BucketKey::Month(key) => month_label(key),
        }
    }

    /// Stable string form used for persisted collapse state.
    pub fn as_key(&self) -> String {
        match self {
            BucketKey::Today => "today".to_string(),
            BucketKey::Yesterday => "yesterday".to_string(),
            BucketKey::Last7Days => "last7days".to_string(),
            BucketKey::Last30Days => "last30days".to_string(),
            BucketKey::Month(key) => key.clone(),
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "today" => Some(BucketKey::Today),
            "yesterday" => Some(BucketKey::Yesterday),
            "last7days" => Some(BucketKey::Last7Days),
            "last30days" => Some(BucketKey::Last30Days),
            _ => NaiveDate::parse_from_str(&format!("{key}-01"), "%Y-%m-%d")
                .ok()
                .map(|_| BucketKey::Month(key.to_string())),
        }
    }
}

fn month_label(key: &str) -> String {
    match NaiveDate::parse_from_str(&format!("{key}-01"), "%Y-%m-%d") {
        Ok(date) => date.format("%B %Y").to_string(),
        Err(_) => key.to_string(),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatHistoryBuckets {
    pub today: Vec<ChatGroupSummary>,
    pub yesterday: Vec<ChatGroupSummary>,
    pub last_7_days: Vec<ChatGroupSummary>,
    pub last_30_days: Vec<ChatGroupSummary>,
    pub months: BTreeMap<String, Vec<ChatGroupSummary>>,
}

impl ChatHistoryBuckets {
    pub fn is_empty(&self) -> bool {
        self.today.is_empty()
            && self.yesterday.is_empty()
            && self.last_7_days.is_empty()
            && self.last_30_days.is_empty()
            && self.months.is_empty()
    }

    pub fn len(&self) -> usize {
        self.today.len()
            + self.yesterday.len()
            + self.last_7_days.len()
            + self.last_30_days.len()
            + self.months.values().map(Vec::len).sum::<usize>()
    }

    /// Month buckets, most recent month first.
    pub fn months_descending(&self) -> impl Iterator<Item = (&String, &Vec<ChatGroupSummary>)> {
        self.months.iter().rev()
    }

    /// Non-empty buckets in display order.
    pub fn sections(&self) -> Vec<(BucketKey, &[ChatGroupSummary])> {
        let mut sections: Vec<(BucketKey, &[ChatGroupSummary])> = [
            (BucketKey::Today, self.today.as_slice()),
            (BucketKey::Yesterday, self.yesterday.as_slice()),
            (BucketKey::Last7Days, self.last_7_days.as_slice()),
            (BucketKey::Last30Days, self.last_30_days.as_slice()),
        ]
        .into_iter()
        .filter(|(_, groups)| !groups.is_empty())
        .collect();

        sections.extend(
            self.months_descending()
                .map(|(key, groups)| (BucketKey::Month(key.clone()), groups.as_slice())),
        );
        sections
    }
}

/// Partition chat groups into relative-time buckets by calendar date in `now`'s
/// time zone. Relative order within each bucket follows the input.
pub fn bucketize<Tz: TimeZone>(
    summaries: &[ChatGroupSummary],
    now: &DateTime<Tz>,
) -> ChatHistoryBuckets {
    let tz = now.timezone();
    let today = now.date_naive();
    let yesterday = today - Days::new(1);
    let last7 = today - Days::new(7);
    let last30 = today - Days::new(30);

    let mut buckets = ChatHistoryBuckets::default();

    for summary in summaries {
        let date = summary.start_timestamp.with_timezone(&tz).date_naive();

        // Future dates (clock skew between us and the API) count as today.
        if date >= today {
            buckets.today.push(summary.clone());
        } else if date == yesterday {
            buckets.yesterday.push(summary.clone());
        } else if date >= last7 {
            buckets.last_7_days.push(summary.clone());
        } else if date >= last30 {
            buckets.last_30_days.push(summary.clone());
        } else {
            let key = format!("{:04}-{:02}", date.year(), date.month());
            buckets.months.entry(key).or_default().push(summary.clone());
        }
    }

    buckets
}

/// Sort newest first, the order `bucketize` callers are expected to supply.
pub fn sort_newest_first(summaries: &mut [ChatGroupSummary]) {
    summaries.sort_by(|a, b| b.start_timestamp.cmp(&a.start_timestamp));
}

/// Caller-held expand/collapse state of the history buckets. Every bucket is
/// expanded unless toggled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollapseState {
    collapsed: BTreeSet<BucketKey>,
}

impl CollapseState {
    pub fn from_keys<'a>(keys: impl IntoIterator<Item = &'a String>) -> Self {
        Self {
            collapsed: keys
                .into_iter()
                .filter_map(|k| BucketKey::from_key(k))
                .collect(),
        }
    }

    pub fn is_expanded(&self, key: &BucketKey) -> bool {
        !self.collapsed.contains(key)
    }

    /// Flip one bucket. Returns whether it is now expanded.
    pub fn toggle(&mut self, key: &BucketKey) -> bool {
        if self.collapsed.remove(key) {
            true
        } else {
            self.collapsed.insert(key.clone());
            false
        }
    }

    pub fn collapsed_keys(&self) -> Vec<String> {
        self.collapsed.iter().map(BucketKey::as_key).collect()
    }
}

#[cfg(test)]
mod tests;
