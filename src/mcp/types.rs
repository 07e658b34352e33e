use schemars::JsonSchema;
use schemars::transform::RecursiveTransform;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::analytics::TimePeriod;
use crate::history::BucketKey;
use crate::sports::SportConfig;
use crate::types::{
    ChatGroupSummary, EmotionScore, MessageEmotions, Outcome, Schedule, SessionAnalytics,
    SessionPhase,
};

/// Strips non-standard numeric `format` annotations from JSON Schemas.
///
/// `schemars` emits format values like `"uint32"` and `"double"` for Rust
/// numeric types. They are not part of JSON Schema and strict validators used
/// by some MCP clients warn about them.
fn strip_non_standard_format(schema: &mut schemars::Schema) {
    let non_standard = schema
        .get("format")
        .and_then(|v| v.as_str())
        .is_some_and(|f| {
            matches!(
                f,
                "uint8"
                    | "int8"
                    | "uint16"
                    | "int16"
                    | "uint32"
                    | "int32"
                    | "uint64"
                    | "int64"
                    | "uint"
                    | "int"
                    | "float"
                    | "double"
            )
        });
    if non_standard {
        schema.remove("format");
    }
}

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[schemars(transform = RecursiveTransform(strip_non_standard_format))]
pub struct ListChatHistoryRequest {
    /// Only return the first N sections (Today, Yesterday, ... then months). If omitted, returns all.
    #[serde(default)]
    pub max_sections: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[schemars(transform = RecursiveTransform(strip_non_standard_format))]
pub struct GetChatEmotionsRequest {
    /// Chat group ID as returned by list_chat_history.
    pub chat_group_id: String,

    /// Number of top emotions per message. Defaults to the configured value (3).
    #[serde(default)]
    pub top: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct GetActiveSessionRequest {}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct GetSessionAnalyticsRequest {
    /// Time period: "week", "month", "season" or "year". If omitted, uses all results.
    #[serde(default)]
    pub period: Option<TimePeriod>,

    /// Sport slug (e.g. "tennis"). If omitted, includes every sport.
    #[serde(default)]
    pub sport: Option<String>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ListSportsRequest {}

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Clone, Serialize, JsonSchema)]
#[schemars(transform = RecursiveTransform(strip_non_standard_format))]
pub struct EmotionEntry {
    pub name: String,
    pub score: f64,
}

impl From<&EmotionScore> for EmotionEntry {
    fn from(e: &EmotionScore) -> Self {
        Self {
            name: e.name.clone(),
            score: e.score,
        }
    }
}

fn emotion_entries(emotions: &[EmotionScore]) -> Vec<EmotionEntry> {
    emotions.iter().map(EmotionEntry::from).collect()
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ChatGroupEntry {
    pub id: String,
    /// RFC 3339 start time of the most recent chat in the group.
    pub start_timestamp: String,
}

impl From<&ChatGroupSummary> for ChatGroupEntry {
    fn from(g: &ChatGroupSummary) -> Self {
        Self {
            id: g.id.clone(),
            start_timestamp: g.start_timestamp.to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct HistorySection {
    /// Stable key: "today", "yesterday", "last7days", "last30days" or "YYYY-MM".
    pub key: String,
    pub label: String,
    pub groups: Vec<ChatGroupEntry>,
}

impl From<(BucketKey, &[ChatGroupSummary])> for HistorySection {
    fn from((key, groups): (BucketKey, &[ChatGroupSummary])) -> Self {
        Self {
            key: key.as_key(),
            label: key.label(),
            groups: groups.iter().map(ChatGroupEntry::from).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
#[schemars(transform = RecursiveTransform(strip_non_standard_format))]
pub struct ChatHistoryResponse {
    pub total_groups: usize,
    pub sections: Vec<HistorySection>,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
#[schemars(transform = RecursiveTransform(strip_non_standard_format))]
pub struct MessageEntry {
    /// "User" or "Assistant".
    pub speaker: String,
    pub text: String,
    /// Epoch milliseconds.
    pub timestamp: i64,
    /// Top emotions for user messages; absent for assistant messages.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emotions: Option<Vec<EmotionEntry>>,
}

impl From<&MessageEmotions> for MessageEntry {
    fn from(m: &MessageEmotions) -> Self {
        Self {
            speaker: m.role.speaker().to_string(),
            text: m.text.clone(),
            timestamp: m.timestamp,
            emotions: m.emotions.as_deref().map(emotion_entries),
        }
    }
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
#[schemars(transform = RecursiveTransform(strip_non_standard_format))]
pub struct ChatEmotionsResponse {
    pub chat_group_id: String,
    pub top_emotions: Vec<EmotionEntry>,
    pub messages: Vec<MessageEntry>,
    pub transcript: String,
}

impl ChatEmotionsResponse {
    pub fn new(chat_group_id: &str, history: &crate::types::ProcessedHistory) -> Self {
        Self {
            chat_group_id: chat_group_id.to_string(),
            top_emotions: emotion_entries(&history.top_emotions),
            messages: history
                .emotions_per_message
                .iter()
                .map(MessageEntry::from)
                .collect(),
            transcript: history.transcript.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ScheduleEntry {
    pub id: String,
    pub date: String,
    pub time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opponent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub venue: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl From<&Schedule> for ScheduleEntry {
    fn from(s: &Schedule) -> Self {
        Self {
            id: s.id.clone(),
            date: s.date.clone(),
            time: s.time.clone(),
            opponent: s.opponent.clone(),
            venue: s.venue.clone(),
            notes: s.notes.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ActiveSessionResponse {
    pub active: bool,
    /// "pre-session" or "post-session" when active.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule: Option<ScheduleEntry>,
    pub sport: String,
    pub key_emotions: Vec<String>,
}

impl ActiveSessionResponse {
    pub fn new(active: Option<&(Schedule, SessionPhase)>, sport: &SportConfig) -> Self {
        let phase = active.map(|(_, phase)| match phase {
            SessionPhase::PreSession => "pre-session".to_string(),
            SessionPhase::PostSession => "post-session".to_string(),
        });
        Self {
            active: active.is_some(),
            phase,
            schedule: active.map(|(schedule, _)| ScheduleEntry::from(schedule)),
            sport: sport.slug.to_string(),
            key_emotions: sport.key_emotions.iter().map(|e| e.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
#[schemars(transform = RecursiveTransform(strip_non_standard_format))]
pub struct SessionAnalyticsResponse {
    /// "week", "month", "season", "year" or "all".
    pub period: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sport: Option<String>,
    pub sessions: u32,
    pub wins: u32,
    pub losses: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub win_rate: Option<f64>,
    pub metric_averages: BTreeMap<String, f64>,
    /// Average post-session minus pre-session score per emotion.
    pub emotion_shifts: BTreeMap<String, f64>,
    pub recent_outcomes: Vec<OutcomeEntry>,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct OutcomeEntry {
    pub date: String,
    pub sport: String,
    /// "win" or "loss".
    pub outcome: String,
}

impl OutcomeEntry {
    pub fn new(date: chrono::NaiveDate, sport: &str, outcome: Outcome) -> Self {
        Self {
            date: date.format("%Y-%m-%d").to_string(),
            sport: sport.to_string(),
            outcome: match outcome {
                Outcome::Win => "win".to_string(),
                Outcome::Loss => "loss".to_string(),
            },
        }
    }
}

impl SessionAnalyticsResponse {
    pub fn new(
        analytics: SessionAnalytics,
        period: Option<TimePeriod>,
        sport: Option<String>,
        recent_outcomes: Vec<OutcomeEntry>,
    ) -> Self {
        Self {
            period: period
                .map(|p| p.to_string())
                .unwrap_or_else(|| "all".to_string()),
            sport,
            sessions: analytics.sessions,
            wins: analytics.wins,
            losses: analytics.losses,
            win_rate: analytics.win_rate(),
            metric_averages: analytics.metric_averages,
            emotion_shifts: analytics.emotion_shifts,
            recent_outcomes,
        }
    }
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct SportEntry {
    pub slug: String,
    pub name: String,
    pub metrics: Vec<String>,
    pub key_emotions: Vec<String>,
}

impl From<&SportConfig> for SportEntry {
    fn from(s: &SportConfig) -> Self {
        Self {
            slug: s.slug.to_string(),
            name: s.name.to_string(),
            metrics: s.metrics.iter().map(|m| m.to_string()).collect(),
            key_emotions: s.key_emotions.iter().map(|e| e.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct SportsResponse {
    pub sports: Vec<SportEntry>,
    /// Slug of the sport configured for this athlete.
    pub current: String,
}
