use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::utils::deserialize_flexible_timestamp;

/// A model-assigned intensity for one named emotion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionScore {
    pub name: String,
    pub score: f64,
}

impl EmotionScore {
    pub fn new(name: impl Into<String>, score: f64) -> Self {
        Self {
            name: name.into(),
            score,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventRole {
    User,
    Agent,
    System,
    Other(String),
}

impl EventRole {
    fn as_str(&self) -> &str {
        match self {
            EventRole::User => "USER",
            EventRole::Agent => "AGENT",
            EventRole::System => "SYSTEM",
            EventRole::Other(s) => s,
        }
    }

    /// Speaker label used in transcripts.
    pub fn speaker(&self) -> &'static str {
        match self {
            EventRole::User => "User",
            _ => "Assistant",
        }
    }
}

impl Serialize for EventRole {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EventRole {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(match s.as_str() {
            "USER" => EventRole::User,
            // Older API revisions used ASSISTANT for the agent side
            "AGENT" | "ASSISTANT" => EventRole::Agent,
            "SYSTEM" => EventRole::System,
            _ => EventRole::Other(s),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventType {
    UserMessage,
    AgentMessage,
    Other(String),
}

impl EventType {
    fn as_str(&self) -> &str {
        match self {
            EventType::UserMessage => "USER_MESSAGE",
            EventType::AgentMessage => "AGENT_MESSAGE",
            EventType::Other(s) => s,
        }
    }

    pub fn is_message(&self) -> bool {
        matches!(self, EventType::UserMessage | EventType::AgentMessage)
    }
}

impl Serialize for EventType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EventType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(match s.as_str() {
            "USER_MESSAGE" => EventType::UserMessage,
            "AGENT_MESSAGE" => EventType::AgentMessage,
            _ => EventType::Other(s),
        })
    }
}

/// One event of a historical chat, as returned by the chat-group events listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatEvent {
    pub role: EventRole,
    #[serde(rename = "type")]
    pub event_type: EventType,
    #[serde(rename = "message_text", default)]
    pub text: Option<String>,
    /// Epoch milliseconds.
    #[serde(default)]
    pub timestamp: i64,
    /// JSON-encoded mapping of emotion name to score. Only user messages carry it.
    #[serde(default)]
    pub emotion_features: Option<String>,
}

/// One historical conversation session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatGroupSummary {
    pub id: String,
    #[serde(deserialize_with = "deserialize_flexible_timestamp")]
    pub start_timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageEmotions {
    pub role: EventRole,
    pub text: String,
    pub emotions: Option<Vec<EmotionScore>>,
    pub timestamp: i64,
}

/// A fetched conversation reduced to what the history view displays.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedHistory {
    pub transcript: String,
    pub top_emotions: Vec<EmotionScore>,
    pub emotions_per_message: Vec<MessageEmotions>,
}

/// A planned training or competition session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    pub id: String,
    /// YYYY-MM-DD
    pub date: String,
    /// HH:MM
    pub time: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opponent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub venue: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionPhase {
    PreSession,
    PostSession,
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionPhase::PreSession => write!(f, "Pre-Session"),
            SessionPhase::PostSession => write!(f, "Post-Session"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Win,
    Loss,
}

impl std::str::FromStr for Outcome {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "win" | "w" => Ok(Outcome::Win),
            "loss" | "l" => Ok(Outcome::Loss),
            _ => anyhow::bail!("Invalid outcome '{s}'. Use 'win' or 'loss'"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricValue {
    pub name: String,
    pub value: f64,
}

/// Recorded outcome of one session, with the emotional state captured around it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResult {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule_id: Option<String>,
    pub sport: String,
    pub date: chrono::NaiveDate,
    pub outcome: Outcome,
    #[serde(default)]
    pub metrics: Vec<MetricValue>,
    #[serde(default)]
    pub pre_session: Vec<EmotionScore>,
    #[serde(default)]
    pub post_session: Vec<EmotionScore>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionAnalytics {
    pub sessions: u32,
    pub wins: u32,
    pub losses: u32,
    pub metric_averages: BTreeMap<String, f64>,
    /// Average post − pre score per emotion, over sessions that captured both.
    pub emotion_shifts: BTreeMap<String, f64>,
}

#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    #[serde(alias = "error")]
    pub message: String,
}
