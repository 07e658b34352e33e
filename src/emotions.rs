use std::collections::HashMap;
use std::fmt;

use serde::Deserialize;
use serde::de::{Deserializer, MapAccess, Visitor};

use crate::debug_log;
use crate::types::{ChatEvent, EmotionScore, EventRole, EventType, MessageEmotions, ProcessedHistory};

pub const DEFAULT_TOP_EMOTIONS: usize = 3;

const NO_TEXT: &str = "(No text content)";

/// Why an emotion payload could not be used.
#[derive(Debug, Clone, PartialEq)]
pub enum EmotionParseError {
    /// The payload is not a JSON object of name → number.
    Malformed(String),
    /// A score parsed but is NaN or infinite.
    NonFinite { name: String },
}

impl fmt::Display for EmotionParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmotionParseError::Malformed(reason) => write!(f, "malformed emotion payload: {reason}"),
            EmotionParseError::NonFinite { name } => {
                write!(f, "non-finite score for emotion '{name}'")
            }
        }
    }
}

impl std::error::Error for EmotionParseError {}

/// Emotion name → score mapping of one message, in payload order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmotionFeatures(Vec<EmotionScore>);

impl EmotionFeatures {
    pub fn parse(payload: &str) -> Result<Self, EmotionParseError> {
        let mut bytes = payload.as_bytes().to_vec();
        let features: EmotionFeatures = simd_json::from_slice(&mut bytes)
            .map_err(|e| EmotionParseError::Malformed(e.to_string()))?;

        if let Some(bad) = features.0.iter().find(|e| !e.score.is_finite()) {
            return Err(EmotionParseError::NonFinite {
                name: bad.name.clone(),
            });
        }

        Ok(features)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EmotionScore> {
        self.0.iter()
    }
}

impl From<Vec<EmotionScore>> for EmotionFeatures {
    fn from(scores: Vec<EmotionScore>) -> Self {
        Self(scores)
    }
}

impl<'de> Deserialize<'de> for EmotionFeatures {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct FeaturesVisitor;

        impl<'de> Visitor<'de> for FeaturesVisitor {
            type Value = EmotionFeatures;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of emotion name to numeric score")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut scores: Vec<EmotionScore> = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((name, score)) = map.next_entry::<String, f64>()? {
                    // A repeated key overwrites in place, keeping its first position
                    match scores.iter_mut().find(|e| e.name == name) {
                        Some(existing) => existing.score = score,
                        None => scores.push(EmotionScore { name, score }),
                    }
                }
                Ok(EmotionFeatures(scores))
            }
        }

        deserializer.deserialize_map(FeaturesVisitor)
    }
}

/// Stable descending sort by score. Ties keep their existing relative order.
fn rank_descending(scores: &mut [EmotionScore]) {
    scores.sort_by(|a, b| b.score.total_cmp(&a.score));
}

/// The `top_n` highest-scoring emotions of a single message.
pub fn top_emotions_for_message(features: &EmotionFeatures, top_n: usize) -> Vec<EmotionScore> {
    let mut ranked = features.0.clone();
    rank_descending(&mut ranked);
    ranked.truncate(top_n);
    ranked
}

fn has_emotion_data(event: &ChatEvent) -> Option<&str> {
    match (&event.event_type, event.emotion_features.as_deref()) {
        (EventType::UserMessage, Some(payload)) if !payload.is_empty() => Some(payload),
        _ => None,
    }
}

/// Average each emotion over every user message of a conversation and return
/// the `top_k` highest averages.
///
/// An emotion missing from a message contributes 0 for that message. Messages
/// whose payload does not parse are skipped and do not count toward the
/// average.
pub fn top_emotions_over_conversation(events: &[ChatEvent], top_k: usize) -> Vec<EmotionScore> {
    let mut totals: Vec<EmotionScore> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut message_count = 0usize;

    for event in events {
        let Some(payload) = has_emotion_data(event) else {
            continue;
        };

        let features = match EmotionFeatures::parse(payload) {
            Ok(features) => features,
            Err(e) => {
                debug_log::emotion_payload_skipped(event.timestamp, &e.to_string());
                continue;
            }
        };

        message_count += 1;
        for emotion in features.0 {
            match positions.get(&emotion.name) {
                Some(&idx) => totals[idx].score += emotion.score,
                None => {
                    positions.insert(emotion.name.clone(), totals.len());
                    totals.push(emotion);
                }
            }
        }
    }

    if message_count == 0 {
        return Vec::new();
    }

    for total in &mut totals {
        total.score /= message_count as f64;
    }
    rank_descending(&mut totals);
    totals.truncate(top_k);
    totals
}

/// Build the transcript, per-message emotions, and conversation summary for a
/// chat's events. Events are expected in ascending time order.
pub fn process_history(events: &[ChatEvent], top_n: usize) -> ProcessedHistory {
    let message_events: Vec<&ChatEvent> = events
        .iter()
        .filter(|e| e.event_type.is_message())
        .collect();

    let transcript = message_events
        .iter()
        .map(|e| {
            format!(
                "{}: {}",
                e.role.speaker(),
                e.text.as_deref().unwrap_or(NO_TEXT)
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let emotions_per_message = message_events
        .iter()
        .map(|e| {
            let emotions = match (&e.role, e.emotion_features.as_deref()) {
                (EventRole::User, Some(payload)) if !payload.is_empty() => {
                    match EmotionFeatures::parse(payload) {
                        Ok(features) => Some(top_emotions_for_message(&features, top_n)),
                        Err(err) => {
                            debug_log::emotion_payload_skipped(e.timestamp, &err.to_string());
                            None
                        }
                    }
                }
                _ => None,
            };

            MessageEmotions {
                role: e.role.clone(),
                text: e.text.clone().unwrap_or_else(|| NO_TEXT.to_string()),
                emotions,
                timestamp: e.timestamp,
            }
        })
        .collect();

    ProcessedHistory {
        transcript,
        top_emotions: top_emotions_over_conversation(events, DEFAULT_TOP_EMOTIONS),
        emotions_per_message,
    }
}
