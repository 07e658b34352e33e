use phf::phf_map;
use serde::Serialize;

pub const DEFAULT_SPORT: &str = "tennis";

/// Metrics recorded after a session and the emotions worth watching for a sport.
#[derive(Debug, Clone, Serialize)]
pub struct SportConfig {
    pub slug: &'static str,
    pub name: &'static str,
    pub metrics: [&'static str; 3],
    pub key_emotions: [&'static str; 3],
}

static SPORTS: phf::Map<&'static str, SportConfig> = phf_map! {
    "tennis" => SportConfig {
        slug: "tennis",
        name: "Tennis",
        metrics: ["First Serve %", "Winners", "Unforced Errors"],
        key_emotions: ["Confidence", "Focus", "Anxiety"],
    },
    "baseball-pitcher" => SportConfig {
        slug: "baseball-pitcher",
        name: "Baseball (Pitcher)",
        metrics: ["Strike %", "Velocity", "ERA"],
        key_emotions: ["Confidence", "Focus", "Composure"],
    },
    "baseball-batter" => SportConfig {
        slug: "baseball-batter",
        name: "Baseball (Batter)",
        metrics: ["Batting Avg", "Exit Velocity", "Contact %"],
        key_emotions: ["Confidence", "Focus", "Pressure"],
    },
};

/// Display order for listings.
const SPORT_ORDER: [&str; 3] = ["tennis", "baseball-pitcher", "baseball-batter"];

/// Look up a sport by slug or display name, case-insensitively.
pub fn get_sport(name: &str) -> Option<&'static SportConfig> {
    let lower = name.trim().to_lowercase();
    SPORTS.get(lower.as_str()).or_else(|| {
        SPORTS
            .values()
            .find(|s| s.name.eq_ignore_ascii_case(name.trim()))
    })
}

pub fn all_sports() -> Vec<&'static SportConfig> {
    SPORT_ORDER.iter().filter_map(|slug| SPORTS.get(*slug)).collect()
}
