use crossterm::style::Stylize;
use std::fmt::Write;

use crate::history::{ChatHistoryBuckets, CollapseState};
use crate::sports::SportConfig;
use crate::types::{
    EmotionScore, EventRole, Outcome, ProcessedHistory, Schedule, SessionAnalytics,
    SessionPhase, SessionResult,
};
use crate::utils::{
    DisplayOptions, format_date_for_display, format_event_time, format_score, format_start_time,
};

const RULE_WIDTH: usize = 72;

fn rule() -> String {
    "─".repeat(RULE_WIDTH).dark_grey().to_string()
}

fn title(out: &mut String, text: &str) {
    let _ = writeln!(out, "{}", text.cyan().bold());
    let _ = writeln!(out, "{}", "=".repeat(text.chars().count()).cyan().bold());
    let _ = writeln!(out);
}

pub fn format_emotions(emotions: &[EmotionScore], options: &DisplayOptions) -> String {
    emotions
        .iter()
        .map(|e| format!("{} {}", e.name, format_score(e.score, options)))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Chat history grouped by relative date. Collapsed sections show only their header.
pub fn render_history(
    buckets: &ChatHistoryBuckets,
    collapse: &CollapseState,
    options: &DisplayOptions,
) -> String {
    let mut out = String::new();
    title(&mut out, "CHAT HISTORY");

    if buckets.is_empty() {
        let _ = writeln!(out, "{}", "No chat history yet.".dark_grey());
        return out;
    }

    for (key, groups) in buckets.sections() {
        let expanded = collapse.is_expanded(&key);
        let marker = if expanded { "▼" } else { "▶" };
        let _ = writeln!(
            out,
            "{} {} {}",
            marker,
            key.label().bold(),
            format!("({})", groups.len()).dark_grey()
        );

        if !expanded {
            continue;
        }
        for group in groups {
            let _ = writeln!(
                out,
                "    {:<18} {}",
                format_start_time(&group.start_timestamp, options),
                group.id
            );
        }
    }

    out
}

/// Transcript of one chat group with per-message and overall top emotions.
pub fn render_chat(group_id: &str, history: &ProcessedHistory, options: &DisplayOptions) -> String {
    let mut out = String::new();
    title(&mut out, &format!("CHAT {group_id}"));

    if history.emotions_per_message.is_empty() {
        let _ = writeln!(out, "{}", "No messages in this chat.".dark_grey());
        return out;
    }

    for message in &history.emotions_per_message {
        let speaker = match message.role {
            EventRole::User => message.role.speaker().green().bold(),
            _ => message.role.speaker().blue().bold(),
        };
        let _ = writeln!(
            out,
            "{} {}: {}",
            format!("[{}]", format_event_time(message.timestamp, options)).dark_grey(),
            speaker,
            message.text
        );

        if let Some(emotions) = &message.emotions
            && !emotions.is_empty()
        {
            let _ = writeln!(
                out,
                "           {}",
                format_emotions(emotions, options).yellow()
            );
        }
    }

    let _ = writeln!(out, "{}", rule());
    if history.top_emotions.is_empty() {
        let _ = writeln!(out, "Top emotions: {}", "none recorded".dark_grey());
    } else {
        let _ = writeln!(
            out,
            "Top emotions: {}",
            format_emotions(&history.top_emotions, options).yellow().bold()
        );
    }

    out
}

pub fn render_schedules(schedules: &[Schedule]) -> String {
    let mut out = String::new();
    title(&mut out, "SCHEDULE");

    if schedules.is_empty() {
        let _ = writeln!(out, "{}", "Nothing scheduled.".dark_grey());
        return out;
    }

    let _ = writeln!(
        out,
        "{:<18} {:<12} {:<6} {:<16} {}",
        "ID", "Date", "Time", "Opponent", "Venue"
    );
    let _ = writeln!(out, "{}", rule());
    for s in schedules {
        let _ = writeln!(
            out,
            "{:<18} {:<12} {:<6} {:<16} {}",
            s.id,
            s.date,
            s.time,
            s.opponent.as_deref().unwrap_or("-"),
            s.venue.as_deref().unwrap_or("-")
        );
        if let Some(notes) = &s.notes {
            let _ = writeln!(out, "{}", format!("    {notes}").dark_grey());
        }
    }

    out
}

pub fn render_active_session(
    active: Option<&(Schedule, SessionPhase)>,
    sport: &SportConfig,
) -> String {
    let mut out = String::new();

    match active {
        Some((schedule, phase)) => {
            let _ = writeln!(
                out,
                "{} {} {} at {}",
                format!("{phase}").green().bold(),
                "for".dark_grey(),
                schedule.date,
                schedule.time
            );
            if let Some(opponent) = &schedule.opponent {
                let _ = writeln!(out, "  Opponent: {opponent}");
            }
            if let Some(venue) = &schedule.venue {
                let _ = writeln!(out, "  Venue: {venue}");
            }
            let _ = writeln!(
                out,
                "  Check in on: {}",
                sport.key_emotions.join(", ").yellow()
            );
        }
        None => {
            let _ = writeln!(out, "{}", "No active session.".dark_grey());
        }
    }

    out
}

pub fn render_results(results: &[SessionResult], options: &DisplayOptions) -> String {
    let mut out = String::new();
    title(&mut out, "SESSION RESULTS");

    if results.is_empty() {
        let _ = writeln!(out, "{}", "No results recorded.".dark_grey());
        return out;
    }

    for r in results {
        let outcome = match r.outcome {
            Outcome::Win => "WIN".green().bold(),
            Outcome::Loss => "LOSS".red().bold(),
        };
        let _ = writeln!(
            out,
            "{:<11} {:<17} {}  {}",
            format_date_for_display(&r.date),
            r.sport,
            outcome,
            r.id.as_str().dark_grey()
        );
        for m in &r.metrics {
            let _ = writeln!(out, "    {}: {}", m.name, format_score(m.value, options));
        }
        if !r.pre_session.is_empty() {
            let _ = writeln!(out, "    Pre:  {}", format_emotions(&r.pre_session, options));
        }
        if !r.post_session.is_empty() {
            let _ = writeln!(out, "    Post: {}", format_emotions(&r.post_session, options));
        }
    }

    out
}

pub fn render_analytics(
    analytics: &SessionAnalytics,
    heading: &str,
    options: &DisplayOptions,
) -> String {
    let mut out = String::new();
    title(&mut out, &format!("ANALYTICS: {heading}"));

    if analytics.sessions == 0 {
        let _ = writeln!(out, "{}", "No sessions in this period.".dark_grey());
        return out;
    }

    let win_rate = analytics.win_rate().unwrap_or_default() * 100.0;
    let _ = writeln!(
        out,
        "Sessions: {}   Wins: {}   Losses: {}   Win rate: {}",
        analytics.sessions.to_string().bold(),
        analytics.wins.to_string().green().bold(),
        analytics.losses.to_string().red().bold(),
        format!("{win_rate:.0}%").bold()
    );

    if !analytics.metric_averages.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "{}", "Metric averages".bold());
        for (name, avg) in &analytics.metric_averages {
            let _ = writeln!(out, "  {:<20} {}", name, format_score(*avg, options));
        }
    }

    if !analytics.emotion_shifts.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "{}", "Emotion shift (post - pre)".bold());
        for (name, shift) in &analytics.emotion_shifts {
            let value = format!("{:+.prec$}", shift, prec = options.decimal_places);
            let value = if *shift >= 0.0 { value.green() } else { value.red() };
            let _ = writeln!(out, "  {name:<20} {value}");
        }
    }

    out
}

pub fn render_sports(sports: &[&SportConfig], current: &str) -> String {
    let mut out = String::new();
    title(&mut out, "SPORTS");

    for sport in sports {
        let marker = if sport.slug == current { "*" } else { " " };
        let _ = writeln!(
            out,
            "{} {} {}",
            marker,
            sport.name.bold(),
            format!("({})", sport.slug).dark_grey()
        );
        let _ = writeln!(out, "    Metrics:      {}", sport.metrics.join(", "));
        let _ = writeln!(out, "    Key emotions: {}", sport.key_emotions.join(", "));
    }

    out
}
