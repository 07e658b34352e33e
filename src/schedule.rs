use anyhow::{Context, Result};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};

use crate::store::JsonStore;
use crate::types::{Schedule, SessionPhase};
use crate::utils::generate_id;

pub const SCHEDULES_FILE: &str = "schedules.json";

/// Hours before a scheduled start that the pre-session window opens.
pub const PRE_SESSION_HOURS: i64 = 2;
/// Hours after a scheduled start that the post-session window stays open.
pub const POST_SESSION_HOURS: i64 = 4;

pub fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{value}'. Use YYYY-MM-DD"))
}

pub fn parse_time(value: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M")
        .with_context(|| format!("Invalid time '{value}'. Use HH:MM"))
}

impl Schedule {
    /// Scheduled start as a naive local date-time.
    pub fn start(&self) -> Result<NaiveDateTime> {
        Ok(parse_date(&self.date)?.and_time(parse_time(&self.time)?))
    }
}

/// Fields supplied when adding a schedule.
#[derive(Debug, Clone, Default)]
pub struct NewSchedule {
    pub date: String,
    pub time: String,
    pub opponent: Option<String>,
    pub venue: Option<String>,
    pub notes: Option<String>,
}

pub struct ScheduleStore {
    store: JsonStore<Schedule>,
}

impl ScheduleStore {
    pub fn open() -> Result<Self> {
        Ok(Self {
            store: JsonStore::open(SCHEDULES_FILE)?,
        })
    }

    /// Every schedule ordered by start; entries with unparsable dates sort last.
    pub fn list(&self) -> Result<Vec<Schedule>> {
        let mut schedules = self.store.load()?;
        sort_by_start(&mut schedules);
        Ok(schedules)
    }

    pub fn add(&self, new: NewSchedule) -> Result<Schedule> {
        let date = parse_date(&new.date)?;
        let time = parse_time(&new.time)?;

        let schedule = Schedule {
            id: generate_id(&format!("{date}T{time}")),
            date: date.format("%Y-%m-%d").to_string(),
            time: time.format("%H:%M").to_string(),
            opponent: non_empty(new.opponent),
            venue: non_empty(new.venue),
            notes: non_empty(new.notes),
        };

        self.store.append(schedule.clone())?;
        Ok(schedule)
    }

    /// Returns `false` when no schedule has that id.
    pub fn remove(&self, id: &str) -> Result<bool> {
        let mut schedules = self.store.load()?;
        let before = schedules.len();
        schedules.retain(|s| s.id != id);

        if schedules.len() == before {
            return Ok(false);
        }

        self.store.save(schedules)?;
        Ok(true)
    }

    pub fn get(&self, id: &str) -> Result<Option<Schedule>> {
        Ok(self.store.load()?.into_iter().find(|s| s.id == id))
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn sort_by_start(schedules: &mut [Schedule]) {
    schedules.sort_by_key(|s| match s.start() {
        Ok(start) => (0, start),
        Err(_) => (1, NaiveDateTime::MIN),
    });
}

/// First schedule whose session window contains `now`, with the phase it is in.
///
/// Schedule times are wall-clock times in `now`'s time zone. The window spans
/// two hours before the start (pre-session) to four hours after it
/// (post-session, inclusive of the start itself).
pub fn find_active_session<Tz: TimeZone>(
    schedules: &[Schedule],
    now: &DateTime<Tz>,
) -> Option<(Schedule, SessionPhase)> {
    let now = now.naive_local();

    schedules.iter().find_map(|schedule| {
        let start = schedule.start().ok()?;
        if now < start - Duration::hours(PRE_SESSION_HOURS)
            || now > start + Duration::hours(POST_SESSION_HOURS)
        {
            return None;
        }

        let phase = if now < start {
            SessionPhase::PreSession
        } else {
            SessionPhase::PostSession
        };
        Some((schedule.clone(), phase))
    })
}
