//! Opt-in diagnostic logging.
//!
//! Enable by setting environment variable: PEAKFORM_DEBUG_LOG=1
//! Logs are written to `peakform-debug.log` in the system temp directory.
//! Nothing logged here is ever shown to the user.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, OnceLock};
use std::time::Instant;

static ENABLED: AtomicBool = AtomicBool::new(false);
static START_TIME: OnceLock<Instant> = OnceLock::new();
static LOG_FILE: OnceLock<Mutex<File>> = OnceLock::new();

pub fn log_path() -> PathBuf {
    std::env::temp_dir().join("peakform-debug.log")
}

/// Initialize debug logging. Call once at startup.
pub fn init() {
    if std::env::var("PEAKFORM_DEBUG_LOG").is_err() {
        return;
    }

    let file = match OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(log_path())
    {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Could not open debug log {}: {e}", log_path().display());
            return;
        }
    };

    START_TIME.get_or_init(Instant::now);
    LOG_FILE.get_or_init(|| Mutex::new(file));
    ENABLED.store(true, Ordering::SeqCst);
    log("DEBUG", "init", "Debug logging initialized");
}

#[inline]
pub fn is_enabled() -> bool {
    ENABLED.load(Ordering::Relaxed)
}

/// Log a debug message with timestamp and thread ID.
pub fn log(category: &str, action: &str, detail: &str) {
    if !is_enabled() {
        return;
    }

    let elapsed = START_TIME
        .get()
        .map(|s| s.elapsed().as_millis())
        .unwrap_or(0);
    let thread_id = std::thread::current().id();

    let msg = format!(
        "[{:>8}ms] [{:?}] [{}] {} - {}\n",
        elapsed, thread_id, category, action, detail
    );

    if let Some(file_mutex) = LOG_FILE.get()
        && let Ok(mut file) = file_mutex.lock()
    {
        let _ = file.write_all(msg.as_bytes());
        let _ = file.flush();
    }
}

/// Record an emotion payload that could not be parsed and was skipped.
#[inline]
pub fn emotion_payload_skipped(timestamp: i64, reason: &str) {
    if is_enabled() {
        log("EMOTIONS", "SKIPPED", &format!("event@{timestamp}: {reason}"));
    }
}

/// Record a poll result that arrived after a newer fetch was requested.
#[inline]
pub fn poll_result_discarded(generation: u64, current: u64) {
    if is_enabled() {
        log(
            "POLL",
            "DISCARDED",
            &format!("generation {generation} superseded by {current}"),
        );
    }
}

/// Log an outgoing API request.
#[inline]
pub fn api_request(method: &str, url: &str) {
    if is_enabled() {
        log("HUME", method, url);
    }
}
