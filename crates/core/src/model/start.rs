use chrono::{DateTime, Utc};
use thiserror::Error;

/// Reasons the quiz service refuses to start a session.
///
/// The `Display` text is meant to be shown to the user verbatim.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum StartRejection {
    #[error("Your account must be approved by an administrator before you can start the quiz.")]
    ApprovalRequired,

    #[error("Please wait {} before starting the quiz.", wait_text(.wait_seconds))]
    CooldownActive {
        wait_seconds: Option<u64>,
        cooldown_hours: Option<u32>,
        ready_at: Option<DateTime<Utc>>,
    },

    #[error("Invalid test code. Please check the code and try again.")]
    InvalidTestCode,

    #[error("{0}")]
    Message(String),
}

fn wait_text(wait_seconds: &Option<u64>) -> String {
    format_wait(*wait_seconds)
}

/// Human-readable wait, e.g. `1h 5m`, `2h`, `40m`; unknown or elapsed waits read as `a moment`.
#[must_use]
pub fn format_wait(seconds: Option<u64>) -> String {
    let Some(seconds) = seconds.filter(|s| *s > 0) else {
        return "a moment".to_string();
    };
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    match (hours, minutes) {
        (0, m) => format!("{m}m"),
        (h, 0) => format!("{h}h"),
        (h, m) => format!("{h}h {m}m"),
    }
}
