use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Per-question limit used when a timed session does not announce its own.
pub const DEFAULT_TIME_LIMIT_SECS: u32 = 30;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown quiz mode: {raw}")]
pub struct ParseModeError {
    pub raw: String,
}

/// How a session paces and grades its questions. Fixed for the session lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuizMode {
    /// Manual pacing, no time limit.
    Classic,
    /// The correct answer is revealed before moving on.
    Educational,
    /// Fixed per-question countdown with auto-submit.
    #[serde(alias = "timeLimited")]
    TimeLimited,
}

impl QuizMode {
    pub const ALL: [QuizMode; 3] = [Self::Educational, Self::TimeLimited, Self::Classic];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Classic => "classic",
            Self::Educational => "educational",
            Self::TimeLimited => "time_limited",
        }
    }

    #[must_use]
    pub fn is_timed(self) -> bool {
        matches!(self, Self::TimeLimited)
    }

    #[must_use]
    pub fn reveals_answers(self) -> bool {
        matches!(self, Self::Educational)
    }
}

impl fmt::Display for QuizMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuizMode {
    type Err = ParseModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "classic" => Ok(Self::Classic),
            "educational" => Ok(Self::Educational),
            "time_limited" | "timeLimited" => Ok(Self::TimeLimited),
            other => Err(ParseModeError {
                raw: other.to_string(),
            }),
        }
    }
}

/// Positive per-question countdown length, in whole seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeLimit(u32);

impl TimeLimit {
    /// Returns `None` for a zero-second limit.
    #[must_use]
    pub fn from_secs(secs: u32) -> Option<Self> {
        (secs > 0).then_some(Self(secs))
    }

    #[must_use]
    pub fn secs(self) -> u32 {
        self.0
    }
}

impl Default for TimeLimit {
    fn default() -> Self {
        Self(DEFAULT_TIME_LIMIT_SECS)
    }
}
