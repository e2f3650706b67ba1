use crate::model::TimeLimit;

/// Result of a single one-second tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Still counting; carries the seconds left.
    Running(u32),
    /// Reached zero. The timer has already been reset to the full limit.
    Expired,
    /// The timer is stopped and ignored the tick.
    Stopped,
}

/// Per-question countdown for timed sessions.
///
/// The timer holds no clock of its own; the driver feeds it one tick per second.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerTimer {
    limit: TimeLimit,
    remaining: u32,
    running: bool,
}

impl AnswerTimer {
    /// A running timer at the full limit.
    #[must_use]
    pub fn start(limit: TimeLimit) -> Self {
        Self {
            limit,
            remaining: limit.secs(),
            running: true,
        }
    }

    #[must_use]
    pub fn limit(&self) -> TimeLimit {
        self.limit
    }

    #[must_use]
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn tick(&mut self) -> TickOutcome {
        if !self.running {
            return TickOutcome::Stopped;
        }
        if self.remaining <= 1 {
            self.remaining = self.limit.secs();
            return TickOutcome::Expired;
        }
        self.remaining -= 1;
        TickOutcome::Running(self.remaining)
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    /// Back to the full limit and running.
    pub fn restart(&mut self) {
        self.remaining = self.limit.secs();
        self.running = true;
    }
}
