use std::fmt;

use crate::model::{QuestionId, QuizMode, SessionId, TimeLimit};

/// Client viewport reported alongside starts and answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenSize {
    pub width: u32,
    pub height: u32,
}

impl ScreenSize {
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for ScreenSize {
    fn default() -> Self {
        Self::new(1920, 1080)
    }
}

impl fmt::Display for ScreenSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Parameters of a "start quiz" request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartRequest {
    pub mode: QuizMode,
    pub screen: ScreenSize,
    test_code: Option<String>,
}

impl StartRequest {
    #[must_use]
    pub fn new(mode: QuizMode, screen: ScreenSize) -> Self {
        Self {
            mode,
            screen,
            test_code: None,
        }
    }

    /// Attach a test code. Blank codes are dropped and the rest is trimmed.
    #[must_use]
    pub fn with_test_code(mut self, code: Option<&str>) -> Self {
        self.test_code = code
            .map(str::trim)
            .filter(|code| !code.is_empty())
            .map(str::to_string);
        self
    }

    #[must_use]
    pub fn test_code(&self) -> Option<&str> {
        self.test_code.as_deref()
    }
}

/// One attempt at a quiz as announced by the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizSession {
    session_id: SessionId,
    mode: QuizMode,
    time_limit: Option<TimeLimit>,
}

impl QuizSession {
    /// Timed sessions always carry a limit, falling back to the default one.
    /// Other modes never do.
    #[must_use]
    pub fn new(session_id: SessionId, mode: QuizMode, time_limit: Option<TimeLimit>) -> Self {
        let time_limit = if mode.is_timed() {
            Some(time_limit.unwrap_or_default())
        } else {
            None
        };
        Self {
            session_id,
            mode,
            time_limit,
        }
    }

    #[must_use]
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    #[must_use]
    pub fn mode(&self) -> QuizMode {
        self.mode
    }

    #[must_use]
    pub fn time_limit(&self) -> Option<TimeLimit> {
        self.time_limit
    }
}

/// A user's choice for the current question plus measured context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerSubmission {
    pub answer: String,
    pub screen: ScreenSize,
}

/// Service acknowledgement of a submitted answer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmittedAnswer {
    pub correct_option: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuestionResult {
    pub question_id: QuestionId,
    pub answer: String,
    pub is_correct: bool,
}

/// Aggregated outcome of a finished session, as reported by the stats service.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionResults {
    pub session_id: SessionId,
    pub mode: Option<QuizMode>,
    pub correct_answers: u32,
    pub total_questions: u32,
    pub accuracy: f64,
    pub questions: Vec<QuestionResult>,
    pub start_time: Option<String>,
}
