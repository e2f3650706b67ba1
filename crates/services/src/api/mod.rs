mod config;
mod http;
pub mod memory;
mod wire;

use async_trait::async_trait;

use quiz_core::model::{
    AnswerSubmission, CaseId, QuestionView, QuizSession, RevealValues, SessionId, SessionResults,
    StartRequest, SubmittedAnswer,
};

use crate::error::ApiError;

pub use config::{ApiConfig, DEFAULT_QUIZ_SERVICE_URL, DEFAULT_STATS_SERVICE_URL};
pub use http::HttpQuizClient;
pub use memory::{ApiCall, ScriptedQuizApi, sample_question};

/// Session-scoped calls to the quiz service.
#[async_trait]
pub trait QuizApi: Send + Sync {
    /// Open a new session.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::StartRejected` for approval, cooldown and test-code refusals,
    /// `ApiError::AuthRequired` when the token is missing or expired.
    async fn start_session(&self, request: &StartRequest) -> Result<QuizSession, ApiError>;

    /// Fetch the next question, or `None` once the session has no more.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` for transport, status or decoding failures.
    async fn next_question(&self, session_id: &SessionId) -> Result<Option<QuestionView>, ApiError>;

    /// Record an answer for the current question.
    ///
    /// Not idempotent on the service side; callers must not repeat it for one question.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` for transport, status or decoding failures.
    async fn submit_answer(
        &self,
        session_id: &SessionId,
        submission: &AnswerSubmission,
    ) -> Result<SubmittedAnswer, ApiError>;

    /// # Errors
    ///
    /// Returns `ApiError` for transport or status failures.
    async fn finish_session(&self, session_id: &SessionId) -> Result<(), ApiError>;

    /// Third-age values of a case, available once its answer has been revealed.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` for transport, status or decoding failures.
    async fn reveal_values(&self, case_id: CaseId) -> Result<RevealValues, ApiError>;

    /// Send a free-text problem report about a case.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` for transport or status failures.
    async fn report_case(&self, case_id: CaseId, description: &str) -> Result<(), ApiError>;
}

/// Read-only calls to the stats service.
#[async_trait]
pub trait StatsApi: Send + Sync {
    /// # Errors
    ///
    /// Returns `ApiError` for transport, status or decoding failures.
    async fn quiz_results(&self, session_id: &SessionId) -> Result<SessionResults, ApiError>;
}
