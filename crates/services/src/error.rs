//! Shared error types for the services crate.

use thiserror::Error;

use quiz_core::model::StartRejection;

/// Errors emitted by the quiz and stats API clients.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ApiError {
    #[error("authentication required")]
    AuthRequired,
    #[error(transparent)]
    StartRejected(#[from] StartRejection),
    #[error("request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error("service unavailable: {0}")]
    Unavailable(String),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error(transparent)]
    InvalidUrl(#[from] url::ParseError),
}

/// Errors emitted by the quiz flow controller.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FlowError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("select an answer first")]
    NoAnswerSelected,
    #[error("option {0:?} is not offered by this question")]
    UnknownOption(String),
    #[error("the answer is locked once the correct one is shown")]
    AnswerLocked,
    #[error("show the correct answer before moving on")]
    RevealRequired,
    #[error("correct answers are only shown in educational mode")]
    RevealUnavailable,
    #[error("this is the last question, finish the quiz instead")]
    LastQuestion,
    #[error("no question is loaded")]
    NoQuestion,
    #[error("the quiz is no longer active")]
    NotActive,
    #[error("the report is empty")]
    EmptyReport,
    #[error("a problem was already reported for this case")]
    AlreadyReported,
}
