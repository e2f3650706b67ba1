#![forbid(unsafe_code)]

pub mod api;
pub mod error;
pub mod flow;

pub use quiz_core::TickOutcome;

pub use api::{ApiConfig, HttpQuizClient, QuizApi, ScriptedQuizApi, StatsApi};
pub use error::{ApiError, FlowError};
pub use flow::{Controls, FlowOutcome, Phase, QuizFlow};
