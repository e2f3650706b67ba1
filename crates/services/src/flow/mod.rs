//! Question-by-question state machine for one quiz session.

mod controller;
mod state;

pub use controller::{MAX_REPORT_CHARS, QuizFlow};
pub use state::{Controls, FlowOutcome, Phase};
