mod ids;
mod mode;
mod question;
mod session;
mod start;

pub use ids::{CaseId, ParameterId, QuestionId, SessionId};
pub use mode::{DEFAULT_TIME_LIMIT_SECS, ParseModeError, QuizMode, TimeLimit};
pub use question::{CaseData, CaseParameter, Parameter, ParameterValues, QuestionView, RevealValues};
pub use session::{
    AnswerSubmission, QuestionResult, QuizSession, ScreenSize, SessionResults, StartRequest,
    SubmittedAnswer,
};
pub use start::{StartRejection, format_wait};
