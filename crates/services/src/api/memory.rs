//! Scripted in-memory implementation of the API traits for testing and prototyping.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use quiz_core::model::{
    AnswerSubmission, CaseData, CaseId, CaseParameter, Parameter, ParameterId, ParameterValues,
    QuestionId, QuestionResult, QuestionView, QuizMode, QuizSession, RevealValues, SessionId,
    SessionResults, StartRejection, StartRequest, SubmittedAnswer, TimeLimit,
};

use super::{QuizApi, StatsApi};
use crate::error::ApiError;

/// One recorded call against the scripted API.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiCall {
    Start {
        mode: QuizMode,
        test_code: Option<String>,
    },
    NextQuestion,
    Submit {
        answer: String,
    },
    Finish,
    Reveal(CaseId),
    Report {
        case_id: CaseId,
        description: String,
    },
    Results,
}

#[derive(Default)]
struct Script {
    session_id: Option<SessionId>,
    time_limit: Option<TimeLimit>,
    start_rejection: Option<StartRejection>,
    questions: VecDeque<QuestionView>,
    correct: HashMap<QuestionId, String>,
    reveals: HashMap<CaseId, RevealValues>,
    failing_fetches: u32,
    failing_submits: u32,
    failing_reveals: u32,
    failing_finishes: u32,
    served: Option<QuestionId>,
    answers: Vec<(QuestionId, String)>,
    mode: Option<QuizMode>,
    calls: Vec<ApiCall>,
}

impl Script {
    fn take_failure(counter: &mut u32, what: &str) -> Result<(), ApiError> {
        if *counter > 0 {
            *counter -= 1;
            return Err(ApiError::Unavailable(format!("scripted {what} failure")));
        }
        Ok(())
    }
}

/// Serves a fixed queue of questions and records every call it receives.
#[derive(Clone, Default)]
pub struct ScriptedQuizApi {
    inner: Arc<Mutex<Script>>,
}

impl ScriptedQuizApi {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn with_session_id(self, id: impl Into<String>) -> Self {
        self.script().session_id = Some(SessionId::new(id));
        self
    }

    #[must_use]
    pub fn with_time_limit(self, limit: TimeLimit) -> Self {
        self.script().time_limit = Some(limit);
        self
    }

    #[must_use]
    pub fn with_questions(self, questions: impl IntoIterator<Item = QuestionView>) -> Self {
        self.script().questions.extend(questions);
        self
    }

    #[must_use]
    pub fn with_correct_option(self, question: QuestionId, option: impl Into<String>) -> Self {
        self.script().correct.insert(question, option.into());
        self
    }

    #[must_use]
    pub fn with_reveal(self, case_id: CaseId, reveal: RevealValues) -> Self {
        self.script().reveals.insert(case_id, reveal);
        self
    }

    #[must_use]
    pub fn rejecting_start(self, rejection: StartRejection) -> Self {
        self.script().start_rejection = Some(rejection);
        self
    }

    /// The next `n` question fetches fail with `ApiError::Unavailable`.
    pub fn fail_next_fetches(&self, n: u32) {
        self.script().failing_fetches = n;
    }

    pub fn fail_next_submits(&self, n: u32) {
        self.script().failing_submits = n;
    }

    pub fn fail_next_reveals(&self, n: u32) {
        self.script().failing_reveals = n;
    }

    pub fn fail_next_finishes(&self, n: u32) {
        self.script().failing_finishes = n;
    }

    #[must_use]
    pub fn calls(&self) -> Vec<ApiCall> {
        self.script().calls.clone()
    }

    #[must_use]
    pub fn fetch_count(&self) -> usize {
        self.count(|call| matches!(call, ApiCall::NextQuestion))
    }

    #[must_use]
    pub fn submit_count(&self) -> usize {
        self.count(|call| matches!(call, ApiCall::Submit { .. }))
    }

    #[must_use]
    pub fn finish_count(&self) -> usize {
        self.count(|call| matches!(call, ApiCall::Finish))
    }

    #[must_use]
    pub fn reveal_count(&self) -> usize {
        self.count(|call| matches!(call, ApiCall::Reveal(_)))
    }

    /// Answers in submission order.
    #[must_use]
    pub fn submitted_answers(&self) -> Vec<String> {
        self.script()
            .answers
            .iter()
            .map(|(_, answer)| answer.clone())
            .collect()
    }

    fn count(&self, predicate: impl Fn(&ApiCall) -> bool) -> usize {
        self.script().calls.iter().filter(|call| predicate(call)).count()
    }
}

#[async_trait]
impl QuizApi for ScriptedQuizApi {
    async fn start_session(&self, request: &StartRequest) -> Result<QuizSession, ApiError> {
        let mut script = self.script();
        script.calls.push(ApiCall::Start {
            mode: request.mode,
            test_code: request.test_code().map(str::to_string),
        });
        if let Some(rejection) = script.start_rejection.clone() {
            return Err(rejection.into());
        }
        script.mode = Some(request.mode);
        let session_id = script
            .session_id
            .clone()
            .unwrap_or_else(|| SessionId::new("session-1"));
        Ok(QuizSession::new(session_id, request.mode, script.time_limit))
    }

    async fn next_question(&self, _session_id: &SessionId) -> Result<Option<QuestionView>, ApiError> {
        let mut script = self.script();
        script.calls.push(ApiCall::NextQuestion);
        Script::take_failure(&mut script.failing_fetches, "fetch")?;
        let next = script.questions.pop_front();
        script.served = next.as_ref().map(|question| question.id);
        Ok(next)
    }

    async fn submit_answer(
        &self,
        _session_id: &SessionId,
        submission: &AnswerSubmission,
    ) -> Result<SubmittedAnswer, ApiError> {
        let mut script = self.script();
        script.calls.push(ApiCall::Submit {
            answer: submission.answer.clone(),
        });
        Script::take_failure(&mut script.failing_submits, "submit")?;
        let Some(question) = script.served else {
            return Err(ApiError::Unavailable("no question served".into()));
        };
        script.answers.push((question, submission.answer.clone()));
        Ok(SubmittedAnswer {
            correct_option: script.correct.get(&question).cloned(),
        })
    }

    async fn finish_session(&self, _session_id: &SessionId) -> Result<(), ApiError> {
        let mut script = self.script();
        script.calls.push(ApiCall::Finish);
        Script::take_failure(&mut script.failing_finishes, "finish")
    }

    async fn reveal_values(&self, case_id: CaseId) -> Result<RevealValues, ApiError> {
        let mut script = self.script();
        script.calls.push(ApiCall::Reveal(case_id));
        Script::take_failure(&mut script.failing_reveals, "reveal")?;
        Ok(script.reveals.get(&case_id).cloned().unwrap_or_default())
    }

    async fn report_case(&self, case_id: CaseId, description: &str) -> Result<(), ApiError> {
        self.script().calls.push(ApiCall::Report {
            case_id,
            description: description.to_string(),
        });
        Ok(())
    }
}

#[async_trait]
impl StatsApi for ScriptedQuizApi {
    async fn quiz_results(&self, session_id: &SessionId) -> Result<SessionResults, ApiError> {
        let mut script = self.script();
        script.calls.push(ApiCall::Results);
        let questions: Vec<QuestionResult> = script
            .answers
            .iter()
            .map(|(question_id, answer)| QuestionResult {
                question_id: *question_id,
                answer: answer.clone(),
                is_correct: script.correct.get(question_id) == Some(answer),
            })
            .collect();
        let total = u32::try_from(questions.len()).unwrap_or(u32::MAX);
        let correct = u32::try_from(questions.iter().filter(|q| q.is_correct).count())
            .unwrap_or(u32::MAX);
        let accuracy = if total == 0 {
            0.0
        } else {
            f64::from(correct) / f64::from(total)
        };
        Ok(SessionResults {
            session_id: session_id.clone(),
            mode: script.mode,
            correct_answers: correct,
            total_questions: total,
            accuracy,
            questions,
            start_time: None,
        })
    }
}

/// A question on a two-parameter case whose id is derived from the question id.
#[must_use]
pub fn sample_question(id: u64, options: &[&str]) -> QuestionView {
    let row = |param: u64, value1: f64, value2: f64| CaseParameter {
        parameter: Parameter {
            id: ParameterId::new(param),
            name: format!("P{param}"),
            description: None,
            reference_values: None,
        },
        values: ParameterValues {
            value1: Some(value1),
            value2: Some(value2),
            value3: None,
        },
    };
    QuestionView {
        id: QuestionId::new(id),
        prompt: None,
        options: options.iter().map(|option| (*option).to_string()).collect(),
        prediction_age: Some(16.0),
        case: CaseData {
            id: CaseId::new(id * 100),
            code: format!("CASE-{id}"),
            gender: "F".into(),
            age1: Some(9.0),
            age2: Some(12.0),
            age3: None,
            parameters: vec![row(1, 80.0, 81.0), row(2, 76.0, 77.5)],
        },
        correct_option: None,
        is_last: false,
    }
}
