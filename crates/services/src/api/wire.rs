//! JSON shapes spoken by the quiz and stats services, and their decoding into
//! domain types.
//!
//! The services are inconsistent about casing and about where some flags live,
//! so every ambiguity is settled here and never reaches the flow controller.

use reqwest::StatusCode;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use quiz_core::model::{
    CaseData, CaseId, CaseParameter, Parameter, ParameterId, ParameterValues, QuestionId,
    QuestionResult, QuestionView, QuizMode, QuizSession, RevealValues, SessionId, SessionResults,
    StartRejection, StartRequest, SubmittedAnswer, TimeLimit,
};

use crate::error::ApiError;

pub(crate) const IS_LAST_HEADER: &str = "x-quiz-is-last";

//
// ─── REQUEST BODIES ────────────────────────────────────────────────────────────
//

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StartBody<'a> {
    mode: QuizMode,
    screen_width: u32,
    screen_height: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    test_code: Option<&'a str>,
}

impl<'a> StartBody<'a> {
    pub(crate) fn from_request(request: &'a StartRequest) -> Self {
        Self {
            mode: request.mode,
            screen_width: request.screen.width,
            screen_height: request.screen.height,
            test_code: request.test_code(),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct AnswerBody<'a> {
    pub(crate) answer: &'a str,
    pub(crate) screen_size: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct ReportBody<'a> {
    pub(crate) description: &'a str,
}

//
// ─── SCALAR REPRESENTATIONS ────────────────────────────────────────────────────
//

/// Identifiers arrive either as JSON numbers or as strings.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum IdRepr {
    Number(u64),
    Text(String),
}

impl IdRepr {
    fn into_text(self) -> String {
        match self {
            Self::Number(n) => n.to_string(),
            Self::Text(s) => s,
        }
    }

    fn as_u64(&self) -> Option<u64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => s.trim().parse().ok(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NumberRepr {
    Number(f64),
    Text(String),
}

/// Accept `12.5`, `"12.5"` or `null`; unparseable text reads as absent.
fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<NumberRepr>::deserialize(deserializer)?;
    Ok(raw.and_then(|repr| match repr {
        NumberRepr::Number(n) => Some(n),
        NumberRepr::Text(s) => s.trim().parse().ok(),
    }))
}

//
// ─── START ─────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Deserialize)]
struct SessionWire {
    #[serde(rename = "sessionId", alias = "session_id")]
    session_id: IdRepr,
    #[serde(rename = "quizMode", alias = "quiz_mode", default)]
    quiz_mode: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StartResponseWire {
    session: SessionWire,
    #[serde(rename = "timeLimit", alias = "time_limit", default)]
    time_limit: Option<u32>,
}

/// Decode a successful start response. An unknown mode echo falls back to the requested one.
pub(crate) fn decode_session(body: &[u8], requested: QuizMode) -> Result<QuizSession, ApiError> {
    let wire: StartResponseWire = serde_json::from_slice(body)?;
    let mode = wire
        .session
        .quiz_mode
        .as_deref()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(requested);
    Ok(QuizSession::new(
        SessionId::new(wire.session.session_id.into_text()),
        mode,
        wire.time_limit.and_then(TimeLimit::from_secs),
    ))
}

#[derive(Debug, Deserialize)]
struct StartErrorWire {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(rename = "waitSeconds", alias = "wait_seconds", default, deserialize_with = "lenient_number")]
    wait_seconds: Option<f64>,
    #[serde(rename = "cooldownHours", alias = "cooldown_hours", default, deserialize_with = "lenient_number")]
    cooldown_hours: Option<f64>,
    #[serde(rename = "readyAt", alias = "ready_at", default)]
    ready_at: Option<String>,
}

/// Map a failed start response onto the error the user should see.
pub(crate) fn decode_start_failure(status: StatusCode, body: &[u8]) -> ApiError {
    if status == StatusCode::UNAUTHORIZED {
        return ApiError::AuthRequired;
    }

    match serde_json::from_slice::<Value>(body) {
        Ok(Value::String(text)) if !text.trim().is_empty() => {
            StartRejection::Message(text).into()
        }
        Ok(value @ Value::Object(_)) => match serde_json::from_value::<StartErrorWire>(value) {
            Ok(wire) => rejection_from_wire(wire).map_or(ApiError::HttpStatus(status), Into::into),
            Err(_) => ApiError::HttpStatus(status),
        },
        Ok(_) => ApiError::HttpStatus(status),
        Err(_) => {
            let text = String::from_utf8_lossy(body).trim().to_string();
            if text.is_empty() {
                ApiError::HttpStatus(status)
            } else {
                StartRejection::Message(text).into()
            }
        }
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn rejection_from_wire(wire: StartErrorWire) -> Option<StartRejection> {
    match wire.error.as_deref() {
        Some("approval_required") => Some(StartRejection::ApprovalRequired),
        Some("cooldown_active") => Some(StartRejection::CooldownActive {
            wait_seconds: wire.wait_seconds.filter(|s| *s > 0.0).map(|s| s as u64),
            cooldown_hours: wire.cooldown_hours.filter(|h| *h > 0.0).map(|h| h as u32),
            ready_at: wire
                .ready_at
                .as_deref()
                .and_then(|raw| chrono::DateTime::parse_from_rfc3339(raw).ok())
                .map(|at| at.with_timezone(&chrono::Utc)),
        }),
        Some("invalid_test_code") => Some(StartRejection::InvalidTestCode),
        _ => wire.message.map(StartRejection::Message),
    }
}

//
// ─── NEXT QUESTION ─────────────────────────────────────────────────────────────
//

#[derive(Debug, Deserialize)]
struct ParameterWire {
    id: u64,
    #[serde(default)]
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(rename = "referenceValues", alias = "reference_values", default)]
    reference_values: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ParameterValueWire {
    #[serde(rename = "parameterId", alias = "parameter_id", default)]
    parameter_id: Option<u64>,
    #[serde(default, deserialize_with = "lenient_number")]
    value1: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    value2: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    value3: Option<f64>,
}

impl ParameterValueWire {
    fn values(&self) -> ParameterValues {
        ParameterValues {
            value1: self.value1,
            value2: self.value2,
            value3: self.value3,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CaseWire {
    id: u64,
    #[serde(default)]
    code: String,
    #[serde(default)]
    gender: String,
    #[serde(default, deserialize_with = "lenient_number")]
    age1: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    age2: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    age3: Option<f64>,
    #[serde(default)]
    parameters: Vec<ParameterWire>,
    #[serde(rename = "parametersValues", alias = "parameters_values", default)]
    parameters_values: Vec<ParameterValueWire>,
}

impl CaseWire {
    /// Pair every parameter with its values: by `parameterId` when the value row
    /// names one, otherwise by the row at the same index.
    fn into_case(self) -> CaseData {
        let CaseWire {
            id,
            code,
            gender,
            age1,
            age2,
            age3,
            parameters,
            parameters_values,
        } = self;

        let rows = parameters
            .into_iter()
            .enumerate()
            .map(|(index, parameter)| {
                let values = parameters_values
                    .iter()
                    .find(|row| row.parameter_id == Some(parameter.id))
                    .or_else(|| {
                        parameters_values
                            .get(index)
                            .filter(|row| row.parameter_id.is_none())
                    })
                    .map(ParameterValueWire::values)
                    .unwrap_or_default();
                CaseParameter {
                    parameter: Parameter {
                        id: ParameterId::new(parameter.id),
                        name: parameter.name,
                        description: parameter.description,
                        reference_values: parameter.reference_values,
                    },
                    values,
                }
            })
            .collect();

        CaseData {
            id: CaseId::new(id),
            code,
            gender,
            age1,
            age2,
            age3,
            parameters: rows,
        }
    }
}

#[derive(Debug, Deserialize)]
struct QuestionWire {
    id: u64,
    #[serde(default)]
    question: Option<String>,
    #[serde(default)]
    options: Vec<String>,
    #[serde(rename = "predictionAge", alias = "prediction_age", default, deserialize_with = "lenient_number")]
    prediction_age: Option<f64>,
    case: CaseWire,
}

impl QuestionWire {
    fn into_view(self, is_last: bool) -> QuestionView {
        QuestionView {
            id: QuestionId::new(self.id),
            prompt: self.question,
            options: self.options,
            prediction_age: self.prediction_age,
            case: self.case.into_case(),
            correct_option: None,
            is_last,
        }
    }
}

/// Where the "this is the last question" signal was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LastSignal {
    Header(bool),
    Body(bool),
}

impl LastSignal {
    fn raised(self) -> bool {
        match self {
            Self::Header(flag) | Self::Body(flag) => flag,
        }
    }
}

fn header_signal(raw: Option<&str>) -> LastSignal {
    LastSignal::Header(raw.is_some_and(|value| value.trim().eq_ignore_ascii_case("true")))
}

fn body_signal(envelope: &Map<String, Value>) -> LastSignal {
    let raw = envelope
        .get("is_last")
        .filter(|value| !value.is_null())
        .or_else(|| envelope.get("isLast"));
    let flag = match raw {
        Some(Value::Bool(flag)) => *flag,
        Some(Value::String(text)) => text.trim().eq_ignore_ascii_case("true"),
        Some(Value::Number(n)) => n.as_u64() == Some(1),
        _ => false,
    };
    LastSignal::Body(flag)
}

/// Decode a `nextQuestion` response.
///
/// `204 No Content` is the normal end-of-quiz signal and yields `None`. The body is
/// either an envelope `{question, is_last?}` or a bare question object that may
/// carry `is_last` itself; the last flag is the OR of the header and the body.
pub(crate) fn decode_next_question(
    status: StatusCode,
    is_last_header: Option<&str>,
    body: &[u8],
) -> Result<Option<QuestionView>, ApiError> {
    if status == StatusCode::NO_CONTENT {
        return Ok(None);
    }

    let value: Value = serde_json::from_slice(body)?;
    let mut signals = vec![header_signal(is_last_header)];
    let payload = match value {
        Value::Object(mut envelope) if envelope.get("question").is_some_and(Value::is_object) => {
            signals.push(body_signal(&envelope));
            envelope.remove("question").unwrap_or(Value::Null)
        }
        Value::Object(question) => {
            signals.push(body_signal(&question));
            Value::Object(question)
        }
        other => other,
    };

    let question: QuestionWire = serde_json::from_value(payload)?;
    let is_last = signals.into_iter().any(LastSignal::raised);
    Ok(Some(question.into_view(is_last)))
}

//
// ─── ANSWER / REVEAL ───────────────────────────────────────────────────────────
//

/// Read the acknowledgement of a stored answer.
///
/// Only a JSON object with a string `correct` carries information; any other
/// body (empty, plain text, `true`, a non-string `correct`) is an ack without
/// a correct option.
pub(crate) fn decode_submitted(body: &[u8]) -> SubmittedAnswer {
    let correct_option = serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|value| {
            value
                .get("correct")
                .and_then(Value::as_str)
                .map(str::to_owned)
        });
    SubmittedAnswer { correct_option }
}

#[derive(Debug, Deserialize)]
struct RevealItemWire {
    #[serde(default)]
    parameter_id: Option<u64>,
    #[serde(rename = "parameterId", default)]
    parameter_id_camel: Option<u64>,
    #[serde(default)]
    id: Option<u64>,
    #[serde(default, deserialize_with = "lenient_number")]
    value3: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RevealWire {
    #[serde(default, deserialize_with = "lenient_number")]
    age3: Option<f64>,
    #[serde(default)]
    values: Vec<RevealItemWire>,
}

/// Items are keyed by `parameter_id`, then `parameterId`, then `id`; items with none are dropped.
pub(crate) fn decode_reveal(body: &[u8]) -> Result<RevealValues, ApiError> {
    let wire: RevealWire = serde_json::from_slice(body)?;
    let values = wire.values.into_iter().filter_map(|item| {
        let id = item.parameter_id.or(item.parameter_id_camel).or(item.id)?;
        Some((ParameterId::new(id), item.value3))
    });
    Ok(RevealValues::new(wire.age3, values))
}

//
// ─── RESULTS ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Deserialize)]
struct QuestionResultWire {
    #[serde(rename = "questionId", alias = "question_id")]
    question_id: IdRepr,
    #[serde(default)]
    answer: String,
    #[serde(rename = "isCorrect", alias = "is_correct", default)]
    is_correct: bool,
}

#[derive(Debug, Deserialize)]
struct ResultsWire {
    #[serde(rename = "sessionId", alias = "session_id")]
    session_id: IdRepr,
    #[serde(default)]
    mode: Option<String>,
    #[serde(rename = "correctAnswers", alias = "correct_answers", default)]
    correct_answers: u32,
    #[serde(rename = "totalQuestions", alias = "total_questions", default)]
    total_questions: u32,
    #[serde(default)]
    accuracy: f64,
    #[serde(default)]
    questions: Vec<QuestionResultWire>,
    #[serde(rename = "startTime", alias = "start_time", default)]
    start_time: Option<String>,
}

pub(crate) fn decode_results(body: &[u8]) -> Result<SessionResults, ApiError> {
    let wire: ResultsWire = serde_json::from_slice(body)?;
    let questions = wire
        .questions
        .into_iter()
        .filter_map(|q| {
            Some(QuestionResult {
                question_id: QuestionId::new(q.question_id.as_u64()?),
                answer: q.answer,
                is_correct: q.is_correct,
            })
        })
        .collect();
    Ok(SessionResults {
        session_id: SessionId::new(wire.session_id.into_text()),
        mode: wire.mode.as_deref().and_then(|raw| raw.parse().ok()),
        correct_answers: wire.correct_answers,
        total_questions: wire.total_questions,
        accuracy: wire.accuracy,
        questions,
        start_time: wire.start_time,
    })
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
