use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use tracing::{debug, warn};
use url::Url;

use quiz_core::model::{
    AnswerSubmission, CaseId, QuestionView, QuizSession, RevealValues, SessionId, SessionResults,
    StartRequest, SubmittedAnswer,
};

use super::config::{ApiConfig, endpoint};
use super::wire::{
    AnswerBody, IS_LAST_HEADER, ReportBody, StartBody, decode_next_question,
    decode_reveal, decode_results, decode_session, decode_start_failure, decode_submitted,
};
use super::{QuizApi, StatsApi};
use crate::error::ApiError;

/// reqwest-backed client for the quiz and stats services.
#[derive(Clone, Debug)]
pub struct HttpQuizClient {
    client: Client,
    config: ApiConfig,
}

impl HttpQuizClient {
    #[must_use]
    pub fn new(config: ApiConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    /// Use a preconfigured reqwest client, e.g. with timeouts or without proxies.
    #[must_use]
    pub fn with_client(client: Client, config: ApiConfig) -> Self {
        Self { client, config }
    }

    /// Build a client from `QUIZ_SERVICE_URL`, `STATS_SERVICE_URL` and `QUIZ_ACCESS_TOKEN`.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::InvalidUrl` if a configured URL does not parse.
    pub fn from_env() -> Result<Self, ApiError> {
        Ok(Self::new(ApiConfig::from_env()?))
    }

    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    fn quiz_url(&self, segments: &[&str]) -> Result<Url, ApiError> {
        endpoint(&self.config.quiz_base_url, segments)
    }

    fn stats_url(&self, segments: &[&str]) -> Result<Url, ApiError> {
        endpoint(&self.config.stats_base_url, segments)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.access_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        let response = self.authorize(request).send().await?;
        check_status(response)
    }
}

fn check_status(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status == StatusCode::UNAUTHORIZED {
        return Err(ApiError::AuthRequired);
    }
    if !status.is_success() {
        warn!(%status, url = %response.url(), "quiz service request failed");
        return Err(ApiError::HttpStatus(status));
    }
    Ok(response)
}

#[async_trait]
impl QuizApi for HttpQuizClient {
    async fn start_session(&self, request: &StartRequest) -> Result<QuizSession, ApiError> {
        let url = self.quiz_url(&["sessions", "new"])?;
        debug!(mode = %request.mode, has_test_code = request.test_code().is_some(), "starting quiz session");
        let response = self
            .authorize(self.client.post(url).json(&StartBody::from_request(request)))
            .send()
            .await?;

        let status = response.status();
        let body = response.bytes().await?;
        if !status.is_success() {
            let err = decode_start_failure(status, &body);
            warn!(%status, error = %err, "quiz session start rejected");
            return Err(err);
        }
        decode_session(&body, request.mode)
    }

    async fn next_question(&self, session_id: &SessionId) -> Result<Option<QuestionView>, ApiError> {
        let url = self.quiz_url(&["sessions", session_id.as_str(), "nextQuestion"])?;
        let response = self.send(self.client.get(url)).await?;

        let status = response.status();
        let is_last_header = response
            .headers()
            .get(IS_LAST_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);
        let body = response.bytes().await?;
        debug!(%session_id, %status, ?is_last_header, "fetched next question");
        decode_next_question(status, is_last_header.as_deref(), &body)
    }

    async fn submit_answer(
        &self,
        session_id: &SessionId,
        submission: &AnswerSubmission,
    ) -> Result<SubmittedAnswer, ApiError> {
        let url = self.quiz_url(&["sessions", session_id.as_str(), "answer"])?;
        let body = AnswerBody {
            answer: &submission.answer,
            screen_size: submission.screen.to_string(),
        };
        let response = self.send(self.client.post(url).json(&body)).await?;
        // From here on the service has stored the answer; a bad ack body must
        // not turn into a failure that invites a second submission.
        let ack = match response.bytes().await {
            Ok(body) => decode_submitted(&body),
            Err(err) => {
                warn!(error = %err, "answer acknowledgement could not be read");
                SubmittedAnswer::default()
            }
        };
        debug!(%session_id, correct = ?ack.correct_option, "answer submitted");
        Ok(ack)
    }

    async fn finish_session(&self, session_id: &SessionId) -> Result<(), ApiError> {
        let url = self.quiz_url(&["sessions", session_id.as_str(), "finish"])?;
        self.send(self.client.post(url)).await?;
        debug!(%session_id, "session finished");
        Ok(())
    }

    async fn reveal_values(&self, case_id: CaseId) -> Result<RevealValues, ApiError> {
        let url = self.quiz_url(&["cases", case_id.to_string().as_str(), "parameters", "v3"])?;
        let response = self.send(self.client.get(url)).await?;
        let body = response.bytes().await?;
        decode_reveal(&body)
    }

    async fn report_case(&self, case_id: CaseId, description: &str) -> Result<(), ApiError> {
        let url = self.quiz_url(&["cases", case_id.to_string().as_str(), "report"])?;
        self.send(self.client.post(url).json(&ReportBody { description }))
            .await?;
        debug!(%case_id, "case problem reported");
        Ok(())
    }
}

#[async_trait]
impl StatsApi for HttpQuizClient {
    async fn quiz_results(&self, session_id: &SessionId) -> Result<SessionResults, ApiError> {
        let url = self.stats_url(&["quiz", session_id.as_str()])?;
        let response = self.send(self.client.get(url)).await?;
        let body = response.bytes().await?;
        decode_results(&body)
    }
}
