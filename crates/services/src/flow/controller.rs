use std::fmt;
use std::sync::Arc;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use tracing::{debug, info, warn};

use quiz_core::model::{
    AnswerSubmission, QuestionView, QuizMode, QuizSession, ScreenSize, StartRequest,
    SubmittedAnswer,
};
use quiz_core::{AnswerTimer, TickOutcome};

use super::state::{ActiveQuestion, Controls, FlowOutcome, FlowState, Phase};
use crate::api::QuizApi;
use crate::error::FlowError;

/// Longest problem report accepted, in characters.
pub const MAX_REPORT_CHARS: usize = 4000;

/// Drives one quiz session from start to finish.
///
/// Every transition takes `&mut self`, so a second action can never start while a
/// previous one is still awaiting the service. State is only written after each
/// awaited call returns; dropping an in-flight transition leaves the flow as it was.
pub struct QuizFlow {
    api: Arc<dyn QuizApi>,
    session: QuizSession,
    screen: ScreenSize,
    state: FlowState,
    timer: Option<AnswerTimer>,
    rng: StdRng,
    question_epoch: u64,
    questions_seen: u32,
    answers_submitted: u32,
    last_error: Option<FlowError>,
}

impl QuizFlow {
    /// Open a session and fetch its first question.
    ///
    /// An empty session finishes immediately. If the first fetch fails the flow is
    /// returned in `Phase::Loading` with the failure in `take_last_error`; `next`
    /// retries it.
    ///
    /// # Errors
    ///
    /// Returns `FlowError::Api` when the session cannot be started, including the
    /// approval, cooldown and test-code refusals, which are never retried.
    pub async fn start(api: Arc<dyn QuizApi>, request: StartRequest) -> Result<Self, FlowError> {
        let session = api.start_session(&request).await?;
        info!(
            session_id = %session.session_id(),
            mode = %session.mode(),
            time_limit = ?session.time_limit().map(|limit| limit.secs()),
            "quiz session started"
        );

        let mut flow = Self::resume(api, session, request.screen);
        if let Err(err) = flow.advance().await {
            warn!(error = %err, "first question could not be loaded");
            flow.last_error = Some(err);
        }
        Ok(flow)
    }

    /// Wrap an already started session. The flow begins in `Phase::Loading`.
    #[must_use]
    pub fn resume(api: Arc<dyn QuizApi>, session: QuizSession, screen: ScreenSize) -> Self {
        Self {
            api,
            session,
            screen,
            state: FlowState::Loading,
            timer: None,
            rng: StdRng::from_os_rng(),
            question_epoch: 0,
            questions_seen: 0,
            answers_submitted: 0,
            last_error: None,
        }
    }

    /// Make timeout picks reproducible.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    //
    // ─── QUERIES ───────────────────────────────────────────────────────────────
    //

    #[must_use]
    pub fn session(&self) -> &QuizSession {
        &self.session
    }

    #[must_use]
    pub fn mode(&self) -> QuizMode {
        self.session.mode()
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        match &self.state {
            FlowState::Loading => Phase::Loading,
            FlowState::Active(active) if active.revealed => Phase::Revealed,
            FlowState::Active(_) => Phase::Answering,
            FlowState::Finished { .. } => Phase::Finished,
            FlowState::Abandoned => Phase::Abandoned,
        }
    }

    #[must_use]
    pub fn question(&self) -> Option<&QuestionView> {
        self.active_ref().map(|active| &active.question)
    }

    #[must_use]
    pub fn selected(&self) -> Option<&str> {
        self.active_ref().and_then(|active| active.selected.as_deref())
    }

    #[must_use]
    pub fn correct_option(&self) -> Option<&str> {
        self.question()
            .and_then(|question| question.correct_option.as_deref())
    }

    #[must_use]
    pub fn is_last_question(&self) -> bool {
        self.question().is_some_and(|question| question.is_last)
    }

    #[must_use]
    pub fn reveal_values_loaded(&self) -> bool {
        self.active_ref().is_some_and(|active| active.reveal_loaded)
    }

    /// Seconds left on the current question, while its countdown runs.
    #[must_use]
    pub fn time_left(&self) -> Option<u32> {
        self.running_timer().map(AnswerTimer::remaining)
    }

    #[must_use]
    pub fn timer_running(&self) -> bool {
        self.running_timer().is_some()
    }

    /// Bumped every time a new question becomes current.
    #[must_use]
    pub fn question_epoch(&self) -> u64 {
        self.question_epoch
    }

    #[must_use]
    pub fn questions_seen(&self) -> u32 {
        self.questions_seen
    }

    #[must_use]
    pub fn answers_submitted(&self) -> u32 {
        self.answers_submitted
    }

    /// True once nothing more will be sent: the finish call succeeded or the
    /// flow was abandoned. A finished flow whose finish call failed is not
    /// settled and `finish` should be retried.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        matches!(
            self.state,
            FlowState::Finished { confirmed: true } | FlowState::Abandoned
        )
    }

    /// Failure recorded by a transition that could not report it directly.
    pub fn take_last_error(&mut self) -> Option<FlowError> {
        self.last_error.take()
    }

    #[must_use]
    pub fn controls(&self) -> Controls {
        let educational = self.mode().reveals_answers();
        match &self.state {
            FlowState::Loading => Controls {
                next: true,
                reveal: false,
                finish: true,
                report: false,
            },
            FlowState::Active(active) => Controls {
                next: !active.question.is_last
                    && if educational {
                        active.revealed
                    } else {
                        active.selected.is_some()
                    },
                reveal: educational && !active.revealed && active.selected.is_some(),
                finish: true,
                report: !active.reported,
            },
            FlowState::Finished { confirmed } => Controls {
                finish: !confirmed,
                ..Controls::default()
            },
            FlowState::Abandoned => Controls::default(),
        }
    }

    //
    // ─── USER ACTIONS ──────────────────────────────────────────────────────────
    //

    /// Choose an option of the current question.
    ///
    /// # Errors
    ///
    /// Returns `FlowError::AnswerLocked` once the answer was submitted or revealed,
    /// `FlowError::UnknownOption` for text that is not one of the options.
    pub fn select(&mut self, option: &str) -> Result<(), FlowError> {
        let active = self.active_mut()?;
        if active.revealed || active.submitted {
            return Err(FlowError::AnswerLocked);
        }
        if !active.question.has_option(option) {
            return Err(FlowError::UnknownOption(option.to_string()));
        }
        active.selected = Some(option.to_string());
        Ok(())
    }

    /// Move to the next question.
    ///
    /// Classic and timed sessions submit the selection first (once per question);
    /// educational sessions only move on after the reveal, without submitting again.
    /// From `Phase::Loading` this retries the failed fetch.
    ///
    /// # Errors
    ///
    /// Returns `FlowError::LastQuestion` on the final question,
    /// `FlowError::NoAnswerSelected` / `FlowError::RevealRequired` when the
    /// question is not ready to leave, and `FlowError::Api` for service failures,
    /// after which the flow stays on the current question.
    pub async fn next(&mut self) -> Result<FlowOutcome, FlowError> {
        if matches!(self.state, FlowState::Loading) {
            return self.advance().await;
        }

        let active = self.active()?;
        if active.question.is_last {
            return Err(FlowError::LastQuestion);
        }
        if self.mode().reveals_answers() {
            if !active.revealed {
                return Err(FlowError::RevealRequired);
            }
        } else {
            if active.selected.is_none() {
                return Err(FlowError::NoAnswerSelected);
            }
            self.submit_pending().await?;
        }
        self.advance().await
    }

    /// Educational only: submit the selection and show the correct answer.
    ///
    /// This is the single submission point of an educational question. The
    /// case's third-age values are then loaded once; if that load fails the
    /// reveal still stands and `load_reveal_values` can retry it.
    ///
    /// # Errors
    ///
    /// Returns `FlowError::RevealUnavailable` outside educational mode,
    /// `FlowError::NoAnswerSelected` without a selection, `FlowError::AnswerLocked`
    /// when already revealed, and `FlowError::Api` if the submission fails.
    pub async fn reveal(&mut self) -> Result<Option<String>, FlowError> {
        if !self.mode().reveals_answers() {
            return Err(FlowError::RevealUnavailable);
        }
        let active = self.active()?;
        if active.revealed {
            return Err(FlowError::AnswerLocked);
        }
        if active.selected.is_none() {
            return Err(FlowError::NoAnswerSelected);
        }

        let ack = self.submit_pending().await?.unwrap_or_default();
        let active = self.active_mut()?;
        active.question.correct_option = ack.correct_option.clone();
        active.revealed = true;
        if let Some(timer) = self.timer.as_mut() {
            timer.stop();
        }
        info!(correct = ?ack.correct_option, "correct answer revealed");

        if let Err(err) = self.load_reveal_values().await {
            warn!(error = %err, "reveal values could not be loaded");
            self.last_error = Some(err);
        }
        Ok(ack.correct_option)
    }

    /// Merge the case's third-age values into the current question.
    ///
    /// Loads at most once per question; returns `false` when already loaded.
    ///
    /// # Errors
    ///
    /// Returns `FlowError::RevealRequired` before the reveal and `FlowError::Api`
    /// when the values cannot be fetched.
    pub async fn load_reveal_values(&mut self) -> Result<bool, FlowError> {
        let active = self.active()?;
        if !active.revealed {
            return Err(FlowError::RevealRequired);
        }
        if active.reveal_loaded {
            return Ok(false);
        }
        let case_id = active.question.case.id;

        let reveal = self.api.reveal_values(case_id).await?;
        let active = self.active_mut()?;
        active.question.case.merge_reveal(&reveal);
        active.reveal_loaded = true;
        debug!(%case_id, rows = reveal.values.len(), "reveal values merged");
        Ok(true)
    }

    /// End the session from any active phase.
    ///
    /// A selected answer that was never submitted is submitted first. Finishing
    /// without any answer is allowed. Calling again after success is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `FlowError::NotActive` after `abandon`, and `FlowError::Api` if the
    /// pending submission or the finish call fails; the flow then stays put.
    pub async fn finish(&mut self) -> Result<(), FlowError> {
        let pending = match &self.state {
            FlowState::Abandoned => return Err(FlowError::NotActive),
            FlowState::Finished { confirmed: true } => return Ok(()),
            FlowState::Active(active) => active.has_pending_answer(),
            FlowState::Loading | FlowState::Finished { confirmed: false } => false,
        };
        if pending {
            self.submit_pending().await?;
        }

        self.api.finish_session(self.session.session_id()).await?;
        self.timer = None;
        self.state = FlowState::Finished { confirmed: true };
        info!(
            session_id = %self.session.session_id(),
            answers = self.answers_submitted,
            "quiz session finished"
        );
        Ok(())
    }

    /// Send a problem report about the current case, once per question.
    ///
    /// # Errors
    ///
    /// Returns `FlowError::EmptyReport` for blank text, `FlowError::AlreadyReported`
    /// for a second report, and `FlowError::Api` if sending fails.
    pub async fn report_problem(&mut self, text: &str) -> Result<(), FlowError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(FlowError::EmptyReport);
        }
        let description: String = text.chars().take(MAX_REPORT_CHARS).collect();

        let active = self.active()?;
        if active.reported {
            return Err(FlowError::AlreadyReported);
        }
        let case_id = active.question.case.id;

        self.api.report_case(case_id, &description).await?;
        self.active_mut()?.reported = true;
        info!(%case_id, "problem reported");
        Ok(())
    }

    /// Leave the quiz without finishing. The timer stops and nothing more is sent.
    ///
    /// Also gives up on a finish call that keeps failing.
    pub fn abandon(&mut self) {
        if self.is_settled() {
            return;
        }
        self.timer = None;
        self.state = FlowState::Abandoned;
        info!(session_id = %self.session.session_id(), "quiz session abandoned");
    }

    //
    // ─── CLOCK ─────────────────────────────────────────────────────────────────
    //

    /// Feed one second to the countdown of a timed question.
    ///
    /// When it reaches zero, a random option is picked if none was chosen, the
    /// answer is submitted and the next question fetched. The countdown is back
    /// at its full length afterwards whatever the outcome.
    ///
    /// # Errors
    ///
    /// Returns `FlowError::Api` when the timeout submission or fetch fails.
    pub async fn tick(&mut self) -> Result<TickOutcome, FlowError> {
        let answering = matches!(self.phase(), Phase::Answering);
        let Some(timer) = self.timer.as_mut().filter(|_| answering) else {
            return Ok(TickOutcome::Stopped);
        };

        let outcome = timer.tick();
        if outcome == TickOutcome::Expired {
            let result = self.on_timeout().await;
            if let Some(timer) = self.timer.as_mut() {
                timer.restart();
            }
            result?;
        }
        Ok(outcome)
    }

    async fn on_timeout(&mut self) -> Result<FlowOutcome, FlowError> {
        let active = self.active()?;
        let submitted = active.submitted;
        let selected = active.selected.clone();
        let options = active.question.options.clone();

        if !submitted {
            let answer = selected.or_else(|| options.choose(&mut self.rng).cloned());
            match answer {
                Some(answer) => {
                    info!(answer = %answer, "time is up, submitting");
                    self.active_mut()?.selected = Some(answer);
                    self.submit_pending().await?;
                }
                None => debug!("time is up on a question without options"),
            }
        }
        self.advance().await
    }

    //
    // ─── INTERNALS ─────────────────────────────────────────────────────────────
    //

    fn active_ref(&self) -> Option<&ActiveQuestion> {
        match &self.state {
            FlowState::Active(active) => Some(active),
            _ => None,
        }
    }

    fn active(&self) -> Result<&ActiveQuestion, FlowError> {
        match &self.state {
            FlowState::Active(active) => Ok(active),
            FlowState::Loading => Err(FlowError::NoQuestion),
            FlowState::Finished { .. } | FlowState::Abandoned => Err(FlowError::NotActive),
        }
    }

    fn active_mut(&mut self) -> Result<&mut ActiveQuestion, FlowError> {
        match &mut self.state {
            FlowState::Active(active) => Ok(active),
            FlowState::Loading => Err(FlowError::NoQuestion),
            FlowState::Finished { .. } | FlowState::Abandoned => Err(FlowError::NotActive),
        }
    }

    fn running_timer(&self) -> Option<&AnswerTimer> {
        if !matches!(self.phase(), Phase::Answering) {
            return None;
        }
        self.timer.as_ref().filter(|timer| timer.is_running())
    }

    /// Submit the current selection unless the service already has it.
    async fn submit_pending(&mut self) -> Result<Option<SubmittedAnswer>, FlowError> {
        let active = self.active()?;
        if active.submitted {
            return Ok(None);
        }
        let Some(answer) = active.selected.clone() else {
            return Err(FlowError::NoAnswerSelected);
        };

        let submission = AnswerSubmission {
            answer,
            screen: self.screen,
        };
        let ack = match self
            .api
            .submit_answer(self.session.session_id(), &submission)
            .await
        {
            Ok(ack) => ack,
            Err(err) => {
                warn!(error = %err, "answer submission failed");
                return Err(err.into());
            }
        };

        self.active_mut()?.submitted = true;
        self.answers_submitted += 1;
        debug!(answer = %submission.answer, "answer recorded");
        Ok(Some(ack))
    }

    /// Fetch the next question, or close the session when there is none.
    async fn advance(&mut self) -> Result<FlowOutcome, FlowError> {
        let next = match self.api.next_question(self.session.session_id()).await {
            Ok(next) => next,
            Err(err) => {
                warn!(error = %err, "next question could not be loaded");
                return Err(err.into());
            }
        };

        let Some(question) = next else {
            self.timer = None;
            self.state = FlowState::Finished { confirmed: false };
            info!("no more questions");
            self.api.finish_session(self.session.session_id()).await?;
            self.state = FlowState::Finished { confirmed: true };
            return Ok(FlowOutcome::Finished);
        };

        self.install(question);
        Ok(FlowOutcome::Continue)
    }

    fn install(&mut self, question: QuestionView) {
        self.question_epoch += 1;
        self.questions_seen += 1;
        debug!(
            question_id = %question.id,
            is_last = question.is_last,
            number = self.questions_seen,
            "question loaded"
        );
        // Replacing the timer drops the previous one.
        self.timer = self
            .session
            .time_limit()
            .filter(|_| self.session.mode().is_timed())
            .map(AnswerTimer::start);
        self.state = FlowState::Active(ActiveQuestion::new(question));
    }
}

impl fmt::Debug for QuizFlow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuizFlow")
            .field("session", &self.session)
            .field("phase", &self.phase())
            .field("timer", &self.timer)
            .field("question_epoch", &self.question_epoch)
            .field("answers_submitted", &self.answers_submitted)
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
