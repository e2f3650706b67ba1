use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use quiz_core::model::{
    AnswerSubmission, CaseId, ParameterId, QuestionId, QuestionView, QuizMode, QuizSession,
    RevealValues, ScreenSize, SessionId, StartRejection, StartRequest, SubmittedAnswer, TimeLimit,
};
use services::api::{ApiCall, sample_question};
use services::{
    ApiError, Controls, FlowError, FlowOutcome, Phase, QuizApi, QuizFlow, ScriptedQuizApi,
    TickOutcome,
};

async fn start(api: &ScriptedQuizApi, mode: QuizMode) -> QuizFlow {
    let request = StartRequest::new(mode, ScreenSize::new(1280, 800));
    QuizFlow::start(Arc::new(api.clone()), request)
        .await
        .unwrap()
        .with_seed(42)
}

fn last(mut question: quiz_core::model::QuestionView) -> quiz_core::model::QuestionView {
    question.is_last = true;
    question
}

async fn tick_times(flow: &mut QuizFlow, n: u32) -> TickOutcome {
    let mut outcome = TickOutcome::Stopped;
    for _ in 0..n {
        outcome = flow.tick().await.unwrap();
    }
    outcome
}

//
// ─── CLASSIC ───────────────────────────────────────────────────────────────────
//

#[tokio::test]
async fn classic_session_ends_when_questions_run_out() {
    let api = ScriptedQuizApi::new().with_questions([
        sample_question(1, &["A", "B"]),
        sample_question(2, &["A", "B"]),
        sample_question(3, &["A", "B"]),
    ]);
    let mut flow = start(&api, QuizMode::Classic).await;

    for expected in [FlowOutcome::Continue, FlowOutcome::Continue, FlowOutcome::Finished] {
        flow.select("B").unwrap();
        assert_eq!(flow.next().await.unwrap(), expected);
    }

    assert_eq!(flow.phase(), Phase::Finished);
    assert_eq!(api.submit_count(), 3);
    assert_eq!(api.fetch_count(), 4);
    assert_eq!(api.finish_count(), 1);
    assert_eq!(flow.questions_seen(), 3);
    assert_eq!(flow.answers_submitted(), 3);
}

#[tokio::test]
async fn next_requires_a_selection_in_classic_mode() {
    let api = ScriptedQuizApi::new().with_questions([sample_question(1, &["A"])]);
    let mut flow = start(&api, QuizMode::Classic).await;

    assert!(matches!(
        flow.next().await.unwrap_err(),
        FlowError::NoAnswerSelected
    ));
    assert_eq!(api.submit_count(), 0);
    assert_eq!(api.fetch_count(), 1);
}

#[tokio::test]
async fn failed_fetch_keeps_question_and_retry_does_not_resubmit() {
    let api = ScriptedQuizApi::new().with_questions([
        sample_question(1, &["A", "B"]),
        sample_question(2, &["A", "B"]),
    ]);
    let mut flow = start(&api, QuizMode::Classic).await;
    flow.select("A").unwrap();

    api.fail_next_fetches(1);
    let err = flow.next().await.unwrap_err();
    assert!(matches!(err, FlowError::Api(ApiError::Unavailable(_))));
    assert_eq!(flow.phase(), Phase::Answering);
    assert_eq!(flow.question().unwrap().id, QuestionId::new(1));
    assert_eq!(api.submit_count(), 1);

    assert_eq!(flow.next().await.unwrap(), FlowOutcome::Continue);
    assert_eq!(flow.question().unwrap().id, QuestionId::new(2));
    assert_eq!(api.submit_count(), 1);
    assert_eq!(api.submitted_answers(), vec!["A".to_string()]);
}

#[tokio::test]
async fn failed_submit_keeps_selection_for_retry() {
    let api = ScriptedQuizApi::new().with_questions([
        sample_question(1, &["A", "B"]),
        sample_question(2, &["A", "B"]),
    ]);
    let mut flow = start(&api, QuizMode::Classic).await;
    flow.select("B").unwrap();

    api.fail_next_submits(1);
    assert!(flow.next().await.is_err());
    assert_eq!(flow.selected(), Some("B"));
    assert_eq!(api.fetch_count(), 1);

    flow.next().await.unwrap();
    assert_eq!(api.submitted_answers(), vec!["B".to_string()]);
    assert_eq!(api.fetch_count(), 2);
}

#[tokio::test]
async fn last_question_disables_next_but_not_finish() {
    let api = ScriptedQuizApi::new().with_questions([last(sample_question(1, &["A", "B"]))]);
    let mut flow = start(&api, QuizMode::Classic).await;
    flow.select("A").unwrap();

    assert!(flow.is_last_question());
    let controls = flow.controls();
    assert!(!controls.next);
    assert!(controls.finish);

    assert!(matches!(
        flow.next().await.unwrap_err(),
        FlowError::LastQuestion
    ));
    assert_eq!(api.submit_count(), 0);
    assert_eq!(api.fetch_count(), 1);
}

#[tokio::test]
async fn finish_submits_pending_answer_first() {
    let api = ScriptedQuizApi::new().with_questions([last(sample_question(1, &["A", "B"]))]);
    let mut flow = start(&api, QuizMode::Classic).await;
    flow.select("A").unwrap();

    flow.finish().await.unwrap();

    let tail: Vec<_> = api.calls().into_iter().skip(2).collect();
    assert_eq!(
        tail,
        vec![
            ApiCall::Submit {
                answer: "A".into()
            },
            ApiCall::Finish
        ]
    );
    assert_eq!(flow.phase(), Phase::Finished);
    assert_eq!(flow.controls(), Controls::default());
}

#[tokio::test]
async fn finish_without_answers_is_allowed_and_idempotent() {
    let api = ScriptedQuizApi::new().with_questions([sample_question(1, &["A"])]);
    let mut flow = start(&api, QuizMode::Classic).await;

    flow.finish().await.unwrap();
    flow.finish().await.unwrap();

    assert_eq!(api.submit_count(), 0);
    assert_eq!(api.finish_count(), 1);
}

#[tokio::test]
async fn failed_automatic_finish_stays_open_until_retried() {
    let api = ScriptedQuizApi::new().with_questions([sample_question(1, &["A"])]);
    let mut flow = start(&api, QuizMode::Classic).await;
    flow.select("A").unwrap();
    api.fail_next_finishes(1);

    assert!(matches!(flow.next().await.unwrap_err(), FlowError::Api(_)));
    assert_eq!(flow.phase(), Phase::Finished);
    assert!(!flow.is_settled());
    assert!(flow.controls().finish);
    assert_eq!(api.finish_count(), 1);

    flow.finish().await.unwrap();

    assert!(flow.is_settled());
    assert_eq!(flow.controls(), Controls::default());
    assert_eq!(api.finish_count(), 2);
    assert_eq!(api.submit_count(), 1);
    assert_eq!(api.fetch_count(), 2);
}

#[tokio::test]
async fn unclosed_session_can_still_be_abandoned() {
    let api = ScriptedQuizApi::new().with_questions([sample_question(1, &["A"])]);
    let mut flow = start(&api, QuizMode::Classic).await;
    flow.select("A").unwrap();
    api.fail_next_finishes(1);
    assert!(flow.next().await.is_err());

    flow.abandon();

    assert_eq!(flow.phase(), Phase::Abandoned);
    assert!(flow.is_settled());
    assert!(matches!(flow.finish().await.unwrap_err(), FlowError::NotActive));
    assert_eq!(api.finish_count(), 1);
}

#[tokio::test]
async fn finished_flow_fetches_nothing_more() {
    let api = ScriptedQuizApi::new().with_questions([sample_question(1, &["A"])]);
    let mut flow = start(&api, QuizMode::Classic).await;
    flow.select("A").unwrap();
    assert_eq!(flow.next().await.unwrap(), FlowOutcome::Finished);
    let fetches = api.fetch_count();

    assert!(matches!(flow.next().await.unwrap_err(), FlowError::NotActive));
    assert!(matches!(flow.select("A").unwrap_err(), FlowError::NotActive));
    assert_eq!(api.fetch_count(), fetches);
}

//
// ─── START ─────────────────────────────────────────────────────────────────────
//

#[tokio::test]
async fn empty_session_finishes_immediately() {
    let api = ScriptedQuizApi::new();
    let flow = start(&api, QuizMode::Classic).await;

    assert_eq!(flow.phase(), Phase::Finished);
    assert_eq!(flow.questions_seen(), 0);
    assert_eq!(api.fetch_count(), 1);
    assert_eq!(api.finish_count(), 1);
}

#[tokio::test]
async fn start_rejection_is_surfaced_once() {
    let api = ScriptedQuizApi::new()
        .rejecting_start(StartRejection::InvalidTestCode)
        .with_questions([sample_question(1, &["A"])]);
    let request = StartRequest::new(QuizMode::Classic, ScreenSize::default())
        .with_test_code(Some(" T-99 "));

    let err = QuizFlow::start(Arc::new(api.clone()), request)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        FlowError::Api(ApiError::StartRejected(StartRejection::InvalidTestCode))
    ));
    assert_eq!(
        api.calls(),
        vec![ApiCall::Start {
            mode: QuizMode::Classic,
            test_code: Some("T-99".into()),
        }]
    );
}

#[tokio::test]
async fn failed_first_fetch_leaves_flow_loading() {
    let api = ScriptedQuizApi::new().with_questions([sample_question(1, &["A"])]);
    api.fail_next_fetches(1);
    let mut flow = start(&api, QuizMode::Classic).await;

    assert_eq!(flow.phase(), Phase::Loading);
    assert!(flow.take_last_error().is_some());
    assert!(flow.take_last_error().is_none());
    assert!(flow.controls().next);
    assert!(matches!(flow.select("A").unwrap_err(), FlowError::NoQuestion));

    assert_eq!(flow.next().await.unwrap(), FlowOutcome::Continue);
    assert_eq!(flow.phase(), Phase::Answering);
    assert_eq!(api.submit_count(), 0);
}

//
// ─── EDUCATIONAL ───────────────────────────────────────────────────────────────
//

fn educational_api() -> ScriptedQuizApi {
    ScriptedQuizApi::new()
        .with_questions([
            sample_question(1, &["Anterior", "Posterior"]),
            sample_question(2, &["Anterior", "Posterior"]),
        ])
        .with_correct_option(QuestionId::new(1), "Posterior")
        .with_reveal(
            CaseId::new(100),
            RevealValues::new(
                Some(18.0),
                [
                    (ParameterId::new(2), Some(79.5)),
                    (ParameterId::new(1), Some(83.0)),
                ],
            ),
        )
}

#[tokio::test]
async fn reveal_submits_once_and_next_does_not_resubmit() {
    let api = educational_api();
    let mut flow = start(&api, QuizMode::Educational).await;

    flow.select("Anterior").unwrap();
    assert!(flow.controls().reveal);
    assert!(!flow.controls().next);

    let correct = flow.reveal().await.unwrap();
    assert_eq!(correct.as_deref(), Some("Posterior"));
    assert_eq!(flow.correct_option(), Some("Posterior"));
    assert_eq!(flow.phase(), Phase::Revealed);
    assert_eq!(api.submitted_answers(), vec!["Anterior".to_string()]);

    assert_eq!(flow.next().await.unwrap(), FlowOutcome::Continue);
    assert_eq!(api.submit_count(), 1);
    assert_eq!(flow.phase(), Phase::Answering);
}

#[tokio::test]
async fn next_before_reveal_is_refused_in_educational_mode() {
    let api = educational_api();
    let mut flow = start(&api, QuizMode::Educational).await;
    flow.select("Anterior").unwrap();

    assert!(matches!(
        flow.next().await.unwrap_err(),
        FlowError::RevealRequired
    ));
    assert_eq!(api.submit_count(), 0);
}

#[tokio::test]
async fn reveal_merges_values_by_parameter_once() {
    let api = educational_api();
    let mut flow = start(&api, QuizMode::Educational).await;
    flow.select("Anterior").unwrap();
    flow.reveal().await.unwrap();

    let case = &flow.question().unwrap().case;
    assert_eq!(case.age3, Some(18.0));
    let first = case.parameter(ParameterId::new(1)).unwrap();
    let second = case.parameter(ParameterId::new(2)).unwrap();
    assert_eq!(first.values.value3, Some(83.0));
    assert_eq!(second.values.value3, Some(79.5));
    assert_eq!(first.values.value1, Some(80.0));

    assert!(flow.reveal_values_loaded());
    assert!(!flow.load_reveal_values().await.unwrap());
    assert_eq!(api.reveal_count(), 1);
}

#[tokio::test]
async fn failed_reveal_values_keep_the_reveal_and_can_be_retried() {
    let api = educational_api();
    api.fail_next_reveals(1);
    let mut flow = start(&api, QuizMode::Educational).await;
    flow.select("Anterior").unwrap();

    flow.reveal().await.unwrap();
    assert_eq!(flow.phase(), Phase::Revealed);
    assert!(!flow.reveal_values_loaded());
    assert!(flow.take_last_error().is_some());

    assert!(flow.load_reveal_values().await.unwrap());
    assert_eq!(flow.question().unwrap().case.age3, Some(18.0));
    assert_eq!(api.submit_count(), 1);
}

#[tokio::test]
async fn selection_is_locked_after_reveal() {
    let api = educational_api();
    let mut flow = start(&api, QuizMode::Educational).await;
    flow.select("Anterior").unwrap();
    flow.reveal().await.unwrap();

    assert!(matches!(
        flow.select("Posterior").unwrap_err(),
        FlowError::AnswerLocked
    ));
    assert!(matches!(
        flow.reveal().await.unwrap_err(),
        FlowError::AnswerLocked
    ));
    assert_eq!(flow.selected(), Some("Anterior"));
    assert_eq!(api.submit_count(), 1);
}

#[tokio::test]
async fn finish_after_reveal_does_not_resubmit() {
    let api = educational_api();
    let mut flow = start(&api, QuizMode::Educational).await;
    flow.select("Anterior").unwrap();
    flow.reveal().await.unwrap();

    flow.finish().await.unwrap();

    assert_eq!(api.submit_count(), 1);
    assert_eq!(api.finish_count(), 1);
}

#[tokio::test]
async fn reveal_is_unavailable_outside_educational_mode() {
    let api = ScriptedQuizApi::new().with_questions([sample_question(1, &["A"])]);
    let mut flow = start(&api, QuizMode::Classic).await;
    flow.select("A").unwrap();

    assert!(matches!(
        flow.reveal().await.unwrap_err(),
        FlowError::RevealUnavailable
    ));
    assert!(!flow.controls().reveal);
    assert_eq!(api.submit_count(), 0);
}

//
// ─── TIME LIMITED ──────────────────────────────────────────────────────────────
//

fn timed_api(secs: u32) -> ScriptedQuizApi {
    ScriptedQuizApi::new()
        .with_time_limit(TimeLimit::from_secs(secs).unwrap())
        .with_questions([
            sample_question(1, &["Anterior", "Posterior", "Neutral"]),
            sample_question(2, &["Anterior", "Posterior", "Neutral"]),
            sample_question(3, &["Anterior", "Posterior", "Neutral"]),
        ])
}

#[tokio::test]
async fn timeout_submits_a_random_option_and_advances() {
    let api = timed_api(30);
    let mut flow = start(&api, QuizMode::TimeLimited).await;
    assert_eq!(flow.time_left(), Some(30));

    assert_eq!(tick_times(&mut flow, 29).await, TickOutcome::Running(1));
    assert_eq!(api.submit_count(), 0);

    assert_eq!(flow.tick().await.unwrap(), TickOutcome::Expired);

    let answers = api.submitted_answers();
    assert_eq!(answers.len(), 1);
    assert!(["Anterior", "Posterior", "Neutral"].contains(&answers[0].as_str()));
    assert_eq!(api.fetch_count(), 2);
    assert_eq!(flow.question().unwrap().id, QuestionId::new(2));
    assert_eq!(flow.time_left(), Some(30));
    assert_eq!(flow.selected(), None);
}

#[tokio::test]
async fn timeout_submits_the_users_selection() {
    let api = timed_api(3);
    let mut flow = start(&api, QuizMode::TimeLimited).await;
    flow.select("Neutral").unwrap();

    assert_eq!(tick_times(&mut flow, 3).await, TickOutcome::Expired);

    assert_eq!(api.submitted_answers(), vec!["Neutral".to_string()]);
    assert_eq!(flow.question().unwrap().id, QuestionId::new(2));
}

#[tokio::test]
async fn timeout_failure_resets_timer_and_keeps_the_question() {
    let api = timed_api(2);
    let mut flow = start(&api, QuizMode::TimeLimited).await;

    flow.tick().await.unwrap();
    api.fail_next_fetches(1);
    assert!(flow.tick().await.is_err());

    assert_eq!(flow.phase(), Phase::Answering);
    assert_eq!(flow.question().unwrap().id, QuestionId::new(1));
    assert_eq!(flow.time_left(), Some(2));
    assert_eq!(api.submit_count(), 1);

    // The picked answer was already recorded; the retry only fetches.
    assert_eq!(tick_times(&mut flow, 2).await, TickOutcome::Expired);
    assert_eq!(api.submit_count(), 1);
    assert_eq!(flow.question().unwrap().id, QuestionId::new(2));
}

#[tokio::test]
async fn new_question_restarts_the_countdown() {
    let api = timed_api(30);
    let mut flow = start(&api, QuizMode::TimeLimited).await;
    let epoch = flow.question_epoch();

    tick_times(&mut flow, 12).await;
    assert_eq!(flow.time_left(), Some(18));

    flow.select("Anterior").unwrap();
    flow.next().await.unwrap();

    assert_eq!(flow.question_epoch(), epoch + 1);
    assert_eq!(flow.time_left(), Some(30));
    assert_eq!(api.submit_count(), 1);
}

#[tokio::test]
async fn finished_flow_ignores_ticks() {
    let api = timed_api(5);
    let mut flow = start(&api, QuizMode::TimeLimited).await;

    flow.finish().await.unwrap();

    assert!(!flow.timer_running());
    assert_eq!(flow.time_left(), None);
    assert_eq!(tick_times(&mut flow, 10).await, TickOutcome::Stopped);
    assert_eq!(api.submit_count(), 0);
    assert_eq!(api.fetch_count(), 1);
}

#[tokio::test]
async fn untimed_modes_never_tick() {
    let api = ScriptedQuizApi::new().with_questions([sample_question(1, &["A"])]);
    let mut flow = start(&api, QuizMode::Classic).await;

    assert_eq!(flow.session().time_limit(), None);
    assert_eq!(tick_times(&mut flow, 100).await, TickOutcome::Stopped);
    assert_eq!(api.submit_count(), 0);
}

#[tokio::test]
async fn timeout_on_the_last_question_finishes_the_session() {
    let api = ScriptedQuizApi::new()
        .with_time_limit(TimeLimit::from_secs(1).unwrap())
        .with_questions([last(sample_question(1, &["A", "B"]))]);
    let mut flow = start(&api, QuizMode::TimeLimited).await;

    assert_eq!(flow.tick().await.unwrap(), TickOutcome::Expired);

    assert_eq!(flow.phase(), Phase::Finished);
    assert_eq!(api.submit_count(), 1);
    assert_eq!(api.finish_count(), 1);
}

//
// ─── CANCELLATION ──────────────────────────────────────────────────────────────
//

/// Holds selected calls open for a minute before handing them to the script.
#[derive(Clone, Default)]
struct StallingApi {
    inner: ScriptedQuizApi,
    stall_fetch: Arc<AtomicBool>,
    stall_submit: Arc<AtomicBool>,
}

impl StallingApi {
    async fn stall_if(flag: &AtomicBool) {
        if flag.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_secs(60)).await;
        }
    }
}

#[async_trait]
impl QuizApi for StallingApi {
    async fn start_session(&self, request: &StartRequest) -> Result<QuizSession, ApiError> {
        self.inner.start_session(request).await
    }

    async fn next_question(&self, session_id: &SessionId) -> Result<Option<QuestionView>, ApiError> {
        Self::stall_if(&self.stall_fetch).await;
        self.inner.next_question(session_id).await
    }

    async fn submit_answer(
        &self,
        session_id: &SessionId,
        submission: &AnswerSubmission,
    ) -> Result<SubmittedAnswer, ApiError> {
        Self::stall_if(&self.stall_submit).await;
        self.inner.submit_answer(session_id, submission).await
    }

    async fn finish_session(&self, session_id: &SessionId) -> Result<(), ApiError> {
        self.inner.finish_session(session_id).await
    }

    async fn reveal_values(&self, case_id: CaseId) -> Result<RevealValues, ApiError> {
        self.inner.reveal_values(case_id).await
    }

    async fn report_case(&self, case_id: CaseId, description: &str) -> Result<(), ApiError> {
        self.inner.report_case(case_id, description).await
    }
}

async fn start_stalling(api: &StallingApi) -> QuizFlow {
    let request = StartRequest::new(QuizMode::TimeLimited, ScreenSize::new(1280, 800));
    QuizFlow::start(Arc::new(api.clone()), request)
        .await
        .unwrap()
        .with_seed(42)
}

const GIVE_UP: Duration = Duration::from_millis(20);

#[tokio::test]
async fn dropped_fetch_leaves_the_question_in_place() {
    let api = StallingApi {
        inner: timed_api(30),
        ..StallingApi::default()
    };
    let mut flow = start_stalling(&api).await;
    flow.select("Anterior").unwrap();
    tick_times(&mut flow, 3).await;
    let epoch = flow.question_epoch();

    api.stall_fetch.store(true, Ordering::SeqCst);
    assert!(tokio::time::timeout(GIVE_UP, flow.next()).await.is_err());

    assert_eq!(flow.phase(), Phase::Answering);
    assert_eq!(flow.question().unwrap().id, QuestionId::new(1));
    assert_eq!(flow.questions_seen(), 1);
    assert_eq!(flow.question_epoch(), epoch);
    assert_eq!(flow.time_left(), Some(27));
    // The submit finished before the fetch stalled, so the answer is locked in.
    assert_eq!(api.inner.submit_count(), 1);
    assert_eq!(flow.answers_submitted(), 1);
    assert!(matches!(
        flow.select("Posterior").unwrap_err(),
        FlowError::AnswerLocked
    ));

    api.stall_fetch.store(false, Ordering::SeqCst);
    assert_eq!(flow.next().await.unwrap(), FlowOutcome::Continue);
    assert_eq!(flow.question().unwrap().id, QuestionId::new(2));
    assert_eq!(flow.time_left(), Some(30));
    assert_eq!(api.inner.submit_count(), 1);
}

#[tokio::test]
async fn dropped_submit_leaves_the_answer_open() {
    let api = StallingApi {
        inner: timed_api(30),
        ..StallingApi::default()
    };
    let mut flow = start_stalling(&api).await;
    flow.select("Anterior").unwrap();
    tick_times(&mut flow, 5).await;

    api.stall_submit.store(true, Ordering::SeqCst);
    assert!(tokio::time::timeout(GIVE_UP, flow.next()).await.is_err());

    assert_eq!(flow.question().unwrap().id, QuestionId::new(1));
    assert_eq!(flow.questions_seen(), 1);
    assert_eq!(flow.time_left(), Some(25));
    assert_eq!(flow.selected(), Some("Anterior"));
    assert_eq!(flow.answers_submitted(), 0);
    assert_eq!(api.inner.submit_count(), 0);

    // Nothing reached the service, so the answer can still change.
    flow.select("Neutral").unwrap();
    api.stall_submit.store(false, Ordering::SeqCst);
    assert_eq!(flow.next().await.unwrap(), FlowOutcome::Continue);

    assert_eq!(api.inner.submitted_answers(), vec!["Neutral".to_string()]);
    assert_eq!(flow.question().unwrap().id, QuestionId::new(2));
}
