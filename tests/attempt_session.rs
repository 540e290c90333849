use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::mpsc::UnboundedReceiver;

use lexent_lib::api::ResponseBody;
use lexent_lib::assessment::{
    AssessmentBackend, AssessmentKind, AttemptSession, LocalAnswer, Phase, SessionError, SessionEvent,
    SessionOptions,
};
use lexent_lib::cache::ProgressCache;
use lexent_lib::models::{
    AnswerUpdate, Attempt, AttemptBundle, AttemptStatus, Question, QuestionKind, QuestionOption,
    SubmitReceipt,
};
use lexent_lib::{ApiError, HttpError, MemoryStore};

const ATTEMPT_ID: u64 = 42;
const USER_ID: u64 = 7;

fn http_error(status: u16, message: &str) -> ApiError {
    ApiError::Http(HttpError {
        status,
        message: message.to_string(),
        body: ResponseBody::Empty,
        url: format!("http://api.test/api/attempts/{}", ATTEMPT_ID),
    })
}

fn question(id: u64, kind: QuestionKind) -> Question {
    let options = match kind {
        QuestionKind::MultipleChoice => (1..=4)
            .map(|n| QuestionOption {
                id: id * 10 + n,
                label: format!("option {}", n),
                is_correct: None,
            })
            .collect(),
        QuestionKind::Text => Vec::new(),
    };
    Question {
        id,
        prompt: format!("Question {}", id),
        kind,
        options,
        points: Some(1.0),
    }
}

fn bundle(limit_minutes: Option<u32>, started_ago: chrono::Duration) -> AttemptBundle {
    AttemptBundle {
        attempt: Attempt {
            id: ATTEMPT_ID,
            user_id: Some(USER_ID),
            assessment_id: Some(5),
            status: AttemptStatus::Started,
            started_at: Utc::now() - started_ago,
            time_limit_minutes: limit_minutes,
            score: None,
            submitted_at: None,
        },
        questions: vec![
            question(1, QuestionKind::MultipleChoice),
            question(2, QuestionKind::MultipleChoice),
            question(3, QuestionKind::Text),
        ],
        answers: Vec::new(),
    }
}

/// In-memory stand-in for the attempts API.
#[derive(Default)]
struct FakeBackend {
    bundle: Mutex<Option<AttemptBundle>>,
    /// Latest answer per question, by highest `client_seq`.
    saved: Mutex<HashMap<u64, AnswerUpdate>>,
    arrivals: Mutex<Vec<u64>>,
    save_delays: Mutex<HashMap<u64, Duration>>,
    fail_saves: AtomicBool,
    submit_results: Mutex<VecDeque<Result<SubmitReceipt, ApiError>>>,
    submit_delay: Mutex<Option<Duration>>,
    submit_calls: AtomicUsize,
    abandon_calls: AtomicUsize,
    log: Mutex<Vec<String>>,
}

impl FakeBackend {
    fn with_bundle(bundle: AttemptBundle) -> Arc<Self> {
        let backend = Self::default();
        *backend.bundle.lock() = Some(bundle);
        Arc::new(backend)
    }

    fn saved_option(&self, question_id: u64) -> Option<u64> {
        self.saved.lock().get(&question_id).and_then(|u| u.option_id)
    }

    fn saved_text(&self, question_id: u64) -> Option<String> {
        self.saved.lock().get(&question_id).and_then(|u| u.text_answer.clone())
    }

    fn submits(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AssessmentBackend for FakeBackend {
    async fn fetch_attempt(&self, _kind: AssessmentKind, _attempt_id: u64) -> Result<AttemptBundle, ApiError> {
        self.bundle
            .lock()
            .clone()
            .ok_or_else(|| http_error(404, "Attempt not found"))
    }

    async fn save_answer(
        &self,
        _kind: AssessmentKind,
        _attempt_id: u64,
        update: &AnswerUpdate,
    ) -> Result<(), ApiError> {
        let delay = self.save_delays.lock().get(&update.client_seq).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(http_error(500, "Server Error"));
        }

        self.arrivals.lock().push(update.client_seq);
        self.log.lock().push(format!("save:{}", update.question_id));
        let mut saved = self.saved.lock();
        let newer = saved
            .get(&update.question_id)
            .map_or(true, |current| update.client_seq > current.client_seq);
        if newer {
            saved.insert(update.question_id, update.clone());
        }
        Ok(())
    }

    async fn submit(&self, _kind: AssessmentKind, _attempt_id: u64) -> Result<SubmitReceipt, ApiError> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        self.log.lock().push("submit".to_string());
        let delay = *self.submit_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let scripted = self.submit_results.lock().pop_front();
        scripted.unwrap_or_else(|| {
            Ok(SubmitReceipt {
                score: Some(80.0),
                submitted_at: Some(Utc::now()),
                cefr_level: None,
            })
        })
    }

    fn signal_abandon(&self, _kind: AssessmentKind, _attempt_id: u64) {
        self.abandon_calls.fetch_add(1, Ordering::SeqCst);
    }
}

fn options() -> SessionOptions {
    SessionOptions {
        answer_debounce: Duration::from_millis(600),
        tick_interval: Duration::from_secs(1),
        ..SessionOptions::default()
    }
    .for_user(USER_ID)
}

async fn start(
    backend: &Arc<FakeBackend>,
    kind: AssessmentKind,
    options: SessionOptions,
) -> (AttemptSession, UnboundedReceiver<SessionEvent>) {
    let backend: Arc<dyn AssessmentBackend> = backend.clone();
    AttemptSession::start(backend, kind, ATTEMPT_ID, options)
        .await
        .expect("attempt loads")
}

fn drain(rx: &mut UnboundedReceiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn without_ticks(events: Vec<SessionEvent>) -> Vec<SessionEvent> {
    events
        .into_iter()
        .filter(|e| !matches!(e, SessionEvent::Tick { .. }))
        .collect()
}

async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test(start_paused = true)]
async fn untimed_attempt_never_submits_by_itself() {
    let backend = FakeBackend::with_bundle(bundle(Some(0), chrono::Duration::zero()));
    let (session, mut rx) = start(&backend, AssessmentKind::Quiz, options()).await;

    assert_eq!(session.phase(), Phase::Started);
    assert_eq!(session.remaining(), None);

    tokio::time::sleep(Duration::from_secs(6 * 60 * 60)).await;
    settle().await;

    assert_eq!(backend.submits(), 0);
    assert_eq!(session.phase(), Phase::Started);
    assert!(drain(&mut rx).is_empty(), "no countdown events without a limit");
}

#[tokio::test(start_paused = true)]
async fn missing_limit_is_the_same_as_zero() {
    let backend = FakeBackend::with_bundle(bundle(None, chrono::Duration::zero()));
    let (session, _rx) = start(&backend, AssessmentKind::Quiz, options()).await;

    tokio::time::sleep(Duration::from_secs(3600)).await;
    settle().await;
    assert_eq!(backend.submits(), 0);
    assert_eq!(session.phase(), Phase::Started);
}

#[tokio::test(start_paused = true)]
async fn one_minute_limit_submits_when_time_runs_out() {
    let backend = FakeBackend::with_bundle(bundle(Some(1), chrono::Duration::zero()));
    let (session, mut rx) = start(&backend, AssessmentKind::Quiz, options()).await;

    let remaining = session.remaining().expect("timed attempt");
    assert!(remaining <= Duration::from_secs(60) && remaining > Duration::from_secs(59));

    tokio::time::sleep(Duration::from_secs(59)).await;
    settle().await;
    assert_eq!(backend.submits(), 0);
    assert_eq!(session.phase(), Phase::Started);

    tokio::time::sleep(Duration::from_secs(2)).await;
    settle().await;
    assert_eq!(backend.submits(), 1);
    assert_eq!(session.phase(), Phase::Submitted);

    let events = drain(&mut rx);
    let ticks = events
        .iter()
        .filter(|e| matches!(e, SessionEvent::Tick { .. }))
        .count();
    assert!(ticks >= 59, "expected a tick per second, got {}", ticks);
    assert_eq!(
        without_ticks(events),
        vec![
            SessionEvent::TimeUp,
            SessionEvent::Submitted {
                attempt_id: ATTEMPT_ID,
                score: Some(80.0),
                cefr_level: None,
                review_path: "/student/quiz/review?aid=42".into(),
            },
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn countdown_resumes_from_server_start_time() {
    let backend = FakeBackend::with_bundle(bundle(Some(1), chrono::Duration::seconds(50)));
    let (session, _rx) = start(&backend, AssessmentKind::Quiz, options()).await;

    let remaining = session.remaining().unwrap();
    assert!(remaining <= Duration::from_secs(10) && remaining > Duration::from_secs(9));

    tokio::time::sleep(Duration::from_secs(11)).await;
    settle().await;
    assert_eq!(backend.submits(), 1);
    assert_eq!(session.phase(), Phase::Submitted);
}

#[tokio::test(start_paused = true)]
async fn conflict_on_submit_goes_to_review_without_error() {
    let backend = FakeBackend::with_bundle(bundle(None, chrono::Duration::zero()));
    backend
        .submit_results
        .lock()
        .push_back(Err(http_error(409, "Attempt already submitted")));
    let (session, mut rx) = start(&backend, AssessmentKind::Quiz, options()).await;

    session.submit().await.expect("conflict counts as success");

    assert_eq!(session.phase(), Phase::Submitted);
    let events = drain(&mut rx);
    assert!(events.iter().all(|e| e.notice().is_none()), "no banner: {:?}", events);
    assert!(matches!(
        events.last(),
        Some(SessionEvent::Submitted { review_path, .. }) if review_path == "/student/quiz/review?aid=42"
    ));
}

#[tokio::test(start_paused = true)]
async fn failed_submit_leaves_attempt_open_for_retry() {
    let backend = FakeBackend::with_bundle(bundle(None, chrono::Duration::zero()));
    backend
        .submit_results
        .lock()
        .push_back(Err(http_error(500, "Grading service unavailable")));
    let (session, mut rx) = start(&backend, AssessmentKind::Quiz, options()).await;

    let err = session.submit().await.unwrap_err();
    assert!(matches!(err, SessionError::Submit(_)));
    assert_eq!(session.phase(), Phase::Started);
    assert!(!session.is_submitting());
    assert_eq!(
        drain(&mut rx),
        vec![SessionEvent::SubmitFailed {
            message: "Grading service unavailable".into()
        }]
    );

    session.select_option(1, 12).expect("still editable");
    session.submit().await.expect("retry succeeds");
    assert_eq!(session.phase(), Phase::Submitted);
    assert_eq!(backend.submits(), 2);
}

#[tokio::test(start_paused = true)]
async fn second_submit_while_first_in_flight_is_rejected() {
    let backend = FakeBackend::with_bundle(bundle(None, chrono::Duration::zero()));
    *backend.submit_delay.lock() = Some(Duration::from_secs(2));
    let (session, _rx) = start(&backend, AssessmentKind::Quiz, options()).await;

    let first = tokio::spawn({
        let session = session.clone();
        async move { session.submit().await }
    });
    settle().await;
    assert!(session.is_submitting());

    let second = session.submit().await;
    assert!(matches!(second, Err(SessionError::SubmitInFlight)));

    first.await.unwrap().expect("first submit completes");
    assert_eq!(backend.submits(), 1);
    assert!(matches!(session.submit().await, Err(SessionError::Closed)));
}

#[tokio::test(start_paused = true)]
async fn answers_are_locked_while_submitting() {
    let backend = FakeBackend::with_bundle(bundle(None, chrono::Duration::zero()));
    *backend.submit_delay.lock() = Some(Duration::from_millis(300));
    let (session, _rx) = start(&backend, AssessmentKind::Quiz, options()).await;

    let submitting = tokio::spawn({
        let session = session.clone();
        async move { session.submit().await }
    });
    settle().await;
    assert!(session.is_submitting());

    assert!(matches!(session.edit_text(3, "late words"), Err(SessionError::Closed)));
    assert!(matches!(session.select_option(1, 12), Err(SessionError::Closed)));
    assert_eq!(session.answer(3), None);

    submitting.await.unwrap().expect("submit completes");
    tokio::time::sleep(Duration::from_secs(1)).await;
    settle().await;

    assert_eq!(session.phase(), Phase::Submitted);
    assert!(backend.arrivals.lock().is_empty());
    assert_eq!(*backend.log.lock(), vec!["submit".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn submit_waits_for_saves_already_on_the_wire() {
    let backend = FakeBackend::with_bundle(bundle(None, chrono::Duration::zero()));
    backend.save_delays.lock().insert(1, Duration::from_secs(1));
    backend.save_delays.lock().insert(2, Duration::from_secs(1));
    let (session, _rx) = start(&backend, AssessmentKind::Quiz, options()).await;

    session.edit_text(3, "typed before the pause").unwrap();
    tokio::time::sleep(Duration::from_millis(700)).await;
    settle().await;
    session.select_option(1, 13).unwrap();

    session.submit().await.unwrap();

    let log = backend.log.lock().clone();
    assert_eq!(log.len(), 3, "{:?}", log);
    assert_eq!(log.last().map(String::as_str), Some("submit"));
    assert_eq!(backend.saved_text(3).as_deref(), Some("typed before the pause"));
    assert_eq!(backend.saved_option(1), Some(13));
}

#[tokio::test(start_paused = true)]
async fn last_selection_wins_when_saves_arrive_out_of_order() {
    let backend = FakeBackend::with_bundle(bundle(None, chrono::Duration::zero()));
    // The first save (B) is held back so it lands after the second (A).
    backend.save_delays.lock().insert(1, Duration::from_millis(500));
    let (session, _rx) = start(&backend, AssessmentKind::Quiz, options()).await;

    session.select_option(1, 12).unwrap();
    session.select_option(1, 11).unwrap();
    assert_eq!(session.answer(1), Some(LocalAnswer::Choice(11)));

    tokio::time::sleep(Duration::from_secs(1)).await;
    settle().await;

    assert_eq!(*backend.arrivals.lock(), vec![2, 1]);
    assert_eq!(backend.saved_option(1), Some(11));
}

#[tokio::test(start_paused = true)]
async fn text_answers_are_saved_after_typing_pauses() {
    let backend = FakeBackend::with_bundle(bundle(None, chrono::Duration::zero()));
    let (session, _rx) = start(&backend, AssessmentKind::Quiz, options()).await;

    session.edit_text(3, "I").unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    session.edit_text(3, "I have").unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    session.edit_text(3, "I have been there").unwrap();

    tokio::time::sleep(Duration::from_millis(500)).await;
    settle().await;
    assert!(backend.arrivals.lock().is_empty(), "still inside the quiet period");

    tokio::time::sleep(Duration::from_millis(200)).await;
    settle().await;
    assert_eq!(backend.arrivals.lock().len(), 1);
    assert_eq!(backend.saved_text(3).as_deref(), Some("I have been there"));
}

#[tokio::test(start_paused = true)]
async fn submit_flushes_unsaved_text_first() {
    let backend = FakeBackend::with_bundle(bundle(None, chrono::Duration::zero()));
    let (session, _rx) = start(&backend, AssessmentKind::Quiz, options()).await;

    session.edit_text(3, "Last-second answer").unwrap();
    session.submit().await.unwrap();

    assert_eq!(*backend.log.lock(), vec!["save:3".to_string(), "submit".to_string()]);
    assert_eq!(backend.saved_text(3).as_deref(), Some("Last-second answer"));
}

#[tokio::test(start_paused = true)]
async fn failed_save_is_reported_and_does_not_block() {
    let backend = FakeBackend::with_bundle(bundle(None, chrono::Duration::zero()));
    backend.fail_saves.store(true, Ordering::SeqCst);
    let (session, mut rx) = start(&backend, AssessmentKind::Quiz, options()).await;

    session.select_option(2, 21).unwrap();
    settle().await;

    let events = drain(&mut rx);
    assert_eq!(events.len(), 1);
    match &events[0] {
        SessionEvent::AnswerSaveFailed { question_id, message } => {
            assert_eq!(*question_id, 2);
            assert_eq!(message, "Server Error");
        }
        other => panic!("unexpected event {:?}", other),
    }

    backend.fail_saves.store(false, Ordering::SeqCst);
    session.select_option(2, 22).unwrap();
    settle().await;
    assert_eq!(backend.saved_option(2), Some(22));
}

#[tokio::test(start_paused = true)]
async fn answer_all_and_submit_once() {
    let store = Arc::new(MemoryStore::new());
    let progress = ProgressCache::new(store);
    let backend = FakeBackend::with_bundle(bundle(Some(0), chrono::Duration::zero()));
    let (session, mut rx) = start(
        &backend,
        AssessmentKind::Quiz,
        options().with_progress(progress.clone()),
    )
    .await;

    session.select_option(1, 13).unwrap();
    session.select_option(2, 24).unwrap();
    session.edit_text(3, "Because it was raining.").unwrap();
    settle().await;

    session.submit().await.unwrap();

    assert_eq!(backend.submits(), 1);
    assert_eq!(session.phase(), Phase::Submitted);
    assert_eq!(backend.saved_option(1), Some(13));
    assert_eq!(backend.saved_option(2), Some(24));
    assert_eq!(backend.saved_text(3).as_deref(), Some("Because it was raining."));

    let attempt = session.attempt().unwrap();
    assert_eq!(attempt.status, AttemptStatus::Submitted);
    assert_eq!(attempt.score, Some(80.0));
    assert!(attempt.submitted_at.is_some());

    assert_eq!(
        progress.last_score(AssessmentKind::Quiz).map(|s| (s.attempt_id, s.score)),
        Some((ATTEMPT_ID, Some(80.0)))
    );
    assert!(progress.is_completed(AssessmentKind::Quiz, 5));

    match without_ticks(drain(&mut rx)).last() {
        Some(SessionEvent::Submitted { review_path, .. }) => {
            assert_eq!(review_path, "/student/quiz/review?aid=42")
        }
        other => panic!("expected navigation to review, got {:?}", other),
    }

    assert!(matches!(session.select_option(1, 11), Err(SessionError::Closed)));
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(backend.submits(), 1);
}

#[tokio::test(start_paused = true)]
async fn placement_submission_reports_level_and_review_route() {
    let backend = FakeBackend::with_bundle(bundle(Some(30), chrono::Duration::zero()));
    backend.submit_results.lock().push_back(Ok(SubmitReceipt {
        score: Some(64.0),
        submitted_at: None,
        cefr_level: Some("B1".into()),
    }));
    let (session, mut rx) = start(&backend, AssessmentKind::Placement, options()).await;

    session.submit().await.unwrap();

    let submitted = without_ticks(drain(&mut rx)).pop();
    assert_eq!(
        submitted,
        Some(SessionEvent::Submitted {
            attempt_id: ATTEMPT_ID,
            score: Some(64.0),
            cefr_level: Some("B1".into()),
            review_path: "/student/placement/review?aid=42".into(),
        })
    );
    assert_eq!(session.remaining(), None);

    // The countdown is gone, so nothing fires at the old deadline.
    tokio::time::sleep(Duration::from_secs(31 * 60)).await;
    settle().await;
    assert_eq!(backend.submits(), 1);
}

#[tokio::test(start_paused = true)]
async fn hiding_the_page_abandons_the_attempt() {
    let backend = FakeBackend::with_bundle(bundle(Some(1), chrono::Duration::zero()));
    let (session, mut rx) = start(&backend, AssessmentKind::Quiz, options()).await;

    session.edit_text(3, "half a sent").unwrap();
    session.page_hidden();

    assert_eq!(session.phase(), Phase::Aborted);
    assert_eq!(backend.abandon_calls.load(Ordering::SeqCst), 1);
    assert_eq!(without_ticks(drain(&mut rx)), vec![SessionEvent::Abandoned]);

    session.page_unload();
    assert_eq!(backend.abandon_calls.load(Ordering::SeqCst), 1);
    assert!(matches!(session.select_option(1, 11), Err(SessionError::Closed)));
    assert!(matches!(session.submit().await, Err(SessionError::Closed)));

    tokio::time::sleep(Duration::from_secs(120)).await;
    settle().await;
    assert_eq!(backend.submits(), 0);
    assert!(backend.arrivals.lock().is_empty(), "pending text must be dropped");
}

#[tokio::test(start_paused = true)]
async fn fetch_failure_is_fatal() {
    let backend = Arc::new(FakeBackend::default());
    let dyn_backend: Arc<dyn AssessmentBackend> = backend.clone();
    let (session, _rx) = AttemptSession::open(dyn_backend, AssessmentKind::Quiz, ATTEMPT_ID, options());
    assert_eq!(session.phase(), Phase::Loading);

    let err = session.load().await.unwrap_err();
    assert!(matches!(err, SessionError::Load(_)));
    assert_eq!(session.phase(), Phase::Aborted);
    assert!(matches!(session.load().await, Err(SessionError::AlreadyLoaded)));
}

#[tokio::test(start_paused = true)]
async fn someone_elses_attempt_is_refused() {
    let backend = FakeBackend::with_bundle(bundle(None, chrono::Duration::zero()));
    let dyn_backend: Arc<dyn AssessmentBackend> = backend.clone();

    let result = AttemptSession::start(
        dyn_backend,
        AssessmentKind::Quiz,
        ATTEMPT_ID,
        options().for_user(USER_ID + 1),
    )
    .await;
    assert!(matches!(result, Err(SessionError::Load(_))));
}

#[tokio::test(start_paused = true)]
async fn finished_attempt_opens_read_only() {
    let mut finished = bundle(Some(1), chrono::Duration::minutes(10));
    finished.attempt.status = AttemptStatus::Submitted;
    finished.attempt.score = Some(55.0);
    finished.answers = vec![lexent_lib::models::Answer {
        question_id: 1,
        option_id: Some(14),
        text_answer: None,
    }];
    let backend = FakeBackend::with_bundle(finished);
    let (session, mut rx) = start(&backend, AssessmentKind::Quiz, options()).await;

    assert_eq!(session.phase(), Phase::Submitted);
    assert_eq!(session.remaining(), None);
    assert_eq!(session.answer(1), Some(LocalAnswer::Choice(14)));
    assert!(matches!(session.edit_text(3, "late"), Err(SessionError::Closed)));

    session.page_hidden();
    assert_eq!(backend.abandon_calls.load(Ordering::SeqCst), 0);

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(backend.submits(), 0);
    assert!(drain(&mut rx).is_empty());
}
