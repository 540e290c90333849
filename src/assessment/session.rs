use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::Utc;
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::cache::ProgressCache;
use crate::coalesce::CoalescingWriter;
use crate::config::AppConfig;
use crate::error::ApiError;
use crate::models::{AnswerUpdate, Attempt, AttemptStatus, Question, SubmitReceipt};

use super::backend::AssessmentBackend;
use super::events::SessionEvent;
use super::timer::Countdown;
use super::AssessmentKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Loading,
    Started,
    Submitted,
    Aborted,
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Submitted | Phase::Aborted)
    }
}

#[derive(Error, Debug)]
pub enum SessionError {
    /// Fatal: the caller should leave the page.
    #[error("Could not open attempt: {0}")]
    Load(String),
    #[error("Attempt is already loaded")]
    AlreadyLoaded,
    #[error("Attempt is not accepting answers")]
    Closed,
    #[error("A submission is already in progress")]
    SubmitInFlight,
    #[error("Submitting failed: {0}")]
    Submit(#[source] ApiError),
}

/// The locally held answer to one question.
#[derive(Debug, Clone, PartialEq)]
pub enum LocalAnswer {
    Choice(u64),
    Text(String),
}

#[derive(Clone)]
pub struct SessionOptions {
    /// When set, an attempt owned by someone else is refused.
    pub expected_user_id: Option<u64>,
    pub answer_debounce: Duration,
    pub tick_interval: Duration,
    pub progress: Option<ProgressCache>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            expected_user_id: None,
            answer_debounce: Duration::from_millis(crate::config::DEFAULT_ANSWER_DEBOUNCE_MS),
            tick_interval: Duration::from_millis(crate::config::DEFAULT_TICK_INTERVAL_MS),
            progress: None,
        }
    }
}

impl SessionOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            answer_debounce: config.answer_debounce(),
            tick_interval: config.tick_interval(),
            ..Self::default()
        }
    }

    pub fn for_user(mut self, user_id: u64) -> Self {
        self.expected_user_id = Some(user_id);
        self
    }

    pub fn with_progress(mut self, progress: ProgressCache) -> Self {
        self.progress = Some(progress);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    User,
    TimeUp,
}

struct State {
    phase: Phase,
    attempt: Option<Attempt>,
    questions: Vec<Question>,
    answers: HashMap<u64, LocalAnswer>,
    countdown: Option<Countdown>,
}

struct Inner {
    kind: AssessmentKind,
    attempt_id: u64,
    backend: Arc<dyn AssessmentBackend>,
    options: SessionOptions,
    state: Mutex<State>,
    writer: CoalescingWriter<u64, AnswerUpdate>,
    events: UnboundedSender<SessionEvent>,
    submitting: AtomicBool,
    seq: AtomicU64,
    ticker: Mutex<Option<JoinHandle<()>>>,
}

/// One student's run through a quiz or placement attempt.
///
/// Cheap to clone; all clones drive the same attempt. Notifications arrive on
/// the receiver returned by [`AttemptSession::open`].
#[derive(Clone)]
pub struct AttemptSession {
    inner: Arc<Inner>,
}

impl AttemptSession {
    /// Creates the session in `Loading`. Call [`load`](Self::load) next.
    pub fn open(
        backend: Arc<dyn AssessmentBackend>,
        kind: AssessmentKind,
        attempt_id: u64,
        options: SessionOptions,
    ) -> (Self, UnboundedReceiver<SessionEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let debounce = options.answer_debounce;

        let inner = Arc::new_cyclic(|weak: &Weak<Inner>| {
            let sink_owner = weak.clone();
            let writer = CoalescingWriter::new(debounce, move |_question_id: u64, update: AnswerUpdate| {
                let owner = sink_owner.clone();
                async move {
                    if let Some(inner) = owner.upgrade() {
                        inner.persist(update).await;
                    }
                }
            });

            Inner {
                kind,
                attempt_id,
                backend,
                options,
                state: Mutex::new(State {
                    phase: Phase::Loading,
                    attempt: None,
                    questions: Vec::new(),
                    answers: HashMap::new(),
                    countdown: None,
                }),
                writer,
                events,
                submitting: AtomicBool::new(false),
                seq: AtomicU64::new(0),
                ticker: Mutex::new(None),
            }
        });

        (Self { inner }, rx)
    }

    /// `open` followed by `load`.
    pub async fn start(
        backend: Arc<dyn AssessmentBackend>,
        kind: AssessmentKind,
        attempt_id: u64,
        options: SessionOptions,
    ) -> Result<(Self, UnboundedReceiver<SessionEvent>), SessionError> {
        let (session, rx) = Self::open(backend, kind, attempt_id, options);
        session.load().await?;
        Ok((session, rx))
    }

    /// Fetches the attempt and its questions.
    ///
    /// A fetch failure or an attempt owned by another user moves the session to
    /// `Aborted` and returns [`SessionError::Load`]. An attempt that is already
    /// finalized on the server loads straight into its terminal phase.
    pub async fn load(&self) -> Result<(), SessionError> {
        let inner = &self.inner;
        if inner.state.lock().phase != Phase::Loading {
            return Err(SessionError::AlreadyLoaded);
        }

        let bundle = match inner.backend.fetch_attempt(inner.kind, inner.attempt_id).await {
            Ok(bundle) => bundle,
            Err(e) => {
                error!("❌ Failed to load {} attempt {}: {}", inner.kind.as_str(), inner.attempt_id, e);
                inner.state.lock().phase = Phase::Aborted;
                return Err(SessionError::Load(e.to_string()));
            }
        };

        if let (Some(expected), Some(owner)) = (inner.options.expected_user_id, bundle.attempt.user_id) {
            if expected != owner {
                warn!("Attempt {} belongs to user {}, not {}", inner.attempt_id, owner, expected);
                inner.state.lock().phase = Phase::Aborted;
                return Err(SessionError::Load("attempt belongs to another user".to_string()));
            }
        }

        let phase = match bundle.attempt.status {
            AttemptStatus::Started => Phase::Started,
            AttemptStatus::Submitted => Phase::Submitted,
            AttemptStatus::Aborted => Phase::Aborted,
        };
        let countdown = match phase {
            Phase::Started => Countdown::for_attempt(&bundle.attempt),
            _ => None,
        };

        {
            let mut state = inner.state.lock();
            state.answers = bundle
                .answers
                .iter()
                .filter_map(|answer| {
                    let local = match (answer.option_id, &answer.text_answer) {
                        (Some(option_id), _) => LocalAnswer::Choice(option_id),
                        (None, Some(text)) => LocalAnswer::Text(text.clone()),
                        (None, None) => return None,
                    };
                    Some((answer.question_id, local))
                })
                .collect();
            state.questions = bundle.questions;
            state.attempt = Some(bundle.attempt);
            state.countdown = countdown;
            state.phase = phase;
        }

        info!(
            "📝 Loaded {} attempt {} ({:?}, {} question(s))",
            inner.kind.as_str(),
            inner.attempt_id,
            phase,
            self.questions().len()
        );

        if let Some(countdown) = countdown {
            let handle = tokio::spawn(run_countdown(
                Arc::downgrade(inner),
                countdown,
                inner.options.tick_interval,
            ));
            *inner.ticker.lock() = Some(handle);
        }
        Ok(())
    }

    pub fn kind(&self) -> AssessmentKind {
        self.inner.kind
    }

    pub fn attempt_id(&self) -> u64 {
        self.inner.attempt_id
    }

    pub fn phase(&self) -> Phase {
        self.inner.state.lock().phase
    }

    pub fn attempt(&self) -> Option<Attempt> {
        self.inner.state.lock().attempt.clone()
    }

    pub fn questions(&self) -> Vec<Question> {
        self.inner.state.lock().questions.clone()
    }

    pub fn answer(&self, question_id: u64) -> Option<LocalAnswer> {
        self.inner.state.lock().answers.get(&question_id).cloned()
    }

    pub fn answers(&self) -> HashMap<u64, LocalAnswer> {
        self.inner.state.lock().answers.clone()
    }

    /// `None` for attempts without a time limit or once the session is terminal.
    pub fn remaining(&self) -> Option<Duration> {
        let state = self.inner.state.lock();
        match state.phase {
            Phase::Started => state.countdown.map(|c| c.remaining()),
            _ => None,
        }
    }

    pub fn is_submitting(&self) -> bool {
        self.inner.submitting.load(Ordering::SeqCst)
    }

    /// Records the choice locally and persists it without waiting for the server.
    pub fn select_option(&self, question_id: u64, option_id: u64) -> Result<(), SessionError> {
        let update = self.inner.record(question_id, LocalAnswer::Choice(option_id))?;
        self.inner.writer.write_now(question_id, update);
        Ok(())
    }

    /// Records the text locally; the server sees it once typing pauses.
    pub fn edit_text(&self, question_id: u64, text: impl Into<String>) -> Result<(), SessionError> {
        let update = self.inner.record(question_id, LocalAnswer::Text(text.into()))?;
        self.inner.writer.write(question_id, update);
        Ok(())
    }

    /// Finalizes the attempt. See [`SessionEvent::Submitted`] for the outcome.
    pub async fn submit(&self) -> Result<(), SessionError> {
        self.inner.finalize(Trigger::User).await
    }

    /// Page lost visibility.
    pub fn page_hidden(&self) {
        self.inner.abandon("page hidden");
    }

    /// Page is being unloaded.
    pub fn page_unload(&self) {
        self.inner.abandon("page unload");
    }
}

impl Inner {
    fn emit(&self, event: SessionEvent) {
        // A dropped receiver only means nobody is rendering anymore.
        let _ = self.events.send(event);
    }

    fn record(&self, question_id: u64, answer: LocalAnswer) -> Result<AnswerUpdate, SessionError> {
        let mut state = self.state.lock();
        // Input is closed from the moment a submit starts; a failed submit reopens it.
        if state.phase != Phase::Started || self.submitting.load(Ordering::SeqCst) {
            return Err(SessionError::Closed);
        }

        let update = AnswerUpdate {
            question_id,
            option_id: match &answer {
                LocalAnswer::Choice(option_id) => Some(*option_id),
                LocalAnswer::Text(_) => None,
            },
            text_answer: match &answer {
                LocalAnswer::Text(text) => Some(text.clone()),
                LocalAnswer::Choice(_) => None,
            },
            client_seq: self.seq.fetch_add(1, Ordering::SeqCst) + 1,
        };
        state.answers.insert(question_id, answer);
        Ok(update)
    }

    async fn persist(&self, update: AnswerUpdate) {
        if self.state.lock().phase.is_terminal() {
            debug!("Dropping answer for question {}: attempt is closed", update.question_id);
            return;
        }

        if let Err(e) = self.backend.save_answer(self.kind, self.attempt_id, &update).await {
            warn!("Saving answer for question {} failed: {}", update.question_id, e);
            self.emit(SessionEvent::AnswerSaveFailed {
                question_id: update.question_id,
                message: e.to_string(),
            });
        }
    }

    async fn finalize(&self, trigger: Trigger) -> Result<(), SessionError> {
        {
            let state = self.state.lock();
            if state.phase != Phase::Started {
                return Err(SessionError::Closed);
            }
            if self.submitting.swap(true, Ordering::SeqCst) {
                debug!("Submit of attempt {} ignored, one is already in flight", self.attempt_id);
                return Err(SessionError::SubmitInFlight);
            }
        }

        if trigger == Trigger::TimeUp {
            info!("⏰ Time is up for attempt {}, submitting", self.attempt_id);
            self.emit(SessionEvent::TimeUp);
        }

        self.writer.flush().await;

        let receipt = match self.backend.submit(self.kind, self.attempt_id).await {
            Ok(receipt) => receipt,
            Err(e) if e.is_conflict() => {
                info!("Attempt {} was already finalized, going to review", self.attempt_id);
                SubmitReceipt::default()
            }
            Err(e) => {
                error!("❌ Submitting attempt {} failed: {}", self.attempt_id, e);
                self.submitting.store(false, Ordering::SeqCst);
                self.emit(SessionEvent::SubmitFailed { message: e.to_string() });
                return Err(SessionError::Submit(e));
            }
        };

        self.complete(receipt);
        Ok(())
    }

    fn complete(&self, receipt: SubmitReceipt) {
        let (score, assessment_id) = {
            let mut state = self.state.lock();
            state.phase = Phase::Submitted;
            state.countdown = None;
            match state.attempt.as_mut() {
                Some(attempt) => {
                    attempt.status = AttemptStatus::Submitted;
                    attempt.score = receipt.score.or(attempt.score);
                    attempt.submitted_at = Some(receipt.submitted_at.unwrap_or_else(Utc::now));
                    (attempt.score, attempt.assessment_id)
                }
                None => (receipt.score, None),
            }
        };

        self.stop_activity();

        if let Some(progress) = &self.options.progress {
            if let Err(e) = progress.record_score(self.kind, self.attempt_id, score) {
                warn!("Could not cache score of attempt {}: {}", self.attempt_id, e);
            }
            if let Some(assessment_id) = assessment_id {
                if let Err(e) = progress.mark_completed(self.kind, assessment_id) {
                    warn!("Could not mark {} {} completed: {}", self.kind.as_str(), assessment_id, e);
                }
            }
        }

        info!("✅ Attempt {} submitted (score: {:?})", self.attempt_id, score);
        self.emit(SessionEvent::Submitted {
            attempt_id: self.attempt_id,
            score,
            cefr_level: receipt.cefr_level,
            review_path: self.kind.review_path(self.attempt_id),
        });
    }

    fn abandon(&self, reason: &str) {
        {
            let mut state = self.state.lock();
            if state.phase != Phase::Started || self.submitting.load(Ordering::SeqCst) {
                return;
            }
            state.phase = Phase::Aborted;
            state.countdown = None;
            if let Some(attempt) = state.attempt.as_mut() {
                attempt.status = AttemptStatus::Aborted;
            }
        }

        info!("🚪 Attempt {} abandoned ({})", self.attempt_id, reason);
        self.backend.signal_abandon(self.kind, self.attempt_id);
        self.stop_activity();
        self.emit(SessionEvent::Abandoned);
    }

    /// Stops the countdown and drops unsent text edits. Saves already sent are left alone.
    fn stop_activity(&self) {
        if let Some(handle) = self.ticker.lock().take() {
            handle.abort();
        }
        self.writer.cancel_all();
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(handle) = self.ticker.lock().take() {
            handle.abort();
        }
    }
}

async fn run_countdown(owner: Weak<Inner>, countdown: Countdown, tick: Duration) {
    let mut ticker = tokio::time::interval(tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let expiry = tokio::time::sleep_until(countdown.deadline());
    tokio::pin!(expiry);

    loop {
        tokio::select! {
            biased;
            _ = &mut expiry => {
                let Some(inner) = owner.upgrade() else { return };
                inner.emit(SessionEvent::Tick { remaining: Duration::ZERO });
                // Submitting runs on its own task so that stopping the countdown
                // from inside `complete` cannot cancel it.
                tokio::spawn(async move {
                    if let Err(e) = inner.finalize(Trigger::TimeUp).await {
                        debug!("Automatic submit of attempt {} skipped: {}", inner.attempt_id, e);
                    }
                });
                return;
            }
            _ = ticker.tick() => {
                let Some(inner) = owner.upgrade() else { return };
                inner.emit(SessionEvent::Tick { remaining: countdown.remaining() });
            }
        }
    }
}
