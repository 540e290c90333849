use std::time::Duration;

/// Notifications published by an [`AttemptSession`](super::AttemptSession).
///
/// The UI layer renders these: the countdown, dismissible banners and the
/// final navigation to the review page.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Countdown refresh. Only emitted for attempts with a time limit.
    Tick { remaining: Duration },
    /// The countdown reached zero and the attempt is being submitted automatically.
    TimeUp,
    /// Persisting one answer failed. Dismissible; the next edit or the final submit retries.
    AnswerSaveFailed { question_id: u64, message: String },
    /// Finalizing failed. The session stays started so the user can retry.
    SubmitFailed { message: String },
    /// The attempt is finalized (or was already finalized elsewhere).
    Submitted {
        attempt_id: u64,
        score: Option<f64>,
        cefr_level: Option<String>,
        review_path: String,
    },
    /// The page went away while the attempt was running.
    Abandoned,
}

impl SessionEvent {
    /// Banner text for the events that warrant one.
    pub fn notice(&self) -> Option<String> {
        match self {
            SessionEvent::TimeUp => Some("Time's up! Submitting your answers.".to_string()),
            SessionEvent::AnswerSaveFailed { message, .. } => {
                Some(format!("Could not save your answer: {}", message))
            }
            SessionEvent::SubmitFailed { message } => Some(message.clone()),
            _ => None,
        }
    }
}
