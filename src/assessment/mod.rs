//! Taking a timed assessment: quiz attempts and the CEFR placement test.
//!
//! [`AttemptSession`] drives one attempt through
//! `loading -> started -> {submitted | aborted}`. Network access goes through an
//! [`AssessmentBackend`], so the state machine can be exercised without a server.

pub mod backend;
pub mod events;
pub mod session;
pub mod timer;

pub use backend::{AssessmentBackend, HttpAssessmentBackend};
pub use events::SessionEvent;
pub use session::{AttemptSession, LocalAnswer, Phase, SessionError, SessionOptions};
pub use timer::Countdown;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssessmentKind {
    Quiz,
    Placement,
}

impl AssessmentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssessmentKind::Quiz => "quiz",
            AssessmentKind::Placement => "placement",
        }
    }

    /// REST resource of a single attempt.
    pub fn attempt_path(&self, attempt_id: u64) -> String {
        match self {
            AssessmentKind::Quiz => format!("/api/attempts/{}", attempt_id),
            AssessmentKind::Placement => format!("/api/placement/attempts/{}", attempt_id),
        }
    }

    /// Client route of the review page shown after finalizing.
    pub fn review_path(&self, attempt_id: u64) -> String {
        format!("/student/{}/review?aid={}", self.as_str(), attempt_id)
    }
}
