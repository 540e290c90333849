use async_trait::async_trait;
use log::debug;

use crate::api::{ApiClient, Method, RequestOptions, ResponseBody};
use crate::beacon::Beacon;
use crate::error::ApiError;
use crate::models::{AnswerUpdate, AttemptBundle, SubmitReceipt};

use super::AssessmentKind;

/// Server operations an attempt session needs.
#[async_trait]
pub trait AssessmentBackend: Send + Sync + 'static {
    /// The attempt record together with its question set and saved answers.
    async fn fetch_attempt(&self, kind: AssessmentKind, attempt_id: u64) -> Result<AttemptBundle, ApiError>;

    /// Idempotent per question id.
    async fn save_answer(
        &self,
        kind: AssessmentKind,
        attempt_id: u64,
        update: &AnswerUpdate,
    ) -> Result<(), ApiError>;

    async fn submit(&self, kind: AssessmentKind, attempt_id: u64) -> Result<SubmitReceipt, ApiError>;

    /// Fire-and-forget abort notification. Must not block.
    fn signal_abandon(&self, kind: AssessmentKind, attempt_id: u64);
}

#[derive(Clone)]
pub struct HttpAssessmentBackend {
    client: ApiClient,
    beacon: Beacon,
}

impl HttpAssessmentBackend {
    pub fn new(client: ApiClient) -> Self {
        let beacon = Beacon::new(client.clone());
        Self { client, beacon }
    }
}

#[async_trait]
impl AssessmentBackend for HttpAssessmentBackend {
    async fn fetch_attempt(&self, kind: AssessmentKind, attempt_id: u64) -> Result<AttemptBundle, ApiError> {
        self.client
            .json(&kind.attempt_path(attempt_id), RequestOptions::new())
            .await
    }

    async fn save_answer(
        &self,
        kind: AssessmentKind,
        attempt_id: u64,
        update: &AnswerUpdate,
    ) -> Result<(), ApiError> {
        let options = RequestOptions::new()
            .method(Method::Post)
            .json(serde_json::to_value(update)?);
        self.client
            .request(&format!("{}/answers", kind.attempt_path(attempt_id)), options)
            .await?;
        Ok(())
    }

    async fn submit(&self, kind: AssessmentKind, attempt_id: u64) -> Result<SubmitReceipt, ApiError> {
        let body = self
            .client
            .request(
                &format!("{}/submit", kind.attempt_path(attempt_id)),
                RequestOptions::new().method(Method::Post),
            )
            .await?;
        match body {
            ResponseBody::Empty => Ok(SubmitReceipt::default()),
            body => Ok(body.decode()?),
        }
    }

    fn signal_abandon(&self, kind: AssessmentKind, attempt_id: u64) {
        debug!("Signalling abandonment of {} attempt {}", kind.as_str(), attempt_id);
        self.beacon
            .send(&format!("{}/abort", kind.attempt_path(attempt_id)), None);
    }
}
