use log::info;

use crate::api::{ApiClient, Method, RequestOptions};
use crate::error::Result;
use crate::models::{Attempt, AttemptReview, PlacementResult};

/// CEFR placement test: start an attempt and read back the assigned level.
#[derive(Clone)]
pub struct PlacementService {
    client: ApiClient,
}

impl PlacementService {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub async fn start(&self) -> Result<Attempt> {
        let attempt: Attempt = self
            .client
            .json("/api/placement/start", RequestOptions::new().method(Method::Post))
            .await?;
        info!("Started placement attempt {}", attempt.id);
        Ok(attempt)
    }

    /// Latest placement result, `None` when the student has not finished one yet.
    pub async fn result(&self) -> Result<Option<PlacementResult>> {
        match self
            .client
            .json("/api/placement/result", RequestOptions::new())
            .await
        {
            Ok(result) => Ok(Some(result)),
            Err(e) if e.status() == Some(404) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn review(&self, attempt_id: u64) -> Result<AttemptReview> {
        self.client
            .json(
                &format!("/api/placement/attempts/{}/review", attempt_id),
                RequestOptions::new(),
            )
            .await
    }
}
