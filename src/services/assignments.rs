use serde_json::json;

use crate::api::{ApiClient, FormData, Method, RequestOptions};
use crate::error::Result;
use crate::models::{Assignment, AssignmentInput, Submission};

use super::{delete, with_json};

#[derive(Clone)]
pub struct AssignmentService {
    client: ApiClient,
}

impl AssignmentService {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub async fn list(&self, week_id: u64) -> Result<Vec<Assignment>> {
        let options = RequestOptions::new().query("week_id", week_id);
        self.client.json("/api/assignments", options).await
    }

    pub async fn get(&self, id: u64) -> Result<Assignment> {
        self.client
            .json(&format!("/api/assignments/{}", id), RequestOptions::new())
            .await
    }

    pub async fn create(&self, assignment: &AssignmentInput) -> Result<Assignment> {
        self.client
            .json("/api/assignments", with_json(Method::Post, assignment)?)
            .await
    }

    pub async fn update(&self, id: u64, assignment: &AssignmentInput) -> Result<Assignment> {
        self.client
            .json(&format!("/api/assignments/{}", id), with_json(Method::Put, assignment)?)
            .await
    }

    pub async fn delete(&self, id: u64) -> Result<()> {
        self.client
            .request(&format!("/api/assignments/{}", id), delete())
            .await?;
        Ok(())
    }

    /// Student hand-in, sent as multipart so it can carry files.
    pub async fn submit(&self, id: u64, form: FormData) -> Result<Submission> {
        let options = RequestOptions::new().method(Method::Post).form(form);
        self.client
            .json(&format!("/api/assignments/{}/submissions", id), options)
            .await
    }

    pub async fn submissions(&self, id: u64) -> Result<Vec<Submission>> {
        self.client
            .json(&format!("/api/assignments/{}/submissions", id), RequestOptions::new())
            .await
    }

    pub async fn grade(
        &self,
        assignment_id: u64,
        submission_id: u64,
        score: f64,
        feedback: Option<&str>,
    ) -> Result<Submission> {
        let options = RequestOptions::new()
            .method(Method::Put)
            .json(json!({ "score": score, "feedback": feedback }));
        self.client
            .json(
                &format!("/api/assignments/{}/submissions/{}", assignment_id, submission_id),
                options,
            )
            .await
    }
}
