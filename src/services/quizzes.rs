use log::info;

use crate::api::{ApiClient, Method, RequestOptions};
use crate::error::Result;
use crate::models::{Attempt, AttemptReview, Question, QuestionInput, Quiz, QuizInput};

use super::{delete, with_json};

/// Quiz authoring for lecturers and attempt start/review for students.
#[derive(Clone)]
pub struct QuizService {
    client: ApiClient,
}

impl QuizService {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub async fn list(&self, week_id: u64) -> Result<Vec<Quiz>> {
        let options = RequestOptions::new().query("week_id", week_id);
        self.client.json("/api/quizzes", options).await
    }

    pub async fn get(&self, id: u64) -> Result<Quiz> {
        self.client
            .json(&format!("/api/quizzes/{}", id), RequestOptions::new())
            .await
    }

    pub async fn create(&self, quiz: &QuizInput) -> Result<Quiz> {
        self.client
            .json("/api/quizzes", with_json(Method::Post, quiz)?)
            .await
    }

    pub async fn update(&self, id: u64, quiz: &QuizInput) -> Result<Quiz> {
        self.client
            .json(&format!("/api/quizzes/{}", id), with_json(Method::Put, quiz)?)
            .await
    }

    pub async fn delete(&self, id: u64) -> Result<()> {
        self.client
            .request(&format!("/api/quizzes/{}", id), delete())
            .await?;
        Ok(())
    }

    pub async fn questions(&self, quiz_id: u64) -> Result<Vec<Question>> {
        self.client
            .json(&format!("/api/quizzes/{}/questions", quiz_id), RequestOptions::new())
            .await
    }

    pub async fn add_question(&self, quiz_id: u64, question: &QuestionInput) -> Result<Question> {
        self.client
            .json(
                &format!("/api/quizzes/{}/questions", quiz_id),
                with_json(Method::Post, question)?,
            )
            .await
    }

    pub async fn update_question(
        &self,
        quiz_id: u64,
        question_id: u64,
        question: &QuestionInput,
    ) -> Result<Question> {
        self.client
            .json(
                &format!("/api/quizzes/{}/questions/{}", quiz_id, question_id),
                with_json(Method::Put, question)?,
            )
            .await
    }

    pub async fn delete_question(&self, quiz_id: u64, question_id: u64) -> Result<()> {
        self.client
            .request(
                &format!("/api/quizzes/{}/questions/{}", quiz_id, question_id),
                delete(),
            )
            .await?;
        Ok(())
    }

    /// Opens a new attempt; take it with [`crate::assessment::AttemptSession`].
    pub async fn start(&self, quiz_id: u64) -> Result<Attempt> {
        let attempt: Attempt = self
            .client
            .json(
                &format!("/api/quizzes/{}/start", quiz_id),
                RequestOptions::new().method(Method::Post),
            )
            .await?;
        info!("Started attempt {} for quiz {}", attempt.id, quiz_id);
        Ok(attempt)
    }

    pub async fn review(&self, attempt_id: u64) -> Result<AttemptReview> {
        self.client
            .json(&format!("/api/attempts/{}/review", attempt_id), RequestOptions::new())
            .await
    }
}
