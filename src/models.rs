use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[serde(alias = "dosen", alias = "teacher")]
    Lecturer,
    #[serde(alias = "mahasiswa")]
    Student,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Lecturer => "lecturer",
            Role::Student => "student",
        }
    }

    /// Landing page for the role.
    pub fn dashboard_path(&self) -> &'static str {
        match self {
            Role::Admin => "/admin/dashboard",
            Role::Lecturer => "/lecturer/dashboard",
            Role::Student => "/student/dashboard",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub name: String,
    pub email: String,
    pub role: Role,
    #[serde(default)]
    pub cefr_level: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    pub role: Option<Role>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Kelas {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Join code handed out to students.
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub lecturer_id: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KelasInput {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Week {
    pub id: u64,
    pub kelas_id: u64,
    pub number: u32,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WeekInput {
    pub kelas_id: u64,
    pub number: u32,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Material {
    pub id: u64,
    pub week_id: u64,
    pub title: String,
    /// "file", "video", "link", ...
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    pub id: u64,
    pub week_id: u64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub due_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub max_score: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssignmentInput {
    pub week_id: u64,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_score: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub id: u64,
    pub assignment_id: u64,
    pub user_id: u64,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub feedback: Option<String>,
    #[serde(default)]
    pub submitted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quiz {
    pub id: u64,
    #[serde(default)]
    pub week_id: Option<u64>,
    pub title: String,
    /// 0 or absent means no time limit.
    #[serde(default)]
    pub time_limit_minutes: Option<u32>,
    #[serde(default)]
    pub cefr_level: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuizInput {
    pub week_id: u64,
    pub title: String,
    pub time_limit_minutes: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cefr_level: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    #[serde(alias = "mcq", alias = "multiple")]
    MultipleChoice,
    #[serde(alias = "essay", alias = "short_answer")]
    Text,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionOption {
    pub id: u64,
    pub label: String,
    /// Only present in the authoring view.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_correct: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: u64,
    pub prompt: String,
    pub kind: QuestionKind,
    #[serde(default)]
    pub options: Vec<QuestionOption>,
    #[serde(default)]
    pub points: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OptionInput {
    pub label: String,
    pub is_correct: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionInput {
    pub prompt: String,
    pub kind: QuestionKind,
    #[serde(default)]
    pub options: Vec<OptionInput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub points: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CefrLevel {
    pub id: u64,
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub min_score: Option<f64>,
    #[serde(default)]
    pub max_score: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CefrLevelInput {
    pub code: String,
    pub name: String,
    pub min_score: f64,
    pub max_score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttemptStatus {
    #[serde(alias = "in_progress")]
    Started,
    #[serde(alias = "completed", alias = "finished")]
    Submitted,
    #[serde(alias = "abandoned")]
    Aborted,
}

impl AttemptStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, AttemptStatus::Started)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attempt {
    pub id: u64,
    #[serde(default)]
    pub user_id: Option<u64>,
    /// The quiz (or placement test) this attempt belongs to.
    #[serde(default, alias = "quiz_id", alias = "test_id")]
    pub assessment_id: Option<u64>,
    pub status: AttemptStatus,
    pub started_at: DateTime<Utc>,
    /// Copied from the quiz or placement test definition. 0 or absent means unlimited.
    #[serde(default)]
    pub time_limit_minutes: Option<u32>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub submitted_at: Option<DateTime<Utc>>,
}

/// A saved answer as the backend reports it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub question_id: u64,
    #[serde(default)]
    pub option_id: Option<u64>,
    #[serde(default)]
    pub text_answer: Option<String>,
}

/// Everything needed to take an attempt: the attempt record, its questions and
/// any answers already saved from an earlier visit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptBundle {
    pub attempt: Attempt,
    #[serde(default)]
    pub questions: Vec<Question>,
    #[serde(default)]
    pub answers: Vec<Answer>,
}

/// Body of an answer save call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerUpdate {
    pub question_id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub option_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_answer: Option<String>,
    /// Increases with every edit in a session, so a late-arriving stale write can be discarded.
    pub client_seq: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubmitReceipt {
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub submitted_at: Option<DateTime<Utc>>,
    /// Placement tests report the assigned CEFR level.
    #[serde(default)]
    pub cefr_level: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptReview {
    pub attempt: Attempt,
    #[serde(default)]
    pub questions: Vec<Question>,
    #[serde(default)]
    pub answers: Vec<Answer>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlacementResult {
    pub attempt_id: u64,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub level: Option<String>,
}
