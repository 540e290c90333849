use thiserror::Error;

use crate::api::ResponseBody;
use crate::storage::StoreError;

pub const TIMEOUT_MESSAGE: &str = "Request timed out";

/// Structured failure of a single API call: a non-2xx response after retries
/// were exhausted, or a timeout (`status == 0`).
#[derive(Error, Debug, Clone)]
#[error("{message}")]
pub struct HttpError {
    pub status: u16,
    pub message: String,
    pub body: ResponseBody,
    pub url: String,
}

impl HttpError {
    pub fn timed_out(url: impl Into<String>) -> Self {
        Self {
            status: 0,
            message: TIMEOUT_MESSAGE.to_string(),
            body: ResponseBody::Empty,
            url: url.into(),
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.status == 0
    }
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Http(#[from] HttpError),
    /// Network-level failures (DNS, refused connection, TLS) are passed through untouched.
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
    #[error("Invalid input: {0}")]
    Validation(#[from] validator::ValidationErrors),
    #[error("Invalid request URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("Invalid header {0}")]
    InvalidHeader(String),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl ApiError {
    /// HTTP status of the failure, `Some(0)` for timeouts, `None` when no response was involved.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Http(e) => Some(e.status),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ApiError::Http(e) if e.is_timeout())
    }

    pub fn is_conflict(&self) -> bool {
        self.status() == Some(409)
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;
