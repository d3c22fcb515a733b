use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Unauthenticated,
    Forbidden,
    NotFound,
    ServiceUnavailable,
    ValidationFailed,
}

impl ErrorCode {
    pub fn from_status(status: u16) -> Self {
        match status {
            401 => Self::Unauthenticated,
            403 => Self::Forbidden,
            404 => Self::NotFound,
            400 | 409 | 422 => Self::ValidationFailed,
            _ => Self::ServiceUnavailable,
        }
    }
}

/// A submitted story with a required field left blank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("story {field} must not be empty")]
pub struct InvalidStory {
    pub field: &'static str,
}

/// Error body returned by the story service on non-2xx responses.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServiceErrorBody {
    #[serde(default)]
    pub error: Option<ServiceErrorDetail>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServiceErrorDetail {
    #[serde(default)]
    pub status: Option<u16>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ServiceErrorBody {
    pub fn message(&self) -> Option<String> {
        let detail = self.error.as_ref()?;
        detail.message.clone().or_else(|| detail.title.clone())
    }
}
