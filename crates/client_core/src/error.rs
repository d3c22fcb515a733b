use shared::{
    domain::StoryId,
    error::{ErrorCode, InvalidStory},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoryError {
    #[error("not logged in")]
    Unauthenticated,
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("story {0} not found")]
    NotFound(StoryId),
    #[error("story service unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("validation failed: {0}")]
    ValidationFailed(String),
    /// Rejected locally because an action on the same story, or a submit, is
    /// still pending. No request was sent. `code()` reports it as
    /// `ValidationFailed`; the service's `ErrorCode` set has no busy code.
    #[error("{0} is already in progress")]
    InFlight(String),
}

impl StoryError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Unauthenticated => ErrorCode::Unauthenticated,
            Self::Forbidden(_) => ErrorCode::Forbidden,
            Self::NotFound(_) => ErrorCode::NotFound,
            Self::ServiceUnavailable(_) => ErrorCode::ServiceUnavailable,
            Self::ValidationFailed(_) | Self::InFlight(_) => ErrorCode::ValidationFailed,
        }
    }

    /// Builds the error for a non-2xx response. `target` names the story the
    /// request was about, when there is one.
    pub fn from_status(status: u16, message: String, target: Option<&StoryId>) -> Self {
        match ErrorCode::from_status(status) {
            ErrorCode::Unauthenticated => Self::Unauthenticated,
            ErrorCode::Forbidden => Self::Forbidden(message),
            ErrorCode::NotFound => match target {
                Some(id) => Self::NotFound(id.clone()),
                None => Self::ServiceUnavailable(message),
            },
            ErrorCode::ValidationFailed => Self::ValidationFailed(message),
            ErrorCode::ServiceUnavailable => {
                Self::ServiceUnavailable(format!("status {status}: {message}"))
            }
        }
    }
}

impl From<reqwest::Error> for StoryError {
    fn from(value: reqwest::Error) -> Self {
        Self::ServiceUnavailable(value.to_string())
    }
}

impl From<InvalidStory> for StoryError {
    fn from(value: InvalidStory) -> Self {
        Self::ValidationFailed(value.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StoryError>;

#[cfg(test)]
#[path = "tests/error_tests.rs"]
mod tests;
