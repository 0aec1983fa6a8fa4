use std::time::Duration;
use thiserror::Error;

pub const RENDER_FAILED_MESSAGE: &str = "Failed to display results. Please try again.";

#[derive(Debug, Error)]
pub enum ClientError {
    /// Rejected locally before any request was made.
    #[error("{0}")]
    Validation(String),
    /// Network failure or a non-2xx response.
    #[error("{0}")]
    Transport(String),
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    /// `status: "error"` inside an otherwise successful response.
    #[error("{0}")]
    Application(String),
    #[error("invalid data format received: {0}")]
    InvalidFormat(String),
    #[error("render failed: {0}")]
    Render(String),
    #[error("a request is already in progress")]
    Busy,
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ClientError {
    /// Text shown in the error banner.
    pub fn user_message(&self) -> String {
        match self {
            Self::Render(_) => RENDER_FAILED_MESSAGE.to_string(),
            Self::Timeout(limit) => format!(
                "The prediction service did not answer within {:?}. Please try again.",
                limit
            ),
            Self::Busy => "A request is already in progress. Please wait.".to_string(),
            other => other.to_string(),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}
