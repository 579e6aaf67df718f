//! Error types for the data endpoint client.

use sominner_core::SominnerError;

/// Faults surfaced by every data endpoint operation.
#[derive(Debug, thiserror::Error)]
pub enum RestError {
    /// Base URL or key missing or still a placeholder. No request was sent.
    #[error("backend configuration is missing or still using placeholder values")]
    NotConfigured,
    /// The backend answered with a non-success status.
    #[error("backend returned status {status}: {body}")]
    Remote { status: u16, body: String },
    /// The response body did not have the expected shape.
    #[error("failed to decode response: {0}")]
    Decode(String),
    /// Rows were requested back but none came.
    #[error("no rows returned from {0}")]
    EmptyResult(String),
    #[error("request cancelled")]
    Cancelled,
    /// Connection-level failure before any status was received.
    #[error("transport error: {0}")]
    Transport(String),
}

impl RestError {
    /// Upstream status for `Remote` faults.
    pub fn status(&self) -> Option<u16> {
        match self {
            RestError::Remote { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, RestError::Cancelled)
    }
}

impl From<serde_json::Error> for RestError {
    fn from(err: serde_json::Error) -> Self {
        RestError::Decode(err.to_string())
    }
}

impl From<reqwest::Error> for RestError {
    fn from(err: reqwest::Error) -> Self {
        RestError::Transport(err.to_string())
    }
}

impl From<SominnerError> for RestError {
    fn from(err: SominnerError) -> Self {
        match err {
            SominnerError::Config(_) => RestError::NotConfigured,
            SominnerError::Serialization(msg) => RestError::Decode(msg),
            other => RestError::Transport(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, RestError>;
