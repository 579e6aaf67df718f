use thiserror::Error;

/// Top-level error type shared by the Sominner crates.
///
/// Client crates define their own error enums for request-level faults and
/// wrap this one for configuration and serialization problems, so the `?`
/// operator works across crate boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SominnerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for SominnerError {
    fn from(err: toml::de::Error) -> Self {
        SominnerError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for SominnerError {
    fn from(err: toml::ser::Error) -> Self {
        SominnerError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for SominnerError {
    fn from(err: serde_json::Error) -> Self {
        SominnerError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for configuration-level operations.
pub type Result<T> = std::result::Result<T, SominnerError>;
