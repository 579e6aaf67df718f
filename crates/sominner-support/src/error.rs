use sominner_rest::RestError;

#[derive(Debug, thiserror::Error)]
pub enum SupportError {
    #[error(transparent)]
    Rest(#[from] RestError),
    #[error("message text is empty")]
    EmptyMessage,
    /// The operation must run as a signed-in user.
    #[error("no access token available for this operation")]
    MissingAccessToken,
}

impl SupportError {
    pub fn status(&self) -> Option<u16> {
        match self {
            SupportError::Rest(err) => err.status(),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, SupportError::Rest(err) if err.is_cancelled())
    }
}

pub type Result<T> = std::result::Result<T, SupportError>;
