use sominner_rest::RestError;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error(transparent)]
    Rest(#[from] RestError),
    /// Admin endpoints were called without a usable service key.
    #[error("service role key is not configured")]
    MissingServiceKey,
    /// The token endpoint answered with success but no access token.
    #[error("unexpected response from the auth endpoint: missing access token")]
    MissingAccessToken,
}

impl AuthError {
    /// Upstream status, when the backend rejected the call.
    pub fn status(&self) -> Option<u16> {
        match self {
            AuthError::Rest(err) => err.status(),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(err: serde_json::Error) -> Self {
        AuthError::Rest(err.into())
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;
