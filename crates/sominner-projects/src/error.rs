use sominner_rest::RestError;

#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    #[error(transparent)]
    Rest(#[from] RestError),
    /// Projects need a name and tasks a title.
    #[error("title must not be empty")]
    EmptyTitle,
    #[error("comment must not be empty")]
    EmptyComment,
}

impl ProjectError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ProjectError::Rest(err) => err.status(),
            ProjectError::EmptyTitle | ProjectError::EmptyComment => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ProjectError>;
