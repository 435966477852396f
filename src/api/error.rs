use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("No access token found. Please log in.")]
    NotLoggedIn,

    #[error("Session expired. Please log in again.")]
    SessionExpired,

    #[error("{0}")]
    RequestFailed(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl ApiError {
    /// Whether the user has to sign in again before retrying.
    pub fn needs_login(&self) -> bool {
        matches!(self, ApiError::NotLoggedIn | ApiError::SessionExpired)
    }
}
