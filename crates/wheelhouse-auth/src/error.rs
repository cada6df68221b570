//! Authentication error types.

use thiserror::Error;

/// Authentication error type.
#[derive(Error, Debug)]
pub enum AuthError {
    /// Authority rejected the login
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    /// Access credential expired and was not recoverable by a refresh-and-retry
    #[error("Access credential expired")]
    TokenExpired,

    /// Valid credential, insufficient permission. Never retried.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Refresh credential itself was rejected; always forces logout
    #[error("Credential refresh failed: {0}")]
    RefreshFailed(String),

    /// Stored session snapshot could not be parsed
    #[error("Session snapshot corrupt: {0}")]
    SessionCorrupt(String),

    /// No session exists
    #[error("Not logged in")]
    NotLoggedIn,

    /// Permission action string that maps to no grant field. This is a
    /// programming error in the caller, not a deniable request.
    #[error("Unknown permission action: {0}")]
    UnknownAction(String),

    /// Invalid transition in the auth state machine
    #[error("Invalid auth state transition: {0}")]
    InvalidStateTransition(String),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(#[from] wheelhouse_storage::StorageError),

    /// Authority unreachable or HTTP-level failure
    #[error("Network error: {0}")]
    Network(reqwest::Error),

    /// Authority answered with an unexpected status
    #[error("Authority error: HTTP {status}: {message}")]
    Authority { status: u16, message: String },

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parse error
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Network call exceeded its bounded timeout
    #[error("Operation timed out")]
    Timeout,
}

impl From<reqwest::Error> for AuthError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            AuthError::Timeout
        } else {
            AuthError::Network(e)
        }
    }
}

impl AuthError {
    /// Returns true for failures that say nothing about the session itself:
    /// the authority was unreachable, timed out, or answered with a server
    /// error. Validation treats these as inconclusive when a cached snapshot
    /// exists, rather than tearing the session down.
    pub fn is_transient(&self) -> bool {
        match self {
            AuthError::Timeout => true,
            AuthError::Network(e) => {
                if e.is_connect() || e.is_timeout() {
                    return true;
                }
                if let Some(status) = e.status() {
                    return status.is_server_error();
                }
                // Request never produced a response.
                e.status().is_none()
            }
            AuthError::Authority { status, .. } => (500..600).contains(status),
            _ => false,
        }
    }
}

/// Result type alias using AuthError.
pub type AuthResult<T> = Result<T, AuthError>;
