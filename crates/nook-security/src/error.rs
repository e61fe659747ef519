use chrono::{DateTime, Utc};
use nook_repo::RepoError;
use nook_store::StoreError;
use thiserror::Error;

/// Errors from security workflows.
#[derive(Debug, Error)]
pub enum SecurityError {
    /// No account uses this email. Nothing was written.
    #[error("no user with email {email}")]
    UserNotFound { email: String },

    #[error("invalid password: {0}")]
    InvalidPassword(String),

    /// Email or password did not match. Deliberately does not say which.
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("account locked until {until}")]
    AccountLocked { until: DateTime<Utc> },

    #[error("repository error: {0}")]
    Repo(#[from] RepoError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, SecurityError>;
