use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid entity id: {0:?}")]
    InvalidId(String),

    #[error("unknown entity kind: {0}")]
    UnknownKind(String),

    #[error("invalid email address: {0:?}")]
    InvalidEmail(String),

    #[error("invalid price: {0}")]
    InvalidPrice(String),

    #[error("invalid date range: check-out {check_out} is not after check-in {check_in}")]
    InvalidDateRange { check_in: String, check_out: String },
}
