use nook_store::StoreError;
use thiserror::Error;

/// Errors from image bucket writes.
///
/// Resolution itself never fails; only explicit saves and deletions report
/// substrate errors.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

pub type MediaResult<T> = std::result::Result<T, MediaError>;
