use std::path::PathBuf;

/// Errors from keyed store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A value could not be encoded for writing.
    #[error("serialization error for key {key}: {reason}")]
    Serialization { key: String, reason: String },

    /// A key or namespace segment is malformed.
    #[error("invalid key segment {segment:?}: {reason}")]
    InvalidKey { segment: String, reason: String },

    /// I/O error from the underlying substrate.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The file substrate could not be persisted.
    #[error("failed to persist {path}: {reason}")]
    Persist { path: PathBuf, reason: String },

    /// Internal lock poisoned by a panicking writer.
    #[error("substrate lock poisoned")]
    Poisoned,
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
