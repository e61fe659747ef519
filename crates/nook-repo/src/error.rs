//! Error types for repository operations.

use nook_store::StoreError;
use nook_types::{EntityId, EntityKind, TypeError};
use thiserror::Error;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepoError {
    /// The target entity does not exist.
    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: EntityId },

    /// A unique field is already taken.
    #[error("{kind} already exists: {key}")]
    AlreadyExists { kind: EntityKind, key: String },

    /// The stored collection does not decode.
    ///
    /// Only returned by [`Repository::verify`](crate::Repository::verify);
    /// ordinary reads recover by treating the collection as empty.
    #[error("{kind} collection at {key} is corrupt: {reason}")]
    Corrupt {
        kind: EntityKind,
        key: String,
        reason: String,
    },

    /// The draft cannot form a valid record.
    #[error("invalid {kind}: {source}")]
    Invalid {
        kind: EntityKind,
        #[source]
        source: TypeError,
    },

    /// Substrate failure.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Convenience type alias for repository operations.
pub type Result<T> = std::result::Result<T, RepoError>;
