use nook_types::{EntityId, EntityKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SdkError {
    #[error("cannot load config {path}: {reason}")]
    Config { path: String, reason: String },

    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: EntityId },

    #[error("store error: {0}")]
    Store(#[from] nook_store::StoreError),

    #[error("repository error: {0}")]
    Repo(#[from] nook_repo::RepoError),

    #[error("media error: {0}")]
    Media(#[from] nook_media::MediaError),

    #[error("security error: {0}")]
    Security(#[from] nook_security::SecurityError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type SdkResult<T> = Result<T, SdkError>;
