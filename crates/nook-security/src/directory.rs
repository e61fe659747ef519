use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nook_repo::{RepoError, UserRepository};
use nook_types::{Credential, EntityId, User, UserPatch};

/// The user accounts a security workflow acts on.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Case-insensitive lookup by email.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepoError>;

    /// Replace the credential material of user `id` and stamp the reset.
    async fn replace_credential(
        &self,
        id: &EntityId,
        credential: Credential,
        reset_at: DateTime<Utc>,
        reset_by: &str,
    ) -> Result<User, RepoError>;
}

#[async_trait]
impl UserDirectory for UserRepository {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepoError> {
        UserRepository::find_by_email(self, email).await
    }

    async fn replace_credential(
        &self,
        id: &EntityId,
        credential: Credential,
        reset_at: DateTime<Utc>,
        reset_by: &str,
    ) -> Result<User, RepoError> {
        self.update(
            id,
            UserPatch {
                credential: Some(credential),
                password_reset_at: Some(reset_at),
                password_reset_by: Some(reset_by.to_string()),
                ..Default::default()
            },
        )
        .await
    }
}
