//! User lookups and unique-email registration.

use nook_types::{Entity, EntityId, User, UserDraft};
use tracing::info;

use crate::error::{RepoError, Result};
use crate::repository::Repository;

impl Repository<User> {
    /// Find a user by email, ignoring ASCII case and surrounding whitespace.
    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self.load().await?.into_iter().find(|u| u.has_email(email)))
    }

    /// Create a user unless another account already uses the same email.
    pub async fn register(&self, draft: UserDraft) -> Result<User> {
        User::validate_draft(&draft).map_err(|source| RepoError::Invalid {
            kind: User::KIND,
            source,
        })?;

        let _guard = self.store().lock(self.key()).await;
        let mut users = self.load().await?;
        if users.iter().any(|u| u.has_email(&draft.email)) {
            return Err(RepoError::AlreadyExists {
                kind: User::KIND,
                key: draft.email.trim().to_ascii_lowercase(),
            });
        }
        let user = User::from_draft(EntityId::generate(), self.clock().now(), draft);
        users.push(user.clone());
        self.save(&users).await?;

        info!(id = %user.id, "user registered");
        Ok(user)
    }
}
