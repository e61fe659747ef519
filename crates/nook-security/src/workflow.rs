use std::sync::{Arc, Mutex};

use nook_store::KeyedStore;
use nook_types::{
    ClientContext, MonotonicClock, ResetRequest, SecurityEventKind, SecurityLogEntry, User,
};
use tracing::{debug, info, warn};

use crate::config::SecurityConfig;
use crate::credential::{self, PasswordRng};
use crate::directory::UserDirectory;
use crate::error::{Result, SecurityError};
use crate::keys;
use crate::throttle::LoginThrottle;

/// Password-reset request and fulfillment, with an append-only audit log.
///
/// Fulfillment writes four keys with no cross-key atomicity. They are
/// written in an order that never shows a request as fulfilled while the
/// old credential is still in place: credential first, then the request,
/// then the audit entry, then the login counter.
pub struct SecurityWorkflow {
    store: Arc<KeyedStore>,
    users: Arc<dyn UserDirectory>,
    clock: Arc<MonotonicClock>,
    rng: Mutex<PasswordRng>,
    throttle: LoginThrottle,
    config: SecurityConfig,
}

impl SecurityWorkflow {
    pub fn new(
        store: Arc<KeyedStore>,
        users: Arc<dyn UserDirectory>,
        clock: Arc<MonotonicClock>,
        config: SecurityConfig,
    ) -> Self {
        Self::with_rng(store, users, clock, config, credential::os_rng())
    }

    /// A workflow drawing passwords and salts from `rng`.
    pub fn with_rng(
        store: Arc<KeyedStore>,
        users: Arc<dyn UserDirectory>,
        clock: Arc<MonotonicClock>,
        config: SecurityConfig,
        rng: PasswordRng,
    ) -> Self {
        let throttle = LoginThrottle::new(
            Arc::clone(&store),
            Arc::clone(&clock),
            config.throttle.clone(),
        );
        Self {
            store,
            users,
            clock,
            rng: Mutex::new(rng),
            throttle,
            config,
        }
    }

    pub fn throttle(&self) -> &LoginThrottle {
        &self.throttle
    }

    pub fn config(&self) -> &SecurityConfig {
        &self.config
    }

    // -----------------------------------------------------------------------
    // Requests
    // -----------------------------------------------------------------------

    /// Record that someone asked to reset the password of `email`.
    ///
    /// Always succeeds from the caller's point of view, whether or not an
    /// account exists. Storage failures are logged and swallowed.
    pub async fn request_reset(&self, email: &str, client: ClientContext) {
        pause(self.config.request_delay()).await;
        let email = email.trim();
        if let Err(e) = self.try_request_reset(email, client).await {
            warn!(error = %e, "reset request could not be recorded");
        }
    }

    async fn try_request_reset(&self, email: &str, client: ClientContext) -> Result<()> {
        let now = self.clock.now();
        let key = keys::reset_requests()?;
        {
            let _guard = self.store.lock(&key).await;
            let mut requests: Vec<ResetRequest> = self.store.get(&key).await?.unwrap_or_default();
            requests.push(ResetRequest::new(email, now));
            self.store.set(&key, &requests).await?;
        }
        self.append_log(SecurityLogEntry {
            kind: SecurityEventKind::ResetRequested,
            email: email.to_string(),
            timestamp: now,
            actor: None,
            client_context: client,
        })
        .await?;
        info!("password reset requested");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Fulfillment
    // -----------------------------------------------------------------------

    /// Set a new password for `email` on behalf of `actor`.
    ///
    /// Returns [`SecurityError::UserNotFound`] without writing anything
    /// when no account uses `email`.
    pub async fn fulfill_reset(
        &self,
        email: &str,
        new_password: &str,
        actor: &str,
        client: ClientContext,
    ) -> Result<User> {
        if new_password.chars().count() < self.config.min_password_length {
            return Err(SecurityError::InvalidPassword(format!(
                "must be at least {} characters",
                self.config.min_password_length
            )));
        }
        let user = self
            .users
            .find_by_email(email)
            .await?
            .ok_or_else(|| SecurityError::UserNotFound {
                email: email.trim().to_string(),
            })?;

        // Every key is derived before the first write.
        let requests_key = keys::reset_requests()?;
        keys::login_attempts_for(&user.email)?;

        pause(self.config.fulfillment_delay()).await;
        let now = self.clock.now();

        // 1. Credential.
        let credential = {
            let mut rng = self.rng.lock().expect("password rng poisoned");
            credential::hash_password(&mut **rng, new_password)
        };
        let user = self
            .users
            .replace_credential(&user.id, credential, now, actor)
            .await
            .map_err(|e| match e {
                nook_repo::RepoError::NotFound { .. } => SecurityError::UserNotFound {
                    email: email.trim().to_string(),
                },
                other => other.into(),
            })?;

        // 2. The most recent pending request for this email, and only that one.
        {
            let key = &requests_key;
            let _guard = self.store.lock(key).await;
            let mut requests: Vec<ResetRequest> = self.store.get(key).await?.unwrap_or_default();
            let latest = requests
                .iter_mut()
                .filter(|r| r.is_pending() && r.is_for(email))
                .max_by_key(|r| r.requested_at);
            match latest {
                Some(request) => {
                    request.fulfill(now, actor);
                    self.store.set(key, &requests).await?;
                }
                None => debug!("no pending request; reset performed directly"),
            }
        }

        // 3. Audit.
        self.append_log(SecurityLogEntry {
            kind: SecurityEventKind::ResetFulfilled,
            email: user.email.clone(),
            timestamp: now,
            actor: Some(actor.to_string()),
            client_context: client,
        })
        .await?;

        // 4. Login counter.
        self.throttle.reset(&user.email).await?;

        info!(id = %user.id, actor, "password reset fulfilled");
        Ok(user)
    }

    /// A fresh random password of the configured length.
    pub fn generate_password(&self) -> String {
        let mut rng = self.rng.lock().expect("password rng poisoned");
        credential::generate_password(&mut **rng, self.config.password_length)
    }

    /// Hash `password` under a fresh salt from this workflow's generator.
    pub fn new_credential(&self, password: &str) -> nook_types::Credential {
        let mut rng = self.rng.lock().expect("password rng poisoned");
        credential::hash_password(&mut **rng, password)
    }

    // -----------------------------------------------------------------------
    // Login
    // -----------------------------------------------------------------------

    /// Check `password` for `email`, honoring and updating the throttle.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<User> {
        if let Some(until) = self.throttle.check(email).await? {
            return Err(SecurityError::AccountLocked { until });
        }
        match self.users.find_by_email(email).await? {
            Some(user) if credential::verify_password(&user, password) => {
                self.throttle.record_success(email).await?;
                Ok(user)
            }
            _ => {
                let record = self.throttle.record_failure(email).await?;
                match record.lock_until {
                    Some(until) => Err(SecurityError::AccountLocked { until }),
                    None => Err(SecurityError::InvalidCredentials),
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Admin views
    // -----------------------------------------------------------------------

    /// Unfulfilled requests, newest first.
    pub async fn pending_requests(&self) -> Result<Vec<ResetRequest>> {
        let mut pending: Vec<ResetRequest> = self
            .load_requests()
            .await?
            .into_iter()
            .filter(ResetRequest::is_pending)
            .collect();
        pending.sort_by(|a, b| b.requested_at.cmp(&a.requested_at));
        Ok(pending)
    }

    /// Every request, newest first, optionally restricted to emails that
    /// contain `filter` (ignoring case).
    pub async fn reset_requests(&self, filter: Option<&str>) -> Result<Vec<ResetRequest>> {
        let needle = filter.map(|f| f.trim().to_lowercase());
        let mut requests: Vec<ResetRequest> = self
            .load_requests()
            .await?
            .into_iter()
            .filter(|r| {
                needle
                    .as_deref()
                    .map_or(true, |n| r.email.to_lowercase().contains(n))
            })
            .collect();
        requests.sort_by(|a, b| b.requested_at.cmp(&a.requested_at));
        Ok(requests)
    }

    /// The audit log, oldest first.
    pub async fn audit_log(&self) -> Result<Vec<SecurityLogEntry>> {
        Ok(self
            .store
            .get(&keys::audit_log()?)
            .await?
            .unwrap_or_default())
    }

    async fn load_requests(&self) -> Result<Vec<ResetRequest>> {
        Ok(self
            .store
            .get(&keys::reset_requests()?)
            .await?
            .unwrap_or_default())
    }

    async fn append_log(&self, entry: SecurityLogEntry) -> Result<()> {
        let key = keys::audit_log()?;
        let _guard = self.store.lock(&key).await;
        let mut log: Vec<SecurityLogEntry> = self.store.get(&key).await?.unwrap_or_default();
        log.push(entry);
        self.store.set(&key, &log).await?;
        Ok(())
    }
}

async fn pause(delay: std::time::Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nook_repo::UserRepository;
    use nook_store::{InMemoryBackend, StoreConfig};
    use nook_types::{LoginAttemptRecord, Role, UserDraft};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    struct Fixture {
        store: Arc<KeyedStore>,
        users: Arc<UserRepository>,
        workflow: SecurityWorkflow,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(KeyedStore::new(
            Arc::new(InMemoryBackend::new()),
            StoreConfig::default(),
        ));
        let clock = Arc::new(MonotonicClock::new());
        let users = Arc::new(UserRepository::new(Arc::clone(&store), Arc::clone(&clock)).unwrap());
        let workflow = SecurityWorkflow::with_rng(
            Arc::clone(&store),
            users.clone(),
            clock,
            SecurityConfig::immediate(),
            Box::new(StdRng::seed_from_u64(11)),
        );
        let credential = workflow.new_credential("old-password");
        users
            .register(UserDraft {
                email: "Alice@Example.com".into(),
                name: "Alice".into(),
                role: Role::User,
                credential,
            })
            .await
            .unwrap();
        Fixture {
            store,
            users,
            workflow,
        }
    }

    fn ua() -> ClientContext {
        ClientContext::new("test-agent")
    }

    // -----------------------------------------------------------------------
    // Requests
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn request_is_recorded_for_unknown_emails_too() {
        let f = fixture().await;
        f.workflow.request_reset("nobody@example.com", ua()).await;
        f.workflow.request_reset(" alice@example.com ", ua()).await;

        let pending = f.workflow.pending_requests().await.unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].email, "alice@example.com");

        let log = f.workflow.audit_log().await.unwrap();
        assert_eq!(log.len(), 2);
        assert!(log.iter().all(|e| e.kind == SecurityEventKind::ResetRequested));
        assert_eq!(log[0].client_context.user_agent.as_deref(), Some("test-agent"));
    }

    #[tokio::test]
    async fn reset_requests_filter_by_email_substring() {
        let f = fixture().await;
        f.workflow.request_reset("alice@example.com", ua()).await;
        f.workflow.request_reset("bob@other.org", ua()).await;

        let hits = f.workflow.reset_requests(Some("EXAMPLE")).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].email, "alice@example.com");
        assert_eq!(f.workflow.reset_requests(None).await.unwrap().len(), 2);
    }

    // -----------------------------------------------------------------------
    // Fulfillment
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn unknown_user_writes_nothing() {
        let f = fixture().await;
        f.workflow.request_reset("ghost@example.com", ua()).await;
        f.workflow
            .throttle()
            .record_failure("ghost@example.com")
            .await
            .unwrap();
        let requests_before = f.workflow.reset_requests(None).await.unwrap();
        let log_before = f.workflow.audit_log().await.unwrap();
        let attempts_before = f.workflow.throttle().record("ghost@example.com").await.unwrap();

        let err = f
            .workflow
            .fulfill_reset("ghost@example.com", "new-password", "admin", ua())
            .await
            .unwrap_err();
        assert!(matches!(err, SecurityError::UserNotFound { .. }));

        assert_eq!(f.workflow.reset_requests(None).await.unwrap(), requests_before);
        assert_eq!(f.workflow.audit_log().await.unwrap(), log_before);
        assert_eq!(
            f.workflow.throttle().record("ghost@example.com").await.unwrap(),
            attempts_before
        );
    }

    #[tokio::test]
    async fn fulfillment_updates_exactly_one_request() {
        let f = fixture().await;
        f.workflow.request_reset("alice@example.com", ua()).await;
        f.workflow.request_reset("bob@example.com", ua()).await;
        f.workflow.request_reset("ALICE@example.com", ua()).await;
        for _ in 0..3 {
            f.workflow
                .throttle()
                .record_failure("alice@example.com")
                .await
                .unwrap();
        }
        let old = f.users.find_by_email("alice@example.com").await.unwrap().unwrap();

        let updated = f
            .workflow
            .fulfill_reset("alice@EXAMPLE.com", "brand-new-pw", "admin@example.com", ua())
            .await
            .unwrap();

        // Credential replaced with a fresh salt.
        assert_ne!(updated.credential.salt, old.credential.salt);
        assert!(credential::verify_password(&updated, "brand-new-pw"));
        assert!(!credential::verify_password(&updated, "old-password"));
        assert_eq!(updated.password_reset_by.as_deref(), Some("admin@example.com"));

        // Only the newest pending request for alice is fulfilled.
        let requests = f.workflow.reset_requests(None).await.unwrap();
        let fulfilled: Vec<&ResetRequest> = requests.iter().filter(|r| r.fulfilled).collect();
        assert_eq!(fulfilled.len(), 1);
        assert_eq!(fulfilled[0].email, "ALICE@example.com");
        assert_eq!(fulfilled[0].fulfilled_at, updated.password_reset_at);
        assert_eq!(f.workflow.pending_requests().await.unwrap().len(), 2);

        // One fulfillment entry appended after the three request entries.
        let log = f.workflow.audit_log().await.unwrap();
        assert_eq!(log.len(), 4);
        assert_eq!(log[3].kind, SecurityEventKind::ResetFulfilled);
        assert_eq!(log[3].actor.as_deref(), Some("admin@example.com"));

        // Counter cleared.
        let attempts: LoginAttemptRecord = f
            .store
            .get("security/login_attempts/alice@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(attempts.count, 0);
        assert_eq!(attempts.lock_until, None);
    }

    #[tokio::test]
    async fn fulfillment_without_request_still_resets() {
        let f = fixture().await;
        let user = f
            .workflow
            .fulfill_reset("alice@example.com", "another-pw", "admin", ClientContext::unknown())
            .await
            .unwrap();
        assert!(credential::verify_password(&user, "another-pw"));
        assert!(f.workflow.reset_requests(None).await.unwrap().is_empty());
        assert_eq!(f.workflow.audit_log().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn email_with_separator_completes_every_step() {
        let f = fixture().await;
        let credential = f.workflow.new_credential("old-password");
        f.users
            .register(UserDraft {
                email: "a/b@example.com".into(),
                name: "Slash".into(),
                role: Role::User,
                credential,
            })
            .await
            .unwrap();
        f.workflow.request_reset("a/b@example.com", ua()).await;
        f.workflow
            .throttle()
            .record_failure("a/b@example.com")
            .await
            .unwrap();

        let user = f
            .workflow
            .fulfill_reset("a/b@example.com", "new-password", "admin", ua())
            .await
            .unwrap();
        assert!(credential::verify_password(&user, "new-password"));

        let requests = f.workflow.reset_requests(None).await.unwrap();
        assert!(requests.iter().all(|r| r.fulfilled));
        assert_eq!(f.workflow.audit_log().await.unwrap().len(), 2);
        let attempts: LoginAttemptRecord = f
            .store
            .get("security/login_attempts/a%2Fb@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(attempts.count, 0);

        let signed_in = f
            .workflow
            .authenticate("a/b@example.com", "new-password")
            .await
            .unwrap();
        assert_eq!(signed_in.id, user.id);
    }

    #[tokio::test]
    async fn short_password_is_rejected_before_any_write() {
        let f = fixture().await;
        let err = f
            .workflow
            .fulfill_reset("alice@example.com", "abc", "admin", ua())
            .await
            .unwrap_err();
        assert!(matches!(err, SecurityError::InvalidPassword(_)));
        assert!(f.workflow.audit_log().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn generated_password_has_configured_length() {
        let f = fixture().await;
        let pw = f.workflow.generate_password();
        assert_eq!(pw.len(), 12);
        assert!(pw.bytes().all(|b| credential::PASSWORD_CHARSET.contains(&b)));
    }

    // -----------------------------------------------------------------------
    // Login
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn authenticate_locks_after_repeated_failures() {
        let f = fixture().await;
        let user = f
            .workflow
            .authenticate("alice@example.com", "old-password")
            .await
            .unwrap();
        assert_eq!(user.name, "Alice");

        let max = f.workflow.config().throttle.max_attempts;
        for _ in 1..max {
            let err = f
                .workflow
                .authenticate("alice@example.com", "wrong")
                .await
                .unwrap_err();
            assert!(matches!(err, SecurityError::InvalidCredentials));
        }
        let err = f
            .workflow
            .authenticate("alice@example.com", "wrong")
            .await
            .unwrap_err();
        assert!(matches!(err, SecurityError::AccountLocked { .. }));

        // Even the right password is refused while locked.
        let err = f
            .workflow
            .authenticate("alice@example.com", "old-password")
            .await
            .unwrap_err();
        assert!(matches!(err, SecurityError::AccountLocked { .. }));

        // An administrator reset lifts the lock.
        f.workflow
            .fulfill_reset("alice@example.com", "fresh-pw-1", "admin", ua())
            .await
            .unwrap();
        f.workflow
            .authenticate("alice@example.com", "fresh-pw-1")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn unknown_email_fails_like_wrong_password() {
        let f = fixture().await;
        let err = f
            .workflow
            .authenticate("nobody@example.com", "whatever")
            .await
            .unwrap_err();
        assert!(matches!(err, SecurityError::InvalidCredentials));
    }
}
