use std::sync::Arc;

use chrono::{DateTime, Utc};
use nook_store::KeyedStore;
use nook_types::{LoginAttemptRecord, MonotonicClock};
use tracing::{debug, info, warn};

use crate::config::ThrottleConfig;
use crate::error::Result;
use crate::keys;

/// Per-email failed-login counter with temporary lockout.
///
/// Failures older than the configured window are forgotten on the next
/// failure. Reaching `max_attempts` within the window locks the email for
/// the configured duration.
pub struct LoginThrottle {
    store: Arc<KeyedStore>,
    clock: Arc<MonotonicClock>,
    config: ThrottleConfig,
}

impl LoginThrottle {
    pub fn new(store: Arc<KeyedStore>, clock: Arc<MonotonicClock>, config: ThrottleConfig) -> Self {
        Self {
            store,
            clock,
            config,
        }
    }

    pub fn config(&self) -> &ThrottleConfig {
        &self.config
    }

    /// The stored record for `email`, if any.
    pub async fn record(&self, email: &str) -> Result<Option<LoginAttemptRecord>> {
        Ok(self.store.get(&keys::login_attempts_for(email)?).await?)
    }

    /// When the email is locked, the instant the lock ends.
    pub async fn check(&self, email: &str) -> Result<Option<DateTime<Utc>>> {
        let now = self.clock.now();
        Ok(self
            .record(email)
            .await?
            .filter(|r| r.is_locked_at(now))
            .and_then(|r| r.lock_until))
    }

    /// Count one failed login and lock the email if the limit is reached.
    pub async fn record_failure(&self, email: &str) -> Result<LoginAttemptRecord> {
        let key = keys::login_attempts_for(email)?;
        let _guard = self.store.lock(&key).await;
        let now = self.clock.now();

        let mut record = match self.store.get::<LoginAttemptRecord>(&key).await? {
            Some(r) if r.is_locked_at(now) => r,
            Some(r) if now - r.last_attempt_at <= self.config.window() => r,
            _ => LoginAttemptRecord::cleared(now),
        };
        record.count = record.count.saturating_add(1);
        record.last_attempt_at = now;
        if record.lock_until.is_some_and(|until| until <= now) {
            record.lock_until = None;
        }
        if record.lock_until.is_none() && record.count >= self.config.max_attempts {
            let until = now + self.config.lock_duration();
            record.lock_until = Some(until);
            warn!(email = %keys::normalize_email(email), count = record.count, %until,
                "too many failed logins; locked");
        } else {
            debug!(
                email = %keys::normalize_email(email),
                count = record.count,
                "failed login recorded"
            );
        }
        self.store.set(&key, &record).await?;
        Ok(record)
    }

    /// A successful login clears the counter.
    pub async fn record_success(&self, email: &str) -> Result<()> {
        self.reset(email).await
    }

    /// Clear the counter and any lock.
    pub async fn reset(&self, email: &str) -> Result<()> {
        let key = keys::login_attempts_for(email)?;
        let _guard = self.store.lock(&key).await;
        let record = LoginAttemptRecord::cleared(self.clock.now());
        self.store.set(&key, &record).await?;
        info!(email = %keys::normalize_email(email), "login attempts reset");
        Ok(())
    }
}
