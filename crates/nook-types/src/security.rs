use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A password-reset request. `Requested → Fulfilled`, never deleted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetRequest {
    pub email: String,
    pub requested_at: DateTime<Utc>,
    #[serde(default)]
    pub fulfilled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fulfilled_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fulfilled_by: Option<String>,
}

impl ResetRequest {
    pub fn new(email: impl Into<String>, requested_at: DateTime<Utc>) -> Self {
        Self {
            email: email.into(),
            requested_at,
            fulfilled: false,
            fulfilled_at: None,
            fulfilled_by: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        !self.fulfilled
    }

    pub fn is_for(&self, email: &str) -> bool {
        self.email.trim().eq_ignore_ascii_case(email.trim())
    }

    /// Move to the terminal `Fulfilled` state. Returns `false` if the
    /// request was already fulfilled; a fulfilled request is never touched.
    pub fn fulfill(&mut self, at: DateTime<Utc>, by: impl Into<String>) -> bool {
        if self.fulfilled {
            return false;
        }
        self.fulfilled = true;
        self.fulfilled_at = Some(at);
        self.fulfilled_by = Some(by.into());
        true
    }
}

/// Kind of a security audit event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityEventKind {
    ResetRequested,
    ResetFulfilled,
}

impl fmt::Display for SecurityEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ResetRequested => write!(f, "reset_requested"),
            Self::ResetFulfilled => write!(f, "reset_fulfilled"),
        }
    }
}

/// Describes the client that triggered a security event.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl ClientContext {
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self {
            user_agent: Some(user_agent.into()),
        }
    }

    pub fn unknown() -> Self {
        Self::default()
    }
}

/// An append-only audit log entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityLogEntry {
    #[serde(rename = "type")]
    pub kind: SecurityEventKind,
    pub email: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
    #[serde(default)]
    pub client_context: ClientContext,
}

/// Failed-login bookkeeping for one email address.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginAttemptRecord {
    pub count: u32,
    pub last_attempt_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock_until: Option<DateTime<Utc>>,
}

impl LoginAttemptRecord {
    /// A cleared record: no failures, no lock.
    pub fn cleared(at: DateTime<Utc>) -> Self {
        Self {
            count: 0,
            last_attempt_at: at,
            lock_until: None,
        }
    }

    pub fn is_locked_at(&self, now: DateTime<Utc>) -> bool {
        self.lock_until.is_some_and(|until| until > now)
    }
}
