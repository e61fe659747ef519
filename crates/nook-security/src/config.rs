use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Failed-login lockout policy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThrottleConfig {
    /// Failures within the window that trigger a lock.
    pub max_attempts: u32,
    /// Failures older than this no longer count, in seconds.
    pub window_secs: u64,
    /// How long a lock lasts, in seconds.
    pub lock_secs: u64,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            window_secs: 15 * 60,
            lock_secs: 15 * 60,
        }
    }
}

impl ThrottleConfig {
    pub fn window(&self) -> chrono::Duration {
        seconds(self.window_secs)
    }

    pub fn lock_duration(&self) -> chrono::Duration {
        seconds(self.lock_secs)
    }
}

/// Saturates at the largest duration `chrono` can represent.
fn seconds(secs: u64) -> chrono::Duration {
    let max = i64::MAX / 1000;
    chrono::Duration::seconds(i64::try_from(secs).unwrap_or(max).min(max))
}

/// Configuration for the [`SecurityWorkflow`](crate::SecurityWorkflow).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Length of generated passwords.
    pub password_length: usize,
    /// Minimum length accepted when an administrator sets a password.
    pub min_password_length: usize,
    /// Simulated latency before a reset request is recorded, in milliseconds.
    pub request_delay_ms: u64,
    /// Simulated latency before a reset is fulfilled, in milliseconds.
    pub fulfillment_delay_ms: u64,
    pub throttle: ThrottleConfig,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            password_length: 12,
            min_password_length: 6,
            request_delay_ms: 0,
            fulfillment_delay_ms: 1000,
            throttle: ThrottleConfig::default(),
        }
    }
}

impl SecurityConfig {
    /// No simulated latency anywhere.
    pub fn immediate() -> Self {
        Self {
            request_delay_ms: 0,
            fulfillment_delay_ms: 0,
            ..Default::default()
        }
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn fulfillment_delay(&self) -> Duration {
        Duration::from_millis(self.fulfillment_delay_ms)
    }
}
