//! Security workflows for Nook.
//!
//! Anyone may ask for a password reset; an administrator fulfills it by
//! setting a new password. Every step leaves a [`SecurityLogEntry`] in an
//! append-only audit log. Failed logins are counted per email by the
//! [`LoginThrottle`], which a fulfilled reset clears.
//!
//! # Key Layout
//!
//! - `security/reset_requests` -- JSON array of [`ResetRequest`]
//! - `security/audit_log` -- JSON array of [`SecurityLogEntry`]
//! - `security/login_attempts/<email>` -- one [`LoginAttemptRecord`] per email
//!
//! [`SecurityLogEntry`]: nook_types::SecurityLogEntry
//! [`ResetRequest`]: nook_types::ResetRequest
//! [`LoginAttemptRecord`]: nook_types::LoginAttemptRecord

pub mod config;
pub mod credential;
pub mod directory;
pub mod error;
pub mod keys;
pub mod throttle;
pub mod workflow;

pub use config::{SecurityConfig, ThrottleConfig};
pub use credential::{
    generate_password, hash_password, os_rng, verify_credential, verify_password, PasswordRng,
    PASSWORD_CHARSET,
};
pub use directory::UserDirectory;
pub use error::{Result, SecurityError};
pub use throttle::LoginThrottle;
pub use workflow::SecurityWorkflow;
