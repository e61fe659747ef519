//! Key layout under `security/`.

use nook_store::{Namespace, StoreResult};

fn security() -> StoreResult<Namespace> {
    Namespace::root("security")
}

pub fn reset_requests() -> StoreResult<String> {
    security()?.key("reset_requests")
}

pub fn audit_log() -> StoreResult<String> {
    security()?.key("audit_log")
}

pub fn login_attempts() -> StoreResult<Namespace> {
    security()?.child("login_attempts")
}

/// Attempts are tracked per normalized (trimmed, lowercased) email,
/// escaped into a single key segment.
pub fn login_attempts_for(email: &str) -> StoreResult<String> {
    login_attempts()?.key(&escape_segment(&normalize_email(email)))
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

/// Percent-escape the bytes a key segment may not hold (`/`, `%`,
/// whitespace, control characters). `.` and `..` are escaped whole.
/// Ordinary addresses come out unchanged.
fn escape_segment(raw: &str) -> String {
    if raw == "." || raw == ".." {
        return raw.replace('.', "%2E");
    }
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if c == '/' || c == '%' || c.is_whitespace() || c.is_control() {
            let mut buf = [0u8; 4];
            for byte in c.encode_utf8(&mut buf).bytes() {
                out.push_str(&format!("%{byte:02X}"));
            }
        } else {
            out.push(c);
        }
    }
    out
}
