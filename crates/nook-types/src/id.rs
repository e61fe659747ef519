use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TypeError;

/// Unique string identifier of a stored entity.
///
/// Generated identifiers are UUID v7 strings, so they sort in creation order
/// within a process. Identifiers read back from storage are accepted as long
/// as they are non-empty and contain no key separator.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    /// Generate a fresh, time-ordered identifier.
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Parse a caller-supplied identifier.
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        let trimmed = s.trim();
        if trimmed.is_empty() || trimmed.contains('/') || trimmed.chars().any(char::is_whitespace)
        {
            return Err(TypeError::InvalidId(s.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short identifier (first 8 characters).
    pub fn short_id(&self) -> &str {
        let end = self.0.char_indices().nth(8).map_or(self.0.len(), |(i, _)| i);
        &self.0[..end]
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({})", self.0)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for EntityId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for EntityId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_unique_and_ordered() {
        let ids: Vec<EntityId> = (0..100).map(|_| EntityId::generate()).collect();
        for w in ids.windows(2) {
            assert!(w[0] < w[1], "{:?} should sort before {:?}", w[0], w[1]);
        }
    }

    #[test]
    fn parse_rejects_empty_and_separators() {
        assert!(EntityId::parse("").is_err());
        assert!(EntityId::parse("   ").is_err());
        assert!(EntityId::parse("a/b").is_err());
        assert!(EntityId::parse("a b").is_err());
        assert_eq!(EntityId::parse(" abc123 ").unwrap().as_str(), "abc123");
    }

    #[test]
    fn short_id_truncates() {
        let id = EntityId::parse("0123456789abcdef").unwrap();
        assert_eq!(id.short_id(), "01234567");
        let short = EntityId::parse("abc").unwrap();
        assert_eq!(short.short_id(), "abc");
    }

    #[test]
    fn serde_is_transparent() {
        let id = EntityId::parse("job-1").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"job-1\"");
        let back: EntityId = serde_json::from_str("\"job-1\"").unwrap();
        assert_eq!(back, id);
    }
}
