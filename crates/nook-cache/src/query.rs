use std::fmt;

use nook_types::{Entity, EntityId, EntityKind};
use serde::{Deserialize, Serialize};

/// Names one cached query.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryKey(String);

impl QueryKey {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The query listing every entity of `kind`, e.g. `reservations`.
    pub fn all(kind: EntityKind) -> Self {
        Self(kind.collection().to_string())
    }

    /// A query scoped under another, e.g. `reservations/<listing-id>`.
    pub fn scoped(&self, scope: &EntityId) -> Self {
        Self(format!("{}/{}", self.0, scope))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A snapshot of one cached query.
#[derive(Clone, Debug, PartialEq)]
pub struct CachedQuery<E> {
    pub entries: Vec<E>,
    /// Set after a mutation or invalidation; the entries may lag the store.
    pub stale: bool,
}

/// The local effect of a successful write.
#[derive(Clone, Debug, PartialEq)]
pub enum Optimistic<E> {
    /// Replace the entry with the same id, or append it.
    Upsert(E),
    /// Drop the entry with this id.
    Remove(EntityId),
    /// Leave the entries alone; only mark the query stale.
    Nothing,
}

impl<E: Entity> Optimistic<E> {
    pub(crate) fn apply(self, entries: &mut Vec<E>) {
        match self {
            Self::Upsert(entity) => {
                match entries.iter_mut().find(|e| e.id() == entity.id()) {
                    Some(slot) => *slot = entity,
                    None => entries.push(entity),
                }
            }
            Self::Remove(id) => entries.retain(|e| e.id() != &id),
            Self::Nothing => {}
        }
    }
}
