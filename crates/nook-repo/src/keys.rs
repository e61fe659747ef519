//! Collection key layout: `collections/<kind>`.

use nook_store::{Namespace, StoreResult};
use nook_types::EntityKind;

/// Namespace holding every entity collection.
pub fn collections() -> StoreResult<Namespace> {
    Namespace::root("collections")
}

/// The single key holding the whole collection of `kind`.
pub fn collection_key(kind: EntityKind) -> StoreResult<String> {
    collections()?.key(kind.collection())
}
