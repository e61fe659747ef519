//! Optimistic query cache for Nook.
//!
//! A [`MutationCache`] mirrors query results (for example the list of all
//! reservations) so views can render without re-reading the store. A
//! mutation first awaits its store write; only when that succeeds is the
//! optimistic effect applied to the mirrored list and the query marked
//! stale, so the next [`reconcile`](MutationCache::reconcile) re-reads the
//! authoritative collection.

pub mod cache;
pub mod query;

pub use cache::{CacheConfig, CacheEvent, CacheEventKind, EventStream, MutationCache};
pub use query::{CachedQuery, Optimistic, QueryKey};
