//! Keyed JSON storage for Nook.
//!
//! This crate stands in for a database on top of a string-keyed substrate
//! that offers no transactions and no atomic multi-key writes. The substrate
//! is always injected, never ambient.
//!
//! # Layers
//!
//! - [`KeyValueBackend`] -- the raw substrate: string keys, string values,
//!   ordered key enumeration.
//! - [`InMemoryBackend`] -- `BTreeMap`-based substrate for tests and embedding.
//! - [`FileBackend`] -- substrate persisted as one JSON document on disk.
//! - [`KeyedStore`] -- async typed facade: JSON (de)serialization, namespaces,
//!   simulated latency, per-key write ordering.
//!
//! # Design Rules
//!
//! 1. A value that fails to decode is absent, never fatal.
//! 2. Every read and write is a suspension point.
//! 3. Last write wins per key; nothing spans more than one key atomically.
//! 4. Keys are built from [`Namespace`]s, never by ad-hoc string joins.

pub mod config;
pub mod error;
pub mod file;
pub mod keyed;
pub mod memory;
pub mod namespace;
pub mod traits;

pub use config::StoreConfig;
pub use error::{StoreError, StoreResult};
pub use file::FileBackend;
pub use keyed::{KeyGuard, KeyedStore, Lookup};
pub use memory::InMemoryBackend;
pub use namespace::Namespace;
pub use traits::KeyValueBackend;
