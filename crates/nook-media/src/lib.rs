//! Image resolution for Nook.
//!
//! Entities carry a primary image and a gallery. Both can be missing or
//! degraded on the record while better references survive in separate
//! per-entity keys, or in a process-wide "latest upload" bucket. The
//! [`ImageResolver`] repairs a record from those sources, in order, and
//! never lets a session-local (`blob:`) reference through.
//!
//! # Key Layout
//!
//! - `images/<kind>/<id>/gallery` -- JSON array of references
//! - `images/<kind>/<id>/primary` -- one reference, stored as text
//! - `images/<kind>/latest/gallery`, `images/<kind>/latest/primary` --
//!   the last upload of that kind, used as a last resort

pub mod config;
pub mod error;
pub mod keys;
pub mod resolver;

pub use config::{MediaConfig, DEFAULT_PLACEHOLDER};
pub use error::{MediaError, MediaResult};
pub use keys::ImageKeys;
pub use resolver::{ImageOrigin, ImageResolver, Resolution};
