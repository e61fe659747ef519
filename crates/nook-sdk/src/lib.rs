//! High-level API for Nook.
//!
//! [`Nook`] wires every subsystem over one keyed store and one clock. This
//! is the entry point for applications embedding Nook.

pub mod config;
pub mod error;
pub mod nook;

pub use config::NookConfig;
pub use error::{SdkError, SdkResult};
pub use nook::{CollectionHealth, Nook};

// Re-export key types
pub use nook_cache::{CacheEvent, CacheEventKind, CachedQuery, QueryKey};
pub use nook_media::{ImageOrigin, Resolution};
pub use nook_security::SecurityError;
pub use nook_types::{
    ClientContext, EntityId, EntityKind, Job, JobDraft, JobPatch, Listing, ListingDraft,
    ListingPatch, Reservation, ReservationDraft, ReservationStatus, ResetRequest, Role,
    SecurityLogEntry, User,
};
