//! Foundation types for Nook.
//!
//! This crate provides the records, identifiers and timestamps shared by
//! every other Nook crate. It performs no I/O.
//!
//! # Key Types
//!
//! - [`EntityId`] -- generated, time-ordered string identifier (UUID v7)
//! - [`MonotonicClock`] -- wall clock that never runs backwards
//! - [`Entity`] -- a record stored in a per-kind collection
//! - [`Job`], [`Listing`], [`Reservation`], [`User`] -- the stored entities
//! - [`ImageSource`] -- trust classification of an image reference
//! - [`ResetRequest`], [`SecurityLogEntry`], [`LoginAttemptRecord`] -- security records

pub mod clock;
pub mod entity;
pub mod error;
pub mod id;
pub mod media;
pub mod security;

pub use clock::MonotonicClock;
pub use entity::{
    Credential, Entity, EntityKind, Job, JobDraft, JobPatch, Listing, ListingDraft, ListingPatch,
    Reservation, ReservationDraft, ReservationPatch, ReservationStatus, Role, User, UserDraft,
    UserPatch,
};
pub use error::TypeError;
pub use id::EntityId;
pub use media::{Illustrated, ImageSource};
pub use security::{
    ClientContext, LoginAttemptRecord, ResetRequest, SecurityEventKind, SecurityLogEntry,
};
