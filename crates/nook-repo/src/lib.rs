//! Entity repositories for Nook.
//!
//! Each entity kind is stored as one ordered JSON array under a single
//! collection key. Writes read the whole collection, apply one change and
//! rewrite the whole collection while holding that key's write guard, which
//! makes every single-entity write atomic per collection. Nothing is atomic
//! across collections: writing a reservation never touches its listing.
//!
//! # Modules
//!
//! - [`error`] -- [`RepoError`] and the [`Result`] alias
//! - [`keys`] -- collection key layout
//! - [`repository`] -- generic [`Repository`] over any [`Entity`](nook_types::Entity)
//! - [`users`] -- user lookups by email
//! - [`reservations`] -- per-listing queries and status changes

pub mod error;
pub mod keys;
pub mod repository;
pub mod reservations;
pub mod users;

pub use error::{RepoError, Result};
pub use repository::Repository;

use nook_types::{Job, Listing, Reservation, User};

pub type JobRepository = Repository<Job>;
pub type ListingRepository = Repository<Listing>;
pub type ReservationRepository = Repository<Reservation>;
pub type UserRepository = Repository<User>;
