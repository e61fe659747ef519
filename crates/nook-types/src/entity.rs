//! Stored entity records and their draft/patch companions.
//!
//! Every entity lives in one per-kind collection. Callers never supply the
//! `id` or `created_at` of a new record: they hand a *draft* to the
//! repository, which stamps both. Updates are expressed as *patches* whose
//! `Some` fields overwrite the stored value.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::id::EntityId;

/// The kind of a stored entity. Each kind owns one collection key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Job,
    Listing,
    Reservation,
    User,
}

impl EntityKind {
    pub const ALL: [EntityKind; 4] = [Self::Job, Self::Listing, Self::Reservation, Self::User];

    /// Collection name used in storage keys.
    pub fn collection(&self) -> &'static str {
        match self {
            Self::Job => "jobs",
            Self::Listing => "listings",
            Self::Reservation => "reservations",
            Self::User => "users",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Job => write!(f, "job"),
            Self::Listing => write!(f, "listing"),
            Self::Reservation => write!(f, "reservation"),
            Self::User => write!(f, "user"),
        }
    }
}

impl std::str::FromStr for EntityKind {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "job" | "jobs" => Ok(Self::Job),
            "listing" | "listings" => Ok(Self::Listing),
            "reservation" | "reservations" => Ok(Self::Reservation),
            "user" | "users" => Ok(Self::User),
            other => Err(TypeError::UnknownKind(other.to_string())),
        }
    }
}

/// A record stored in a per-kind collection.
pub trait Entity:
    Clone + fmt::Debug + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Caller-supplied fields of a new record.
    type Draft: Send + 'static;
    /// Partial update; `None` fields are left untouched.
    type Patch: Send + 'static;

    const KIND: EntityKind;

    fn id(&self) -> &EntityId;

    fn created_at(&self) -> DateTime<Utc>;

    /// Build a record from a draft and the generated identity.
    fn from_draft(id: EntityId, created_at: DateTime<Utc>, draft: Self::Draft) -> Self;

    fn apply_patch(&mut self, patch: Self::Patch);

    /// Reject drafts that can never form a valid record.
    fn validate_draft(_draft: &Self::Draft) -> Result<(), TypeError> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Jobs
// ---------------------------------------------------------------------------

/// A job offer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: EntityId,
    pub title: String,
    pub company: String,
    pub location: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub salary: Option<String>,
    #[serde(default)]
    pub contract_type: Option<String>,
    #[serde(default)]
    pub contact_email: Option<String>,
    /// Primary display image.
    #[serde(default)]
    pub image: Option<String>,
    /// Secondary gallery images, in display order.
    #[serde(default)]
    pub images: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDraft {
    pub title: String,
    pub company: String,
    pub location: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub salary: Option<String>,
    #[serde(default)]
    pub contract_type: Option<String>,
    #[serde(default)]
    pub contact_email: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct JobPatch {
    pub title: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub salary: Option<Option<String>>,
    pub contract_type: Option<Option<String>>,
    pub contact_email: Option<Option<String>>,
    pub image: Option<Option<String>>,
    pub images: Option<Vec<String>>,
}

impl Entity for Job {
    type Draft = JobDraft;
    type Patch = JobPatch;

    const KIND: EntityKind = EntityKind::Job;

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn from_draft(id: EntityId, created_at: DateTime<Utc>, draft: JobDraft) -> Self {
        Self {
            id,
            title: draft.title,
            company: draft.company,
            location: draft.location,
            description: draft.description,
            salary: draft.salary,
            contract_type: draft.contract_type,
            contact_email: draft.contact_email,
            image: draft.image,
            images: draft.images,
            created_at,
        }
    }

    fn apply_patch(&mut self, patch: JobPatch) {
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(company) = patch.company {
            self.company = company;
        }
        if let Some(location) = patch.location {
            self.location = location;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(salary) = patch.salary {
            self.salary = salary;
        }
        if let Some(contract_type) = patch.contract_type {
            self.contract_type = contract_type;
        }
        if let Some(contact_email) = patch.contact_email {
            self.contact_email = contact_email;
        }
        if let Some(image) = patch.image {
            self.image = image;
        }
        if let Some(images) = patch.images {
            self.images = images;
        }
    }
}

// ---------------------------------------------------------------------------
// Listings
// ---------------------------------------------------------------------------

/// A rental listing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    pub id: EntityId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub location: String,
    pub price_per_night: f64,
    #[serde(default = "default_capacity")]
    pub capacity: u32,
    #[serde(default)]
    pub host_email: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    pub created_at: DateTime<Utc>,
}

fn default_capacity() -> u32 {
    1
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingDraft {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub location: String,
    pub price_per_night: f64,
    #[serde(default = "default_capacity")]
    pub capacity: u32,
    #[serde(default)]
    pub host_email: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ListingPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub price_per_night: Option<f64>,
    pub capacity: Option<u32>,
    pub host_email: Option<Option<String>>,
    pub image: Option<Option<String>>,
    pub images: Option<Vec<String>>,
}

impl Entity for Listing {
    type Draft = ListingDraft;
    type Patch = ListingPatch;

    const KIND: EntityKind = EntityKind::Listing;

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn from_draft(id: EntityId, created_at: DateTime<Utc>, draft: ListingDraft) -> Self {
        Self {
            id,
            title: draft.title,
            description: draft.description,
            location: draft.location,
            price_per_night: draft.price_per_night,
            capacity: draft.capacity,
            host_email: draft.host_email,
            image: draft.image,
            images: draft.images,
            created_at,
        }
    }

    fn apply_patch(&mut self, patch: ListingPatch) {
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(location) = patch.location {
            self.location = location;
        }
        if let Some(price) = patch.price_per_night {
            self.price_per_night = price;
        }
        if let Some(capacity) = patch.capacity {
            self.capacity = capacity;
        }
        if let Some(host_email) = patch.host_email {
            self.host_email = host_email;
        }
        if let Some(image) = patch.image {
            self.image = image;
        }
        if let Some(images) = patch.images {
            self.images = images;
        }
    }

    fn validate_draft(draft: &ListingDraft) -> Result<(), TypeError> {
        if !draft.price_per_night.is_finite() || draft.price_per_night < 0.0 {
            return Err(TypeError::InvalidPrice(draft.price_per_night.to_string()));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Reservations
// ---------------------------------------------------------------------------

/// Lifecycle of a reservation. New reservations start as `Pending`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    #[default]
    Pending,
    Confirmed,
    Cancelled,
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Confirmed => write!(f, "confirmed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// A booking of a listing. Holds the listing id only; the listing itself is
/// not updated when a reservation is written.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reservation {
    pub id: EntityId,
    pub listing_id: EntityId,
    pub guest_name: String,
    pub guest_email: String,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    #[serde(default = "default_capacity")]
    pub guests: u32,
    #[serde(default)]
    pub status: ReservationStatus,
    pub created_at: DateTime<Utc>,
}

impl Reservation {
    /// Number of nights booked.
    pub fn nights(&self) -> i64 {
        (self.check_out - self.check_in).num_days()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationDraft {
    pub listing_id: EntityId,
    pub guest_name: String,
    pub guest_email: String,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    #[serde(default = "default_capacity")]
    pub guests: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReservationPatch {
    pub guest_name: Option<String>,
    pub guest_email: Option<String>,
    pub check_in: Option<NaiveDate>,
    pub check_out: Option<NaiveDate>,
    pub guests: Option<u32>,
    pub status: Option<ReservationStatus>,
}

impl Entity for Reservation {
    type Draft = ReservationDraft;
    type Patch = ReservationPatch;

    const KIND: EntityKind = EntityKind::Reservation;

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn from_draft(id: EntityId, created_at: DateTime<Utc>, draft: ReservationDraft) -> Self {
        Self {
            id,
            listing_id: draft.listing_id,
            guest_name: draft.guest_name,
            guest_email: draft.guest_email,
            check_in: draft.check_in,
            check_out: draft.check_out,
            guests: draft.guests,
            status: ReservationStatus::Pending,
            created_at,
        }
    }

    fn apply_patch(&mut self, patch: ReservationPatch) {
        if let Some(name) = patch.guest_name {
            self.guest_name = name;
        }
        if let Some(email) = patch.guest_email {
            self.guest_email = email;
        }
        if let Some(check_in) = patch.check_in {
            self.check_in = check_in;
        }
        if let Some(check_out) = patch.check_out {
            self.check_out = check_out;
        }
        if let Some(guests) = patch.guests {
            self.guests = guests;
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
    }

    fn validate_draft(draft: &ReservationDraft) -> Result<(), TypeError> {
        if draft.check_out <= draft.check_in {
            return Err(TypeError::InvalidDateRange {
                check_in: draft.check_in.to_string(),
                check_out: draft.check_out.to_string(),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Admin => write!(f, "admin"),
        }
    }
}

/// Salted credential material. Never holds the plain password.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    pub password_hash: String,
    pub salt: String,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("password_hash", &"<redacted>")
            .field("salt", &self.salt)
            .finish()
    }
}

/// A user account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: EntityId,
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub role: Role,
    #[serde(flatten)]
    pub credential: Credential,
    #[serde(default)]
    pub password_reset_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub password_reset_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Case-insensitive email comparison.
    pub fn has_email(&self, email: &str) -> bool {
        self.email.trim().eq_ignore_ascii_case(email.trim())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserDraft {
    pub email: String,
    pub name: String,
    pub role: Role,
    pub credential: Credential,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UserPatch {
    pub name: Option<String>,
    pub role: Option<Role>,
    pub credential: Option<Credential>,
    pub password_reset_at: Option<DateTime<Utc>>,
    pub password_reset_by: Option<String>,
}

impl Entity for User {
    type Draft = UserDraft;
    type Patch = UserPatch;

    const KIND: EntityKind = EntityKind::User;

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn from_draft(id: EntityId, created_at: DateTime<Utc>, draft: UserDraft) -> Self {
        Self {
            id,
            email: draft.email.trim().to_string(),
            name: draft.name,
            role: draft.role,
            credential: draft.credential,
            password_reset_at: None,
            password_reset_by: None,
            created_at,
        }
    }

    fn apply_patch(&mut self, patch: UserPatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(role) = patch.role {
            self.role = role;
        }
        if let Some(credential) = patch.credential {
            self.credential = credential;
        }
        if let Some(at) = patch.password_reset_at {
            self.password_reset_at = Some(at);
        }
        if let Some(by) = patch.password_reset_by {
            self.password_reset_by = Some(by);
        }
    }

    fn validate_draft(draft: &UserDraft) -> Result<(), TypeError> {
        let email = draft.email.trim();
        match email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
            _ => Err(TypeError::InvalidEmail(draft.email.clone())),
        }
    }
}
