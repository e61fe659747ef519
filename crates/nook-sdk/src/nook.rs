use std::path::Path;
use std::sync::Arc;

use nook_cache::{MutationCache, Optimistic, QueryKey};
use nook_media::{ImageResolver, Resolution};
use nook_repo::{
    JobRepository, ListingRepository, RepoError, ReservationRepository, UserRepository,
};
use nook_security::SecurityWorkflow;
use nook_store::{FileBackend, InMemoryBackend, KeyValueBackend, KeyedStore};
use nook_types::{
    Entity, EntityId, EntityKind, Illustrated, Job, JobDraft, JobPatch, Listing, ListingDraft,
    ListingPatch, MonotonicClock, Reservation, ReservationDraft, ReservationStatus, Role, User,
    UserDraft,
};
use tracing::{info, warn};

use crate::config::NookConfig;
use crate::error::{SdkError, SdkResult};

/// Outcome of checking one stored collection.
#[derive(Debug)]
pub struct CollectionHealth {
    pub kind: EntityKind,
    pub key: String,
    /// Entity count, or why the collection does not decode.
    pub status: Result<usize, RepoError>,
}

/// High-level Nook API.
///
/// Every component shares one [`KeyedStore`] and one [`MonotonicClock`].
/// Listing, job and reservation writes go through a [`MutationCache`] so
/// list views can be served without re-reading the store.
pub struct Nook {
    store: Arc<KeyedStore>,
    jobs: JobRepository,
    listings: ListingRepository,
    reservations: ReservationRepository,
    users: Arc<UserRepository>,
    images: ImageResolver,
    security: SecurityWorkflow,
    job_cache: MutationCache<Job>,
    listing_cache: MutationCache<Listing>,
    reservation_cache: MutationCache<Reservation>,
    config: NookConfig,
}

impl Nook {
    /// A Nook over a fresh in-memory substrate with default configuration.
    pub fn in_memory() -> SdkResult<Self> {
        Self::with_backend(Arc::new(InMemoryBackend::new()), NookConfig::default())
    }

    /// A Nook persisted to the JSON document at `path`.
    pub fn open(path: &Path, config: NookConfig) -> SdkResult<Self> {
        let backend = FileBackend::open(path)?;
        info!(path = %path.display(), "store opened");
        Self::with_backend(Arc::new(backend), config)
    }

    pub fn with_backend(backend: Arc<dyn KeyValueBackend>, config: NookConfig) -> SdkResult<Self> {
        let store = Arc::new(KeyedStore::new(backend, config.store.clone()));
        let clock = Arc::new(MonotonicClock::new());
        let users = Arc::new(UserRepository::new(Arc::clone(&store), Arc::clone(&clock))?);
        let security = SecurityWorkflow::new(
            Arc::clone(&store),
            users.clone(),
            Arc::clone(&clock),
            config.security.clone(),
        );
        Ok(Self {
            jobs: JobRepository::new(Arc::clone(&store), Arc::clone(&clock))?,
            listings: ListingRepository::new(Arc::clone(&store), Arc::clone(&clock))?,
            reservations: ReservationRepository::new(Arc::clone(&store), Arc::clone(&clock))?,
            images: ImageResolver::new(Arc::clone(&store), config.media.clone()),
            job_cache: MutationCache::new(config.cache.clone()),
            listing_cache: MutationCache::new(config.cache.clone()),
            reservation_cache: MutationCache::new(config.cache.clone()),
            users,
            security,
            store,
            config,
        })
    }

    // ---- Components ----

    pub fn store(&self) -> &Arc<KeyedStore> {
        &self.store
    }

    pub fn config(&self) -> &NookConfig {
        &self.config
    }

    pub fn jobs(&self) -> &JobRepository {
        &self.jobs
    }

    pub fn listings(&self) -> &ListingRepository {
        &self.listings
    }

    pub fn reservations(&self) -> &ReservationRepository {
        &self.reservations
    }

    pub fn users(&self) -> &UserRepository {
        &self.users
    }

    pub fn images(&self) -> &ImageResolver {
        &self.images
    }

    pub fn security(&self) -> &SecurityWorkflow {
        &self.security
    }

    pub fn reservation_cache(&self) -> &MutationCache<Reservation> {
        &self.reservation_cache
    }

    // ---- Reservations ----

    /// Create a pending reservation and mirror it into the cached list.
    pub async fn add_reservation(&self, draft: ReservationDraft) -> SdkResult<Reservation> {
        Ok(self
            .reservation_cache
            .mutate(
                &QueryKey::all(EntityKind::Reservation),
                self.reservations.create(draft),
                |r| Optimistic::Upsert(r.clone()),
            )
            .await?)
    }

    /// Every reservation, served from the cache when it is fresh.
    pub async fn list_reservations(&self) -> SdkResult<Vec<Reservation>> {
        Ok(self
            .reservation_cache
            .reconcile(&QueryKey::all(EntityKind::Reservation), || {
                self.reservations.list()
            })
            .await?)
    }

    pub async fn reservations_for_listing(
        &self,
        listing: &EntityId,
    ) -> SdkResult<Vec<Reservation>> {
        Ok(self.reservations.for_listing(listing).await?)
    }

    pub async fn set_reservation_status(
        &self,
        id: &EntityId,
        status: ReservationStatus,
    ) -> SdkResult<Reservation> {
        Ok(self
            .reservation_cache
            .mutate(
                &QueryKey::all(EntityKind::Reservation),
                self.reservations.set_status(id, status),
                |r| Optimistic::Upsert(r.clone()),
            )
            .await?)
    }

    // ---- Listings ----

    /// Create a listing and keep its persistable images in its bucket.
    pub async fn add_listing(&self, draft: ListingDraft) -> SdkResult<Listing> {
        let listing = self
            .listing_cache
            .mutate(
                &QueryKey::all(EntityKind::Listing),
                self.listings.create(draft),
                |l| Optimistic::Upsert(l.clone()),
            )
            .await?;
        self.keep_images(&listing).await;
        Ok(listing)
    }

    /// Every listing with its images resolved.
    pub async fn list_listings(&self) -> SdkResult<Vec<Listing>> {
        let listings = self
            .listing_cache
            .reconcile(&QueryKey::all(EntityKind::Listing), || self.listings.list())
            .await?;
        Ok(self.resolve_all(&listings).await)
    }

    pub async fn listing(&self, id: &EntityId) -> SdkResult<Listing> {
        let listing = self
            .listings
            .get_by_id(id)
            .await?
            .ok_or_else(|| not_found(EntityKind::Listing, id))?;
        Ok(self.images.resolve(&listing).await.into_entity())
    }

    pub async fn update_listing(&self, id: &EntityId, patch: ListingPatch) -> SdkResult<Listing> {
        let images_changed = patch.image.is_some() || patch.images.is_some();
        let listing = self
            .listing_cache
            .mutate(
                &QueryKey::all(EntityKind::Listing),
                self.listings.update(id, patch),
                |l| Optimistic::Upsert(l.clone()),
            )
            .await?;
        if images_changed {
            self.keep_images(&listing).await;
        }
        Ok(listing)
    }

    /// Delete a listing and its image bucket. Its reservations are kept.
    pub async fn delete_listing(&self, id: &EntityId) -> SdkResult<Listing> {
        let removed = self
            .listing_cache
            .mutate(
                &QueryKey::all(EntityKind::Listing),
                self.listings.delete(id),
                |l| Optimistic::Remove(l.id.clone()),
            )
            .await?;
        self.images.clear_images(EntityKind::Listing, id).await?;
        Ok(removed)
    }

    // ---- Jobs ----

    /// Create a job and keep its persistable images in its bucket.
    pub async fn add_job(&self, draft: JobDraft) -> SdkResult<Job> {
        let job = self
            .job_cache
            .mutate(
                &QueryKey::all(EntityKind::Job),
                self.jobs.create(draft),
                |j| Optimistic::Upsert(j.clone()),
            )
            .await?;
        self.keep_images(&job).await;
        Ok(job)
    }

    /// Every job with its images resolved.
    pub async fn list_jobs(&self) -> SdkResult<Vec<Job>> {
        let jobs = self
            .job_cache
            .reconcile(&QueryKey::all(EntityKind::Job), || self.jobs.list())
            .await?;
        Ok(self.resolve_all(&jobs).await)
    }

    pub async fn job(&self, id: &EntityId) -> SdkResult<Job> {
        let job = self
            .jobs
            .get_by_id(id)
            .await?
            .ok_or_else(|| not_found(EntityKind::Job, id))?;
        Ok(self.images.resolve(&job).await.into_entity())
    }

    pub async fn update_job(&self, id: &EntityId, patch: JobPatch) -> SdkResult<Job> {
        let images_changed = patch.image.is_some() || patch.images.is_some();
        let job = self
            .job_cache
            .mutate(
                &QueryKey::all(EntityKind::Job),
                self.jobs.update(id, patch),
                |j| Optimistic::Upsert(j.clone()),
            )
            .await?;
        if images_changed {
            self.keep_images(&job).await;
        }
        Ok(job)
    }

    /// Delete a job and its image bucket.
    pub async fn delete_job(&self, id: &EntityId) -> SdkResult<Job> {
        let removed = self
            .job_cache
            .mutate(
                &QueryKey::all(EntityKind::Job),
                self.jobs.delete(id),
                |j| Optimistic::Remove(j.id.clone()),
            )
            .await?;
        self.images.clear_images(EntityKind::Job, id).await?;
        Ok(removed)
    }

    // ---- Images ----

    pub async fn resolve_images<E: Illustrated>(&self, entity: &E) -> Resolution<E> {
        self.images.resolve(entity).await
    }

    async fn resolve_all<E: Illustrated>(&self, entities: &[E]) -> Vec<E> {
        let mut resolved = Vec::with_capacity(entities.len());
        for entity in entities {
            resolved.push(self.images.resolve(entity).await.into_entity());
        }
        resolved
    }

    /// Best effort: the record is already written, so a failed bucket
    /// write only costs the fallback.
    async fn keep_images<E: Illustrated>(&self, entity: &E) {
        let mut images: Vec<String> = entity.image().map(str::to_string).into_iter().collect();
        images.extend(
            entity
                .images()
                .iter()
                .filter(|i| Some(i.as_str()) != entity.image())
                .cloned(),
        );
        if let Err(e) = self.images.save_images(E::KIND, entity.id(), &images).await {
            warn!(kind = %E::KIND, id = %entity.id(), error = %e, "image bucket not written");
        }
    }

    // ---- Users ----

    /// Register an account with a salted credential for `password`.
    pub async fn register_user(
        &self,
        email: &str,
        name: &str,
        role: Role,
        password: &str,
    ) -> SdkResult<User> {
        let credential = self.security.new_credential(password);
        Ok(self
            .users
            .register(UserDraft {
                email: email.to_string(),
                name: name.to_string(),
                role,
                credential,
            })
            .await?)
    }

    // ---- Maintenance ----

    /// Check that every stored collection decodes.
    pub async fn verify(&self) -> SdkResult<Vec<CollectionHealth>> {
        Ok(vec![
            health(&self.jobs).await,
            health(&self.listings).await,
            health(&self.reservations).await,
            health(&*self.users).await,
        ])
    }
}

async fn health<E: Entity>(repo: &nook_repo::Repository<E>) -> CollectionHealth {
    CollectionHealth {
        kind: E::KIND,
        key: repo.key().to_string(),
        status: repo.verify().await,
    }
}

fn not_found(kind: EntityKind, id: &EntityId) -> SdkError {
    SdkError::NotFound {
        kind,
        id: id.clone(),
    }
}
