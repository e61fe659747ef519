use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use nook_store::{KeyedStore, Lookup};
use nook_types::{Entity, EntityId, MonotonicClock};
use tracing::{debug, info, warn};

use crate::error::{RepoError, Result};
use crate::keys::collection_key;

/// CRUD over the collection of one entity kind.
///
/// Identifiers and creation timestamps are generated here, never taken from
/// the caller. Every write holds the collection key's guard from the read
/// through the rewrite, so concurrent writers in the same process never
/// lose each other's updates.
pub struct Repository<E: Entity> {
    store: Arc<KeyedStore>,
    clock: Arc<MonotonicClock>,
    key: String,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> Repository<E> {
    pub fn new(store: Arc<KeyedStore>, clock: Arc<MonotonicClock>) -> Result<Self> {
        Ok(Self {
            store,
            clock,
            key: collection_key(E::KIND)?,
            _entity: PhantomData,
        })
    }

    /// The collection key this repository owns.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn store(&self) -> &Arc<KeyedStore> {
        &self.store
    }

    pub(crate) fn clock(&self) -> &MonotonicClock {
        &self.clock
    }

    /// Read the collection, recovering from corruption with an empty one.
    pub(crate) async fn load(&self) -> Result<Vec<E>> {
        match self.store.get_checked::<Vec<E>>(&self.key).await? {
            Lookup::Present(entries) => Ok(entries),
            Lookup::Absent => Ok(Vec::new()),
            Lookup::Corrupt { reason } => {
                warn!(kind = %E::KIND, key = %self.key, %reason,
                    "collection is corrupt; treating as empty, stored entries are lost");
                Ok(Vec::new())
            }
        }
    }

    pub(crate) async fn save(&self, entries: &[E]) -> Result<()> {
        self.store.set(&self.key, entries).await?;
        Ok(())
    }

    /// Every entity, in insertion order.
    pub async fn list(&self) -> Result<Vec<E>> {
        self.load().await
    }

    pub async fn get_by_id(&self, id: &EntityId) -> Result<Option<E>> {
        Ok(self.load().await?.into_iter().find(|e| e.id() == id))
    }

    /// Entities matching `predicate`, in insertion order.
    pub async fn find<P>(&self, predicate: P) -> Result<Vec<E>>
    where
        P: Fn(&E) -> bool,
    {
        Ok(self.load().await?.into_iter().filter(|e| predicate(e)).collect())
    }

    /// Append a new entity built from `draft`.
    pub async fn create(&self, draft: E::Draft) -> Result<E> {
        E::validate_draft(&draft).map_err(|source| RepoError::Invalid {
            kind: E::KIND,
            source,
        })?;

        let _guard = self.store.lock(&self.key).await;
        let mut entries = self.load().await?;
        let entity = E::from_draft(EntityId::generate(), self.clock.now(), draft);
        entries.push(entity.clone());
        self.save(&entries).await?;

        info!(kind = %E::KIND, id = %entity.id(), total = entries.len(), "entity created");
        Ok(entity)
    }

    /// Apply `patch` to the entity with `id` and return the new value.
    pub async fn update(&self, id: &EntityId, patch: E::Patch) -> Result<E> {
        let _guard = self.store.lock(&self.key).await;
        let mut entries = self.load().await?;
        let entity = entries
            .iter_mut()
            .find(|e| e.id() == id)
            .ok_or_else(|| RepoError::NotFound {
                kind: E::KIND,
                id: id.clone(),
            })?;
        entity.apply_patch(patch);
        let updated = entity.clone();
        self.save(&entries).await?;

        debug!(kind = %E::KIND, %id, "entity updated");
        Ok(updated)
    }

    /// Remove the entity with `id` and return it.
    pub async fn delete(&self, id: &EntityId) -> Result<E> {
        let _guard = self.store.lock(&self.key).await;
        let mut entries = self.load().await?;
        let position = entries
            .iter()
            .position(|e| e.id() == id)
            .ok_or_else(|| RepoError::NotFound {
                kind: E::KIND,
                id: id.clone(),
            })?;
        let removed = entries.remove(position);
        self.save(&entries).await?;

        info!(kind = %E::KIND, %id, remaining = entries.len(), "entity deleted");
        Ok(removed)
    }

    /// Check that the stored collection decodes. Returns the entity count.
    ///
    /// Unlike every other read, this surfaces corruption as an error.
    pub async fn verify(&self) -> Result<usize> {
        match self.store.get_checked::<Vec<E>>(&self.key).await? {
            Lookup::Present(entries) => Ok(entries.len()),
            Lookup::Absent => Ok(0),
            Lookup::Corrupt { reason } => Err(RepoError::Corrupt {
                kind: E::KIND,
                key: self.key.clone(),
                reason,
            }),
        }
    }
}

impl<E: Entity> fmt::Debug for Repository<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repository")
            .field("kind", &E::KIND)
            .field("key", &self.key)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nook_store::{InMemoryBackend, KeyValueBackend, StoreConfig};
    use nook_types::{Job, JobDraft, JobPatch, Listing, ListingDraft};
    use std::time::Duration;

    fn repo<E: Entity>() -> Repository<E> {
        Repository::new(
            Arc::new(KeyedStore::in_memory()),
            Arc::new(MonotonicClock::new()),
        )
        .unwrap()
    }

    fn job_draft(title: &str) -> JobDraft {
        JobDraft {
            title: title.into(),
            company: "Acme".into(),
            location: "Nantes".into(),
            description: "Do things".into(),
            salary: Some("2000".into()),
            contract_type: Some("CDI".into()),
            contact_email: None,
            image: Some("https://img/1.jpg".into()),
            images: vec!["https://img/2.jpg".into()],
        }
    }

    // -----------------------------------------------------------------------
    // Round trip
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let jobs = repo::<Job>();
        let draft = job_draft("Welder");
        let created = jobs.create(draft.clone()).await.unwrap();

        let fetched = jobs.get_by_id(&created.id).await.unwrap().unwrap();
        assert_eq!(fetched, created);
        assert!(!fetched.id.as_str().is_empty());
        assert_eq!(fetched.title, draft.title);
        assert_eq!(fetched.company, draft.company);
        assert_eq!(fetched.salary, draft.salary);
        assert_eq!(fetched.image, draft.image);
        assert_eq!(fetched.images, draft.images);
    }

    #[tokio::test]
    async fn generated_ids_and_timestamps_are_monotonic() {
        let jobs = repo::<Job>();
        let mut created = Vec::new();
        for i in 0..20 {
            created.push(jobs.create(job_draft(&format!("job {i}"))).await.unwrap());
        }
        for w in created.windows(2) {
            assert!(w[0].created_at <= w[1].created_at);
            assert!(w[0].id < w[1].id);
        }
        let listed = jobs.list().await.unwrap();
        assert_eq!(listed, created);
    }

    #[tokio::test]
    async fn listing_round_trips_non_integer_price() {
        let listings = repo::<Listing>();
        let created = listings
            .create(ListingDraft {
                title: "Loft".into(),
                description: "Bright".into(),
                location: "Lille".into(),
                price_per_night: 84.5,
                capacity: 3,
                host_email: Some("host@x.com".into()),
                image: None,
                images: vec![],
            })
            .await
            .unwrap();
        let fetched = listings.get_by_id(&created.id).await.unwrap().unwrap();
        assert_eq!(fetched, created);
    }

    // -----------------------------------------------------------------------
    // Update / Delete
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn update_applies_patch() {
        let jobs = repo::<Job>();
        let job = jobs.create(job_draft("Cook")).await.unwrap();
        let updated = jobs
            .update(
                &job.id,
                JobPatch {
                    title: Some("Chef".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.title, "Chef");
        assert_eq!(updated.id, job.id);
        assert_eq!(updated.created_at, job.created_at);
        assert_eq!(jobs.get_by_id(&job.id).await.unwrap().unwrap().title, "Chef");
    }

    #[tokio::test]
    async fn update_missing_is_not_found() {
        let jobs = repo::<Job>();
        jobs.create(job_draft("Cook")).await.unwrap();
        let missing = EntityId::parse("missing").unwrap();
        let err = jobs.update(&missing, JobPatch::default()).await.unwrap_err();
        assert!(matches!(err, RepoError::NotFound { .. }));
        assert_eq!(jobs.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn delete_removes_only_target() {
        let jobs = repo::<Job>();
        let a = jobs.create(job_draft("a")).await.unwrap();
        let b = jobs.create(job_draft("b")).await.unwrap();
        let removed = jobs.delete(&a.id).await.unwrap();
        assert_eq!(removed.id, a.id);
        assert_eq!(jobs.list().await.unwrap(), vec![b]);

        let err = jobs.delete(&a.id).await.unwrap_err();
        assert!(matches!(err, RepoError::NotFound { .. }));
    }

    // -----------------------------------------------------------------------
    // Corruption recovery
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn corrupt_collection_reads_as_empty_and_is_reset_on_write() {
        let backend = Arc::new(InMemoryBackend::with_entries([("collections/jobs", "{oops")]));
        let store = Arc::new(KeyedStore::new(backend.clone(), StoreConfig::default()));
        let jobs: Repository<Job> =
            Repository::new(store, Arc::new(MonotonicClock::new())).unwrap();

        assert!(matches!(jobs.verify().await, Err(RepoError::Corrupt { .. })));
        assert!(jobs.list().await.unwrap().is_empty());

        let job = jobs.create(job_draft("fresh")).await.unwrap();
        assert_eq!(jobs.verify().await.unwrap(), 1);
        assert_eq!(jobs.list().await.unwrap(), vec![job]);
        assert!(backend.get_raw("collections/jobs").unwrap().unwrap().starts_with('['));
    }

    #[tokio::test]
    async fn invalid_draft_is_rejected_without_write() {
        let backend = Arc::new(InMemoryBackend::new());
        let store = Arc::new(KeyedStore::new(backend.clone(), StoreConfig::default()));
        let listings: Repository<Listing> =
            Repository::new(store, Arc::new(MonotonicClock::new())).unwrap();
        let err = listings
            .create(ListingDraft {
                title: "x".into(),
                description: String::new(),
                location: "y".into(),
                price_per_night: f64::NAN,
                capacity: 1,
                host_email: None,
                image: None,
                images: vec![],
            })
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::Invalid { .. }));
        assert!(backend.is_empty());
    }

    // -----------------------------------------------------------------------
    // Concurrency
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn concurrent_creates_do_not_lose_updates() {
        let store = Arc::new(KeyedStore::new(
            Arc::new(InMemoryBackend::new()),
            StoreConfig::with_latency(Duration::from_millis(3)),
        ));
        let jobs: Repository<Job> =
            Repository::new(store, Arc::new(MonotonicClock::new())).unwrap();

        let (a, b, c) = tokio::join!(
            jobs.create(job_draft("a")),
            jobs.create(job_draft("b")),
            jobs.create(job_draft("c")),
        );
        let ids = [a.unwrap().id, b.unwrap().id, c.unwrap().id];
        let listed = jobs.list().await.unwrap();
        assert_eq!(listed.len(), 3);
        for id in &ids {
            assert!(listed.iter().any(|j| &j.id == id));
        }
    }

    #[tokio::test]
    async fn debug_names_kind_and_key() {
        let jobs = repo::<Job>();
        let debug = format!("{jobs:?}");
        assert!(debug.contains("collections/jobs"));
    }
}
