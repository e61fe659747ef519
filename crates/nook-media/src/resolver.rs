use std::sync::Arc;

use nook_store::{KeyedStore, Lookup, StoreResult};
use nook_types::{EntityId, EntityKind, Illustrated, ImageSource};
use tracing::{debug, info, warn};

use crate::config::MediaConfig;
use crate::error::MediaResult;
use crate::keys::{images, ImageKeys};

/// Where a resolved image part came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ImageOrigin {
    /// Left as it was on the record.
    Record,
    /// The entity's own stored bucket.
    EntityBucket,
    /// The process-wide latest-upload bucket.
    LatestBucket,
    /// Promoted from the first valid gallery image.
    Gallery,
    /// Replaced by the configured placeholder.
    Placeholder,
    /// Nothing usable was found.
    Missing,
}

/// The repaired entity and the provenance of its images.
#[derive(Clone, Debug, PartialEq)]
pub struct Resolution<E> {
    pub entity: E,
    pub primary: ImageOrigin,
    pub gallery: ImageOrigin,
}

impl<E> Resolution<E> {
    pub fn into_entity(self) -> E {
        self.entity
    }

    /// `true` if anything other than the record itself contributed.
    pub fn is_repaired(&self) -> bool {
        self.primary != ImageOrigin::Record || self.gallery != ImageOrigin::Record
    }
}

/// Repairs entity image sets from stored buckets.
///
/// Reads never fail from the caller's point of view: a substrate error or
/// an undecodable bucket is logged and treated as an empty bucket.
pub struct ImageResolver {
    store: Arc<KeyedStore>,
    config: MediaConfig,
}

impl ImageResolver {
    pub fn new(store: Arc<KeyedStore>, config: MediaConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &MediaConfig {
        &self.config
    }

    /// Produce the best displayable image set for `entity`.
    ///
    /// An entity whose primary image and whole gallery are already
    /// persistable is returned as is, without touching the store.
    pub async fn resolve<E: Illustrated>(&self, entity: &E) -> Resolution<E> {
        if entity.has_complete_images() {
            return Resolution {
                entity: entity.clone(),
                primary: ImageOrigin::Record,
                gallery: ImageOrigin::Record,
            };
        }

        let kind = E::KIND;
        let id = entity.id();
        let own = log_key_error(kind, id, ImageKeys::for_entity(kind, id));
        let latest = if self.config.use_latest_fallback {
            log_key_error(kind, id, ImageKeys::latest(kind))
        } else {
            None
        };

        // Gallery.
        let had_valid_gallery = !entity.images().is_empty()
            && entity
                .images()
                .iter()
                .all(|img| ImageSource::classify(img).is_persistable());
        let mut gallery = entity.images().to_vec();
        let mut gallery_origin = ImageOrigin::Record;

        let own_gallery = match &own {
            Some(keys) => self.read_gallery(&keys.gallery).await,
            None => None,
        };
        let candidate = match own_gallery {
            Some(stored) => Some((stored, ImageOrigin::EntityBucket)),
            None if !had_valid_gallery => match &latest {
                Some(keys) => self
                    .read_gallery(&keys.gallery)
                    .await
                    .map(|stored| (stored, ImageOrigin::LatestBucket)),
                None => None,
            },
            None => None,
        };
        if let Some((stored, origin)) = candidate {
            let usable: Vec<String> = stored
                .into_iter()
                .filter(|img| ImageSource::classify(img) != ImageSource::Invalid)
                .collect();
            if usable.is_empty() {
                debug!(%kind, %id, ?origin, "stored gallery holds no usable image");
            } else {
                gallery = usable;
                gallery_origin = origin;
            }
        }

        // Primary.
        let mut primary = entity.image().map(str::to_string);
        let mut primary_origin = ImageOrigin::Record;
        let primary_valid = primary
            .as_deref()
            .is_some_and(|img| ImageSource::classify(img).is_persistable());

        if !primary_valid {
            let own_primary = match &own {
                Some(keys) => self.read_primary(&keys.primary).await,
                None => None,
            };
            let found = match own_primary {
                Some(reference) => Some((reference, ImageOrigin::EntityBucket)),
                None => match &latest {
                    Some(keys) => self
                        .read_primary(&keys.primary)
                        .await
                        .map(|reference| (reference, ImageOrigin::LatestBucket)),
                    None => None,
                },
            };
            let found = found.filter(|(reference, origin)| {
                let usable = ImageSource::classify(reference) != ImageSource::Invalid;
                if !usable {
                    debug!(%kind, %id, ?origin, "stored primary image is not a valid reference");
                }
                usable
            });
            match found {
                Some((reference, origin)) => {
                    primary = Some(reference);
                    primary_origin = origin;
                }
                None => {
                    if let Some(first) = gallery
                        .iter()
                        .find(|img| ImageSource::classify(img).is_persistable())
                    {
                        primary = Some(first.clone());
                        primary_origin = ImageOrigin::Gallery;
                    }
                }
            }
        }

        // Session-local and invalid references never leave the resolver.
        match primary.as_deref().map(ImageSource::classify) {
            Some(ImageSource::Transient) => {
                warn!(%kind, %id, "session-local primary image replaced by placeholder");
                primary = Some(self.config.placeholder.clone());
                primary_origin = ImageOrigin::Placeholder;
            }
            Some(ImageSource::Invalid) | None => {
                primary = None;
                primary_origin = ImageOrigin::Missing;
            }
            Some(_) => {}
        }

        gallery.retain(|img| ImageSource::classify(img) != ImageSource::Invalid);
        if gallery.iter().any(|img| ImageSource::classify(img).is_transient()) {
            warn!(%kind, %id, "session-local gallery images dropped");
            gallery.retain(|img| !ImageSource::classify(img).is_transient());
            if gallery.is_empty() {
                gallery.push(self.config.placeholder.clone());
                gallery_origin = ImageOrigin::Placeholder;
            }
        }
        if gallery.is_empty() {
            gallery_origin = ImageOrigin::Missing;
        }

        let mut repaired = entity.clone();
        repaired.set_image_set(primary, gallery);
        debug!(%kind, %id, primary = ?primary_origin, gallery = ?gallery_origin, "images resolved");
        Resolution {
            entity: repaired,
            primary: primary_origin,
            gallery: gallery_origin,
        }
    }

    /// Store the persistable subset of `images` as the entity's bucket; the
    /// first one becomes its primary. Returns the number saved.
    ///
    /// Nothing is written when no reference is persistable.
    pub async fn save_images(
        &self,
        kind: EntityKind,
        id: &EntityId,
        images: &[String],
    ) -> MediaResult<usize> {
        let keys = ImageKeys::for_entity(kind, id)?;
        self.write_bucket(&keys, images).await
    }

    /// Record the last upload of `kind`, consulted by every entity of that
    /// kind that has no images of its own.
    pub async fn record_latest_upload(
        &self,
        kind: EntityKind,
        images: &[String],
    ) -> MediaResult<usize> {
        let keys = ImageKeys::latest(kind)?;
        self.write_bucket(&keys, images).await
    }

    /// Remove the entity's bucket. Returns `true` if anything was removed.
    pub async fn clear_images(&self, kind: EntityKind, id: &EntityId) -> MediaResult<bool> {
        let keys = ImageKeys::for_entity(kind, id)?;
        let gallery = self.store.remove(&keys.gallery).await?;
        let primary = self.store.remove(&keys.primary).await?;
        if gallery || primary {
            debug!(%kind, %id, "image bucket cleared");
        }
        Ok(gallery || primary)
    }

    /// Remove every image key, including the latest-upload buckets.
    pub async fn purge_all_images(&self) -> MediaResult<usize> {
        let removed = self.store.remove_all(&images()?).await?;
        info!(removed, "all image buckets purged");
        Ok(removed)
    }

    async fn write_bucket(&self, keys: &ImageKeys, images: &[String]) -> MediaResult<usize> {
        let valid: Vec<&str> = images
            .iter()
            .map(String::as_str)
            .filter(|img| ImageSource::classify(img).is_persistable())
            .collect();
        let Some(first) = valid.first() else {
            debug!(key = %keys.gallery, offered = images.len(), "no persistable image to save");
            return Ok(0);
        };
        self.store.set(&keys.gallery, &valid).await?;
        self.store.set_text(&keys.primary, first).await?;
        debug!(key = %keys.gallery, saved = valid.len(), "image bucket written");
        Ok(valid.len())
    }

    async fn read_gallery(&self, key: &str) -> Option<Vec<String>> {
        match self.store.get_checked::<Vec<String>>(key).await {
            Ok(Lookup::Present(images)) if !images.is_empty() => Some(images),
            Ok(Lookup::Present(_)) | Ok(Lookup::Absent) => None,
            Ok(Lookup::Corrupt { reason }) => {
                warn!(key, %reason, "undecodable gallery ignored");
                None
            }
            Err(e) => {
                warn!(key, error = %e, "gallery read failed");
                None
            }
        }
    }

    async fn read_primary(&self, key: &str) -> Option<String> {
        match self.store.get_text(key).await {
            Ok(Some(raw)) if !raw.is_empty() => Some(dequote(key, &raw)),
            Ok(_) => None,
            Err(e) => {
                warn!(key, error = %e, "primary image read failed");
                None
            }
        }
    }
}

fn log_key_error(
    kind: EntityKind,
    id: &EntityId,
    keys: StoreResult<ImageKeys>,
) -> Option<ImageKeys> {
    keys.map_err(|e| warn!(%kind, %id, error = %e, "no image bucket for this id"))
        .ok()
}

/// Strip one layer of surrounding double quotes.
fn dequote(key: &str, raw: &str) -> String {
    let inner = raw
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(raw);
    if inner.len() >= 2 && inner.starts_with('"') && inner.ends_with('"') {
        warn!(key, "primary image still quoted after one pass; kept as is");
    }
    inner.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DEFAULT_PLACEHOLDER;
    use chrono::Utc;
    use nook_store::{InMemoryBackend, KeyValueBackend, StoreConfig};
    use nook_types::{Entity, Job, JobDraft, Listing, ListingDraft};
    use proptest::prelude::*;

    const PNG: &str = "data:image/png;base64,AAAA";

    fn setup() -> (Arc<InMemoryBackend>, ImageResolver) {
        let backend = Arc::new(InMemoryBackend::new());
        let store = Arc::new(KeyedStore::new(backend.clone(), StoreConfig::default()));
        (backend, ImageResolver::new(store, MediaConfig::default()))
    }

    fn job(id: &str, image: Option<&str>, images: &[&str]) -> Job {
        Job::from_draft(
            EntityId::parse(id).unwrap(),
            Utc::now(),
            JobDraft {
                title: "t".into(),
                company: "c".into(),
                location: "l".into(),
                image: image.map(str::to_string),
                images: images.iter().map(|s| s.to_string()).collect(),
                ..Default::default()
            },
        )
    }

    fn seed(backend: &InMemoryBackend, key: &str, value: &str) {
        backend.set_raw(key, value).unwrap();
    }

    // -----------------------------------------------------------------------
    // Cheap path
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn complete_entity_is_returned_untouched() {
        let (backend, resolver) = setup();
        seed(&backend, "images/job/j1/gallery", r#"["https://other/x.jpg"]"#);
        let j = job("j1", Some("https://a/1.jpg"), &["https://a/2.jpg", PNG]);

        let res = resolver.resolve(&j).await;
        assert_eq!(res.entity, j);
        assert!(!res.is_repaired());
    }

    #[tokio::test]
    async fn resolving_twice_is_stable() {
        let (backend, resolver) = setup();
        seed(&backend, "images/job/latest/gallery", r#"["blob:http://x/1"]"#);
        seed(&backend, "images/job/latest/primary", "blob:http://x/1");
        let once = resolver.resolve(&job("j1", None, &[])).await.into_entity();
        let twice = resolver.resolve(&once).await;
        assert_eq!(twice.entity, once);
        assert!(!twice.is_repaired());
    }

    // -----------------------------------------------------------------------
    // Fallback ordering
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn entity_bucket_wins_over_latest() {
        let (backend, resolver) = setup();
        seed(&backend, "images/job/j1/gallery", r#"["https://own/1.jpg","nonsense"]"#);
        seed(&backend, "images/job/j1/primary", "https://own/main.jpg");
        seed(&backend, "images/job/latest/gallery", r#"["https://latest/1.jpg"]"#);
        seed(&backend, "images/job/latest/primary", "https://latest/main.jpg");

        let res = resolver.resolve(&job("j1", None, &[])).await;
        assert_eq!(res.entity.images, vec!["https://own/1.jpg"]);
        assert_eq!(res.entity.image.as_deref(), Some("https://own/main.jpg"));
        assert_eq!(res.gallery, ImageOrigin::EntityBucket);
        assert_eq!(res.primary, ImageOrigin::EntityBucket);
    }

    #[tokio::test]
    async fn latest_bucket_used_only_when_entity_has_nothing() {
        let (backend, resolver) = setup();
        seed(&backend, "images/job/latest/gallery", r#"["https://latest/1.jpg"]"#);
        seed(&backend, "images/job/latest/primary", "https://latest/main.jpg");

        let res = resolver.resolve(&job("j1", None, &[])).await;
        assert_eq!(res.entity.images, vec!["https://latest/1.jpg"]);
        assert_eq!(res.entity.image.as_deref(), Some("https://latest/main.jpg"));
        assert_eq!(res.gallery, ImageOrigin::LatestBucket);
        assert_eq!(res.primary, ImageOrigin::LatestBucket);

        // A valid gallery on the record keeps the latest gallery out.
        let res = resolver
            .resolve(&job("j2", None, &["https://mine/1.jpg"]))
            .await;
        assert_eq!(res.entity.images, vec!["https://mine/1.jpg"]);
        assert_eq!(res.gallery, ImageOrigin::Record);
        assert_eq!(res.primary, ImageOrigin::LatestBucket);
    }

    #[tokio::test]
    async fn latest_buckets_are_per_kind() {
        let (backend, resolver) = setup();
        seed(&backend, "images/job/latest/gallery", r#"["https://latest/job.jpg"]"#);
        let listing = Listing::from_draft(
            EntityId::parse("l1").unwrap(),
            Utc::now(),
            ListingDraft {
                title: "Loft".into(),
                description: String::new(),
                location: "Lyon".into(),
                price_per_night: 40.0,
                capacity: 2,
                host_email: None,
                image: None,
                images: vec![],
            },
        );
        let res = resolver.resolve(&listing).await;
        assert!(res.entity.images.is_empty());
        assert_eq!(res.entity.image, None);
        assert_eq!(res.primary, ImageOrigin::Missing);
    }

    #[tokio::test]
    async fn primary_falls_back_to_first_valid_gallery_image() {
        let (_backend, resolver) = setup();
        let res = resolver
            .resolve(&job("j1", Some("not-a-url"), &["junk", "https://g/1.jpg", PNG]))
            .await;
        assert_eq!(res.entity.image.as_deref(), Some("https://g/1.jpg"));
        assert_eq!(res.primary, ImageOrigin::Gallery);
        assert_eq!(res.entity.images, vec!["https://g/1.jpg", PNG]);
    }

    #[tokio::test]
    async fn quoted_primary_is_dequoted_once() {
        let (backend, resolver) = setup();
        seed(&backend, "images/job/j1/primary", "\"https://own/main.jpg\"");
        let res = resolver.resolve(&job("j1", None, &[])).await;
        assert_eq!(res.entity.image.as_deref(), Some("https://own/main.jpg"));

        seed(&backend, "images/job/j2/primary", "\"\"https://own/main.jpg\"\"");
        let res = resolver.resolve(&job("j2", None, &[])).await;
        // Still quoted, hence invalid, hence not used.
        assert_eq!(res.entity.image, None);
    }

    #[tokio::test]
    async fn corrupt_entity_gallery_falls_through_to_latest() {
        let (backend, resolver) = setup();
        seed(&backend, "images/job/j1/gallery", "{not json");
        seed(&backend, "images/job/latest/gallery", r#"["https://latest/1.jpg"]"#);
        let res = resolver.resolve(&job("j1", None, &[])).await;
        assert_eq!(res.gallery, ImageOrigin::LatestBucket);
    }

    #[tokio::test]
    async fn latest_fallback_can_be_disabled() {
        let backend = Arc::new(InMemoryBackend::new());
        seed(&backend, "images/job/latest/gallery", r#"["https://latest/1.jpg"]"#);
        let store = Arc::new(KeyedStore::new(backend, StoreConfig::default()));
        let resolver = ImageResolver::new(
            store,
            MediaConfig {
                use_latest_fallback: false,
                ..Default::default()
            },
        );
        let res = resolver.resolve(&job("j1", None, &[])).await;
        assert!(res.entity.images.is_empty());
    }

    // -----------------------------------------------------------------------
    // Transient references
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn transient_references_are_replaced() {
        let (_backend, resolver) = setup();
        let res = resolver
            .resolve(&job("j1", Some("blob:http://x/1"), &["blob:http://x/2"]))
            .await;
        assert_eq!(res.entity.image.as_deref(), Some(DEFAULT_PLACEHOLDER));
        assert_eq!(res.entity.images, vec![DEFAULT_PLACEHOLDER]);
        assert_eq!(res.primary, ImageOrigin::Placeholder);
        assert_eq!(res.gallery, ImageOrigin::Placeholder);
    }

    #[tokio::test]
    async fn transient_gallery_entries_are_filtered_not_replaced() {
        let (_backend, resolver) = setup();
        let res = resolver
            .resolve(&job("j1", None, &["blob:http://x/1", "https://g/1.jpg"]))
            .await;
        assert_eq!(res.entity.images, vec!["https://g/1.jpg"]);
        assert_eq!(res.entity.image.as_deref(), Some("https://g/1.jpg"));
    }

    // -----------------------------------------------------------------------
    // Bucket writes
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn save_images_keeps_only_persistable() {
        let (backend, resolver) = setup();
        let id = EntityId::parse("j1").unwrap();
        let saved = resolver
            .save_images(
                EntityKind::Job,
                &id,
                &["blob:x".into(), "https://a/1.jpg".into(), PNG.into()],
            )
            .await
            .unwrap();
        assert_eq!(saved, 2);
        assert_eq!(
            backend.get_raw("images/job/j1/primary").unwrap().as_deref(),
            Some("https://a/1.jpg")
        );

        let res = resolver.resolve(&job("j1", None, &[])).await;
        assert_eq!(res.entity.images, vec!["https://a/1.jpg", PNG]);
    }

    #[tokio::test]
    async fn save_images_without_valid_input_writes_nothing() {
        let (backend, resolver) = setup();
        let id = EntityId::parse("j1").unwrap();
        let saved = resolver
            .save_images(EntityKind::Job, &id, &["blob:x".into(), "junk".into()])
            .await
            .unwrap();
        assert_eq!(saved, 0);
        assert!(backend.is_empty());
    }

    #[tokio::test]
    async fn clear_images_is_idempotent() {
        let (backend, resolver) = setup();
        let id = EntityId::parse("j1").unwrap();
        resolver
            .save_images(EntityKind::Job, &id, &["https://a/1.jpg".into()])
            .await
            .unwrap();
        assert!(resolver.clear_images(EntityKind::Job, &id).await.unwrap());
        assert!(!resolver.clear_images(EntityKind::Job, &id).await.unwrap());
        assert!(backend.is_empty());
    }

    #[tokio::test]
    async fn purge_all_images_is_idempotent_and_scoped() {
        let (backend, resolver) = setup();
        seed(&backend, "collections/jobs", "[]");
        for id in ["a", "b"] {
            resolver
                .save_images(
                    EntityKind::Job,
                    &EntityId::parse(id).unwrap(),
                    &["https://a/1.jpg".into()],
                )
                .await
                .unwrap();
        }
        resolver
            .record_latest_upload(EntityKind::Listing, &[PNG.into()])
            .await
            .unwrap();

        assert_eq!(resolver.purge_all_images().await.unwrap(), 6);
        assert_eq!(resolver.purge_all_images().await.unwrap(), 0);
        assert_eq!(backend.keys().unwrap(), vec!["collections/jobs"]);
    }

    // -----------------------------------------------------------------------
    // Properties
    // -----------------------------------------------------------------------

    fn reference() -> impl Strategy<Value = String> {
        prop_oneof![
            "[a-z]{1,8}".prop_map(|s| format!("https://cdn/{s}.jpg")),
            "[A-Za-z0-9]{1,8}".prop_map(|s| format!("data:image/png;base64,{s}")),
            "[a-z0-9]{1,8}".prop_map(|s| format!("blob:http://local/{s}")),
            "[a-z ]{0,8}",
        ]
    }

    proptest! {
        #[test]
        fn resolved_images_are_always_persistable(
            image in proptest::option::of(reference()),
            images in proptest::collection::vec(reference(), 0..5),
            latest in proptest::collection::vec(reference(), 0..3),
        ) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            rt.block_on(async {
                let (backend, resolver) = setup();
                let latest_json = json_array(&latest);
                seed(&backend, "images/job/latest/gallery", &latest_json);

                let refs: Vec<&str> = images.iter().map(String::as_str).collect();
                let res = resolver.resolve(&job("j1", image.as_deref(), &refs)).await;
                if let Some(img) = &res.entity.image {
                    assert!(ImageSource::classify(img).is_persistable());
                }
                for img in &res.entity.images {
                    assert!(ImageSource::classify(img).is_persistable());
                }
            });
        }
    }

    fn json_array(items: &[String]) -> String {
        let quoted: Vec<String> = items.iter().map(|s| format!("\"{s}\"")).collect();
        format!("[{}]", quoted.join(","))
    }
}
