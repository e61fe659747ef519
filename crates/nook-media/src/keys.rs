use nook_store::{Namespace, StoreResult};
use nook_types::{EntityId, EntityKind};

const LATEST: &str = "latest";

/// Root namespace of every image key.
pub fn images() -> StoreResult<Namespace> {
    Namespace::root("images")
}

/// The gallery and primary keys of one bucket.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageKeys {
    pub gallery: String,
    pub primary: String,
}

impl ImageKeys {
    /// Keys scoped to a single entity.
    pub fn for_entity(kind: EntityKind, id: &EntityId) -> StoreResult<Self> {
        Self::within(images()?.child(&kind.to_string())?.child(id.as_str())?)
    }

    /// The process-wide last-upload keys for `kind`.
    pub fn latest(kind: EntityKind) -> StoreResult<Self> {
        Self::within(images()?.child(&kind.to_string())?.child(LATEST)?)
    }

    fn within(ns: Namespace) -> StoreResult<Self> {
        Ok(Self {
            gallery: ns.key("gallery")?,
            primary: ns.key("primary")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout() {
        let id = EntityId::parse("abc").unwrap();
        let keys = ImageKeys::for_entity(EntityKind::Job, &id).unwrap();
        assert_eq!(keys.gallery, "images/job/abc/gallery");
        assert_eq!(keys.primary, "images/job/abc/primary");

        let latest = ImageKeys::latest(EntityKind::Listing).unwrap();
        assert_eq!(latest.gallery, "images/listing/latest/gallery");

        let ns = images().unwrap();
        assert!(ns.contains(&keys.primary));
        assert!(ns.contains(&latest.primary));
    }

    #[test]
    fn dot_ids_are_rejected() {
        let id = EntityId::parse("..").unwrap();
        assert!(ImageKeys::for_entity(EntityKind::Job, &id).is_err());
    }
}
