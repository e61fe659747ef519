//! Image reference classification.
//!
//! An image reference is a plain string. Its scheme decides how far it can be
//! trusted, in order:
//!
//! 1. `data:image/...` -- embedded, self-contained, always displayable.
//! 2. `http://...` / `https://...` -- external, assumed displayable.
//! 3. `blob:...` -- session-local upload preview. Valid only while the
//!    producing session lives and must never be persisted.
//!
//! Anything else is invalid and is filtered out wherever it is found.

use std::fmt;

use crate::entity::{Entity, Job, Listing};

const EMBEDDED_PREFIX: &str = "data:image/";
const TRANSIENT_PREFIX: &str = "blob:";

/// Trust classification of an image reference.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ImageSource {
    Embedded,
    Remote,
    Transient,
    Invalid,
}

impl ImageSource {
    pub fn classify(reference: &str) -> Self {
        if reference.starts_with(EMBEDDED_PREFIX) {
            Self::Embedded
        } else if reference.starts_with("http://") || reference.starts_with("https://") {
            Self::Remote
        } else if reference.starts_with(TRANSIENT_PREFIX) {
            Self::Transient
        } else {
            Self::Invalid
        }
    }

    /// Displayable and safe to persist.
    pub fn is_persistable(&self) -> bool {
        matches!(self, Self::Embedded | Self::Remote)
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient)
    }
}

impl fmt::Display for ImageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Embedded => write!(f, "embedded"),
            Self::Remote => write!(f, "remote"),
            Self::Transient => write!(f, "transient"),
            Self::Invalid => write!(f, "invalid"),
        }
    }
}

/// An entity that carries a primary image and a gallery of secondary images.
pub trait Illustrated: Entity {
    fn image(&self) -> Option<&str>;

    fn images(&self) -> &[String];

    fn set_image_set(&mut self, image: Option<String>, images: Vec<String>);

    /// `true` when the primary image and every gallery image are
    /// persistable and the gallery is non-empty.
    fn has_complete_images(&self) -> bool {
        let primary_ok = self
            .image()
            .is_some_and(|img| ImageSource::classify(img).is_persistable());
        let gallery_ok = !self.images().is_empty()
            && self
                .images()
                .iter()
                .all(|img| ImageSource::classify(img).is_persistable());
        primary_ok && gallery_ok
    }
}

impl Illustrated for Job {
    fn image(&self) -> Option<&str> {
        self.image.as_deref()
    }

    fn images(&self) -> &[String] {
        &self.images
    }

    fn set_image_set(&mut self, image: Option<String>, images: Vec<String>) {
        self.image = image;
        self.images = images;
    }
}

impl Illustrated for Listing {
    fn image(&self) -> Option<&str> {
        self.image.as_deref()
    }

    fn images(&self) -> &[String] {
        &self.images
    }

    fn set_image_set(&mut self, image: Option<String>, images: Vec<String>) {
        self.image = image;
        self.images = images;
    }
}
