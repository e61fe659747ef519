use serde::{Deserialize, Serialize};

/// Reference substituted for session-local images.
pub const DEFAULT_PLACEHOLDER: &str = "https://source.unsplash.com/random/800x600/?work";

/// Configuration for the [`ImageResolver`](crate::ImageResolver).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// Fallback image used wherever a transient reference is dropped.
    pub placeholder: String,
    /// Consult the process-wide latest-upload buckets when an entity has
    /// nothing of its own.
    pub use_latest_fallback: bool,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            placeholder: DEFAULT_PLACEHOLDER.to_string(),
            use_latest_fallback: true,
        }
    }
}
