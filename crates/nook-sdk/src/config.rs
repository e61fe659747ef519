use std::path::Path;

use nook_cache::CacheConfig;
use nook_media::MediaConfig;
use nook_security::SecurityConfig;
use nook_store::StoreConfig;
use serde::{Deserialize, Serialize};

use crate::error::{SdkError, SdkResult};

/// Configuration for every Nook subsystem. Missing sections take defaults.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NookConfig {
    pub store: StoreConfig,
    pub media: MediaConfig,
    pub cache: CacheConfig,
    pub security: SecurityConfig,
}

impl NookConfig {
    /// Read a TOML configuration file.
    pub fn load(path: &Path) -> SdkResult<Self> {
        let text = std::fs::read_to_string(path)?;
        toml::from_str(&text).map_err(|e| SdkError::Config {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }

    /// Parse TOML text.
    pub fn from_toml(text: &str) -> SdkResult<Self> {
        toml::from_str(text).map_err(|e| SdkError::Config {
            path: "<inline>".into(),
            reason: e.to_string(),
        })
    }

    /// Render as TOML, e.g. for writing a starter file.
    pub fn to_toml(&self) -> SdkResult<String> {
        toml::to_string_pretty(self).map_err(|e| SdkError::Config {
            path: "<inline>".into(),
            reason: e.to_string(),
        })
    }
}
