use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, warn};

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::memory::InMemoryBackend;
use crate::namespace::Namespace;
use crate::traits::KeyValueBackend;

/// Outcome of a checked typed read.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Lookup<T> {
    /// No value is stored at the key.
    Absent,
    /// The value decoded successfully.
    Present(T),
    /// A value is stored but does not decode as `T`.
    Corrupt { reason: String },
}

impl<T> Lookup<T> {
    /// Collapse to an `Option`, treating corrupt values as absent.
    pub fn into_option(self) -> Option<T> {
        match self {
            Self::Present(v) => Some(v),
            Self::Absent | Self::Corrupt { .. } => None,
        }
    }

    pub fn is_corrupt(&self) -> bool {
        matches!(self, Self::Corrupt { .. })
    }
}

/// Exclusive hold on one key's read-modify-write span.
///
/// Dropping the guard releases the key. Holding it does not stop other
/// readers; it only orders writers that also take the guard.
pub struct KeyGuard {
    key: String,
    _guard: OwnedMutexGuard<()>,
}

impl KeyGuard {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl fmt::Debug for KeyGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyGuard").field("key", &self.key).finish()
    }
}

/// Async typed facade over an injected [`KeyValueBackend`].
///
/// Values are stored as JSON. Every read and write first awaits the
/// configured latency (or yields), so concurrent operations interleave at
/// exactly these boundaries.
pub struct KeyedStore {
    backend: Arc<dyn KeyValueBackend>,
    config: StoreConfig,
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl KeyedStore {
    pub fn new(backend: Arc<dyn KeyValueBackend>, config: StoreConfig) -> Self {
        Self {
            backend,
            config,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// A store over a fresh [`InMemoryBackend`] with default configuration.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryBackend::new()), StoreConfig::default())
    }

    pub fn backend(&self) -> &Arc<dyn KeyValueBackend> {
        &self.backend
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Suspension point preceding every substrate access.
    async fn pause(&self) {
        let latency = self.config.latency();
        if latency.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(latency).await;
        }
    }

    /// Typed read that reports corrupt values instead of hiding them.
    pub async fn get_checked<T: DeserializeOwned>(&self, key: &str) -> StoreResult<Lookup<T>> {
        self.pause().await;
        let Some(raw) = self.backend.get_raw(key)? else {
            return Ok(Lookup::Absent);
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Lookup::Present(value)),
            Err(e) => Ok(Lookup::Corrupt {
                reason: e.to_string(),
            }),
        }
    }

    /// Typed read. A value that fails to decode is treated as absent.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> StoreResult<Option<T>> {
        match self.get_checked(key).await? {
            Lookup::Corrupt { reason } => {
                warn!(key, %reason, "undecodable value treated as absent");
                Ok(None)
            }
            other => Ok(other.into_option()),
        }
    }

    /// Typed write; the value is encoded as JSON.
    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> StoreResult<()> {
        let json = serde_json::to_string(value).map_err(|e| StoreError::Serialization {
            key: key.to_string(),
            reason: e.to_string(),
        })?;
        self.pause().await;
        self.backend.set_raw(key, &json)?;
        debug!(key, bytes = json.len(), "value written");
        Ok(())
    }

    /// Read a value stored verbatim, without JSON decoding.
    pub async fn get_text(&self, key: &str) -> StoreResult<Option<String>> {
        self.pause().await;
        self.backend.get_raw(key)
    }

    /// Write a value verbatim, without JSON encoding.
    pub async fn set_text(&self, key: &str, value: &str) -> StoreResult<()> {
        self.pause().await;
        self.backend.set_raw(key, value)?;
        debug!(key, bytes = value.len(), "text written");
        Ok(())
    }

    /// Remove a key. Returns `true` if it existed.
    pub async fn remove(&self, key: &str) -> StoreResult<bool> {
        self.pause().await;
        self.backend.remove(key)
    }

    /// All keys inside `namespace`, in order.
    pub async fn scan(&self, namespace: &Namespace) -> StoreResult<Vec<String>> {
        self.pause().await;
        let keys = self.backend.keys_with_prefix(namespace.as_prefix())?;
        Ok(keys.into_iter().filter(|k| namespace.contains(k)).collect())
    }

    /// Remove every key inside `namespace`. Returns the number removed.
    ///
    /// Keys are removed one at a time; a concurrent writer may add a key
    /// to the namespace while this runs.
    pub async fn remove_all(&self, namespace: &Namespace) -> StoreResult<usize> {
        let keys = self.scan(namespace).await?;
        let mut removed = 0;
        for key in &keys {
            if self.remove(key).await? {
                removed += 1;
            }
        }
        debug!(namespace = %namespace, removed, "namespace cleared");
        Ok(removed)
    }

    /// Serialize read-modify-write spans on `key`.
    pub async fn lock(&self, key: &str) -> KeyGuard {
        let mutex = {
            let mut locks = self.locks.lock().expect("key lock table poisoned");
            // Drop entries nobody holds or waits on.
            locks.retain(|k, m| k == key || Arc::strong_count(m) > 1);
            Arc::clone(
                locks
                    .entry(key.to_string())
                    .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
            )
        };
        KeyGuard {
            key: key.to_string(),
            _guard: mutex.lock_owned().await,
        }
    }
}

impl fmt::Debug for KeyedStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyedStore")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
