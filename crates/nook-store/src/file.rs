//! File-backed substrate.
//!
//! The whole substrate is one JSON object (`{ key: value }`) on disk. It is
//! loaded once on open and rewritten after every mutation through a
//! temporary file in the same directory followed by a rename, so a crash
//! leaves either the old or the new document, never a torn one.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use tracing::{debug, warn};

use crate::error::{StoreError, StoreResult};
use crate::traits::KeyValueBackend;

/// Substrate persisted as a single JSON document.
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    entries: RwLock<BTreeMap<String, String>>,
}

impl FileBackend {
    /// Open (or create) the substrate document at `path`.
    ///
    /// An undecodable document is moved aside to `<path>.corrupt` and the
    /// substrate starts empty.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = match fs::read_to_string(&path) {
            Ok(text) if text.trim().is_empty() => BTreeMap::new(),
            Ok(text) => match serde_json::from_str::<BTreeMap<String, String>>(&text) {
                Ok(map) => map,
                Err(e) => {
                    let aside = corrupt_path(&path);
                    warn!(path = %path.display(), aside = %aside.display(), error = %e,
                        "substrate document is corrupt; starting empty");
                    fs::rename(&path, &aside)?;
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        debug!(path = %path.display(), keys = entries.len(), "file substrate opened");
        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    /// Location of the substrate document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, map: &BTreeMap<String, String>) -> StoreResult<()> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;
        let json = serde_json::to_vec_pretty(map).map_err(|e| StoreError::Persist {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        tmp.write_all(&json)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| StoreError::Persist {
            path: self.path.clone(),
            reason: e.error.to_string(),
        })?;
        Ok(())
    }
}

fn corrupt_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".corrupt");
    PathBuf::from(name)
}

impl KeyValueBackend for FileBackend {
    fn get_raw(&self, key: &str) -> StoreResult<Option<String>> {
        let map = self.entries.read().map_err(|_| StoreError::Poisoned)?;
        Ok(map.get(key).cloned())
    }

    fn set_raw(&self, key: &str, value: &str) -> StoreResult<()> {
        let mut map = self.entries.write().map_err(|_| StoreError::Poisoned)?;
        map.insert(key.to_string(), value.to_string());
        self.persist(&map)
    }

    fn remove(&self, key: &str) -> StoreResult<bool> {
        let mut map = self.entries.write().map_err(|_| StoreError::Poisoned)?;
        if map.remove(key).is_none() {
            return Ok(false);
        }
        self.persist(&map)?;
        Ok(true)
    }

    fn keys(&self) -> StoreResult<Vec<String>> {
        let map = self.entries.read().map_err(|_| StoreError::Poisoned)?;
        Ok(map.keys().cloned().collect())
    }
}
