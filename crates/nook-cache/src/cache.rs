use std::collections::HashMap;
use std::future::Future;
use std::sync::{Mutex, RwLock};

use nook_types::Entity;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::query::{CachedQuery, Optimistic, QueryKey};

/// What happened to a cached query.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CacheEventKind {
    /// A successful write was applied optimistically.
    Mutated,
    /// Entries were replaced by a fresh fetch.
    Refreshed,
    /// The query was marked stale without touching its entries.
    Invalidated,
}

/// Change notification for one query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheEvent {
    pub key: QueryKey,
    pub kind: CacheEventKind,
}

/// A broadcast channel receiver for cache events.
pub type EventStream = broadcast::Receiver<CacheEvent>;

/// Configuration for the [`MutationCache`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Capacity of the change-event channel. Slow subscribers that fall
    /// further behind miss events.
    pub channel_capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 256,
        }
    }
}

struct Slot<E> {
    entries: Vec<E>,
    stale: bool,
    /// Bumped by every mutation and invalidation.
    generation: u64,
    /// Effects applied while a fetch was in flight, tagged with the
    /// generation they produced. Replayed over the fetched snapshot.
    replay: Vec<(u64, Optimistic<E>)>,
}

impl<E> Slot<E> {
    fn empty() -> Self {
        Self {
            entries: Vec::new(),
            stale: true,
            generation: 0,
            replay: Vec::new(),
        }
    }
}

/// Mirror of query results for one entity type.
///
/// Entries are only ever changed after the write that justifies them has
/// completed, so the mirror never shows an entity the store rejected.
/// Mutations are applied in the order their writes complete.
pub struct MutationCache<E: Entity> {
    slots: RwLock<HashMap<QueryKey, Slot<E>>>,
    /// Fetches in flight per query. Locked after `slots`.
    fetching: Mutex<HashMap<QueryKey, usize>>,
    events: broadcast::Sender<CacheEvent>,
}

impl<E: Entity> MutationCache<E> {
    pub fn new(config: CacheConfig) -> Self {
        let (events, _) = broadcast::channel(config.channel_capacity.max(1));
        Self {
            slots: RwLock::new(HashMap::new()),
            fetching: Mutex::new(HashMap::new()),
            events,
        }
    }

    /// Current entries of `key`, if it was ever fetched or mutated.
    pub fn read(&self, key: &QueryKey) -> Option<CachedQuery<E>> {
        let slots = self.slots.read().expect("cache lock poisoned");
        slots.get(key).map(|slot| CachedQuery {
            entries: slot.entries.clone(),
            stale: slot.stale,
        })
    }

    /// Await `write`; on success apply `effect` of its output to `key` and
    /// mark the query stale. On failure the cache is left untouched and the
    /// error is returned.
    pub async fn mutate<T, Err, W, F>(&self, key: &QueryKey, write: W, effect: F) -> Result<T, Err>
    where
        W: Future<Output = Result<T, Err>>,
        F: FnOnce(&T) -> Optimistic<E>,
    {
        let output = match write.await {
            Ok(output) => output,
            Err(e) => {
                debug!(query = %key, "write failed; cache untouched");
                return Err(e);
            }
        };

        // No await between the write completing and the effect landing.
        {
            let mut slots = self.slots.write().expect("cache lock poisoned");
            let slot = slots.entry(key.clone()).or_insert_with(Slot::empty);
            let effect = effect(&output);
            slot.stale = true;
            slot.generation += 1;
            if self.fetch_in_flight(key) {
                slot.replay.push((slot.generation, effect.clone()));
            }
            effect.apply(&mut slot.entries);
            debug!(query = %key, entries = slot.entries.len(), "mutation applied");
        }
        self.emit(key, CacheEventKind::Mutated);
        Ok(output)
    }

    /// Return fresh entries for `key`, calling `fetch` when the query is
    /// missing or stale.
    ///
    /// If the query is mutated or invalidated while the fetch is in flight,
    /// the mutations applied meanwhile are replayed over the fetched
    /// entries and the query stays stale.
    pub async fn reconcile<Err, F, Fut>(&self, key: &QueryKey, fetch: F) -> Result<Vec<E>, Err>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<E>, Err>>,
    {
        let started_at = {
            let slots = self.slots.read().expect("cache lock poisoned");
            let started_at = match slots.get(key) {
                Some(slot) if !slot.stale => return Ok(slot.entries.clone()),
                Some(slot) => slot.generation,
                None => 0,
            };
            *self
                .fetching
                .lock()
                .expect("fetch table poisoned")
                .entry(key.clone())
                .or_insert(0) += 1;
            started_at
        };

        let result = fetch().await;

        let mut slots = self.slots.write().expect("cache lock poisoned");
        let last_fetch = self.finish_fetch(key);
        let fetched = match result {
            Ok(fetched) => fetched,
            Err(e) => {
                if last_fetch {
                    if let Some(slot) = slots.get_mut(key) {
                        slot.replay.clear();
                    }
                }
                return Err(e);
            }
        };
        let slot = slots.entry(key.clone()).or_insert_with(Slot::empty);
        let raced = slot.generation != started_at;
        let mut entries = fetched;
        if raced {
            warn!(query = %key, "query changed during fetch; left stale");
            for (_, effect) in slot.replay.iter().filter(|(g, _)| *g > started_at) {
                effect.clone().apply(&mut entries);
            }
        }
        if last_fetch {
            slot.replay.clear();
        }
        slot.entries = entries.clone();
        slot.stale = raced;
        drop(slots);

        debug!(query = %key, entries = entries.len(), "query refreshed");
        self.emit(key, CacheEventKind::Refreshed);
        Ok(entries)
    }

    fn fetch_in_flight(&self, key: &QueryKey) -> bool {
        let fetching = self.fetching.lock().expect("fetch table poisoned");
        fetching.get(key).is_some_and(|n| *n > 0)
    }

    /// Returns `true` when no other fetch of `key` is still running.
    fn finish_fetch(&self, key: &QueryKey) -> bool {
        let mut fetching = self.fetching.lock().expect("fetch table poisoned");
        match fetching.get_mut(key) {
            Some(n) if *n > 1 => {
                *n -= 1;
                false
            }
            _ => {
                fetching.remove(key);
                true
            }
        }
    }

    /// Mark `key` stale. Returns `false` if it was never cached.
    pub fn invalidate(&self, key: &QueryKey) -> bool {
        let found = {
            let mut slots = self.slots.write().expect("cache lock poisoned");
            match slots.get_mut(key) {
                Some(slot) => {
                    slot.stale = true;
                    slot.generation += 1;
                    true
                }
                None => false,
            }
        };
        if found {
            self.emit(key, CacheEventKind::Invalidated);
        }
        found
    }

    /// Mark every cached query stale.
    pub fn invalidate_all(&self) {
        let keys: Vec<QueryKey> = {
            let mut slots = self.slots.write().expect("cache lock poisoned");
            for slot in slots.values_mut() {
                slot.stale = true;
                slot.generation += 1;
            }
            slots.keys().cloned().collect()
        };
        for key in &keys {
            self.emit(key, CacheEventKind::Invalidated);
        }
    }

    /// Subscribe to change events for every query.
    pub fn subscribe(&self) -> EventStream {
        self.events.subscribe()
    }

    fn emit(&self, key: &QueryKey, kind: CacheEventKind) {
        // No subscribers is not an error.
        let _ = self.events.send(CacheEvent {
            key: key.clone(),
            kind,
        });
    }
}

impl<E: Entity> Default for MutationCache<E> {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}
