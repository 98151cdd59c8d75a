//! Bounded, TTL-expiring cache of live sink clients.
//!
//! Entries are keyed by [`SinkIdentity`] and own the client, the
//! configuration it was built from, and its background listener. An entry
//! leaving the cache for any reason (expiry, eviction, replacement, explicit
//! removal, shutdown) cancels its listener before the call returns.
//!
//! Capacity eviction is adaptive in the ARC sense: expired entries go first,
//! then the least recently used entry that was never read back after insert,
//! and only then the least recently used of the frequently read ones.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use {
    futures::future::join_all,
    kvnts_config::{CacheConfig, SinkConfig},
    tokio::time::Instant,
    tracing::{debug, info},
};

use crate::{
    Error, Result,
    identity::SinkIdentity,
    sink::{BuiltSink, Sink},
};

/// Expiry used when `now + ttl` does not fit in an [`Instant`].
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// Outcome of [`SinkRegistry::try_insert`].
pub enum Insert {
    /// The candidate is now cached.
    Inserted(Arc<dyn Sink>),
    /// A live entry already existed. The caller owns the rejected candidate
    /// and must tear it down.
    Occupied {
        winner: Arc<dyn Sink>,
        rejected: BuiltSink,
    },
}

/// A cached client together with the configuration it was built from.
pub struct Cached {
    pub client: Arc<dyn Sink>,
    pub config: SinkConfig,
}

struct CacheEntry {
    built: BuiltSink,
    config: SinkConfig,
    expires_at: Instant,
    hits: u64,
    last_access: u64,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

#[derive(Default)]
struct Inner {
    entries: HashMap<SinkIdentity, CacheEntry>,
    clock: u64,
}

impl Inner {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    /// Remove every expired entry, returning them for teardown.
    fn drain_expired(&mut self, now: Instant) -> Vec<(SinkIdentity, CacheEntry)> {
        let expired: Vec<SinkIdentity> = self
            .entries
            .iter()
            .filter(|(_, e)| e.is_expired(now))
            .map(|(id, _)| id.clone())
            .collect();
        expired
            .into_iter()
            .filter_map(|id| self.entries.remove(&id).map(|e| (id, e)))
            .collect()
    }

    fn lru_victim(&self, keep: &SinkIdentity, frequent: bool) -> Option<SinkIdentity> {
        self.entries
            .iter()
            .filter(|(id, e)| *id != keep && (e.hits > 0) == frequent)
            .min_by_key(|(_, e)| e.last_access)
            .map(|(id, _)| id.clone())
    }
}

pub struct SinkRegistry {
    capacity: usize,
    default_ttl: Duration,
    inner: Mutex<Inner>,
}

impl SinkRegistry {
    pub fn new(capacity: usize, default_ttl: Duration) -> Self {
        Self {
            capacity: capacity.max(1),
            default_ttl,
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.capacity, config.ttl())
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Return the live client for `identity`.
    ///
    /// An expired entry is treated as a miss and torn down here.
    pub fn get(&self, identity: &SinkIdentity) -> Result<Arc<dyn Sink>> {
        self.lookup(identity)
            .map(|cached| cached.client)
            .ok_or_else(|| Error::not_found(identity))
    }

    /// Like [`get`](Self::get), but also returns the configuration snapshot
    /// the client was built from. Counts as an access.
    pub fn lookup(&self, identity: &SinkIdentity) -> Option<Cached> {
        let now = Instant::now();
        let mut inner = self.lock();
        let tick = inner.tick();

        match inner.entries.get_mut(identity) {
            None => return None,
            Some(entry) if entry.is_expired(now) => {},
            Some(entry) => {
                entry.hits += 1;
                entry.last_access = tick;
                debug!(identity = %identity, hits = entry.hits, "sink cache hit");
                return Some(Cached {
                    client: Arc::clone(&entry.built.client),
                    config: entry.config.clone(),
                });
            },
        }

        if let Some(entry) = inner.entries.remove(identity) {
            drop(inner);
            teardown(identity, entry, "expired");
        }
        None
    }

    /// Whether a live (non-expired) entry exists. Does not count as an access.
    pub fn contains(&self, identity: &SinkIdentity) -> bool {
        let now = Instant::now();
        self.lock()
            .entries
            .get(identity)
            .is_some_and(|e| !e.is_expired(now))
    }

    /// Configuration snapshot of a live entry. Does not count as an access.
    pub fn snapshot(&self, identity: &SinkIdentity) -> Option<SinkConfig> {
        let now = Instant::now();
        self.lock()
            .entries
            .get(identity)
            .filter(|e| !e.is_expired(now))
            .map(|e| e.config.clone())
    }

    /// Insert or replace. A replaced entry is torn down; capacity is enforced.
    pub fn put(
        &self,
        identity: SinkIdentity,
        built: BuiltSink,
        config: SinkConfig,
        ttl: Option<Duration>,
    ) -> Arc<dyn Sink> {
        let client = Arc::clone(&built.client);
        let mut inner = self.lock();
        let entry = self.new_entry(&mut inner, built, config, ttl);
        let replaced = inner.entries.insert(identity.clone(), entry);
        let evicted = self.evict_over_capacity(&mut inner, &identity);
        drop(inner);

        if let Some(old) = replaced {
            teardown(&identity, old, "replaced");
        }
        for (id, entry) in evicted {
            teardown(&id, entry, "evicted");
        }
        client
    }

    /// Insert only if no live entry exists for `identity`.
    ///
    /// This is the race-resolution point for concurrent builds: exactly one
    /// candidate wins and every caller gets the winner's client.
    pub fn try_insert(
        &self,
        identity: SinkIdentity,
        built: BuiltSink,
        config: SinkConfig,
        ttl: Option<Duration>,
    ) -> Insert {
        let now = Instant::now();
        let mut inner = self.lock();

        let stale = match inner.entries.get(&identity) {
            Some(existing) if !existing.is_expired(now) => {
                return Insert::Occupied {
                    winner: Arc::clone(&existing.built.client),
                    rejected: built,
                };
            },
            Some(_) => inner.entries.remove(&identity),
            None => None,
        };

        let client = Arc::clone(&built.client);
        let entry = self.new_entry(&mut inner, built, config, ttl);
        inner.entries.insert(identity.clone(), entry);
        let evicted = self.evict_over_capacity(&mut inner, &identity);
        drop(inner);

        if let Some(old) = stale {
            teardown(&identity, old, "expired");
        }
        for (id, entry) in evicted {
            teardown(&id, entry, "evicted");
        }
        Insert::Inserted(client)
    }

    /// Remove an entry and cancel its listener. Returns whether one existed.
    pub fn remove(&self, identity: &SinkIdentity) -> bool {
        let removed = self.lock().entries.remove(identity);
        match removed {
            Some(entry) => {
                teardown(identity, entry, "removed");
                true
            },
            None => false,
        }
    }

    /// Tear down every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let expired = self.lock().drain_expired(Instant::now());
        let count = expired.len();
        for (id, entry) in expired {
            teardown(&id, entry, "expired");
        }
        count
    }

    /// Number of entries, expired ones not yet purged included.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Tear down every entry and wait for their listeners to exit.
    pub async fn shutdown(&self) {
        let drained: Vec<_> = self.lock().entries.drain().collect();
        if drained.is_empty() {
            return;
        }
        info!(count = drained.len(), "shutting down cached sinks");
        let listeners = drained.into_iter().filter_map(|(id, entry)| {
            info!(identity = %id, cause = "shutdown", "sink entry torn down");
            entry.built.listener
        });
        join_all(listeners.map(|l| l.join())).await;
    }

    fn new_entry(
        &self,
        inner: &mut Inner,
        built: BuiltSink,
        config: SinkConfig,
        ttl: Option<Duration>,
    ) -> CacheEntry {
        CacheEntry {
            built,
            config,
            expires_at: expiry(Instant::now(), ttl.unwrap_or(self.default_ttl)),
            hits: 0,
            last_access: inner.tick(),
        }
    }

    fn evict_over_capacity(
        &self,
        inner: &mut Inner,
        keep: &SinkIdentity,
    ) -> Vec<(SinkIdentity, CacheEntry)> {
        if inner.entries.len() <= self.capacity {
            return Vec::new();
        }

        let mut evicted = inner.drain_expired(Instant::now());
        while inner.entries.len() > self.capacity {
            let Some(victim) = inner
                .lru_victim(keep, false)
                .or_else(|| inner.lru_victim(keep, true))
            else {
                break;
            };
            if let Some(entry) = inner.entries.remove(&victim) {
                evicted.push((victim, entry));
            }
        }
        evicted
    }
}

fn expiry(now: Instant, ttl: Duration) -> Instant {
    now.checked_add(ttl)
        .or_else(|| now.checked_add(FAR_FUTURE))
        .unwrap_or(now)
}

fn teardown(identity: &SinkIdentity, entry: CacheEntry, cause: &'static str) {
    info!(identity = %identity, cause, "sink entry torn down");
    entry.built.teardown();
}
