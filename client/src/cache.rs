//! Expiring caches shared by concurrent collectors.
//!
//! Expired entries are never returned but stay in the map until they are
//! overwritten or removed by [`TtlCache::sweep`].

use crate::remote::MetricResponse;
use derive_more::Display;
use parking_lot::RwLock;
use std::{
    borrow::Borrow,
    collections::{
        BTreeMap,
        HashMap,
    },
    hash::Hash,
    sync::Arc,
    time::Duration,
};
use tokio::time::Instant;

/// Raw metric responses are reused within one scrape window.
pub const RESPONSE_TTL: Duration = Duration::from_secs(30);
/// Resource tags change rarely.
pub const TAG_TTL: Duration = Duration::from_secs(5 * 60);

pub type ResponseCache = TtlCache<MetricKey, Arc<MetricResponse>>;
pub type TagCache = TtlCache<String, ResourceTags>;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Display)]
#[display("{namespace}:{metric}")]
pub struct MetricKey {
    pub namespace: String,
    pub metric: String,
}

impl MetricKey {
    pub fn new(namespace: impl Into<String>, metric: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            metric: metric.into(),
        }
    }
}

/// Metadata of one cloud resource. The default value marks a resource that
/// was not found in any region.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceTags {
    pub region: Option<String>,
    pub tags: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    value: V,
    created_at: Instant,
    ttl: Duration,
}

impl<V> CacheEntry<V> {
    pub fn new(value: V, ttl: Duration) -> Self {
        Self {
            value,
            created_at: Instant::now(),
            ttl,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.created_at.elapsed() > self.ttl
    }

    pub fn value(&self) -> &V {
        &self.value
    }
}

#[derive(Debug)]
pub struct TtlCache<K, V> {
    entries: RwLock<HashMap<K, CacheEntry<V>>>,
    ttl: Duration,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let entries = self.entries.read();
        entries
            .get(key)
            .filter(|entry| !entry.is_expired())
            .map(|entry| entry.value().clone())
    }

    /// Replaces any previous entry and restarts its lifetime.
    pub fn set(&self, key: K, value: V) {
        self.entries.write().insert(key, CacheEntry::new(value, self.ttl));
    }

    /// Removes expired entries and returns how many were dropped.
    pub fn sweep(&self) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired());
        before - entries.len()
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}
