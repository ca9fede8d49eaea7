//! Bounded memoization of graphs and derived results
//!
//! Entries expire a fixed time after insertion and are evicted least recently
//! used first once either the entry count or the byte budget is exceeded.
//! Concurrent misses on one key run the computation once; the other callers
//! wait for it and read the populated entry.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::graph::FilterOptions;
use crate::GeneId;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("value of {weight} bytes exceeds the {budget} byte cache budget")]
    Oversized { weight: usize, budget: usize },

    #[error("failed to encode cache key: {0}")]
    Key(#[from] bincode::Error),
}

/// Approximate memory held by a cached value
pub trait CacheWeight {
    fn weight(&self) -> usize;
}

/// Canonical, order-independent request identity.
///
/// The gene set is encoded as its sorted distinct identifiers, so two
/// requests naming the same genes in any order share an entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(Vec<u8>);

#[derive(Serialize)]
struct KeyFields<'a, P> {
    operation: &'a str,
    genes: Vec<GeneId>,
    min_confidence: u16,
    filter: &'a FilterOptions,
    params: &'a P,
}

impl CacheKey {
    pub fn new<P: Serialize>(
        operation: &str,
        genes: &BTreeSet<GeneId>,
        min_confidence: u16,
        filter: &FilterOptions,
        params: &P,
    ) -> Result<Self, CacheError> {
        let fields = KeyFields {
            operation,
            genes: genes.iter().copied().collect(),
            min_confidence,
            filter,
            params,
        };
        Ok(CacheKey(bincode::serialize(&fields)?))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    pub capacity: usize,
    pub ttl: Duration,
    pub max_bytes: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub bytes: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

struct Entry<V> {
    value: Arc<V>,
    inserted: Instant,
    last_used: AtomicU64,
    weight: usize,
}

pub struct ResultCache<V> {
    name: &'static str,
    config: CacheConfig,
    entries: DashMap<CacheKey, Entry<V>>,
    in_flight: DashMap<CacheKey, Arc<Mutex<()>>>,
    used_bytes: AtomicUsize,
    tick: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl<V: CacheWeight> ResultCache<V> {
    pub fn new(name: &'static str, config: CacheConfig) -> Self {
        Self {
            name,
            config,
            entries: DashMap::new(),
            in_flight: DashMap::new(),
            used_bytes: AtomicUsize::new(0),
            tick: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    fn next_tick(&self) -> u64 {
        self.tick.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Live value for `key`, refreshing its recency. Expired entries are
    /// dropped instead of served.
    pub fn get(&self, key: &CacheKey) -> Option<Arc<V>> {
        let expired = match self.entries.get(key) {
            Some(entry) if entry.inserted.elapsed() < self.config.ttl => {
                entry.last_used.store(self.next_tick(), Ordering::Relaxed);
                return Some(Arc::clone(&entry.value));
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            let ttl = self.config.ttl;
            if let Some((_, entry)) = self.entries.remove_if(key, |_, e| e.inserted.elapsed() >= ttl) {
                self.used_bytes.fetch_sub(entry.weight, Ordering::Relaxed);
                log::debug!("{} cache: expired entry dropped", self.name);
            }
        }
        None
    }

    /// Return the cached value for `key`, or run `compute` and cache its
    /// result. Errors from `compute` are passed through and not cached.
    pub fn get_or_compute<E, F>(&self, key: CacheKey, compute: F) -> Result<Arc<V>, E>
    where
        F: FnOnce() -> Result<V, E>,
        E: From<CacheError>,
    {
        if let Some(value) = self.get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(value);
        }

        let lock = Arc::clone(
            self.in_flight
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .value(),
        );
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        // Another caller may have populated the entry while we waited
        if let Some(value) = self.get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(value);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let outcome = compute().and_then(|value| self.insert(key.clone(), value).map_err(E::from));
        self.in_flight.remove_if(&key, |_, m| Arc::ptr_eq(m, &lock));
        outcome
    }

    /// Store `value` under `key` and evict down to the configured bounds
    pub fn insert(&self, key: CacheKey, value: V) -> Result<Arc<V>, CacheError> {
        let weight = value.weight();
        if weight > self.config.max_bytes {
            return Err(CacheError::Oversized {
                weight,
                budget: self.config.max_bytes,
            });
        }

        let value = Arc::new(value);
        let entry = Entry {
            value: Arc::clone(&value),
            inserted: Instant::now(),
            last_used: AtomicU64::new(self.next_tick()),
            weight,
        };
        if let Some(previous) = self.entries.insert(key.clone(), entry) {
            self.used_bytes.fetch_sub(previous.weight, Ordering::Relaxed);
        }
        self.used_bytes.fetch_add(weight, Ordering::Relaxed);

        self.evict(&key);
        Ok(value)
    }

    fn over_budget(&self) -> bool {
        self.entries.len() > self.config.capacity
            || self.used_bytes.load(Ordering::Relaxed) > self.config.max_bytes
    }

    /// Drop expired entries, then least recently used ones, until the cache
    /// fits its bounds. `keep` is never evicted.
    fn evict(&self, keep: &CacheKey) {
        if !self.over_budget() {
            return;
        }

        let ttl = self.config.ttl;
        let expired: Vec<CacheKey> = self
            .entries
            .iter()
            .filter(|e| e.key() != keep && e.inserted.elapsed() >= ttl)
            .map(|e| e.key().clone())
            .collect();
        for key in expired {
            self.remove(&key);
        }

        while self.over_budget() {
            let oldest = self
                .entries
                .iter()
                .filter(|e| e.key() != keep)
                .min_by_key(|e| e.last_used.load(Ordering::Relaxed))
                .map(|e| e.key().clone());
            match oldest {
                Some(key) => {
                    self.remove(&key);
                    self.evictions.fetch_add(1, Ordering::Relaxed);
                }
                None => break,
            }
        }
    }

    fn remove(&self, key: &CacheKey) {
        if let Some((_, entry)) = self.entries.remove(key) {
            self.used_bytes.fetch_sub(entry.weight, Ordering::Relaxed);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            bytes: self.used_bytes.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

impl CacheWeight for crate::graph::InteractionGraph {
    fn weight(&self) -> usize {
        self.memory_usage()
    }
}

impl CacheWeight for crate::cluster::Partition {
    fn weight(&self) -> usize {
        self.memory_usage()
    }
}

impl CacheWeight for crate::centrality::CentralityResult {
    fn weight(&self) -> usize {
        self.memory_usage()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;
    use std::thread;

    #[derive(Debug, PartialEq)]
    struct Blob(usize);

    impl CacheWeight for Blob {
        fn weight(&self) -> usize {
            self.0
        }
    }

    fn config(capacity: usize, ttl_ms: u64, max_bytes: usize) -> CacheConfig {
        CacheConfig {
            capacity,
            ttl: Duration::from_millis(ttl_ms),
            max_bytes,
        }
    }

    fn key(genes: &[GeneId]) -> CacheKey {
        let genes: BTreeSet<GeneId> = genes.iter().copied().collect();
        CacheKey::new("build", &genes, 400, &FilterOptions::default(), &()).unwrap()
    }

    #[test]
    fn key_ignores_gene_order_and_duplicates() {
        assert_eq!(key(&[3, 1, 2]), key(&[1, 2, 3, 3]));
        assert_ne!(key(&[1, 2]), key(&[1, 2, 3]));

        let genes: BTreeSet<GeneId> = [1, 2].into_iter().collect();
        let filter = FilterOptions::default();
        let low = CacheKey::new("build", &genes, 400, &filter, &()).unwrap();
        let high = CacheKey::new("build", &genes, 700, &filter, &()).unwrap();
        let other_op = CacheKey::new("cluster", &genes, 400, &filter, &()).unwrap();
        assert_ne!(low, high);
        assert_ne!(low, other_op);
    }

    #[test]
    fn expired_entries_are_not_served() {
        let cache = ResultCache::new("test", config(10, 40, 1000));
        cache.insert(key(&[1]), Blob(1)).unwrap();
        assert!(cache.get(&key(&[1])).is_some());

        thread::sleep(Duration::from_millis(80));
        assert!(cache.get(&key(&[1])).is_none());
        assert!(cache.is_empty());
        assert_eq!(cache.stats().bytes, 0);
    }

    #[test]
    fn least_recently_used_is_evicted_first() {
        let cache = ResultCache::new("test", config(2, 60_000, 1000));
        cache.insert(key(&[1]), Blob(1)).unwrap();
        cache.insert(key(&[2]), Blob(1)).unwrap();
        cache.get(&key(&[1]));
        cache.insert(key(&[3]), Blob(1)).unwrap();

        assert_eq!(cache.len(), 2);
        assert!(cache.get(&key(&[1])).is_some());
        assert!(cache.get(&key(&[2])).is_none());
        assert!(cache.get(&key(&[3])).is_some());
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn byte_budget_forces_eviction() {
        let cache = ResultCache::new("test", config(100, 60_000, 100));
        cache.insert(key(&[1]), Blob(60)).unwrap();
        cache.insert(key(&[2]), Blob(60)).unwrap();
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.stats().bytes, 60);
        assert!(cache.get(&key(&[2])).is_some());
    }

    #[test]
    fn oversized_value_is_rejected() {
        let cache = ResultCache::new("test", config(100, 60_000, 100));
        let err = cache
            .get_or_compute(key(&[1]), || Ok::<_, CacheError>(Blob(101)))
            .unwrap_err();
        assert!(matches!(err, CacheError::Oversized { weight: 101, budget: 100 }));
        assert!(cache.is_empty());
    }

    #[test]
    fn errors_are_not_cached() {
        #[derive(Debug)]
        enum Failure {
            Compute,
            Cache(CacheError),
        }
        impl From<CacheError> for Failure {
            fn from(e: CacheError) -> Self {
                Failure::Cache(e)
            }
        }

        let cache: ResultCache<Blob> = ResultCache::new("test", config(10, 60_000, 1000));
        let first = cache.get_or_compute(key(&[1]), || Err(Failure::Compute));
        assert!(matches!(first, Err(Failure::Compute)));

        let second = cache.get_or_compute(key(&[1]), || Ok::<_, Failure>(Blob(5))).unwrap();
        assert_eq!(*second, Blob(5));
    }

    #[test]
    fn concurrent_misses_compute_once() {
        let cache: ResultCache<Blob> = ResultCache::new("test", config(10, 60_000, 1000));
        let computations = AtomicUsize::new(0);
        let barrier = Barrier::new(8);

        let values: Vec<Arc<Blob>> = thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    scope.spawn(|| {
                        barrier.wait();
                        cache
                            .get_or_compute(key(&[4, 5]), || {
                                computations.fetch_add(1, Ordering::SeqCst);
                                thread::sleep(Duration::from_millis(50));
                                Ok::<_, CacheError>(Blob(7))
                            })
                            .unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(computations.load(Ordering::SeqCst), 1);
        assert!(values.iter().all(|v| Arc::ptr_eq(v, &values[0])));
        let stats = cache.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 7);
    }
}
