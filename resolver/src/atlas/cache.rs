//! Thread-safe atlas volume cache with LRU eviction

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use indexmap::IndexMap;
use metrics::counter;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use super::types::{AtlasError, AtlasListItem, AtlasResolution};
use super::volume::AtlasVolume;

const ATLAS_LIST_CACHE_TTL: Duration = Duration::from_secs(30);

/// Counter for probabilistic LRU updates - update every N accesses
const LRU_UPDATE_FREQUENCY: u64 = 8;

/// Cached atlas list with timestamp
struct AtlasListCache {
    atlases: Vec<AtlasListItem>,
    cached_at: Instant,
}

/// Cache for loaded atlas volumes with O(1) LRU tracking
///
/// Uses IndexMap which maintains insertion order; re-inserting an entry moves
/// it to the end (most recent). Loads are serialised per atlas through a
/// mutex held in a DashMap, so a volume that takes seconds to read is read
/// once even under concurrent requests, while other atlases stay readable.
pub struct AtlasCache {
    /// Loaded volumes with LRU ordering (most recent at end)
    volumes: RwLock<IndexMap<AtlasResolution, Arc<AtlasVolume>>>,
    /// Per-atlas load guards
    load_locks: DashMap<AtlasResolution, Arc<Mutex<()>>>,
    /// Maximum number of resident volumes
    max_size: usize,
    /// Cached atlas list (avoids repeated directory scans)
    atlas_list_cache: RwLock<Option<AtlasListCache>>,
    /// Counter for probabilistic LRU updates
    access_counter: AtomicU64,
}

impl AtlasCache {
    /// Create a new atlas cache holding at most `max_size` volumes
    pub fn new(max_size: usize) -> Self {
        let max_size = max_size.max(1);
        Self {
            volumes: RwLock::new(IndexMap::with_capacity(max_size)),
            load_locks: DashMap::new(),
            max_size,
            atlas_list_cache: RwLock::new(None),
            access_counter: AtomicU64::new(0),
        }
    }

    /// Get a cached volume, or load it with `load` and cache the result
    pub async fn get_or_load<F>(
        &self,
        atlas: &AtlasResolution,
        load: F,
    ) -> Result<Arc<AtlasVolume>, AtlasError>
    where
        F: Future<Output = Result<AtlasVolume, AtlasError>>,
    {
        if let Some(volume) = self.get_cached(atlas).await {
            counter!("ccf_atlas_cache_hits_total").increment(1);
            return Ok(volume);
        }

        let lock = self.load_locks.entry(atlas.clone()).or_default().clone();
        let result = self.load_exclusive(atlas, &lock, load).await;

        // Drop the guard entry unless another task is waiting on it
        self.load_locks.remove_if(atlas, |_, held| {
            Arc::ptr_eq(held, &lock) && Arc::strong_count(held) == 2
        });
        result
    }

    async fn load_exclusive<F>(
        &self,
        atlas: &AtlasResolution,
        lock: &Mutex<()>,
        load: F,
    ) -> Result<Arc<AtlasVolume>, AtlasError>
    where
        F: Future<Output = Result<AtlasVolume, AtlasError>>,
    {
        let _guard = lock.lock().await;

        // Another task may have finished loading while we waited
        if let Some(volume) = self.get_cached(atlas).await {
            counter!("ccf_atlas_cache_hits_total").increment(1);
            return Ok(volume);
        }

        counter!("ccf_atlas_cache_misses_total").increment(1);
        let volume = Arc::new(load.await?);
        self.insert(atlas, Arc::clone(&volume)).await;
        Ok(volume)
    }

    /// Get a cached volume without loading it
    ///
    /// Takes the write lock only 1 in N hits to update LRU order.
    pub async fn get_cached(&self, atlas: &AtlasResolution) -> Option<Arc<AtlasVolume>> {
        let volumes = self.volumes.read().await;
        let volume = Arc::clone(volumes.get(atlas)?);

        let count = self.access_counter.fetch_add(1, Ordering::Relaxed);
        if count.is_multiple_of(LRU_UPDATE_FREQUENCY) {
            drop(volumes);
            let mut volumes = self.volumes.write().await;
            if let Some(v) = volumes.shift_remove(atlas) {
                volumes.insert(atlas.clone(), v);
            }
        }
        Some(volume)
    }

    async fn insert(&self, atlas: &AtlasResolution, volume: Arc<AtlasVolume>) {
        let mut volumes = self.volumes.write().await;

        // Evict LRU if needed (first item is oldest)
        if volumes.len() >= self.max_size
            && !volumes.contains_key(atlas)
            && let Some((evicted, _)) = volumes.shift_remove_index(0)
        {
            debug!("Evicted atlas from cache: {}", evicted);
        }

        volumes.insert(atlas.clone(), volume);
    }

    /// Number of resident volumes
    pub async fn len(&self) -> usize {
        self.volumes.read().await.len()
    }

    /// Get the cached atlas list if still valid
    pub async fn get_atlas_list(&self) -> Option<Vec<AtlasListItem>> {
        let cache = self.atlas_list_cache.read().await;
        if let Some(ref list_cache) = *cache
            && list_cache.cached_at.elapsed() < ATLAS_LIST_CACHE_TTL
        {
            return Some(list_cache.atlases.clone());
        }
        None
    }

    /// Set the cached atlas list
    pub async fn set_atlas_list(&self, atlases: Vec<AtlasListItem>) {
        let mut cache = self.atlas_list_cache.write().await;
        *cache = Some(AtlasListCache {
            atlases,
            cached_at: Instant::now(),
        });
    }
}
