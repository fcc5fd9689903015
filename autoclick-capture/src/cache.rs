//! SharedFrameCache (C1): a ref-counted latest-frame registry letting
//! multiple consumers (detector, preview, diagnostics) read the newest
//! frame by reference without copying or re-capturing.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::frame::Frame;

pub type ConsumerId = String;

struct CacheEntry {
    frame: Frame,
    cached_at: Instant,
    consumers: HashSet<ConsumerId>,
    generation: u64,
}

/// A non-owning, read-only view into a frame held by the cache. Cheap to
/// clone; holding one keeps the underlying `Arc<[u8]>` pixel buffer alive
/// even if the cache entry is later replaced.
#[derive(Clone)]
pub struct SharedFrameView {
    pub frame: Frame,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub current_consumers: usize,
    pub current_frame_id: Option<u64>,
    pub age: Option<Duration>,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

struct Counters {
    hits: u64,
    misses: u64,
}

/// Single mutex guarding entry + consumer-set metadata. Readers never block
/// each other on pixel access, since a [`SharedFrameView`] holds only an
/// `Arc` clone, not the lock.
pub struct SharedFrameCache {
    max_cache_age: Duration,
    auto_cleanup: bool,
    state: Mutex<(Option<CacheEntry>, Counters)>,
    generation: std::sync::atomic::AtomicU64,
}

impl SharedFrameCache {
    pub fn new(max_cache_age: Duration) -> Self {
        Self {
            max_cache_age,
            auto_cleanup: true,
            state: Mutex::new((None, Counters { hits: 0, misses: 0 })),
            generation: std::sync::atomic::AtomicU64::new(0),
        }
    }

    pub fn with_auto_cleanup(mut self, enabled: bool) -> Self {
        self.auto_cleanup = enabled;
        self
    }

    /// Replaces the current entry with `frame`, resetting the consumer set.
    /// Frames are already immutable (`Arc<[u8]>`) by the time they reach
    /// here, so publication is always zero-copy, never a defensive copy.
    pub fn cache(&self, frame: Frame) -> u64 {
        let generation = self.generation.fetch_add(1, std::sync::atomic::Ordering::SeqCst) + 1;
        let frame_id = frame.frame_id;
        let mut guard = self.state.lock();
        guard.0 = Some(CacheEntry {
            frame,
            cached_at: Instant::now(),
            consumers: HashSet::new(),
            generation,
        });
        frame_id
    }

    /// Returns a view of the current entry if it is fresh enough and (when
    /// supplied) matches `frame_id`, registering `consumer_id` against it.
    pub fn get(&self, consumer_id: &str, frame_id: Option<u64>) -> Option<SharedFrameView> {
        let mut guard = self.state.lock();
        let (entry, counters) = (&mut guard.0, &mut guard.1);
        let Some(entry) = entry else {
            counters.misses += 1;
            return None;
        };
        let fresh = entry.cached_at.elapsed() <= self.max_cache_age;
        let matches_id = frame_id.is_none_or(|id| id == entry.frame.frame_id);
        if !fresh || !matches_id {
            counters.misses += 1;
            return None;
        }
        entry.consumers.insert(consumer_id.to_string());
        counters.hits += 1;
        Some(SharedFrameView {
            frame: entry.frame.clone(),
        })
    }

    /// Removes `consumer_id` from the current entry's consumer set. If
    /// auto-cleanup is enabled and the set becomes empty, drops the entry.
    pub fn release(&self, consumer_id: &str) {
        let mut guard = self.state.lock();
        let should_clear = if let Some(entry) = guard.0.as_mut() {
            entry.consumers.remove(consumer_id);
            self.auto_cleanup && entry.consumers.is_empty()
        } else {
            false
        };
        if should_clear {
            guard.0 = None;
        }
    }

    /// Drops the current entry unconditionally.
    pub fn force_cleanup(&self) {
        let mut guard = self.state.lock();
        guard.0 = None;
    }

    pub fn stats(&self) -> CacheStats {
        let guard = self.state.lock();
        let (entry, counters) = (&guard.0, &guard.1);
        CacheStats {
            hits: counters.hits,
            misses: counters.misses,
            current_consumers: entry.as_ref().map_or(0, |e| e.consumers.len()),
            current_frame_id: entry.as_ref().map(|e| e.frame.frame_id),
            age: entry.as_ref().map(|e| e.cached_at.elapsed()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use autoclick_ipc::ContentSize;

    fn sample_frame(id: u64) -> Frame {
        Frame::new(id, ContentSize::new(2, 1), vec![0u8; 6])
    }

    #[test]
    fn cache_then_get_registers_consumer_and_counts_a_hit() {
        let cache = SharedFrameCache::new(Duration::from_secs(5));
        cache.cache(sample_frame(1));
        let view = cache.get("scanner_detection", None).unwrap();
        assert_eq!(view.frame.frame_id, 1);
        assert_eq!(cache.stats().hits, 1);
    }

    #[test]
    fn get_with_mismatched_frame_id_misses() {
        let cache = SharedFrameCache::new(Duration::from_secs(5));
        cache.cache(sample_frame(1));
        assert!(cache.get("c", Some(999)).is_none());
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn release_drops_entry_once_last_consumer_leaves() {
        let cache = SharedFrameCache::new(Duration::from_secs(5));
        cache.cache(sample_frame(1));
        cache.get("a", None).unwrap();
        cache.get("b", None).unwrap();
        cache.release("a");
        assert_eq!(cache.stats().current_consumers, 1);
        cache.release("b");
        assert_eq!(cache.stats().current_consumers, 0);
        assert!(cache.get("a", None).is_none());
    }

    #[test]
    fn stale_entry_is_treated_as_a_miss() {
        let cache = SharedFrameCache::new(Duration::from_millis(0));
        cache.cache(sample_frame(1));
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get("a", None).is_none());
    }

    #[test]
    fn force_cleanup_empties_the_cache_regardless_of_consumers() {
        let cache = SharedFrameCache::new(Duration::from_secs(5));
        cache.cache(sample_frame(1));
        cache.get("a", None).unwrap();
        cache.force_cleanup();
        assert_eq!(cache.stats().current_frame_id, None);
        assert_eq!(cache.stats().current_consumers, 0);
    }

    #[test]
    fn cache_release_force_cleanup_round_trip_leaves_it_empty() {
        let cache = SharedFrameCache::new(Duration::from_secs(5));
        cache.cache(sample_frame(1));
        cache.get("c", None).unwrap();
        cache.release("c");
        cache.force_cleanup();
        let stats = cache.stats();
        assert_eq!(stats.current_frame_id, None);
        assert_eq!(stats.current_consumers, 0);
    }
}
