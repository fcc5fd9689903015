//! TemplateCache (C4): loads and caches template bitmaps, with LRU
//! eviction and opportunistic time-based sweeping.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use image::GenericImageView;
use lru::LruCache;
use parking_lot::Mutex;

use autoclick_config::TemplateSourceLoader;

use crate::error::{MatchError, Result};

const EVICTION_SWEEP_INTERVAL: Duration = Duration::from_secs(30);
const MAX_ENTRY_AGE_UNUSED: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct TemplateKey {
    source_ref: String,
    grayscale: bool,
}

/// A decoded, cached template. Two templates are equal iff their `hash`
/// matches. Pixel data is stored read-only: callers only ever see `&[u8]`.
#[derive(Clone)]
pub struct DecodedTemplate {
    pub pixels: Arc<[u8]>,
    pub width: u32,
    pub height: u32,
    pub grayscale: bool,
    pub hash: u64,
    pub source_ref: String,
    pub load_time: Instant,
    pub last_access: Instant,
    pub access_count: u64,
}

impl PartialEq for DecodedTemplate {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash
    }
}

fn fnv1a_hash(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for b in bytes {
        hash ^= *b as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

pub struct TemplateCache {
    loader: TemplateSourceLoader,
    entries: Mutex<LruCache<TemplateKey, DecodedTemplate>>,
    last_sweep: Mutex<Instant>,
}

impl TemplateCache {
    pub fn new(loader: TemplateSourceLoader, capacity: usize) -> Self {
        Self {
            loader,
            entries: Mutex::new(LruCache::new(
                NonZeroUsize::new(capacity.max(1)).unwrap(),
            )),
            last_sweep: Mutex::new(Instant::now()),
        }
    }

    /// `get(source_ref, grayscale)`: loads from source on miss, touches
    /// `last_access` on hit. Key is `(source_ref, grayscale)`, since the
    /// same source can be cached in both color and grayscale form.
    pub fn get(&self, source_ref: &str, grayscale: bool) -> Result<DecodedTemplate> {
        let key = TemplateKey {
            source_ref: source_ref.to_string(),
            grayscale,
        };

        {
            let mut entries = self.entries.lock();
            if let Some(entry) = entries.get_mut(&key) {
                entry.last_access = Instant::now();
                entry.access_count += 1;
                return Ok(entry.clone());
            }
        }

        let decoded = self.load_and_decode(source_ref, grayscale)?;
        self.entries.lock().put(key, decoded.clone());
        Ok(decoded)
    }

    fn load_and_decode(&self, source_ref: &str, grayscale: bool) -> Result<DecodedTemplate> {
        let bytes = self
            .loader
            .load(source_ref)
            .map_err(|e| MatchError::TemplateLoad {
                source_ref: source_ref.to_string(),
                detail: e.to_string(),
            })?;
        let hash = fnv1a_hash(&bytes);
        let image = image::load_from_memory(&bytes)?;
        let (width, height) = image.dimensions();
        let pixels: Arc<[u8]> = if grayscale {
            Arc::from(image.to_luma8().into_raw())
        } else {
            Arc::from(image.to_rgb8().into_raw())
        };
        let now = Instant::now();
        Ok(DecodedTemplate {
            pixels,
            width,
            height,
            grayscale,
            hash,
            source_ref: source_ref.to_string(),
            load_time: now,
            last_access: now,
            access_count: 1,
        })
    }

    /// Warms the cache by loading every `source_ref` in `refs` up front, so
    /// the first scan tick does not pay decode latency on the hot path.
    pub fn warm(&self, refs: &[String], grayscale: bool) -> Result<()> {
        for source_ref in refs {
            self.get(source_ref, grayscale)?;
        }
        Ok(())
    }

    /// Opportunistic periodic eviction: a no-op unless at least
    /// [`EVICTION_SWEEP_INTERVAL`] has passed since the last sweep. Drops
    /// entries unused for over an hour. LRU already handles the
    /// over-capacity case on every `put`.
    pub fn maybe_evict_stale(&self) {
        let mut last_sweep = self.last_sweep.lock();
        if last_sweep.elapsed() < EVICTION_SWEEP_INTERVAL {
            return;
        }
        *last_sweep = Instant::now();
        drop(last_sweep);

        let mut entries = self.entries.lock();
        let stale: Vec<TemplateKey> = entries
            .iter()
            .filter(|(_, v)| v.last_access.elapsed() > MAX_ENTRY_AGE_UNUSED)
            .map(|(k, _)| k.clone())
            .collect();
        for key in stale {
            entries.pop(&key);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use autoclick_config::TemplateSourceLoader;

    fn tiny_png_bytes() -> Vec<u8> {
        let img = image::RgbImage::from_pixel(4, 4, image::Rgb([255, 0, 0]));
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn get_loads_on_miss_and_reuses_on_hit() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("t.png"), tiny_png_bytes()).unwrap();
        let cache = TemplateCache::new(TemplateSourceLoader::new(dir.path()), 8);

        let first = cache.get("t.png", false).unwrap();
        assert_eq!(first.access_count, 1);
        let second = cache.get("t.png", false).unwrap();
        assert_eq!(second.access_count, 2);
        assert_eq!(first.hash, second.hash);
    }

    #[test]
    fn grayscale_and_color_are_cached_separately() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("t.png"), tiny_png_bytes()).unwrap();
        let cache = TemplateCache::new(TemplateSourceLoader::new(dir.path()), 8);

        cache.get("t.png", false).unwrap();
        cache.get("t.png", true).unwrap();
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn missing_template_surfaces_a_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TemplateCache::new(TemplateSourceLoader::new(dir.path()), 8);
        let err = cache.get("missing.png", false).unwrap_err();
        assert!(matches!(err, MatchError::TemplateLoad { .. }));
    }

    #[test]
    fn over_capacity_insert_evicts_least_recently_used() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["a.png", "b.png", "c.png"] {
            std::fs::write(dir.path().join(name), tiny_png_bytes()).unwrap();
        }
        let cache = TemplateCache::new(TemplateSourceLoader::new(dir.path()), 2);
        cache.get("a.png", false).unwrap();
        cache.get("b.png", false).unwrap();
        cache.get("c.png", false).unwrap();
        assert_eq!(cache.len(), 2);
    }
}
