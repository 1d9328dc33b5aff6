//! The fingerprint cache: approximate lookup, in-place update, eviction
//! and sealed persistence.
//!
//! Lookup and update share one mutex so that a find-then-save sequence
//! from concurrent callers cannot insert the same face twice.

use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use facegeo_core::Metrics;
use serde::Serialize;

use crate::config::CacheConfig;
use crate::crypto::CacheCipher;
use crate::fingerprint::{self, CachedAnalysis, FaceCache, FaceFingerprint, FORMAT_VERSION};
use crate::store::BlobStore;
use crate::CacheError;

const USAGE_WEIGHT: f64 = 0.7;
const RECENCY_WEIGHT: f64 = 0.3;
const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// Outcome of [`FingerprintCache::resolve`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resolution {
    /// Shape label to present: the remembered one on a match.
    pub face_shape: String,
    pub fingerprint_id: String,
    /// Similarity to the matched entry, `None` for a new face.
    pub similarity: Option<f64>,
    pub analysis_count: u32,
}

impl Resolution {
    pub fn is_repeat_visit(&self) -> bool {
        self.similarity.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub count: usize,
    pub oldest_days: i64,
    pub total_analyses: u64,
}

pub struct FingerprintCache {
    config: CacheConfig,
    cipher: CacheCipher,
    store: Box<dyn BlobStore>,
    state: Mutex<FaceCache>,
}

impl FingerprintCache {
    /// Load the cache from `store`. Unreadable or undecryptable data
    /// yields an empty cache; this never fails.
    pub fn open(config: CacheConfig, cipher: CacheCipher, store: impl BlobStore + 'static) -> Self {
        let state = match store.read() {
            Ok(Some(blob)) => decode(&cipher, &blob),
            Ok(None) => FaceCache::default(),
            Err(e) => {
                tracing::warn!(error = %e, "failed to read face cache; starting empty");
                FaceCache::default()
            }
        };
        tracing::debug!(entries = state.fingerprints.len(), "face cache opened");

        Self {
            config: config.validated(),
            cipher,
            store: Box::new(store),
            state: Mutex::new(state),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Best stored fingerprint at or above the similarity threshold.
    pub fn find_similar(&self, metrics: &Metrics) -> Option<FaceFingerprint> {
        let state = self.lock();
        let (index, similarity) = self.best_match(&state, metrics)?;
        let found = state.fingerprints[index].clone();
        tracing::info!(
            similarity,
            id = %found.id,
            face_shape = %found.face_shape,
            "face fingerprint matched"
        );
        Some(found)
    }

    /// Record a visit: update the matching entry in place or insert a new one,
    /// then evict and persist.
    pub fn save(&self, metrics: &Metrics, face_shape: &str) -> Result<(), CacheError> {
        self.save_at(metrics, face_shape, None, Utc::now()).map(|_| ())
    }

    /// As [`save`](Self::save), also remembering an external analysis.
    pub fn save_with_analysis(
        &self,
        metrics: &Metrics,
        face_shape: &str,
        analysis: CachedAnalysis,
    ) -> Result<(), CacheError> {
        self.save_at(metrics, face_shape, Some(analysis), Utc::now()).map(|_| ())
    }

    /// Find-or-insert in one critical section. On a match the remembered
    /// shape label wins, which keeps repeat visits consistent.
    pub fn resolve(&self, metrics: &Metrics, face_shape: &str) -> Result<Resolution, CacheError> {
        self.save_at(metrics, face_shape, None, Utc::now())
    }

    pub fn save_at(
        &self,
        metrics: &Metrics,
        face_shape: &str,
        analysis: Option<CachedAnalysis>,
        now: DateTime<Utc>,
    ) -> Result<Resolution, CacheError> {
        let mut state = self.lock();
        let timestamp = now.timestamp_millis();
        let analysis = analysis.filter(CachedAnalysis::is_cacheable);

        // Mutate a copy; memory only moves once the sealed write succeeds.
        let mut next = state.clone();
        let resolution = match self.best_match(&next, metrics) {
            Some((index, similarity)) => {
                let entry = &mut next.fingerprints[index];
                entry.metrics = metrics.clone();
                entry.timestamp = timestamp;
                entry.analysis_count = entry.analysis_count.saturating_add(1);
                if analysis.is_some() {
                    entry.last_analysis = analysis;
                }
                tracing::info!(
                    id = %entry.id,
                    similarity,
                    analysis_count = entry.analysis_count,
                    "face fingerprint updated"
                );
                Resolution {
                    face_shape: entry.face_shape.clone(),
                    fingerprint_id: entry.id.clone(),
                    similarity: Some(similarity),
                    analysis_count: entry.analysis_count,
                }
            }
            None => {
                let entry = FaceFingerprint {
                    id: fingerprint::fingerprint_id(metrics),
                    metrics: metrics.clone(),
                    face_shape: face_shape.to_string(),
                    timestamp,
                    analysis_count: 1,
                    last_analysis: analysis,
                };
                tracing::info!(id = %entry.id, face_shape, "new face fingerprint stored");
                let resolution = Resolution {
                    face_shape: entry.face_shape.clone(),
                    fingerprint_id: entry.id.clone(),
                    similarity: None,
                    analysis_count: 1,
                };
                next.fingerprints.push(entry);
                resolution
            }
        };

        evict(&mut next, &self.config, timestamp);
        self.persist(&next)?;
        *state = next;
        Ok(resolution)
    }

    /// Remembered analysis of a similar face, if any.
    pub fn cached_analysis(&self, metrics: &Metrics) -> Option<CachedAnalysis> {
        self.find_similar(metrics)?.last_analysis
    }

    pub fn stats(&self) -> CacheStats {
        self.stats_at(Utc::now())
    }

    pub fn stats_at(&self, now: DateTime<Utc>) -> CacheStats {
        let state = self.lock();
        let now = now.timestamp_millis();
        let oldest = state.fingerprints.iter().map(|fp| fp.timestamp).min();
        CacheStats {
            count: state.fingerprints.len(),
            oldest_days: oldest.map_or(0, |ts| (age_millis(now, ts) / MILLIS_PER_DAY).max(0)),
            total_analyses: state
                .fingerprints
                .iter()
                .map(|fp| u64::from(fp.analysis_count))
                .sum(),
        }
    }

    /// Snapshot of the stored fingerprints.
    pub fn entries(&self) -> Vec<FaceFingerprint> {
        self.lock().fingerprints.clone()
    }

    pub fn len(&self) -> usize {
        self.lock().fingerprints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry and the persisted blob.
    pub fn clear(&self) -> Result<(), CacheError> {
        let mut state = self.lock();
        self.store.remove()?;
        *state = FaceCache::default();
        tracing::info!("face cache cleared");
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, FaceCache> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn best_match(&self, state: &FaceCache, metrics: &Metrics) -> Option<(usize, f64)> {
        let mut best: Option<(usize, f64)> = None;
        for (i, fp) in state.fingerprints.iter().enumerate() {
            let similarity = fingerprint::similarity(metrics, &fp.metrics);
            let is_better = best.map_or(true, |(_, s)| similarity > s);
            if similarity >= self.config.similarity_threshold && is_better {
                best = Some((i, similarity));
            }
        }
        best
    }

    fn persist(&self, state: &FaceCache) -> Result<(), CacheError> {
        let json = serde_json::to_vec(state)?;
        let sealed = self.cipher.seal(&json)?;
        self.store.write(&sealed)
    }
}

impl std::fmt::Debug for FingerprintCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FingerprintCache")
            .field("config", &self.config)
            .field("entries", &self.len())
            .finish()
    }
}

/// Decrypt and parse; fall back to the legacy plaintext format, then to empty.
fn decode(cipher: &CacheCipher, blob: &[u8]) -> FaceCache {
    if let Some(plain) = cipher.open(blob) {
        match serde_json::from_slice::<FaceCache>(&plain) {
            Ok(cache) => return cache,
            Err(e) => tracing::warn!(error = %e, "decrypted face cache is malformed"),
        }
    }

    match serde_json::from_slice::<FaceCache>(blob) {
        Ok(mut cache) => {
            tracing::info!(
                from = %cache.version,
                to = FORMAT_VERSION,
                entries = cache.fingerprints.len(),
                "migrating unencrypted face cache"
            );
            cache.version = FORMAT_VERSION.to_string();
            cache
        }
        Err(_) => {
            tracing::warn!("face cache could not be decrypted or parsed; starting empty");
            FaceCache::default()
        }
    }
}

/// Persisted timestamps are untrusted: saturate rather than overflow.
fn age_millis(now: i64, timestamp: i64) -> i64 {
    now.saturating_sub(timestamp)
}

/// Drop expired entries, then keep the best-ranked `capacity` entries.
fn evict(state: &mut FaceCache, config: &CacheConfig, now: i64) {
    let expiry = config.expiry_millis();

    let before = state.fingerprints.len();
    state.fingerprints.retain(|fp| age_millis(now, fp.timestamp) < expiry);
    let expired = before - state.fingerprints.len();
    if expired > 0 {
        tracing::info!(expired, "expired face fingerprints removed");
    }

    if state.fingerprints.len() > config.capacity {
        let rank = |fp: &FaceFingerprint| {
            let age = age_millis(now, fp.timestamp);
            let recency = (1.0 - age as f64 / expiry as f64).clamp(0.0, 1.0);
            f64::from(fp.analysis_count) * USAGE_WEIGHT + recency * RECENCY_WEIGHT
        };
        state
            .fingerprints
            .sort_by(|a, b| rank(b).total_cmp(&rank(a)));
        let dropped = state.fingerprints.len() - config.capacity;
        state.fingerprints.truncate(config.capacity);
        tracing::info!(dropped, capacity = config.capacity, "face cache trimmed to capacity");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::tests::metrics;
    use crate::store::{FileStore, MemoryStore};
    use chrono::Duration;
    use std::sync::Arc;

    fn cache_with(config: CacheConfig) -> (FingerprintCache, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let cache = FingerprintCache::open(config, CacheCipher::from_passphrase("k"), store.clone());
        (cache, store)
    }

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp(1_767_225_600, 0).unwrap()
    }

    #[test]
    fn test_find_similar_empty() {
        let (cache, _) = cache_with(CacheConfig::default());
        assert!(cache.find_similar(&metrics(0.0)).is_none());
    }

    #[test]
    fn test_save_twice_similar_updates_in_place() {
        let (cache, _) = cache_with(CacheConfig::default());
        cache.save_at(&metrics(0.0), "SQUARE", None, t0()).unwrap();
        let second = cache
            .save_at(&metrics(0.05), "OVAL", None, t0() + Duration::hours(1))
            .unwrap();

        let entries = cache.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].analysis_count, 2);
        assert_eq!(entries[0].metrics, metrics(0.05));
        assert_eq!(entries[0].timestamp, (t0() + Duration::hours(1)).timestamp_millis());
        assert_eq!(second.face_shape, "SQUARE");
        assert!(second.is_repeat_visit());
    }

    #[test]
    fn test_dissimilar_faces_get_separate_entries() {
        let (cache, _) = cache_with(CacheConfig::default());
        cache.save_at(&metrics(0.0), "OVAL", None, t0()).unwrap();
        let r = cache.save_at(&metrics(0.25), "ROUND", None, t0()).unwrap();
        assert_eq!(cache.len(), 2);
        assert_eq!(r.face_shape, "ROUND");
        assert!(!r.is_repeat_visit());
    }

    #[test]
    fn test_find_similar_picks_best_match() {
        let (cache, _) = cache_with(CacheConfig { similarity_threshold: 70.0, ..Default::default() });
        cache.save_at(&metrics(0.0), "OVAL", None, t0()).unwrap();
        cache.save_at(&metrics(0.4), "ROUND", None, t0()).unwrap();
        let found = cache.find_similar(&metrics(0.3)).unwrap();
        assert_eq!(found.face_shape, "ROUND");
    }

    #[test]
    fn test_threshold_gates_matches() {
        let (cache, _) = cache_with(CacheConfig { similarity_threshold: 75.0, ..Default::default() });
        cache.save_at(&metrics(0.0), "OVAL", None, t0()).unwrap();
        assert!(cache.find_similar(&metrics(0.2)).is_some());
        assert!(cache.find_similar(&metrics(0.3)).is_none());
    }

    #[test]
    fn test_capacity_evicts_lowest_rank() {
        let config = CacheConfig { capacity: 3, ..Default::default() };
        let (cache, _) = cache_with(config);
        for i in 0..4 {
            let level = f64::from(i) * 0.25;
            cache
                .save_at(&metrics(level), &format!("S{i}"), None, t0() + Duration::hours(i64::from(i)))
                .unwrap();
        }
        let shapes: Vec<String> = cache.entries().into_iter().map(|fp| fp.face_shape).collect();
        assert_eq!(shapes.len(), 3);
        assert!(!shapes.contains(&"S0".to_string()), "oldest entry should go: {shapes:?}");
    }

    #[test]
    fn test_usage_outweighs_recency() {
        let config = CacheConfig { capacity: 3, ..Default::default() };
        let (cache, _) = cache_with(config);
        cache.save_at(&metrics(0.0), "FREQUENT", None, t0()).unwrap();
        cache.save_at(&metrics(0.01), "FREQUENT", None, t0()).unwrap();
        for i in 1..4 {
            let level = f64::from(i) * 0.25;
            cache
                .save_at(&metrics(level), &format!("S{i}"), None, t0() + Duration::days(i64::from(i)))
                .unwrap();
        }
        let shapes: Vec<String> = cache.entries().into_iter().map(|fp| fp.face_shape).collect();
        assert_eq!(shapes.len(), 3);
        assert!(shapes.contains(&"FREQUENT".to_string()));
        assert!(!shapes.contains(&"S1".to_string()));
    }

    #[test]
    fn test_expired_entries_removed_on_save() {
        let (cache, _) = cache_with(CacheConfig::default());
        cache.save_at(&metrics(0.0), "OLD", None, t0()).unwrap();
        cache
            .save_at(&metrics(0.5), "NEW", None, t0() + Duration::days(731))
            .unwrap();
        let entries = cache.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].face_shape, "NEW");
    }

    #[test]
    fn test_persist_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("faces.cache");
        {
            let cache = FingerprintCache::open(
                CacheConfig::default(),
                CacheCipher::from_passphrase("key"),
                FileStore::new(&path),
            );
            cache.save(&metrics(0.0), "HEART").unwrap();
        }

        let raw = std::fs::read(&path).unwrap();
        assert!(serde_json::from_slice::<FaceCache>(&raw).is_err(), "blob must not be plaintext");

        let reopened = FingerprintCache::open(
            CacheConfig::default(),
            CacheCipher::from_passphrase("key"),
            FileStore::new(&path),
        );
        assert_eq!(reopened.len(), 1);
        assert_eq!(reopened.entries()[0].face_shape, "HEART");
    }

    #[test]
    fn test_wrong_key_degrades_to_empty() {
        let store = Arc::new(MemoryStore::new());
        let cache = FingerprintCache::open(CacheConfig::default(), CacheCipher::from_passphrase("a"), store.clone());
        cache.save(&metrics(0.0), "OVAL").unwrap();

        let other = FingerprintCache::open(CacheConfig::default(), CacheCipher::from_passphrase("b"), store);
        assert!(other.is_empty());
    }

    #[test]
    fn test_corrupt_blob_degrades_to_empty() {
        let cache = FingerprintCache::open(
            CacheConfig::default(),
            CacheCipher::from_passphrase("k"),
            MemoryStore::with_blob(b"\x00\x01garbage that is neither sealed nor json".to_vec()),
        );
        assert!(cache.is_empty());
    }

    #[test]
    fn test_legacy_plaintext_is_migrated() {
        let legacy = FaceCache {
            version: "1.0".into(),
            fingerprints: vec![FaceFingerprint {
                id: "legacy".into(),
                metrics: metrics(0.0),
                face_shape: "DIAMOND".into(),
                timestamp: t0().timestamp_millis(),
                analysis_count: 3,
                last_analysis: None,
            }],
        };
        let store = Arc::new(MemoryStore::with_blob(serde_json::to_vec(&legacy).unwrap()));
        let cache = FingerprintCache::open(CacheConfig::default(), CacheCipher::from_passphrase("k"), store.clone());
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.find_similar(&metrics(0.0)).unwrap().face_shape, "DIAMOND");

        // The next save rewrites it sealed.
        cache.save_at(&metrics(0.0), "OVAL", None, t0()).unwrap();
        let blob = store.read().unwrap().unwrap();
        assert!(serde_json::from_slice::<FaceCache>(&blob).is_err());
        let plain = CacheCipher::from_passphrase("k").open(&blob).unwrap();
        let migrated: FaceCache = serde_json::from_slice(&plain).unwrap();
        assert_eq!(migrated.version, FORMAT_VERSION);
        assert_eq!(migrated.fingerprints[0].analysis_count, 4);
    }

    #[test]
    fn test_out_of_range_timestamps_do_not_overflow() {
        let entry = |level: f64, timestamp: i64| FaceFingerprint {
            id: format!("ts{timestamp}"),
            metrics: metrics(level),
            face_shape: "OVAL".into(),
            timestamp,
            analysis_count: 1,
            last_analysis: None,
        };
        let legacy = FaceCache {
            version: "1.0".into(),
            fingerprints: vec![entry(0.5, i64::MIN), entry(0.75, i64::MAX)],
        };
        let store = MemoryStore::with_blob(serde_json::to_vec(&legacy).unwrap());
        let cache = FingerprintCache::open(CacheConfig::default(), CacheCipher::from_passphrase("k"), store);

        let stats = cache.stats_at(t0());
        assert_eq!(stats.count, 2);
        assert!(stats.oldest_days > 0);

        cache.save_at(&metrics(0.0), "ROUND", None, t0()).unwrap();
        let ids: Vec<String> = cache.entries().into_iter().map(|fp| fp.id).collect();
        assert_eq!(ids.len(), 2);
        assert!(!ids.contains(&format!("ts{}", i64::MIN)), "ancient entry expires: {ids:?}");
    }

    /// Store whose writes can be made to fail.
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryStore,
        failing: std::sync::atomic::AtomicBool,
    }

    impl FlakyStore {
        fn set_failing(&self, failing: bool) {
            self.failing.store(failing, std::sync::atomic::Ordering::SeqCst);
        }
    }

    impl BlobStore for FlakyStore {
        fn read(&self) -> Result<Option<Vec<u8>>, CacheError> {
            self.inner.read()
        }

        fn write(&self, blob: &[u8]) -> Result<(), CacheError> {
            if self.failing.load(std::sync::atomic::Ordering::SeqCst) {
                return Err(std::io::Error::other("disk full").into());
            }
            self.inner.write(blob)
        }

        fn remove(&self) -> Result<(), CacheError> {
            if self.failing.load(std::sync::atomic::Ordering::SeqCst) {
                return Err(std::io::Error::other("read-only").into());
            }
            self.inner.remove()
        }
    }

    #[test]
    fn test_failed_write_leaves_memory_unchanged() {
        let store = Arc::new(FlakyStore::default());
        let cache = FingerprintCache::open(CacheConfig::default(), CacheCipher::from_passphrase("k"), store.clone());
        cache.save_at(&metrics(0.0), "OVAL", None, t0()).unwrap();

        store.set_failing(true);
        assert!(cache.save_at(&metrics(0.5), "ROUND", None, t0()).is_err());
        assert!(cache.save_at(&metrics(0.0), "OVAL", None, t0()).is_err());
        assert!(cache.clear().is_err());
        let entries = cache.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].analysis_count, 1);

        store.set_failing(false);
        let r = cache.save_at(&metrics(0.0), "OVAL", None, t0()).unwrap();
        assert_eq!(r.analysis_count, 2);
    }

    #[test]
    fn test_cached_analysis_skips_local_providers() {
        let (cache, _) = cache_with(CacheConfig::default());
        let local = CachedAnalysis { provider: "LOCAL".into(), beauty_score: Some(7.5), notes: vec![] };
        cache.save_with_analysis(&metrics(0.0), "OVAL", local).unwrap();
        assert!(cache.cached_analysis(&metrics(0.0)).is_none());

        let remote = CachedAnalysis {
            provider: "VISION".into(),
            beauty_score: Some(8.7),
            notes: vec!["strong jaw".into()],
        };
        cache.save_with_analysis(&metrics(0.01), "OVAL", remote.clone()).unwrap();
        assert_eq!(cache.cached_analysis(&metrics(0.0)), Some(remote.clone()));

        // A later local analysis does not overwrite the remembered one.
        let local = CachedAnalysis { provider: "LOCAL_FALLBACK".into(), beauty_score: None, notes: vec![] };
        cache.save_with_analysis(&metrics(0.0), "OVAL", local).unwrap();
        assert_eq!(cache.cached_analysis(&metrics(0.0)), Some(remote));
    }

    #[test]
    fn test_stats_and_clear() {
        let (cache, store) = cache_with(CacheConfig::default());
        assert_eq!(cache.stats_at(t0()), CacheStats { count: 0, oldest_days: 0, total_analyses: 0 });

        cache.save_at(&metrics(0.0), "OVAL", None, t0()).unwrap();
        cache.save_at(&metrics(0.0), "OVAL", None, t0() + Duration::days(1)).unwrap();
        cache.save_at(&metrics(0.5), "ROUND", None, t0() + Duration::days(2)).unwrap();

        let stats = cache.stats_at(t0() + Duration::days(10));
        assert_eq!(stats.count, 2);
        assert_eq!(stats.oldest_days, 9);
        assert_eq!(stats.total_analyses, 3);

        cache.clear().unwrap();
        assert!(cache.is_empty());
        assert!(store.read().unwrap().is_none());
    }

    #[test]
    fn test_concurrent_resolve_inserts_once() {
        let (cache, _) = cache_with(CacheConfig::default());
        let cache = Arc::new(cache);
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    cache.resolve(&metrics(f64::from(i) * 0.001), "OVAL").unwrap()
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let entries = cache.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].analysis_count, 8);
    }
}
