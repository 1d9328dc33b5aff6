use serde::Deserialize;

pub const DEFAULT_CAPACITY: usize = 10;
pub const DEFAULT_EXPIRY_DAYS: u32 = 730;
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 85.0;

/// Limits of the fingerprint cache.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CacheConfig {
    /// Maximum number of stored fingerprints.
    pub capacity: usize,
    /// Maximum entry age in days.
    #[serde(alias = "expiry_days")]
    pub expiry_days: u32,
    /// Minimum similarity (percent) for two faces to count as the same person.
    #[serde(alias = "similarity_threshold")]
    pub similarity_threshold: f64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            expiry_days: DEFAULT_EXPIRY_DAYS,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
        }
    }
}

impl CacheConfig {
    /// Clamp out-of-range values: capacity and expiry at least 1, threshold in [0, 100].
    pub fn validated(self) -> Self {
        let threshold = if self.similarity_threshold.is_finite() {
            self.similarity_threshold.clamp(0.0, 100.0)
        } else {
            DEFAULT_SIMILARITY_THRESHOLD
        };
        Self {
            capacity: self.capacity.max(1),
            expiry_days: self.expiry_days.max(1),
            similarity_threshold: threshold,
        }
    }

    pub fn expiry_millis(&self) -> i64 {
        i64::from(self.expiry_days) * 24 * 60 * 60 * 1000
    }
}
