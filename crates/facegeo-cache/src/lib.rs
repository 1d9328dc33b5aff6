//! facegeo-cache — Encrypted fingerprint cache.
//!
//! Remembers recently analyzed faces by their proportions so that a repeat
//! visit gets the same face-shape label. Entries are bounded, expire, and
//! are sealed with AES-256-GCM at rest.

pub mod cache;
pub mod config;
pub mod crypto;
pub mod fingerprint;
pub mod store;

use thiserror::Error;

pub use cache::{CacheStats, FingerprintCache, Resolution};
pub use config::CacheConfig;
pub use crypto::CacheCipher;
pub use fingerprint::{CachedAnalysis, FaceFingerprint, FeatureVector};
pub use store::{BlobStore, FileStore, MemoryStore};

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("cache storage error: {0}")]
    Io(#[from] std::io::Error),
    #[error("cache serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("cache encryption failed")]
    Encrypt,
}
