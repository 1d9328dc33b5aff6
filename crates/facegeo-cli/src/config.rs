use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use facegeo_cache::CacheConfig;
use serde::Deserialize;

/// Passphrase used when none is configured. Keeps casual readers out of
/// the cache file; set `FACEGEO_CACHE_KEY` for anything more.
const DEFAULT_CACHE_KEY: &str = "facegeo-local-cache";

/// CLI configuration: optional TOML file, then `FACEGEO_*` overrides.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Location of the sealed fingerprint cache.
    pub cache_path: PathBuf,
    /// Passphrase the cache key is derived from.
    pub cache_key: String,
    pub cache: CacheConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_path: default_data_dir().join("faces.cache"),
            cache_key: DEFAULT_CACHE_KEY.to_string(),
            cache: CacheConfig::default(),
        }
    }
}

impl Config {
    /// Load from `path` if given, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("reading config {}", path.display()))?;
                Self::from_toml(&text)
                    .with_context(|| format!("parsing config {}", path.display()))?
            }
            None => Self::default(),
        };
        Ok(config.with_env_overrides())
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn with_env_overrides(self) -> Self {
        let cache = CacheConfig {
            capacity: env_usize("FACEGEO_CACHE_CAPACITY", self.cache.capacity),
            expiry_days: env_u32("FACEGEO_CACHE_EXPIRY_DAYS", self.cache.expiry_days),
            similarity_threshold: env_f64(
                "FACEGEO_SIMILARITY_THRESHOLD",
                self.cache.similarity_threshold,
            ),
        };
        Self {
            cache_path: std::env::var("FACEGEO_CACHE_PATH")
                .map(PathBuf::from)
                .unwrap_or(self.cache_path),
            cache_key: std::env::var("FACEGEO_CACHE_KEY").unwrap_or(self.cache_key),
            cache: cache.validated(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("facegeo")
}

fn env_f64(key: &str, default: f64) -> f64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
