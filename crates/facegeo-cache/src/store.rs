//! Where the sealed cache blob lives.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::CacheError;

/// Byte-level persistence for a single blob.
pub trait BlobStore: Send + Sync {
    /// `Ok(None)` when nothing has been stored yet.
    fn read(&self) -> Result<Option<Vec<u8>>, CacheError>;
    fn write(&self, blob: &[u8]) -> Result<(), CacheError>;
    fn remove(&self) -> Result<(), CacheError>;
}

/// Blob kept in a file, replaced atomically on write.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl BlobStore for FileStore {
    fn read(&self) -> Result<Option<Vec<u8>>, CacheError> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, blob: &[u8]) -> Result<(), CacheError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, blob)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn remove(&self) -> Result<(), CacheError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-process blob, for embedding and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    blob: Mutex<Option<Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_blob(blob: Vec<u8>) -> Self {
        Self { blob: Mutex::new(Some(blob)) }
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<Vec<u8>>> {
        self.blob.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl BlobStore for MemoryStore {
    fn read(&self) -> Result<Option<Vec<u8>>, CacheError> {
        Ok(self.slot().clone())
    }

    fn write(&self, blob: &[u8]) -> Result<(), CacheError> {
        *self.slot() = Some(blob.to_vec());
        Ok(())
    }

    fn remove(&self) -> Result<(), CacheError> {
        *self.slot() = None;
        Ok(())
    }
}

impl<S: BlobStore + ?Sized> BlobStore for std::sync::Arc<S> {
    fn read(&self) -> Result<Option<Vec<u8>>, CacheError> {
        (**self).read()
    }

    fn write(&self, blob: &[u8]) -> Result<(), CacheError> {
        (**self).write(blob)
    }

    fn remove(&self) -> Result<(), CacheError> {
        (**self).remove()
    }
}
