//! On-disk slots for raw stream responses (images).
//!
//! # Design Decisions
//! - One file per cache key, named by the key, in a dedicated directory
//! - Writes land in a uniquely named temporary file and are renamed into
//!   place, so readers see either the old or the new file, never a torn one
//! - Every file operation is bounded by a deadline

use axum::body::Bytes;
use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::fs;
use tokio::time;
use uuid::Uuid;

use crate::cache::key::CacheKey;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache I/O timed out after {0:?}")]
    Timeout(Duration),
}

/// Directory of cached byte streams.
#[derive(Debug, Clone)]
pub struct DiskCache {
    dir: PathBuf,
    io_timeout: Duration,
}

impl DiskCache {
    pub fn new(dir: impl Into<PathBuf>, io_timeout: Duration) -> Self {
        Self {
            dir: dir.into(),
            io_timeout,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(key.as_str())
    }

    /// Replace the slot for `key` with `bytes`.
    pub async fn put(&self, key: &CacheKey, bytes: &[u8]) -> Result<(), CacheError> {
        let target = self.path_for(key);
        let tmp = self.dir.join(format!(".{}.{}.tmp", key, Uuid::new_v4()));

        self.bounded(async {
            fs::create_dir_all(&self.dir).await?;
            fs::write(&tmp, bytes).await?;
            if let Err(e) = fs::rename(&tmp, &target).await {
                let _ = fs::remove_file(&tmp).await;
                return Err(e);
            }
            Ok::<(), std::io::Error>(())
        })
        .await?;

        tracing::debug!(path = %target.display(), bytes = bytes.len(), "Cached stream response");
        Ok(())
    }

    /// Read the slot for `key`; `None` if it was never written.
    pub async fn get(&self, key: &CacheKey) -> Result<Option<Bytes>, CacheError> {
        let path = self.path_for(key);
        match self.bounded(fs::read(&path)).await {
            Ok(bytes) => Ok(Some(Bytes::from(bytes))),
            Err(CacheError::Io(e)) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn bounded<T>(
        &self,
        op: impl Future<Output = std::io::Result<T>>,
    ) -> Result<T, CacheError> {
        match time::timeout(self.io_timeout, op).await {
            Ok(result) => result.map_err(CacheError::from),
            Err(_) => Err(CacheError::Timeout(self.io_timeout)),
        }
    }
}
