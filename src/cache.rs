//! Persisted record of the last installed release, per source.
//!
//! Each source owns one JSON file (`<cache_dir>/github.json`,
//! `<cache_dir>/gcs.json`) holding the [`ReleaseDescriptor`] that was last
//! installed from it. The record is written only after a fully successful
//! install and is compared against freshly fetched metadata on the next run.
//!
//! An unreadable or malformed record is never fatal: it is logged and treated
//! as absent, which makes the next comparison stale and triggers a reinstall.

use crate::core::NmkupError;
use crate::release::{ReleaseDescriptor, ReleaseSource, SourceKind};
use crate::utils::fs::atomic_write;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Freshness record stored at a fixed path.
#[derive(Debug, Clone)]
pub struct FreshnessCache {
    path: PathBuf,
}

impl FreshnessCache {
    /// Cache backed by the file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
        }
    }

    /// Cache for `kind` under `cache_dir`.
    pub fn for_source(cache_dir: &Path, kind: SourceKind) -> Self {
        Self::new(Self::path_for(cache_dir, kind))
    }

    /// File holding the record of `kind` under `cache_dir`.
    pub fn path_for(cache_dir: &Path, kind: SourceKind) -> PathBuf {
        cache_dir.join(format!("{}.json", kind.as_str()))
    }

    /// Location of the record.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a record file is present.
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Read the record, or `None` when it is missing or unusable.
    pub async fn load(&self) -> Option<ReleaseDescriptor> {
        match self.try_load().await {
            Ok(record) => record,
            Err(e) => {
                warn!("{e}; treating cache as absent");
                None
            }
        }
    }

    async fn try_load(&self) -> std::result::Result<Option<ReleaseDescriptor>, NmkupError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No cache record at {}", self.path.display());
                return Ok(None);
            }
            Err(e) => {
                return Err(NmkupError::CacheRead {
                    path: self.path.display().to_string(),
                    reason: e.to_string(),
                });
            }
        };

        serde_json::from_str(&content).map(Some).map_err(|e| NmkupError::CacheRead {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        })
    }

    /// Persist `descriptor` verbatim, replacing any previous record.
    pub async fn save(&self, descriptor: &ReleaseDescriptor) -> Result<()> {
        let json = serde_json::to_vec_pretty(descriptor)
            .context("Failed to serialize release descriptor")?;

        let path = self.path.clone();
        tokio::task::spawn_blocking(move || atomic_write(&path, &json))
            .await
            .context("Cache write task panicked")??;

        debug!("Saved cache record {} ({})", self.path.display(), descriptor.label());
        Ok(())
    }

    /// Remove the record. Returns whether one existed.
    pub async fn clear(&self) -> Result<bool> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                debug!("Cleared cache record {}", self.path.display());
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e)
                .with_context(|| format!("Failed to remove cache record {}", self.path.display())),
        }
    }

    /// Whether `fetched` matches the stored record under `source`'s policy.
    ///
    /// A missing record is always stale.
    pub async fn is_up_to_date<S: ReleaseSource>(
        &self,
        source: &S,
        fetched: &ReleaseDescriptor,
    ) -> bool {
        match self.load().await {
            Some(cached) => source.is_fresh(fetched, &cached),
            None => false,
        }
    }
}
