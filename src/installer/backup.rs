use crate::core::NmkupError;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

/// The previous install tree kept beside the live one.
///
/// A committed install moves the old tree to `<root>.backup`. The backup is
/// either cleaned up right away or kept for `--rollback`, which swaps it back
/// in place of the current tree.
pub struct BackupManager {
    /// The live install root.
    original_path: PathBuf,
    /// Where the previous tree is kept.
    backup_path: PathBuf,
}

impl BackupManager {
    /// Backup manager for the install tree at `install_root`.
    pub fn new(install_root: PathBuf) -> Self {
        let backup_path = sibling(&install_root, "backup");
        Self {
            original_path: install_root,
            backup_path,
        }
    }

    /// Swap the backup in place of the current tree.
    ///
    /// The current tree is discarded. If the swap fails halfway, the current
    /// tree is put back.
    pub async fn restore_backup(&self) -> Result<()> {
        if !self.backup_exists() {
            return Err(NmkupError::NoBackup {
                path: self.backup_path.display().to_string(),
            }
            .into());
        }

        warn!("Restoring from backup at {}", self.backup_path.display());

        let discard = sibling(&self.original_path, "discard");
        if fs::symlink_metadata(&discard).await.is_ok() {
            fs::remove_dir_all(&discard).await.context("Failed to remove stale discard tree")?;
        }

        let had_current = fs::symlink_metadata(&self.original_path).await.is_ok();
        if had_current {
            fs::rename(&self.original_path, &discard)
                .await
                .context("Failed to move current tree aside")?;
        }

        if let Err(e) = fs::rename(&self.backup_path, &self.original_path).await {
            if had_current {
                fs::rename(&discard, &self.original_path)
                    .await
                    .context("Failed to put current tree back after a failed restore")?;
            }
            return Err(e).context("Failed to restore backup");
        }

        if had_current {
            fs::remove_dir_all(&discard).await.context("Failed to remove replaced tree")?;
        }

        info!("Successfully restored from backup");
        Ok(())
    }

    /// Remove the backup if present.
    pub async fn cleanup_backup(&self) -> Result<()> {
        if self.backup_exists() {
            debug!("Cleaning up backup at {}", self.backup_path.display());
            fs::remove_dir_all(&self.backup_path).await.context("Failed to remove backup")?;
        }
        Ok(())
    }

    pub fn backup_exists(&self) -> bool {
        self.backup_path.is_dir()
    }

    pub fn backup_path(&self) -> &Path {
        &self.backup_path
    }
}

/// `<path>.<suffix>` in the same directory.
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}
