//! Stage-and-rename replacement of the install tree.
//!
//! The new tree is assembled in a scratch directory beside the live root and
//! only swapped in by two renames once it is complete:
//!
//! ```text
//! <root>          ──rename──► <root>.backup
//! <staging dir>   ──rename──► <root>
//! ```
//!
//! Until [`StagedTree::commit`] the live tree is never modified, and dropping
//! an uncommitted [`StagedTree`] removes the scratch directory.

use crate::installer::backup::BackupManager;
use crate::utils::fs::ensure_dir;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// A copy of the install tree being prepared for replacement.
pub struct StagedTree {
    root: PathBuf,
    staging: TempDir,
}

impl StagedTree {
    /// Create a staging directory beside `root` seeded with a copy of it.
    ///
    /// A missing `root` yields an empty staging directory.
    pub fn prepare(root: &Path) -> Result<Self> {
        let parent = root
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .with_context(|| format!("Install root has no parent: {}", root.display()))?;
        ensure_dir(parent)?;

        let staging = tempfile::Builder::new()
            .prefix(".nmkup-staging-")
            .tempdir_in(parent)
            .with_context(|| format!("Failed to create staging directory in {}", parent.display()))?;

        if root.exists() {
            copy_tree(root, staging.path())?;
            copy_permissions(root, staging.path())?;
        } else {
            set_default_permissions(staging.path())?;
        }

        debug!("Staged {} at {}", root.display(), staging.path().display());
        Ok(Self {
            root: root.to_path_buf(),
            staging,
        })
    }

    /// The directory to modify.
    pub fn path(&self) -> &Path {
        self.staging.path()
    }

    /// Swap the staged tree in as the live root.
    ///
    /// The previous tree is left at the backup path, replacing any older
    /// backup. Returns that path, or `None` when there was no previous tree.
    pub fn commit(self, backups: &BackupManager) -> Result<Option<PathBuf>> {
        let backup_path = backups.backup_path().to_path_buf();
        let had_root = self.root.exists();

        if had_root {
            if backup_path.exists() {
                fs::remove_dir_all(&backup_path).with_context(|| {
                    format!("Failed to remove old backup {}", backup_path.display())
                })?;
            }
            fs::rename(&self.root, &backup_path).with_context(|| {
                format!("Failed to move {} to {}", self.root.display(), backup_path.display())
            })?;
        }

        if let Err(e) = fs::rename(self.staging.path(), &self.root) {
            if had_root {
                if let Err(restore) = fs::rename(&backup_path, &self.root) {
                    warn!(
                        "Could not restore {} from {}: {}",
                        self.root.display(),
                        backup_path.display(),
                        restore
                    );
                }
            }
            return Err(e).with_context(|| format!("Failed to move new tree to {}", self.root.display()));
        }

        debug!("Committed new tree at {}", self.root.display());
        // The TempDir path no longer exists; dropping it is a no-op.
        drop(self.staging);
        Ok(had_root.then_some(backup_path))
    }
}

/// Copy `src` into the existing directory `dst`, recreating symlinks.
fn copy_tree(src: &Path, dst: &Path) -> Result<()> {
    for entry in WalkDir::new(src).min_depth(1).follow_links(false) {
        let entry = entry.with_context(|| format!("Failed to walk {}", src.display()))?;
        let relative = entry.path().strip_prefix(src)?;
        let target = dst.join(relative);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir_all(&target)
                .with_context(|| format!("Failed to create {}", target.display()))?;
            copy_permissions(entry.path(), &target)?;
        } else if file_type.is_symlink() {
            let link = fs::read_link(entry.path())?;
            symlink(&link, &target)
                .with_context(|| format!("Failed to recreate link {}", target.display()))?;
        } else {
            fs::copy(entry.path(), &target)
                .with_context(|| format!("Failed to copy {}", entry.path().display()))?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn symlink(link: &Path, target: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(link, target)
}

#[cfg(windows)]
fn symlink(link: &Path, target: &Path) -> std::io::Result<()> {
    if target.parent().map(|p| p.join(link)).is_some_and(|p| p.is_dir()) {
        std::os::windows::fs::symlink_dir(link, target)
    } else {
        std::os::windows::fs::symlink_file(link, target)
    }
}

fn copy_permissions(from: &Path, to: &Path) -> Result<()> {
    let permissions = fs::metadata(from)?.permissions();
    fs::set_permissions(to, permissions)
        .with_context(|| format!("Failed to set permissions on {}", to.display()))
}

#[cfg(unix)]
fn set_default_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))
        .with_context(|| format!("Failed to set permissions on {}", path.display()))
}

#[cfg(not(unix))]
fn set_default_permissions(_path: &Path) -> Result<()> {
    Ok(())
}
