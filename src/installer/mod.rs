//! Bundle installation.
//!
//! [`Installer::install`] turns a bundle URL into a replaced install tree:
//!
//! 1. Stream the bundle into a temporary file ([`download`]).
//! 2. Verify its MD5 when the source published one ([`verification`]).
//! 3. Copy the live tree into a staging directory ([`staging`]).
//! 4. Apply the previous uninstall manifest to the copy ([`manifest`]).
//! 5. Extract the bundle over the copy, stripping one component ([`archive`]).
//! 6. Swap the copy in, keeping the previous tree as a backup ([`backup`]).
//!
//! Steps 1-5 never touch the live tree. A failure in 3-5 is reported as
//! [`NmkupError::StaleInstall`] and the staging directory is discarded.

pub mod archive;
pub mod backup;
pub mod download;
pub mod manifest;
pub mod staging;
pub mod verification;

use crate::config::UpdaterConfig;
use crate::core::NmkupError;
use crate::utils::fs::is_missing_or_empty;
use anyhow::{Context, Result};
use backup::BackupManager;
use manifest::{UninstallManifest, remove_python_bytecode};
use reqwest::Client;
use staging::StagedTree;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use verification::ChecksumVerifier;

/// Leading path components dropped from every bundle entry.
pub const STRIP_COMPONENTS: usize = 1;

/// Owns the install tree for the duration of one run.
pub struct Installer {
    client: Client,
    install_root: PathBuf,
    download_dir: PathBuf,
    manifest_name: String,
    keep_archive: bool,
    keep_backup: bool,
    show_progress: bool,
}

impl Installer {
    pub fn new(client: Client, install_root: PathBuf, download_dir: PathBuf) -> Self {
        Self {
            client,
            install_root,
            download_dir,
            manifest_name: crate::config::DEFAULT_MANIFEST_NAME.to_string(),
            keep_archive: false,
            keep_backup: false,
            show_progress: true,
        }
    }

    /// Installer configured from `config`.
    pub fn from_config(client: Client, config: &UpdaterConfig) -> Result<Self> {
        Ok(Self::new(client, config.install_root()?, config.cache_dir()?)
            .manifest_name(&config.manifest_name)
            .keep_archive(config.keep_archive)
            .keep_backup(config.keep_backup))
    }

    pub fn manifest_name(mut self, name: &str) -> Self {
        self.manifest_name = name.to_string();
        self
    }

    /// Keep the downloaded bundle at `<download_dir>/<bundle name>`.
    pub fn keep_archive(mut self, keep: bool) -> Self {
        self.keep_archive = keep;
        self
    }

    /// Keep the replaced tree for a later rollback.
    pub fn keep_backup(mut self, keep: bool) -> Self {
        self.keep_backup = keep;
        self
    }

    pub fn show_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn install_root(&self) -> &Path {
        &self.install_root
    }

    /// Backups of the tree at [`tree_root`](Self::tree_root).
    pub fn backups(&self) -> Result<BackupManager> {
        Ok(BackupManager::new(self.tree_root()?))
    }

    /// The directory holding the tree.
    ///
    /// A symlinked install root is followed, so the tree is replaced where it
    /// actually lives and the link itself is left alone.
    pub fn tree_root(&self) -> Result<PathBuf> {
        match std::fs::symlink_metadata(&self.install_root) {
            Ok(meta) if meta.file_type().is_symlink() => {
                let resolved = std::fs::canonicalize(&self.install_root).with_context(|| {
                    format!("Install root {} is a dangling link", self.install_root.display())
                })?;
                debug!("{} links to {}", self.install_root.display(), resolved.display());
                Ok(resolved)
            }
            _ => Ok(self.install_root.clone()),
        }
    }

    /// Whether a previous install left its uninstall manifest.
    pub fn has_manifest(&self) -> bool {
        self.install_root.join(&self.manifest_name).is_file()
    }

    /// Refuse to replace a tree that is a git checkout.
    pub fn check_not_git_managed(&self) -> Result<()> {
        let git_dir = self.install_root.join(".git");
        if git_dir.exists() {
            return Err(NmkupError::ManagedByGit {
                path: self.install_root.display().to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Refuse to replace a non-empty directory nmkup has no record of.
    ///
    /// `known_install` is whether any freshness record exists; an uninstall
    /// manifest in the root also counts. `force` skips the check.
    pub fn check_safe_root(&self, known_install: bool, force: bool) -> Result<()> {
        if force || known_install || self.has_manifest() {
            return Ok(());
        }
        if !is_missing_or_empty(&self.install_root)? {
            return Err(NmkupError::UnsafeInstallRoot {
                path: self.install_root.display().to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Download the bundle at `url` and install it.
    ///
    /// `bundle_name` names the kept archive; `expected_md5` is the published
    /// base64 MD5 of the bundle, when the source has one.
    pub async fn install(
        &self,
        url: &str,
        bundle_name: &str,
        expected_md5: Option<&str>,
    ) -> Result<()> {
        let archive =
            download::download_to_temp(&self.client, url, &self.download_dir, self.show_progress)
                .await?;

        if let Some(expected) = expected_md5 {
            ChecksumVerifier::verify(archive.path(), expected).await?;
        }

        let root = self.tree_root()?;
        let backups = BackupManager::new(root.clone());
        let archive_path = archive.path().to_path_buf();
        let manifest_name = self.manifest_name.clone();
        let staged = tokio::task::spawn_blocking(move || {
            stage(&root, &archive_path, &manifest_name)
        })
        .await
        .context("Install task panicked")??;

        let (committed, backups) = tokio::task::spawn_blocking(move || {
            let committed = staged.commit(&backups);
            (committed, backups)
        })
        .await
        .context("Install task panicked")?;
        let backup = committed.map_err(|e| stale("commit", &e))?;
        info!("Installed to {}", self.install_root.display());

        if let Some(path) = backup {
            if self.keep_backup {
                info!("Previous install kept at {}", path.display());
            } else {
                backups.cleanup_backup().await?;
            }
        }

        if self.keep_archive {
            let kept = self.download_dir.join(bundle_name);
            archive
                .persist(&kept)
                .with_context(|| format!("Failed to keep archive at {}", kept.display()))?;
            info!("Kept archive at {}", kept.display());
        }

        Ok(())
    }

    /// Put the previous tree back.
    pub async fn rollback(&self) -> Result<()> {
        self.backups()?.restore_backup().await
    }
}

/// Build the replacement tree in a staging directory.
fn stage(root: &Path, archive: &Path, manifest_name: &str) -> Result<StagedTree> {
    let staged = StagedTree::prepare(root).map_err(|e| stale("staging", &e))?;

    match UninstallManifest::load(staged.path(), manifest_name).map_err(|e| stale("uninstall", &e))? {
        Some(manifest) => {
            let report = manifest.apply(staged.path()).map_err(|e| stale("uninstall", &e))?;
            info!("Removed {} files of the previous install", report.removed);
        }
        None => debug!("No uninstall manifest, nothing to remove"),
    }
    remove_python_bytecode(staged.path()).map_err(|e| stale("uninstall", &e))?;

    let written = archive::extract(archive, staged.path(), STRIP_COMPONENTS)
        .map_err(|e| stale("extract", &e))?;
    debug!("Extracted {written} entries");

    Ok(staged)
}

fn stale(operation: &str, err: &anyhow::Error) -> anyhow::Error {
    NmkupError::StaleInstall {
        operation: operation.to_string(),
        reason: format!("{err:#}"),
    }
    .into()
}
