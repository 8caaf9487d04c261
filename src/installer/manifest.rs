//! The uninstall manifest.
//!
//! Every bundle ships a list of the paths it installs (by default
//! `.installed-files` at the install root). Before a new bundle is extracted,
//! each listed path is removed, deepest first, so files dropped from the new
//! release do not linger. Compiled Python byproducts are not listed but are
//! swept as well.
//!
//! Entries may be separated by newlines or NUL bytes (`find -print0`).

use anyhow::{Context, Result};
use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Paths recorded by the previous install, sorted deepest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UninstallManifest {
    entries: Vec<PathBuf>,
}

/// What [`UninstallManifest::apply`] did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct UninstallReport {
    pub removed: usize,
    pub missing: usize,
    pub skipped: usize,
}

impl UninstallManifest {
    /// Parse manifest text.
    pub fn parse(content: &str) -> Self {
        let mut entries: Vec<PathBuf> = content
            .split(['\n', '\0'])
            .map(|line| line.trim_end_matches('\r'))
            .map(|line| line.strip_prefix("./").unwrap_or(line))
            .filter(|line| !line.is_empty() && *line != ".")
            .map(PathBuf::from)
            .collect();

        entries.sort_unstable_by(|a, b| b.cmp(a));
        entries.dedup();

        Self {
            entries,
        }
    }

    /// Read `<root>/<name>`. A missing manifest means nothing to remove.
    pub fn load(root: &Path, name: &str) -> Result<Option<Self>> {
        let path = root.join(name);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(Self::parse(&String::from_utf8_lossy(&bytes)))),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No uninstall manifest at {}", path.display());
                Ok(None)
            }
            Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
        }
    }

    pub fn entries(&self) -> &[PathBuf] {
        &self.entries
    }

    /// Remove every listed path below `root`.
    ///
    /// Directories are removed only once empty; a directory that still holds
    /// unlisted files is left in place. Missing entries and entries reaching
    /// outside `root` are reported, not fatal.
    pub fn apply(&self, root: &Path) -> Result<UninstallReport> {
        let mut report = UninstallReport::default();

        for entry in &self.entries {
            if !is_contained(entry) {
                warn!("Skipping manifest entry outside the install root: {}", entry.display());
                report.skipped += 1;
                continue;
            }

            let target = root.join(entry);
            let metadata = match fs::symlink_metadata(&target) {
                Ok(metadata) => metadata,
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    warn!("Listed file is already gone: {}", entry.display());
                    report.missing += 1;
                    continue;
                }
                Err(e) => {
                    return Err(e).with_context(|| format!("Failed to inspect {}", target.display()));
                }
            };

            if metadata.is_dir() {
                match fs::remove_dir(&target) {
                    Ok(()) => report.removed += 1,
                    Err(e) if e.kind() == ErrorKind::DirectoryNotEmpty => {
                        debug!("Keeping non-empty directory {}", entry.display());
                    }
                    Err(e) => {
                        return Err(e)
                            .with_context(|| format!("Failed to remove {}", target.display()));
                    }
                }
            } else {
                fs::remove_file(&target)
                    .with_context(|| format!("Failed to remove {}", target.display()))?;
                report.removed += 1;
            }
        }

        debug!(
            "Uninstalled {} entries ({} missing, {} skipped)",
            report.removed, report.missing, report.skipped
        );
        Ok(report)
    }
}

fn is_contained(path: &Path) -> bool {
    path.components().all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

/// Remove `*.pyc` files and `__pycache__` directories below `root`.
pub fn remove_python_bytecode(root: &Path) -> Result<usize> {
    let mut doomed = Vec::new();

    let mut walker = WalkDir::new(root).min_depth(1).follow_links(false).into_iter();
    while let Some(entry) = walker.next() {
        let entry = entry.context("Failed to walk install tree")?;
        let is_dir = entry.file_type().is_dir();

        if is_dir && entry.file_name() == "__pycache__" {
            doomed.push((entry.into_path(), true));
            walker.skip_current_dir();
        } else if !is_dir && entry.path().extension().is_some_and(|ext| ext == "pyc") {
            doomed.push((entry.into_path(), false));
        }
    }

    for (path, is_dir) in &doomed {
        let result = if *is_dir { fs::remove_dir_all(path) } else { fs::remove_file(path) };
        result.with_context(|| format!("Failed to remove {}", path.display()))?;
    }

    if !doomed.is_empty() {
        debug!("Removed {} Python bytecode entries", doomed.len());
    }
    Ok(doomed.len())
}
