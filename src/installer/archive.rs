//! Bundle extraction.
//!
//! Bundles are tar archives compressed with gzip or xz whose only top-level
//! entry is a directory. The format is detected from the file's magic bytes,
//! not its name.

use anyhow::{Context, Result, bail};
use flate2::read::GzDecoder;
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::{Component, Path, PathBuf};
use tar::Archive;
use tracing::debug;
use xz2::read::XzDecoder;

const GZIP_MAGIC: &[u8] = &[0x1f, 0x8b];
const XZ_MAGIC: &[u8] = &[0xfd, 0x37, 0x7a, 0x58, 0x5a, 0x00];

/// Compression wrapped around the tar stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Gzip,
    Xz,
}

impl ArchiveFormat {
    /// Identify the compression from the first bytes of the file.
    pub fn detect(header: &[u8]) -> Option<Self> {
        if header.starts_with(GZIP_MAGIC) {
            Some(Self::Gzip)
        } else if header.starts_with(XZ_MAGIC) {
            Some(Self::Xz)
        } else {
            None
        }
    }

    fn of_file(path: &Path) -> Result<Self> {
        let mut header = [0u8; 6];
        let mut file =
            File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
        let read = file.read(&mut header)?;

        match Self::detect(&header[..read]) {
            Some(format) => Ok(format),
            None => bail!("{} is neither a gzip nor an xz archive", path.display()),
        }
    }
}

/// Extract the archive at `archive_path` into `dst`, dropping the first
/// `strip` path components of every entry.
///
/// Existing files in `dst` are overwritten. Returns the number of entries
/// written.
pub fn extract(archive_path: &Path, dst: &Path, strip: usize) -> Result<usize> {
    let format = ArchiveFormat::of_file(archive_path)?;
    debug!("Extracting {:?} archive {}", format, archive_path.display());

    let file = BufReader::new(File::open(archive_path)?);
    match format {
        ArchiveFormat::Gzip => unpack(GzDecoder::new(file), dst, strip),
        ArchiveFormat::Xz => unpack(XzDecoder::new(file), dst, strip),
    }
}

fn unpack<R: Read>(reader: R, dst: &Path, strip: usize) -> Result<usize> {
    let root = dst
        .canonicalize()
        .with_context(|| format!("Failed to resolve {}", dst.display()))?;
    let mut archive = Archive::new(reader);
    archive.set_preserve_permissions(true);
    archive.set_preserve_mtime(true);

    let mut written = 0;
    for entry in archive.entries().context("Failed to read archive")? {
        let mut entry = entry.context("Corrupt archive entry")?;
        let path = entry.path()?.into_owned();

        let Some(relative) = stripped(&path, strip)? else {
            continue;
        };
        let target = root.join(&relative);

        if let Some(parent) = target.parent() {
            ensure_within(&root, parent, &path)?;
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        // Replace rather than write through a link left by an earlier entry.
        if target.symlink_metadata().is_ok_and(|m| m.file_type().is_symlink()) {
            fs::remove_file(&target)
                .with_context(|| format!("Failed to replace link {}", target.display()))?;
        }

        if entry.header().entry_type().is_hard_link() {
            let link = entry
                .link_name()?
                .with_context(|| format!("Hard link {} has no target", path.display()))?
                .into_owned();
            let Some(link_relative) = stripped(&link, strip)? else {
                bail!("Hard link {} points outside the bundle", path.display());
            };
            let source = root.join(link_relative);
            ensure_within(&root, &source, &path)?;
            if target.symlink_metadata().is_ok() {
                fs::remove_file(&target)?;
            }
            fs::hard_link(&source, &target)
                .with_context(|| format!("Failed to link {}", target.display()))?;
        } else {
            entry
                .unpack(&target)
                .with_context(|| format!("Failed to unpack {}", relative.display()))?;
        }
        written += 1;
    }

    debug!("Extracted {} entries into {}", written, dst.display());
    Ok(written)
}

/// Fail unless `path` resolves inside `root`.
///
/// Only the deepest part of `path` that already exists is resolved, so a
/// symlink extracted earlier from the same archive cannot redirect later
/// entries outside `root`. `root` must already be canonical.
fn ensure_within(root: &Path, path: &Path, entry: &Path) -> Result<()> {
    let existing = path
        .ancestors()
        .find(|p| p.symlink_metadata().is_ok())
        .unwrap_or(root);
    let resolved = existing.canonicalize().with_context(|| {
        format!("Archive entry {} goes through a dangling link", entry.display())
    })?;

    if !resolved.starts_with(root) {
        bail!("Archive entry escapes the install root: {}", entry.display());
    }
    Ok(())
}

/// `path` with its first `strip` components removed.
///
/// `None` when nothing is left (the wrapping directory itself). Entries that
/// are absolute or climb with `..` are rejected.
fn stripped(path: &Path, strip: usize) -> Result<Option<PathBuf>> {
    let mut parts = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => parts.push(part),
            Component::CurDir => {}
            _ => bail!("Archive entry escapes the install root: {}", path.display()),
        }
    }

    if parts.len() <= strip {
        return Ok(None);
    }
    Ok(Some(parts[strip..].iter().collect()))
}
