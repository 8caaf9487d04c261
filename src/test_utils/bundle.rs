//! In-memory bundle builder.
//!
//! Produces the same shape as a published bundle: a compressed tar stream whose
//! only top-level entry is the `nmk/` directory.

use crate::installer::archive::ArchiveFormat;
use flate2::Compression;
use flate2::write::GzEncoder;
use std::io::Write;
use std::path::Path;
use tar::{Builder, EntryType, Header};
use xz2::write::XzEncoder;

/// Name of the wrapping directory inside generated bundles.
pub const TOP_DIR: &str = "nmk";

/// One entry below the wrapping directory.
#[derive(Debug, Clone)]
pub enum BundleEntry {
    File { path: String, content: Vec<u8> },
    Dir { path: String },
    Symlink { path: String, target: String },
}

impl BundleEntry {
    pub fn file(path: &str, content: impl AsRef<[u8]>) -> Self {
        Self::File {
            path: path.to_string(),
            content: content.as_ref().to_vec(),
        }
    }

    pub fn dir(path: &str) -> Self {
        Self::Dir {
            path: path.to_string(),
        }
    }

    pub fn symlink(path: &str, target: &str) -> Self {
        Self::Symlink {
            path: path.to_string(),
            target: target.to_string(),
        }
    }
}

fn tar_bytes(entries: &[BundleEntry]) -> Vec<u8> {
    let mut builder = Builder::new(Vec::new());

    let mut top = Header::new_gnu();
    top.set_entry_type(EntryType::Directory);
    top.set_mode(0o755);
    top.set_size(0);
    builder.append_data(&mut top, format!("{TOP_DIR}/"), std::io::empty()).unwrap();

    for entry in entries {
        let mut header = Header::new_gnu();
        match entry {
            BundleEntry::File { path, content } => {
                header.set_entry_type(EntryType::Regular);
                header.set_mode(0o644);
                header.set_size(content.len() as u64);
                builder
                    .append_data(&mut header, format!("{TOP_DIR}/{path}"), content.as_slice())
                    .unwrap();
            }
            BundleEntry::Dir { path } => {
                header.set_entry_type(EntryType::Directory);
                header.set_mode(0o755);
                header.set_size(0);
                builder
                    .append_data(&mut header, format!("{TOP_DIR}/{path}/"), std::io::empty())
                    .unwrap();
            }
            BundleEntry::Symlink { path, target } => {
                header.set_entry_type(EntryType::Symlink);
                header.set_mode(0o777);
                header.set_size(0);
                builder.append_link(&mut header, format!("{TOP_DIR}/{path}"), target).unwrap();
            }
        }
    }

    builder.into_inner().unwrap()
}

/// A compressed bundle containing `entries` under [`TOP_DIR`].
pub fn bundle_bytes(format: ArchiveFormat, entries: &[BundleEntry]) -> Vec<u8> {
    let tar = tar_bytes(entries);
    match format {
        ArchiveFormat::Gzip => {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(&tar).unwrap();
            encoder.finish().unwrap()
        }
        ArchiveFormat::Xz => {
            let mut encoder = XzEncoder::new(Vec::new(), 6);
            encoder.write_all(&tar).unwrap();
            encoder.finish().unwrap()
        }
    }
}

/// Write [`bundle_bytes`] to `path`.
pub fn write_bundle(path: &Path, format: ArchiveFormat, entries: &[BundleEntry]) {
    std::fs::write(path, bundle_bytes(format, entries)).unwrap();
}
