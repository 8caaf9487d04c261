use crate::core::NmkupError;
use crate::release::{ReleaseDescriptor, Selector};
use anyhow::Result;
use std::fmt;
use std::path::Path;

/// Identifies a release backend.
///
/// The identifier doubles as the cache file stem (`github.json`, `gcs.json`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum SourceKind {
    /// GitHub releases, versioned by tag.
    Github,
    /// A single Google Cloud Storage object, versioned by content hash.
    Gcs,
}

impl SourceKind {
    /// Every known backend.
    pub const ALL: [SourceKind; 2] = [SourceKind::Github, SourceKind::Gcs];

    /// Stable identifier used in file names and messages.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            SourceKind::Github => "github",
            SourceKind::Gcs => "gcs",
        }
    }

    /// The other backend, whose cache is invalidated when this one installs.
    #[must_use]
    pub const fn sibling(self) -> SourceKind {
        match self {
            SourceKind::Github => SourceKind::Gcs,
            SourceKind::Gcs => SourceKind::Github,
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A backend that can describe and serve installable bundles.
///
/// Implementations share no state; each one owns its HTTP client handle,
/// its bundle name and the location of its cache record.
#[allow(async_fn_in_trait)]
pub trait ReleaseSource {
    /// Which backend this is.
    fn kind(&self) -> SourceKind;

    /// Name of the bundle asset every installable release must carry.
    fn bundle_name(&self) -> &str;

    /// Fetch the candidates `selector` needs, most recent first.
    ///
    /// Only releases carrying [`bundle_name`](Self::bundle_name) are returned;
    /// when none qualify this fails with [`NmkupError::NoUpdatableRelease`].
    async fn fetch(&self, selector: &Selector) -> Result<Vec<ReleaseDescriptor>>;

    /// Where this source's freshness record is persisted.
    fn cache_path(&self) -> &Path;

    /// Whether `fetched` is the release described by the `cached` record.
    fn is_fresh(&self, fetched: &ReleaseDescriptor, cached: &ReleaseDescriptor) -> bool;

    /// URL of the bundle for `descriptor`.
    fn download_url<'a>(&self, descriptor: &'a ReleaseDescriptor) -> Result<&'a str> {
        descriptor
            .asset(self.bundle_name())
            .map(|asset| asset.download_url.as_str())
            .ok_or_else(|| {
                NmkupError::NoUpdatableRelease {
                    asset: self.bundle_name().to_string(),
                }
                .into()
            })
    }
}

/// Keep only releases carrying `asset`, preserving order.
pub fn qualifying(releases: Vec<ReleaseDescriptor>, asset: &str) -> Result<Vec<ReleaseDescriptor>> {
    let qualified: Vec<_> = releases.into_iter().filter(|r| r.has_asset(asset)).collect();

    if qualified.is_empty() {
        return Err(NmkupError::NoUpdatableRelease {
            asset: asset.to_string(),
        }
        .into());
    }

    Ok(qualified)
}
