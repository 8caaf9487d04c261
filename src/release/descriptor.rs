use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One downloadable file attached to a release.
///
/// Tag-backed sources fill in the timestamps and size; hash-backed sources
/// also carry the content hash. Field order matches the cache file layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    /// File name, e.g. `nmk.tar.gz`.
    pub name: String,
    /// Where the bundle bytes are served from.
    pub download_url: String,
    /// Upload time, when the backend reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// Last modification time, when the backend reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    /// Size in bytes.
    pub size: u64,
    /// Base64 MD5 of the content, as published by object storage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
}

/// An immutable description of one candidate release.
///
/// This is also the record persisted by the freshness cache, so a descriptor
/// read back from disk compares equal to the one that was saved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseDescriptor {
    /// Release tag; absent for sources without versioning.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    /// Assets in the order the backend listed them.
    pub assets: Vec<Asset>,
}

impl ReleaseDescriptor {
    /// The asset named `name`, if this release carries it.
    #[must_use]
    pub fn asset(&self, name: &str) -> Option<&Asset> {
        self.assets.iter().find(|asset| asset.name == name)
    }

    /// Whether this release can be installed with bundle `name`.
    #[must_use]
    pub fn has_asset(&self, name: &str) -> bool {
        self.asset(name).is_some()
    }

    /// Tag for display, or `untagged`.
    #[must_use]
    pub fn label(&self) -> &str {
        self.tag.as_deref().unwrap_or("untagged")
    }
}
