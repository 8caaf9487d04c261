//! JSON bodies mimicking the release APIs.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use md5::{Digest, Md5};
use serde_json::{Value, json};

/// A GitHub release object as served by `/releases` and `/releases/latest`.
#[derive(Debug, Clone)]
pub struct GithubReleaseFixture {
    pub tag: String,
    pub assets: Vec<Value>,
}

impl GithubReleaseFixture {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            assets: Vec::new(),
        }
    }

    /// Add an asset with both timestamps set to `timestamp`.
    pub fn asset(mut self, name: &str, url: &str, size: u64, timestamp: &str) -> Self {
        self.assets.push(json!({
            "name": name,
            "browser_download_url": url,
            "created_at": timestamp,
            "updated_at": timestamp,
            "size": size,
            "download_count": 0,
            "content_type": "application/gzip",
        }));
        self
    }

    pub fn to_json(&self) -> Value {
        json!({
            "tag_name": self.tag,
            "name": self.tag,
            "draft": false,
            "prerelease": false,
            "assets": self.assets,
        })
    }
}

/// A Cloud Storage object metadata resource.
#[derive(Debug, Clone)]
pub struct GcsObjectFixture {
    pub media_link: String,
    pub md5_hash: String,
    pub size: u64,
}

impl GcsObjectFixture {
    pub fn new(media_link: &str, md5_hash: &str, size: u64) -> Self {
        Self {
            media_link: media_link.to_string(),
            md5_hash: md5_hash.to_string(),
            size,
        }
    }

    /// Metadata whose hash and size describe `body`.
    pub fn for_body(media_link: &str, body: &[u8]) -> Self {
        Self::new(media_link, &md5_base64(body), body.len() as u64)
    }

    pub fn to_json(&self) -> Value {
        json!({
            "kind": "storage#object",
            "name": "nmk.tar.gz",
            "bucket": "nmk.nuimk.com",
            "mediaLink": self.media_link,
            "md5Hash": self.md5_hash,
            "size": self.size.to_string(),
            "timeCreated": "2024-01-01T00:00:00.000Z",
            "updated": "2024-01-01T00:00:00.000Z",
        })
    }
}

/// Base64-encoded MD5 of `data`, the encoding Cloud Storage uses.
pub fn md5_base64(data: &[u8]) -> String {
    STANDARD.encode(Md5::digest(data))
}
