use crate::config::GcsConfig;
use crate::core::NmkupError;
use crate::release::{Asset, ReleaseDescriptor, ReleaseSource, Selector, SourceKind};
use crate::utils::http::get_json;
use anyhow::Result;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Object metadata from the Cloud Storage JSON API.
///
/// The API encodes `size` as a decimal string.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GcsObject {
    media_link: String,
    md5_hash: String,
    size: String,
    #[serde(default)]
    time_created: Option<DateTime<Utc>>,
    #[serde(default)]
    updated: Option<DateTime<Utc>>,
}

/// Hash-backed source reading a single Cloud Storage object.
///
/// There is no tag and no history: the object is always the current bundle,
/// and its MD5 content hash is the only freshness signal.
pub struct GcsSource {
    client: Client,
    object_url: String,
    asset: String,
    cache_path: PathBuf,
}

impl GcsSource {
    /// Create a source for the object at `config.object_url`.
    pub fn new(client: Client, config: &GcsConfig, cache_path: PathBuf) -> Self {
        Self {
            client,
            object_url: config.object_url.clone(),
            asset: config.asset.clone(),
            cache_path,
        }
    }

    async fn object(&self) -> Result<ReleaseDescriptor> {
        let object: GcsObject = get_json(&self.client, &self.object_url).await?;
        debug!("Object md5Hash {}", object.md5_hash);

        let size = object.size.parse::<u64>().map_err(|_| NmkupError::FetchFailure {
            url: self.object_url.clone(),
            reason: format!("malformed response: size '{}' is not a number", object.size),
        })?;

        Ok(ReleaseDescriptor {
            tag: None,
            assets: vec![Asset {
                name: self.asset.clone(),
                download_url: object.media_link,
                created_at: object.time_created,
                updated_at: object.updated,
                size,
                content_hash: Some(object.md5_hash),
            }],
        })
    }
}

impl ReleaseSource for GcsSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Gcs
    }

    fn bundle_name(&self) -> &str {
        &self.asset
    }

    async fn fetch(&self, selector: &Selector) -> Result<Vec<ReleaseDescriptor>> {
        match selector {
            Selector::Latest | Selector::Interactive => Ok(vec![self.object().await?]),
            Selector::Tag(_) => Err(NmkupError::UnsupportedSelector {
                source_name: self.kind().to_string(),
                selector: selector.to_string(),
            }
            .into()),
        }
    }

    fn cache_path(&self) -> &Path {
        &self.cache_path
    }

    fn is_fresh(&self, fetched: &ReleaseDescriptor, cached: &ReleaseDescriptor) -> bool {
        let hash_of = |d: &ReleaseDescriptor| {
            d.asset(&self.asset).and_then(|asset| asset.content_hash.clone())
        };

        match (hash_of(fetched), hash_of(cached)) {
            (Some(new), Some(old)) => {
                debug!("Cached md5Hash {}", old);
                new == old
            }
            _ => false,
        }
    }
}
