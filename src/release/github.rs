use crate::config::GithubConfig;
use crate::release::source::qualifying;
use crate::release::{Asset, ReleaseDescriptor, ReleaseSource, Selector, SourceKind};
use crate::utils::http::{get_json, get_json_pages};
use anyhow::Result;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Largest page size the releases API accepts.
const RELEASES_PER_PAGE: u32 = 100;

/// A release object as returned by `GET /releases` and `GET /releases/latest`.
#[derive(Debug, Deserialize)]
struct GithubRelease {
    tag_name: String,
    #[serde(default)]
    assets: Vec<GithubAsset>,
}

#[derive(Debug, Deserialize)]
struct GithubAsset {
    name: String,
    browser_download_url: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    size: u64,
}

impl From<GithubRelease> for ReleaseDescriptor {
    fn from(release: GithubRelease) -> Self {
        Self {
            tag: Some(release.tag_name),
            assets: release
                .assets
                .into_iter()
                .map(|asset| Asset {
                    name: asset.name,
                    download_url: asset.browser_download_url,
                    created_at: Some(asset.created_at),
                    updated_at: Some(asset.updated_at),
                    size: asset.size,
                    content_hash: None,
                })
                .collect(),
        }
    }
}

/// Tag-backed source reading GitHub releases.
///
/// A cached release is fresh only while its tag is unchanged *and* the bundle
/// asset still has the same creation time, update time and size, which catches
/// a binary re-uploaded under an existing tag.
pub struct GithubSource {
    client: Client,
    api_url: String,
    asset: String,
    cache_path: PathBuf,
}

impl GithubSource {
    /// Create a source for the repository at `config.api_url`.
    pub fn new(client: Client, config: &GithubConfig, cache_path: PathBuf) -> Self {
        Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            asset: config.asset.clone(),
            cache_path,
        }
    }

    async fn latest(&self) -> Result<ReleaseDescriptor> {
        let url = format!("{}/releases/latest", self.api_url);
        let release: GithubRelease = get_json(&self.client, &url).await?;
        debug!("Latest release is {}", release.tag_name);
        Ok(release.into())
    }

    async fn releases(&self) -> Result<Vec<ReleaseDescriptor>> {
        let url = format!("{}/releases?per_page={RELEASES_PER_PAGE}", self.api_url);
        let releases: Vec<GithubRelease> = get_json_pages(&self.client, &url).await?;
        debug!("Fetched {} releases", releases.len());
        Ok(releases.into_iter().map(ReleaseDescriptor::from).collect())
    }
}

impl ReleaseSource for GithubSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Github
    }

    fn bundle_name(&self) -> &str {
        &self.asset
    }

    async fn fetch(&self, selector: &Selector) -> Result<Vec<ReleaseDescriptor>> {
        let releases = match selector {
            Selector::Latest => vec![self.latest().await?],
            Selector::Tag(_) | Selector::Interactive => self.releases().await?,
        };
        qualifying(releases, &self.asset)
    }

    fn cache_path(&self) -> &Path {
        &self.cache_path
    }

    fn is_fresh(&self, fetched: &ReleaseDescriptor, cached: &ReleaseDescriptor) -> bool {
        if fetched.tag != cached.tag {
            debug!("Tag changed: {} -> {}", cached.label(), fetched.label());
            return false;
        }

        match (fetched.asset(&self.asset), cached.asset(&self.asset)) {
            (Some(new), Some(old)) => {
                let unchanged = new.created_at == old.created_at
                    && new.updated_at == old.updated_at
                    && new.size == old.size;
                if !unchanged {
                    debug!("Asset {} was replaced under tag {}", self.asset, fetched.label());
                }
                unchanged
            }
            _ => false,
        }
    }
}
