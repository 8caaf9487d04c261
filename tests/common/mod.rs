//! Shared fixtures for nmkup integration tests.
//!
//! A [`TestEnv`] owns a scratch home directory and a `wiremock` server that
//! stands in for both the GitHub releases API and the Cloud Storage JSON API.

// Not every test file uses every helper.
#![allow(dead_code)]

use chrono::{DateTime, Utc};
use nmkup::config::UpdaterConfig;
use nmkup::installer::archive::ArchiveFormat;
use nmkup::release::{Asset, ReleaseDescriptor, SourceKind};
use nmkup::test_utils::{BundleEntry, GcsObjectFixture, GithubReleaseFixture, bundle_bytes};
use nmkup::updater::Updater;
use std::path::PathBuf;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const BUNDLE: &str = "nmk.tar.gz";
pub const T1: &str = "2024-01-01T00:00:00Z";
pub const REPO_PATH: &str = "/repos/nui/nmk";
pub const OBJECT_PATH: &str = "/storage/v1/b/nmk.nuimk.com/o/nmk.tar.gz";

pub struct TestEnv {
    pub temp: TempDir,
    pub server: MockServer,
}

impl TestEnv {
    pub async fn new() -> Self {
        nmkup::test_utils::init_test_logging(None);
        Self {
            temp: TempDir::new().unwrap(),
            server: MockServer::start().await,
        }
    }

    pub fn install_root(&self) -> PathBuf {
        self.temp.path().join(".nmk")
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.temp.path().join(".nmkup")
    }

    pub fn cache_file(&self, kind: SourceKind) -> PathBuf {
        self.cache_dir().join(format!("{kind}.json"))
    }

    pub fn config(&self) -> UpdaterConfig {
        let mut config = UpdaterConfig {
            install_root: Some(self.install_root().display().to_string()),
            cache_dir: Some(self.cache_dir().display().to_string()),
            ..UpdaterConfig::default()
        };
        config.github.api_url = format!("{}{REPO_PATH}", self.server.uri());
        config.gcs.object_url = format!("{}{OBJECT_PATH}", self.server.uri());
        config
    }

    /// Write [`config`](Self::config) as TOML and return its path.
    pub fn write_config(&self) -> PathBuf {
        let path = self.temp.path().join("nmkup.toml");
        std::fs::write(&path, toml::to_string(&self.config()).unwrap()).unwrap();
        path
    }

    pub fn updater(&self) -> Updater {
        Updater::new(self.config()).unwrap().show_progress(false)
    }

    pub fn bundle_url(&self, tag: &str) -> String {
        format!("{}/download/{tag}/{BUNDLE}", self.server.uri())
    }

    /// Serve a bundle for `tag` containing a `version` file, expecting
    /// `downloads` requests.
    pub async fn serve_bundle(&self, tag: &str, downloads: u64) -> Vec<u8> {
        let body = bundle_bytes(
            ArchiveFormat::Gzip,
            &[
                BundleEntry::file("version", tag),
                BundleEntry::file("bin/nmk", "#!/bin/sh\n"),
                BundleEntry::file(".installed-files", "./bin\n./bin/nmk\n./version\n"),
            ],
        );
        Mock::given(method("GET"))
            .and(path(format!("/download/{tag}/{BUNDLE}")))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
            .expect(downloads)
            .mount(&self.server)
            .await;
        body
    }

    /// A release for `tag` whose bundle has `size` and timestamps [`T1`].
    pub fn release(&self, tag: &str, size: u64) -> GithubReleaseFixture {
        GithubReleaseFixture::new(tag).asset(BUNDLE, &self.bundle_url(tag), size, T1)
    }

    pub async fn serve_latest(&self, release: &GithubReleaseFixture) {
        Mock::given(method("GET"))
            .and(path(format!("{REPO_PATH}/releases/latest")))
            .respond_with(ResponseTemplate::new(200).set_body_json(release.to_json()))
            .mount(&self.server)
            .await;
    }

    pub async fn serve_releases(&self, releases: &[GithubReleaseFixture]) {
        let body: Vec<_> = releases.iter().map(GithubReleaseFixture::to_json).collect();
        Mock::given(method("GET"))
            .and(path(format!("{REPO_PATH}/releases")))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    pub async fn serve_object(&self, object: &GcsObjectFixture) {
        Mock::given(method("GET"))
            .and(path(OBJECT_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(object.to_json()))
            .mount(&self.server)
            .await;
    }

    /// The descriptor the GitHub source builds for [`release`](Self::release).
    pub fn github_descriptor(&self, tag: &str, size: u64) -> ReleaseDescriptor {
        let t1: DateTime<Utc> = T1.parse().unwrap();
        ReleaseDescriptor {
            tag: Some(tag.to_string()),
            assets: vec![Asset {
                name: BUNDLE.to_string(),
                download_url: self.bundle_url(tag),
                created_at: Some(t1),
                updated_at: Some(t1),
                size,
                content_hash: None,
            }],
        }
    }

    /// A cached GCS record with `hash`.
    pub fn gcs_descriptor(&self, hash: &str) -> ReleaseDescriptor {
        ReleaseDescriptor {
            tag: None,
            assets: vec![Asset {
                name: BUNDLE.to_string(),
                download_url: self.bundle_url("gcs"),
                created_at: None,
                updated_at: None,
                size: 1,
                content_hash: Some(hash.to_string()),
            }],
        }
    }

    pub fn read_installed(&self, relative: &str) -> String {
        std::fs::read_to_string(self.install_root().join(relative)).unwrap()
    }
}

/// Prompt that must never be shown.
pub fn no_prompt(_: &[ReleaseDescriptor]) -> anyhow::Result<String> {
    panic!("selection prompt shown unexpectedly")
}
