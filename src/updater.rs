//! The update pipeline.
//!
//! One run walks a fixed state machine:
//!
//! ```text
//! Idle ─► Selecting ─► Fetched ─┬─► UpToDate
//!                               └─► Installing ─► Done
//!          (any failure) ─► Error
//! ```
//!
//! The freshness record of the active source is written only after a
//! complete install, and the sibling source's record is cleared at the same
//! point so switching sources later never trusts stale data.

use crate::cache::FreshnessCache;
use crate::config::UpdaterConfig;
use crate::installer::Installer;
use crate::release::{
    GcsSource, GithubSource, ReleaseDescriptor, ReleaseSource, SelectionPrompt, Selector,
    SourceKind,
};
use crate::utils::http::build_client;
use anyhow::Result;
use reqwest::Client;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Pipeline state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Selecting,
    Fetched,
    UpToDate,
    Installing,
    Done,
    Error,
}

/// Per-run switches.
#[derive(Debug, Clone, Copy, Default)]
pub struct UpdateOptions {
    /// Install even when the cache says the release is current, and skip
    /// the install-root safety check.
    pub force: bool,
    /// Stop after the freshness check.
    pub check_only: bool,
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The cached release is current; nothing was downloaded.
    UpToDate(ReleaseDescriptor),
    /// The release was downloaded and installed.
    Installed(ReleaseDescriptor),
    /// Check-only run.
    Checked {
        release: ReleaseDescriptor,
        up_to_date: bool,
    },
}

/// Runs the pipeline against one installation root.
pub struct Updater {
    config: UpdaterConfig,
    client: Client,
    cache_dir: PathBuf,
    installer: Installer,
    stage: Stage,
}

impl Updater {
    pub fn new(config: UpdaterConfig) -> Result<Self> {
        let client = build_client(&config.user_agent)?;
        let cache_dir = config.cache_dir()?;
        let installer = Installer::from_config(client.clone(), &config)?;

        Ok(Self {
            config,
            client,
            cache_dir,
            installer,
            stage: Stage::Idle,
        })
    }

    /// Show or hide the download progress bar.
    pub fn show_progress(mut self, show: bool) -> Self {
        self.installer = self.installer.show_progress(show);
        self
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn install_root(&self) -> &Path {
        self.installer.install_root()
    }

    /// Bundle asset name configured for `kind`.
    pub fn bundle_name(&self, kind: SourceKind) -> &str {
        match kind {
            SourceKind::Github => &self.config.github.asset,
            SourceKind::Gcs => &self.config.gcs.asset,
        }
    }

    /// Freshness record of `kind`.
    pub fn cache(&self, kind: SourceKind) -> FreshnessCache {
        FreshnessCache::for_source(&self.cache_dir, kind)
    }

    /// Run the pipeline against the source `kind`.
    pub async fn run(
        &mut self,
        kind: SourceKind,
        selector: &Selector,
        prompt: &mut dyn SelectionPrompt,
        options: UpdateOptions,
    ) -> Result<UpdateOutcome> {
        let cache_path = FreshnessCache::path_for(&self.cache_dir, kind);
        match kind {
            SourceKind::Github => {
                let source = GithubSource::new(self.client.clone(), &self.config.github, cache_path);
                self.run_with(&source, selector, prompt, options).await
            }
            SourceKind::Gcs => {
                let source = GcsSource::new(self.client.clone(), &self.config.gcs, cache_path);
                self.run_with(&source, selector, prompt, options).await
            }
        }
    }

    /// Run the pipeline against `source`.
    pub async fn run_with<S: ReleaseSource>(
        &mut self,
        source: &S,
        selector: &Selector,
        prompt: &mut dyn SelectionPrompt,
        options: UpdateOptions,
    ) -> Result<UpdateOutcome> {
        self.transition(Stage::Selecting);
        let result = self.pipeline(source, selector, prompt, options).await;
        if result.is_err() {
            self.transition(Stage::Error);
        }
        result
    }

    async fn pipeline<S: ReleaseSource>(
        &mut self,
        source: &S,
        selector: &Selector,
        prompt: &mut dyn SelectionPrompt,
        options: UpdateOptions,
    ) -> Result<UpdateOutcome> {
        if !options.check_only {
            self.installer.check_not_git_managed()?;
        }

        info!("Checking {} for the {} release", source.kind(), selector);
        let candidates = source.fetch(selector).await?;
        let release = selector.select(candidates, source.bundle_name(), prompt)?;
        self.transition(Stage::Fetched);

        let cache = FreshnessCache::new(source.cache_path());
        let up_to_date = cache.is_up_to_date(source, &release).await;

        if options.check_only {
            self.transition(if up_to_date { Stage::UpToDate } else { Stage::Done });
            return Ok(UpdateOutcome::Checked {
                release,
                up_to_date,
            });
        }

        if up_to_date && !options.force {
            info!("{} is up to date ({})", self.install_root().display(), release.label());
            self.transition(Stage::UpToDate);
            return Ok(UpdateOutcome::UpToDate(release));
        }

        self.transition(Stage::Installing);
        let known_install = FreshnessCache::new(source.cache_path()).exists()
            || self.cache(source.kind().sibling()).exists();
        self.installer.check_safe_root(known_install, options.force)?;

        let url = source.download_url(&release)?;
        let expected_md5 = release
            .asset(source.bundle_name())
            .and_then(|asset| asset.content_hash.as_deref());
        self.installer.install(url, source.bundle_name(), expected_md5).await?;

        cache.save(&release).await?;
        if self.cache(source.kind().sibling()).clear().await? {
            debug!("Invalidated {} cache", source.kind().sibling());
        }

        info!("Installed {} from {}", release.label(), source.kind());
        self.transition(Stage::Done);
        Ok(UpdateOutcome::Installed(release))
    }

    /// Remove every source's freshness record. Returns how many existed.
    pub async fn clear_caches(&self) -> Result<usize> {
        let mut cleared = 0;
        for kind in SourceKind::ALL {
            if self.cache(kind).clear().await? {
                cleared += 1;
            }
        }
        Ok(cleared)
    }

    /// Restore the previous tree and forget what was installed.
    ///
    /// The restored tree matches neither cached descriptor, so both records
    /// are cleared and the next run reinstalls.
    pub async fn rollback(&self) -> Result<()> {
        self.installer.rollback().await?;
        self.clear_caches().await?;
        Ok(())
    }

    fn transition(&mut self, next: Stage) {
        debug!("{:?} -> {:?}", self.stage, next);
        self.stage = next;
    }
}
