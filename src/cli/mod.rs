//! Command-line interface for nmkup.
//!
//! ```bash
//! # Install or update from the latest GitHub release
//! nmkup
//!
//! # Install a specific tag
//! nmkup v2.3.0
//!
//! # Pick a release from a list
//! nmkup --interactive
//!
//! # Use the Cloud Storage mirror
//! nmkup --source gcs
//!
//! # Only report whether an update is available
//! nmkup --check
//!
//! # Put the previous install back
//! nmkup --rollback
//! ```

use crate::config::UpdaterConfig;
use crate::release::{Selector, SourceKind, TerminalPrompt};
use crate::updater::{UpdateOptions, UpdateOutcome, Updater};
use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use std::io::IsTerminal;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "nmkup",
    about = "Install and update the nmk environment bundle",
    version,
    long_about = "nmkup downloads the nmk bundle from GitHub releases or Cloud Storage, \
                  skips the download when the installed copy is current, and replaces \
                  the installation atomically."
)]
pub struct Cli {
    /// Install this release tag instead of the latest one.
    #[arg(value_name = "TAG", conflicts_with = "interactive")]
    pub tag: Option<String>,

    /// Where to look for releases.
    #[arg(long, value_enum, default_value_t = SourceKind::Github)]
    pub source: SourceKind,

    /// Choose the release from a numbered list.
    #[arg(short, long)]
    pub interactive: bool,

    /// Reinstall even when up to date, and install into unrecognised directories.
    #[arg(short, long)]
    pub force: bool,

    /// Report whether an update is available without installing.
    #[arg(long, conflicts_with_all = ["clear_cache", "rollback"])]
    pub check: bool,

    /// Forget what was installed so the next run reinstalls.
    #[arg(long, conflicts_with = "rollback")]
    pub clear_cache: bool,

    /// Restore the installation replaced by the last update.
    #[arg(long)]
    pub rollback: bool,

    /// Keep the downloaded bundle in the cache directory.
    #[arg(long)]
    pub keep_archive: bool,

    /// Enable debug logging.
    #[arg(short, long, conflicts_with = "quiet")]
    pub debug: bool,

    /// Only print errors.
    #[arg(short, long)]
    pub quiet: bool,

    /// Path to the configuration file.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Installation root (overrides the configuration and NMK_HOME).
    #[arg(long, value_name = "PATH")]
    pub install_root: Option<PathBuf>,
}

impl Cli {
    /// Selection policy implied by the arguments.
    pub fn selector(&self) -> Selector {
        match (&self.tag, self.interactive) {
            (Some(tag), _) => Selector::Tag(tag.clone()),
            (None, true) => Selector::Interactive,
            (None, false) => Selector::Latest,
        }
    }

    /// Log filter implied by `--debug`/`--quiet`; `RUST_LOG` wins when set.
    pub fn log_filter(&self) -> EnvFilter {
        if let Ok(filter) = EnvFilter::try_from_default_env() {
            return filter;
        }
        let level = if self.debug {
            "nmkup=debug"
        } else if self.quiet {
            "off"
        } else {
            "nmkup=info"
        };
        EnvFilter::new(level)
    }

    /// Install the stderr subscriber for this run.
    pub fn init_logging(&self) {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(self.log_filter())
            .with_writer(std::io::stderr)
            .with_target(false)
            .without_time()
            .try_init();
    }

    async fn load_config(&self) -> Result<UpdaterConfig> {
        let mut config = UpdaterConfig::load(self.config.as_deref()).await?;
        if let Some(root) = &self.install_root {
            config.install_root = Some(root.display().to_string());
        }
        if self.keep_archive {
            config.keep_archive = true;
        }
        Ok(config)
    }

    pub async fn execute(self) -> Result<()> {
        let config = self.load_config().await?;
        let show_progress = !self.quiet && std::io::stderr().is_terminal();
        let mut updater = Updater::new(config)?.show_progress(show_progress);

        if self.clear_cache {
            let cleared = updater.clear_caches().await?;
            self.say(format!("Cleared {cleared} cache record(s)").green());
            return Ok(());
        }

        if self.rollback {
            self.say("Rolling back to the previous installation...".yellow());
            updater.rollback().await?;
            self.say(format!("Restored {}", updater.install_root().display()).green());
            return Ok(());
        }

        let options = UpdateOptions {
            force: self.force,
            check_only: self.check,
        };
        let mut prompt = TerminalPrompt::new(updater.bundle_name(self.source));

        let outcome = updater.run(self.source, &self.selector(), &mut prompt, options).await?;
        self.report(&outcome);
        Ok(())
    }

    fn report(&self, outcome: &UpdateOutcome) {
        match outcome {
            UpdateOutcome::UpToDate(release) => {
                self.say(format!("Already up to date ({})", release.label()).green());
            }
            UpdateOutcome::Installed(release) => {
                self.say(format!("Installed {} from {}", release.label(), self.source).green());
            }
            UpdateOutcome::Checked {
                release,
                up_to_date: true,
            } => {
                self.say(format!("Up to date ({})", release.label()).green());
            }
            UpdateOutcome::Checked {
                release,
                up_to_date: false,
            } => {
                self.say(format!("Update available: {}", release.label()).cyan());
                println!("Run `nmkup` to install it");
            }
        }
    }

    fn say(&self, message: colored::ColoredString) {
        if !self.quiet {
            println!("{message}");
        }
    }
}
