//! Download progress reporting.
//!
//! Progress is drawn on stderr and disappears on its own when stderr is not a
//! terminal. Set `NMKUP_NO_PROGRESS` (or pass `--quiet`) to hide it entirely.

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

const NO_PROGRESS_ENV: &str = "NMKUP_NO_PROGRESS";

fn is_progress_disabled() -> bool {
    std::env::var_os(NO_PROGRESS_ENV).is_some()
}

/// Byte progress for one bundle download.
pub struct DownloadProgress {
    inner: ProgressBar,
}

impl DownloadProgress {
    /// A bar for `total` bytes, or a spinner when the length is unknown.
    pub fn new(total: Option<u64>, enabled: bool) -> Self {
        if !enabled || is_progress_disabled() {
            return Self::hidden();
        }

        let inner = match total {
            Some(len) => {
                let bar = ProgressBar::new(len);
                bar.set_style(
                    ProgressStyle::with_template(
                        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})",
                    )
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("#>-"),
                );
                bar
            }
            None => {
                let bar = ProgressBar::new_spinner();
                bar.set_style(
                    ProgressStyle::with_template("{spinner:.green} {bytes} ({bytes_per_sec})")
                        .unwrap_or_else(|_| ProgressStyle::default_spinner()),
                );
                bar.enable_steady_tick(Duration::from_millis(100));
                bar
            }
        };

        Self {
            inner,
        }
    }

    /// A progress reporter that draws nothing.
    pub fn hidden() -> Self {
        Self {
            inner: ProgressBar::hidden(),
        }
    }

    /// Record `n` more bytes.
    pub fn advance(&self, n: u64) {
        self.inner.inc(n);
    }

    /// Bytes recorded so far.
    pub fn position(&self) -> u64 {
        self.inner.position()
    }

    /// Remove the bar from the terminal.
    pub fn finish(&self) {
        self.inner.finish_and_clear();
    }
}
