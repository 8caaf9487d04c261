//! nmkup - installer and updater for the nmk environment bundle
//!
//! nmkup keeps a local copy of the nmk bundle current. It asks a release
//! source what the newest bundle is, compares that with a record of what it
//! installed last, and only downloads when something changed. Replacement is
//! staged beside the live tree and swapped in with renames, so a failed update
//! never leaves a half-written installation behind.
//!
//! # Architecture Overview
//!
//! ```text
//! Selector ─► ReleaseSource::fetch ─► FreshnessCache ─┬─► up to date
//!                                                     └─► Installer ─► FreshnessCache::save
//! ```
//!
//! # Core Modules
//!
//! - [`release`] - release descriptors, the GitHub and Cloud Storage sources, selection
//! - [`cache`] - per-source record of the last installed release
//! - [`installer`] - download, verification, uninstall manifest, extraction, staging
//! - [`updater`] - the pipeline state machine tying the above together
//!
//! ## Supporting Modules
//!
//! - [`cli`] - command-line interface
//! - [`config`] - `~/.nmkup/config.toml`
//! - [`core`] - error taxonomy and user-facing error rendering
//! - [`utils`] - file system, HTTP and progress helpers
//!
//! # Sources
//!
//! | Source | Versioned by | Fresh when |
//! |--------|--------------|------------|
//! | `github` | release tag | tag, bundle size and bundle timestamps are unchanged |
//! | `gcs` | object content | the object's MD5 hash is unchanged |
//!
//! Installing from one source clears the other source's record, so switching
//! back always re-checks.

pub mod cache;
pub mod cli;
pub mod config;
pub mod core;
pub mod installer;
pub mod release;
pub mod updater;
pub mod utils;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
