//! Integration test suite for nmkup
//!
//! End-to-end runs of the update pipeline against a `wiremock` server standing
//! in for the GitHub releases API and the Cloud Storage JSON API, with real
//! gzip/xz bundles built in-test.
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! - **github**: tag-backed source, freshness by tag + asset metadata
//! - **gcs**: hash-backed source, freshness by MD5 content hash
//! - **cli**: the `nmkup` binary

#[path = "../common/mod.rs"]
mod common;

mod cli;
mod gcs;
mod github;
