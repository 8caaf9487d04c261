//! Release discovery.
//!
//! A [`ReleaseSource`] turns a backend into a list of [`ReleaseDescriptor`]s,
//! and a [`Selector`] picks the one to install:
//!
//! ```text
//! Selector ──► ReleaseSource::fetch ──► candidates ──► Selector::select ──► descriptor
//! ```
//!
//! Two backends exist and share nothing but the trait:
//!
//! - [`GithubSource`] - tagged releases; freshness is tag + bundle size/timestamps
//! - [`GcsSource`] - one storage object; freshness is its MD5 content hash

pub mod descriptor;
pub mod gcs;
pub mod github;
pub mod selector;
pub mod source;

pub use descriptor::{Asset, ReleaseDescriptor};
pub use gcs::GcsSource;
pub use github::GithubSource;
pub use selector::{SelectionPrompt, Selector, TerminalPrompt, parse_choice};
pub use source::{ReleaseSource, SourceKind};
