//! Supporting utilities for the update pipeline.
//!
//! - [`fs`] - atomic writes and directory helpers
//! - [`http`] - request helpers that map failures to `FetchFailure`
//! - [`progress`] - the download progress bar

pub mod fs;
pub mod http;
pub mod progress;

pub use fs::{atomic_write, ensure_dir};
pub use progress::DownloadProgress;
