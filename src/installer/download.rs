use crate::core::NmkupError;
use crate::utils::fs::ensure_dir;
use crate::utils::http::get_checked;
use crate::utils::progress::DownloadProgress;
use anyhow::{Context, Result};
use reqwest::Client;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// Stream `url` into a temporary file created in `dir`.
///
/// The file is deleted when the returned handle drops unless it is persisted.
/// Nothing outside `dir` is touched, so a failure here leaves the install
/// untouched.
pub async fn download_to_temp(
    client: &Client,
    url: &str,
    dir: &Path,
    show_progress: bool,
) -> Result<NamedTempFile> {
    info!("Downloading {url}");
    let mut response = get_checked(client, url).await?;

    ensure_dir(dir)?;
    let mut file = tempfile::Builder::new()
        .prefix(".download-")
        .tempfile_in(dir)
        .with_context(|| format!("Failed to create temporary file in {}", dir.display()))?;

    let progress = DownloadProgress::new(response.content_length(), show_progress);

    while let Some(chunk) = response.chunk().await.map_err(|e| NmkupError::FetchFailure {
        url: url.to_string(),
        reason: e.to_string(),
    })? {
        file.write_all(&chunk).context("Failed to write downloaded data")?;
        progress.advance(chunk.len() as u64);
    }

    file.flush().context("Failed to flush downloaded data")?;
    progress.finish();

    debug!("Downloaded {} bytes to {}", progress.position(), file.path().display());
    Ok(file)
}
