use crate::core::NmkupError;
use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use md5::{Digest, Md5};
use std::path::Path;
use tokio::fs;
use tracing::{debug, info};

/// Verifies downloaded bundles against a published content hash.
///
/// Object storage publishes the MD5 digest of each object base64-encoded
/// (`md5Hash`), so digests are compared in that encoding.
pub struct ChecksumVerifier;

impl ChecksumVerifier {
    /// Base64-encoded MD5 digest of the file at `file_path`.
    pub async fn compute_md5(file_path: &Path) -> Result<String> {
        debug!("Computing MD5 checksum for: {}", file_path.display());

        let contents = fs::read(file_path)
            .await
            .with_context(|| format!("Failed to read file: {}", file_path.display()))?;

        let digest = Md5::digest(&contents);
        Ok(STANDARD.encode(digest))
    }

    /// Fail with [`NmkupError::ChecksumMismatch`] unless the file's digest
    /// equals `expected`.
    pub async fn verify(file_path: &Path, expected: &str) -> Result<()> {
        let actual = Self::compute_md5(file_path).await?;

        if actual != expected.trim() {
            return Err(NmkupError::ChecksumMismatch {
                expected: expected.trim().to_string(),
                actual,
            }
            .into());
        }

        info!("Checksum verified ({actual})");
        Ok(())
    }
}
