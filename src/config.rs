//! Updater configuration.
//!
//! nmkup reads an optional TOML file and otherwise runs on built-in defaults.
//! The loaded [`UpdaterConfig`] is passed explicitly through the pipeline; the
//! process environment is only ever read.
//!
//! # Location
//!
//! 1. The path given with `--config`
//! 2. `$NMKUP_CONFIG`
//! 3. `~/.nmkup/config.toml`
//!
//! A missing file is not an error. Without an `install_root` setting the
//! tree goes to `$NMK_HOME`, else `~/.nmk`.
//!
//! # Format
//!
//! ```toml
//! install_root = "~/.nmk"
//! cache_dir = "~/.nmkup"
//! manifest_name = ".installed-files"
//! keep_archive = false
//! keep_backup = false
//!
//! [github]
//! api_url = "https://api.github.com/repos/nui/nmk"
//! asset = "nmk.tar.gz"
//!
//! [gcs]
//! object_url = "https://www.googleapis.com/storage/v1/b/nmk.nuimk.com/o/nmk.tar.gz"
//! asset = "nmk.tar.gz"
//! ```

use crate::core::NmkupError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Environment variable naming an alternative config file.
pub const CONFIG_ENV: &str = "NMKUP_CONFIG";

/// Environment variable overriding the default installation root.
pub const NMK_HOME_ENV: &str = "NMK_HOME";

/// Installation root used when neither the config nor `$NMK_HOME` sets one.
pub const DEFAULT_INSTALL_ROOT: &str = "~/.nmk";

/// Uninstall manifest shipped at the root of every bundle.
pub const DEFAULT_MANIFEST_NAME: &str = ".installed-files";

/// Top-level updater settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdaterConfig {
    /// Installation root. `~` and `$VARS` are expanded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install_root: Option<String>,

    /// Where cache records and kept archives live.
    ///
    /// Defaults to `.nmkup` beside the installation root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<String>,

    /// Name of the uninstall manifest inside the installation root.
    #[serde(default = "default_manifest_name")]
    pub manifest_name: String,

    /// Keep the downloaded bundle in the cache directory after installing.
    #[serde(default)]
    pub keep_archive: bool,

    /// Keep the replaced tree as `<root>.backup` so `--rollback` can restore it.
    #[serde(default)]
    pub keep_backup: bool,

    /// User-Agent sent with every request. GitHub rejects requests without one.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Tag-backed source settings.
    #[serde(default)]
    pub github: GithubConfig,

    /// Hash-backed source settings.
    #[serde(default)]
    pub gcs: GcsConfig,
}

/// Settings for the GitHub releases source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GithubConfig {
    /// Repository API base; `/releases` and `/releases/latest` are appended.
    #[serde(default = "default_github_api_url")]
    pub api_url: String,

    /// Bundle asset every qualifying release must carry.
    #[serde(default = "default_bundle_name")]
    pub asset: String,
}

/// Settings for the Google Cloud Storage object source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GcsConfig {
    /// JSON API URL of the bundle object.
    #[serde(default = "default_gcs_object_url")]
    pub object_url: String,

    /// Bundle name recorded for the object.
    #[serde(default = "default_bundle_name")]
    pub asset: String,
}

fn default_manifest_name() -> String {
    DEFAULT_MANIFEST_NAME.to_string()
}

fn default_user_agent() -> String {
    format!("nmkup/{}", env!("CARGO_PKG_VERSION"))
}

fn default_github_api_url() -> String {
    "https://api.github.com/repos/nui/nmk".to_string()
}

fn default_gcs_object_url() -> String {
    "https://www.googleapis.com/storage/v1/b/nmk.nuimk.com/o/nmk.tar.gz".to_string()
}

fn default_bundle_name() -> String {
    "nmk.tar.gz".to_string()
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            install_root: None,
            cache_dir: None,
            manifest_name: default_manifest_name(),
            keep_archive: false,
            keep_backup: false,
            user_agent: default_user_agent(),
            github: GithubConfig::default(),
            gcs: GcsConfig::default(),
        }
    }
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_url: default_github_api_url(),
            asset: default_bundle_name(),
        }
    }
}

impl Default for GcsConfig {
    fn default() -> Self {
        Self {
            object_url: default_gcs_object_url(),
            asset: default_bundle_name(),
        }
    }
}

impl UpdaterConfig {
    /// Load configuration, falling back to defaults when no file exists.
    pub async fn load(explicit: Option<&Path>) -> Result<Self> {
        Self::load_with_env(explicit, |key| std::env::var_os(key)).await
    }

    /// [`load`](Self::load) with `env` standing in for the process environment.
    pub async fn load_with_env(
        explicit: Option<&Path>,
        env: impl Fn(&str) -> Option<OsString>,
    ) -> Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => match env(CONFIG_ENV) {
                Some(path) => PathBuf::from(path),
                None => Self::default_path()?,
            },
        };

        let mut config = if path.exists() {
            Self::load_from(&path).await?
        } else {
            debug!("No config at {}, using defaults", path.display());
            Self::default()
        };

        if config.install_root.is_none()
            && let Some(home) = env(NMK_HOME_ENV)
        {
            debug!("Using {} from {}", home.to_string_lossy(), NMK_HOME_ENV);
            config.install_root = Some(home.to_string_lossy().into_owned());
        }
        Ok(config)
    }

    /// Load and validate configuration from a specific file.
    pub async fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        let config: Self = toml::from_str(&content).map_err(|e| NmkupError::ConfigError {
            message: format!("{}: {}", path.display(), e.message()),
        })?;
        config.validate()?;

        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// `~/.nmkup/config.toml`
    pub fn default_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| anyhow::anyhow!("Unable to determine home directory"))?;
        Ok(home.join(".nmkup").join("config.toml"))
    }

    /// Reject settings that would make the pipeline write outside its directories.
    pub fn validate(&self) -> Result<()> {
        if self.manifest_name.is_empty()
            || self.manifest_name.contains('/')
            || self.manifest_name.contains('\\')
        {
            return Err(NmkupError::ConfigError {
                message: format!("manifest_name '{}' must be a plain file name", self.manifest_name),
            }
            .into());
        }

        for (source, asset) in [("github", &self.github.asset), ("gcs", &self.gcs.asset)] {
            if asset.is_empty() {
                return Err(NmkupError::ConfigError {
                    message: format!("{source}.asset must not be empty"),
                }
                .into());
            }
        }

        Ok(())
    }

    /// Expanded installation root.
    pub fn install_root(&self) -> Result<PathBuf> {
        expand_path(self.install_root.as_deref().unwrap_or(DEFAULT_INSTALL_ROOT))
    }

    /// Expanded cache directory.
    pub fn cache_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.cache_dir {
            return expand_path(dir);
        }

        let root = self.install_root()?;
        let parent = root.parent().ok_or_else(|| NmkupError::ConfigError {
            message: format!("installation root {} has no parent directory", root.display()),
        })?;
        Ok(parent.join(".nmkup"))
    }
}

fn expand_path(raw: &str) -> Result<PathBuf> {
    let expanded = shellexpand::full(raw).map_err(|e| NmkupError::ConfigError {
        message: format!("cannot expand '{raw}': {e}"),
    })?;
    Ok(PathBuf::from(expanded.as_ref()))
}
