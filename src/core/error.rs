//! Error handling for nmkup
//!
//! The updater reports failures through two layers:
//! 1. [`NmkupError`] - a strongly-typed enumeration of every failure class the
//!    release pipeline can hit, used by library code and by tests that need to
//!    assert on the exact class of a failure
//! 2. [`ErrorContext`] - a wrapper that pairs an error with details and an
//!    actionable suggestion for display on the terminal
//!
//! Library functions return [`anyhow::Result`] and raise typed failures with
//! `NmkupError::Variant { .. }.into()`, so context added on the way up never
//! hides the class. [`user_friendly_error`] recovers the class with a downcast.
//!
//! # Failure classes
//!
//! | Class | Raised by | Retryable |
//! |-------|-----------|-----------|
//! | [`NmkupError::FetchFailure`] | release sources, downloader | re-run |
//! | [`NmkupError::NoUpdatableRelease`] | release sources, selector | no |
//! | [`NmkupError::ReleaseNotFound`] | selector | no |
//! | [`NmkupError::InvalidSelection`] | interactive selector | no |
//! | [`NmkupError::StaleInstall`] | installer | no |
//! | [`NmkupError::CacheRead`] | freshness cache (logged, never fatal) | - |
//!
//! # Examples
//!
//! ```rust,no_run
//! use nmkup::core::{NmkupError, user_friendly_error};
//!
//! let err = anyhow::Error::from(NmkupError::ReleaseNotFound {
//!     tag: "v9.9.9".to_string(),
//! });
//! user_friendly_error(err).display();
//! ```

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// The main error type for nmkup operations.
///
/// Each variant is one failure class of the update pipeline. Variants carry the
/// values a user needs to understand the failure (URLs, tags, paths), never raw
/// library error types.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NmkupError {
    /// A release source or bundle URL could not be contacted, answered with a
    /// non-2xx status, or returned a body that could not be decoded.
    #[error("Failed to fetch {url}: {reason}")]
    FetchFailure {
        /// The URL that was requested
        url: String,
        /// Transport error, HTTP status or decode error
        reason: String,
    },

    /// No release offered by the source contains the required bundle asset.
    #[error("No release contains the bundle asset '{asset}'")]
    NoUpdatableRelease {
        /// Name of the required bundle asset
        asset: String,
    },

    /// The requested tag is not among the qualifying releases.
    #[error("Release '{tag}' not found")]
    ReleaseNotFound {
        /// The tag that was asked for
        tag: String,
    },

    /// Interactive input did not name one of the listed releases.
    #[error("Invalid selection '{input}': expected a number between 1 and {count}")]
    InvalidSelection {
        /// The raw line read from the prompt
        input: String,
        /// Number of candidates that were offered
        count: usize,
    },

    /// The uninstall hook, extraction or the final swap failed.
    ///
    /// Failures before the commit leave the live tree untouched; a failure
    /// during the commit is rolled back when possible.
    #[error("Install failed during {operation}: {reason}")]
    StaleInstall {
        /// The installer step that failed
        operation: String,
        /// What went wrong
        reason: String,
    },

    /// A cache record exists but cannot be read or parsed.
    ///
    /// Never fatal: the cache degrades to "absent" and the release is treated as stale.
    #[error("Unreadable cache record {path}: {reason}")]
    CacheRead {
        /// Path of the cache file
        path: String,
        /// Read or parse error
        reason: String,
    },

    /// The selection policy cannot be applied to the chosen source.
    #[error("Source '{source_name}' does not support {selector} selection")]
    UnsupportedSelector {
        /// Source identifier (`github`, `gcs`)
        source_name: String,
        /// Human readable selection policy
        selector: String,
    },

    /// The downloaded bundle does not match the hash published by the source.
    #[error("Checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// Hash advertised by the source
        expected: String,
        /// Hash of the downloaded file
        actual: String,
    },

    /// The installation root is a git checkout and must not be overwritten.
    #[error("Installation root {path} is managed by git")]
    ManagedByGit {
        /// Installation root
        path: String,
    },

    /// The installation root holds files that nmkup did not install.
    #[error("Installation root {path} is not empty and was not installed by nmkup")]
    UnsafeInstallRoot {
        /// Installation root
        path: String,
    },

    /// Rollback was requested but there is no previous tree to restore.
    #[error("No backup found at {path}")]
    NoBackup {
        /// Expected backup location
        path: String,
    },

    /// The configuration file is invalid.
    #[error("Configuration error: {message}")]
    ConfigError {
        /// What is wrong with the configuration
        message: String,
    },

    /// Anything else, with the full error chain folded into the message.
    #[error("{message}")]
    Other {
        /// Error message
        message: String,
    },
}

/// An error paired with optional details and a suggestion for the user.
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error
    pub error: NmkupError,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a context with no suggestion or details.
    #[must_use]
    pub const fn new(error: NmkupError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    /// Attach a suggestion, shown in green.
    #[must_use]
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Attach details, shown in yellow.
    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print the error block to stderr.
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error into an [`ErrorContext`] suitable for the terminal.
///
/// Typed [`NmkupError`]s anywhere in the chain get a tailored suggestion.
/// Anything else is reported with its full cause chain.
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    if let Some(nmkup_error) = error.chain().find_map(|e| e.downcast_ref::<NmkupError>()) {
        let mut ctx = create_error_context(nmkup_error.clone());
        // Context attached above the typed error is still worth showing.
        let outer = error.to_string();
        if outer != nmkup_error.to_string() && ctx.details.is_none() {
            ctx.details = Some(outer);
        }
        return ctx;
    }

    if let Some(io_error) = error.downcast_ref::<std::io::Error>()
        && io_error.kind() == std::io::ErrorKind::PermissionDenied
    {
        return ErrorContext::new(NmkupError::Other {
            message: error.to_string(),
        })
        .with_suggestion("Check ownership of the installation root and the cache directory");
    }

    let mut message = error.to_string();
    let chain: Vec<String> =
        error.chain().skip(1).map(std::string::ToString::to_string).collect();

    if !chain.is_empty() {
        message.push_str("\n\nCaused by:");
        for (i, cause) in chain.iter().enumerate() {
            message.push_str(&format!("\n  {}: {}", i + 1, cause));
        }
    }

    ErrorContext::new(NmkupError::Other {
        message,
    })
}

fn create_error_context(error: NmkupError) -> ErrorContext {
    match &error {
        NmkupError::FetchFailure { .. } => ErrorContext::new(error)
            .with_suggestion("Check your internet connection and run nmkup again"),

        NmkupError::NoUpdatableRelease { asset } => {
            let suggestion = format!(
                "Make sure the release publishes an asset named '{asset}', or try --source gcs"
            );
            ErrorContext::new(error).with_suggestion(suggestion)
        }

        NmkupError::ReleaseNotFound { .. } => ErrorContext::new(error)
            .with_suggestion("Run 'nmkup --interactive' to list the available releases"),

        NmkupError::InvalidSelection { .. } => ErrorContext::new(error)
            .with_suggestion("Enter the number shown next to a release, or press Enter for the first one"),

        NmkupError::StaleInstall { .. } => ErrorContext::new(error)
            .with_suggestion("Run 'nmkup --force' to retry, or 'nmkup --rollback' if a backup was kept"),

        NmkupError::ChecksumMismatch { .. } => ErrorContext::new(error)
            .with_suggestion("Run nmkup again; if it keeps failing the published bundle may be corrupt"),

        NmkupError::ManagedByGit { .. } => ErrorContext::new(error)
            .with_suggestion("Update the checkout with 'git pull' instead"),

        NmkupError::UnsafeInstallRoot { .. } => ErrorContext::new(error)
            .with_suggestion("Move the directory away, or pass --force to install over it"),

        NmkupError::NoBackup { .. } => ErrorContext::new(error)
            .with_suggestion("Set keep_backup = true in the configuration to keep the previous tree"),

        NmkupError::ConfigError { .. } => ErrorContext::new(error)
            .with_suggestion("Check ~/.nmkup/config.toml or the file passed with --config"),

        NmkupError::UnsupportedSelector { .. } => ErrorContext::new(error)
            .with_suggestion("Use --source github to pick a release by tag"),

        NmkupError::CacheRead { .. } | NmkupError::Other { .. } => ErrorContext::new(error),
    }
}
