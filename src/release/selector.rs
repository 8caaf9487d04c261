use crate::core::NmkupError;
use crate::release::ReleaseDescriptor;
use anyhow::{Context, Result};
use std::fmt;
use std::io::{BufRead, Write};
use tracing::debug;

/// How one release is chosen out of a source's candidates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// The first (most recent) qualifying release.
    Latest,
    /// The release whose tag equals this string exactly.
    Tag(String),
    /// Ask the user, defaulting to the first entry.
    Interactive,
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Latest => f.write_str("latest"),
            Selector::Tag(tag) => write!(f, "tag '{tag}'"),
            Selector::Interactive => f.write_str("interactive"),
        }
    }
}

/// Source of the answer for [`Selector::Interactive`].
///
/// Returns the raw line the user typed. Tests plug in a closure with a canned
/// answer; the binary uses [`TerminalPrompt`].
pub trait SelectionPrompt {
    /// Present `candidates` and return the user's raw answer.
    fn choose(&mut self, candidates: &[ReleaseDescriptor]) -> Result<String>;
}

impl<F> SelectionPrompt for F
where
    F: FnMut(&[ReleaseDescriptor]) -> Result<String>,
{
    fn choose(&mut self, candidates: &[ReleaseDescriptor]) -> Result<String> {
        self(candidates)
    }
}

/// Prompt on stderr, answer on stdin.
pub struct TerminalPrompt {
    bundle_name: String,
}

impl TerminalPrompt {
    /// Prompt listing the `bundle_name` asset of each candidate.
    pub fn new(bundle_name: impl Into<String>) -> Self {
        Self {
            bundle_name: bundle_name.into(),
        }
    }

    fn render(&self, candidates: &[ReleaseDescriptor]) -> String {
        let mut out = String::from("Available releases:\n");
        for (i, candidate) in candidates.iter().enumerate() {
            let asset = candidate.asset(&self.bundle_name);
            let size = asset.map(|a| a.size).unwrap_or_default();
            let updated = asset
                .and_then(|a| a.updated_at)
                .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_default();
            out.push_str(&format!(
                "  {:>2}) {:<16} {:>10} bytes  {}\n",
                i + 1,
                candidate.label(),
                size,
                updated
            ));
        }
        out.push_str(&format!("Select a release [1-{}] (default 1): ", candidates.len()));
        out
    }
}

impl SelectionPrompt for TerminalPrompt {
    fn choose(&mut self, candidates: &[ReleaseDescriptor]) -> Result<String> {
        let mut stderr = std::io::stderr().lock();
        stderr.write_all(self.render(candidates).as_bytes())?;
        stderr.flush()?;

        let mut line = String::new();
        std::io::stdin().lock().read_line(&mut line).context("Failed to read selection")?;
        Ok(line)
    }
}

/// Turn a prompt answer into a zero-based index into `count` candidates.
///
/// Blank input selects the first entry.
pub fn parse_choice(input: &str, count: usize) -> Result<usize> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(0);
    }

    let invalid = || NmkupError::InvalidSelection {
        input: trimmed.to_string(),
        count,
    };

    let number: usize = trimmed.parse().map_err(|_| invalid())?;
    if number == 0 || number > count {
        return Err(invalid().into());
    }
    Ok(number - 1)
}

impl Selector {
    /// Pick one release from `candidates` (most recent first).
    ///
    /// An empty candidate list always fails with
    /// [`NmkupError::NoUpdatableRelease`] for `bundle_name`.
    pub fn select(
        &self,
        mut candidates: Vec<ReleaseDescriptor>,
        bundle_name: &str,
        prompt: &mut dyn SelectionPrompt,
    ) -> Result<ReleaseDescriptor> {
        if candidates.is_empty() {
            return Err(NmkupError::NoUpdatableRelease {
                asset: bundle_name.to_string(),
            }
            .into());
        }

        let index = match self {
            Selector::Latest => 0,
            Selector::Tag(tag) => candidates
                .iter()
                .position(|c| c.tag.as_deref() == Some(tag.as_str()))
                .ok_or_else(|| NmkupError::ReleaseNotFound {
                    tag: tag.clone(),
                })?,
            Selector::Interactive => {
                let answer = prompt.choose(&candidates)?;
                parse_choice(&answer, candidates.len())?
            }
        };

        let chosen = candidates.swap_remove(index);
        debug!("Selected release {} ({})", chosen.label(), self);
        Ok(chosen)
    }
}
