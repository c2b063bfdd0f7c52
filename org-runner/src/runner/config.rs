//! Runner configuration.

use std::path::{Path, PathBuf};

/// Program used for GitHub API calls.
pub const DEFAULT_GH_PROGRAM: &str = "gh";

/// Where a [`Runner`](super::Runner) keeps working copies and which `gh`
/// binary it calls.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Root of the working copies and cache entries.
    base_dir: PathBuf,
    /// Program invoked for listing and lookups.
    gh_program: String,
}

impl RunnerConfig {
    /// Creates a configuration keeping working copies below `base_dir`.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            gh_program: DEFAULT_GH_PROGRAM.to_string(),
        }
    }

    /// Sets the program used instead of `gh`.
    #[must_use]
    pub fn with_gh_program(mut self, gh_program: impl Into<String>) -> Self {
        self.gh_program = gh_program.into();
        self
    }

    /// Returns the working-copy root.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Returns the program used for GitHub API calls.
    pub fn gh_program(&self) -> &str {
        &self.gh_program
    }
}

impl Default for RunnerConfig {
    /// Keeps working copies in `org-runner` below the system temp directory.
    fn default() -> Self {
        Self::new(std::env::temp_dir().join("org-runner"))
    }
}
