//! TOML profile supplying defaults for the command-line flags.
//!
//! ```toml
//! base-dir = "/var/cache/org-runner"
//! https = true
//! workers = 4
//! cache-key = "nightly"
//! subset = ["/go.mod", "/go.sum"]
//!
//! [search]
//! languages = ["Go"]
//! archived = "omit-archived"
//! source = "only-non-forks"
//! page = "all"
//! cache-secs = 3600
//! ```

use org_runner::{ArchiveCondition, Page, SizeCondition, Source, Visibility};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while loading a profile.
#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("Failed to read profile '{path}': {source}")]
    IoError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse profile '{path}': {source}")]
    TomlError {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

/// Defaults for a run, overridden by explicit flags.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Profile {
    #[serde(default)]
    pub base_dir: Option<PathBuf>,
    #[serde(default)]
    pub https: bool,
    #[serde(default)]
    pub subset: Vec<String>,
    #[serde(default)]
    pub cache_key: Option<String>,
    #[serde(default)]
    pub workers: Option<usize>,
    #[serde(default)]
    pub fail_fast: bool,
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub search: SearchProfile,
}

/// The `[search]` table.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct SearchProfile {
    #[serde(default)]
    pub languages: Vec<String>,
    #[serde(default)]
    pub archived: Option<ArchiveCondition>,
    #[serde(default)]
    pub visibility: Option<Visibility>,
    #[serde(default)]
    pub source: Option<Source>,
    #[serde(default)]
    pub size: Option<SizeCondition>,
    #[serde(default)]
    pub per_page: Option<i32>,
    #[serde(default)]
    pub page: Option<PageSetting>,
    #[serde(default)]
    pub cache_secs: Option<u64>,
}

/// Page number or `"all"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum PageSetting {
    Number(i32),
    Keyword(PageKeyword),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageKeyword {
    All,
}

impl From<PageSetting> for Page {
    fn from(setting: PageSetting) -> Self {
        match setting {
            PageSetting::Number(n) => Page::from(n),
            PageSetting::Keyword(PageKeyword::All) => Page::All,
        }
    }
}

/// Loads a profile from `path`.
pub fn load_profile(path: &Path) -> Result<Profile, ProfileError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ProfileError::IoError {
        path: path.display().to_string(),
        source,
    })?;
    toml::from_str(&contents).map_err(|source| ProfileError::TomlError {
        path: path.display().to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_profile(temp: &TempDir, contents: &str) -> PathBuf {
        let path = temp.path().join("profile.toml");
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn parses_full_profile() {
        let temp = TempDir::new().unwrap();
        let path = write_profile(
            &temp,
            r#"
base-dir = "/var/cache/org-runner"
https = true
workers = 4
cache-key = "nightly"
subset = ["/go.mod"]
fail-fast = true

[search]
languages = ["Go", "Rust"]
archived = "omit-archived"
visibility = "internal"
source = "only-non-forks"
size = "not-empty"
per-page = 50
page = "all"
cache-secs = 3600
"#,
        );

        let profile = load_profile(&path).unwrap();
        assert_eq!(profile.base_dir, Some(PathBuf::from("/var/cache/org-runner")));
        assert!(profile.https);
        assert_eq!(profile.workers, Some(4));
        assert_eq!(profile.cache_key.as_deref(), Some("nightly"));
        assert_eq!(profile.subset, vec!["/go.mod"]);
        assert!(profile.fail_fast);
        assert!(!profile.debug);

        let search = profile.search;
        assert_eq!(search.languages, vec!["Go", "Rust"]);
        assert_eq!(search.archived, Some(ArchiveCondition::OmitArchived));
        assert_eq!(search.visibility, Some(Visibility::Internal));
        assert_eq!(search.source, Some(Source::OnlyNonForks));
        assert_eq!(search.size, Some(SizeCondition::NotEmpty));
        assert_eq!(search.per_page, Some(50));
        assert_eq!(search.page.map(Page::from), Some(Page::All));
        assert_eq!(search.cache_secs, Some(3600));
    }

    #[test]
    fn numeric_page_is_a_page_number() {
        let temp = TempDir::new().unwrap();
        let path = write_profile(&temp, "[search]\npage = 3\n");
        let page = load_profile(&path).unwrap().search.page.map(Page::from);
        assert_eq!(page, Some(Page::Number(3)));
    }

    #[test]
    fn empty_profile_uses_defaults() {
        let temp = TempDir::new().unwrap();
        let path = write_profile(&temp, "");
        let profile = load_profile(&path).unwrap();
        assert!(profile.base_dir.is_none());
        assert!(profile.search.languages.is_empty());
        assert!(profile.search.archived.is_none());
    }

    #[test]
    fn reports_missing_file() {
        let temp = TempDir::new().unwrap();
        let error = load_profile(&temp.path().join("missing.toml")).unwrap_err();
        assert!(matches!(error, ProfileError::IoError { .. }));
        assert!(error.to_string().contains("missing.toml"));
    }

    #[test]
    fn reports_invalid_toml() {
        let temp = TempDir::new().unwrap();
        let path = write_profile(&temp, "workers = [4");
        let error = load_profile(&path).unwrap_err();
        assert!(matches!(error, ProfileError::TomlError { .. }));
    }

    #[test]
    fn rejects_unknown_conditions() {
        let temp = TempDir::new().unwrap();
        let path = write_profile(&temp, "[search]\narchived = \"sometimes\"\n");
        assert!(matches!(
            load_profile(&path),
            Err(ProfileError::TomlError { .. })
        ));
    }
}
