//! Repository metadata as returned by the listing call.

use serde::{Deserialize, Deserializer, Serialize};

/// A repository belonging to an organization.
///
/// Produced by decoding a listing page; never mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Repository {
    /// Full repository name in "owner/name" format.
    #[serde(rename = "full_name")]
    pub name: String,

    /// HTTPS clone URL.
    #[serde(rename = "clone_url", default, deserialize_with = "null_as_default")]
    pub url: String,

    /// SSH clone URL.
    #[serde(default, deserialize_with = "null_as_default")]
    pub ssh_url: String,

    /// Default branch name. Empty for repositories without any branch.
    #[serde(default, deserialize_with = "null_as_default")]
    pub default_branch: String,

    /// Whether the repository is archived.
    #[serde(default)]
    pub archived: bool,

    /// Primary language, if GitHub detected one.
    #[serde(default)]
    pub language: Option<String>,

    /// Visibility as reported by the API (`public`, `private`, `internal`).
    #[serde(default, deserialize_with = "null_as_default")]
    pub visibility: String,

    /// Whether the repository is a fork.
    #[serde(default)]
    pub fork: bool,

    /// Size in kilobytes. Zero means the repository has no content.
    #[serde(default)]
    pub size: u64,
}

impl Repository {
    /// Returns true if the repository has no content at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Returns the URL to clone from.
    #[must_use]
    pub fn clone_url(&self, use_https: bool) -> &str {
        if use_https {
            &self.url
        } else {
            &self.ssh_url
        }
    }

    /// Splits the full name into owner and short name.
    ///
    /// Names without an owner part return an empty owner.
    #[must_use]
    pub fn owner_and_name(&self) -> (&str, &str) {
        self.name.split_once('/').unwrap_or(("", self.name.as_str()))
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_api_fields() {
        let repo: Repository = serde_json::from_str(
            r#"{
                "full_name": "acme/widgets",
                "clone_url": "https://github.com/acme/widgets.git",
                "ssh_url": "git@github.com:acme/widgets.git",
                "default_branch": "main",
                "archived": true,
                "language": "Rust",
                "visibility": "public",
                "fork": false,
                "size": 42
            }"#,
        )
        .unwrap();

        assert_eq!(repo.name, "acme/widgets");
        assert_eq!(repo.clone_url(true), "https://github.com/acme/widgets.git");
        assert_eq!(repo.clone_url(false), "git@github.com:acme/widgets.git");
        assert_eq!(repo.default_branch, "main");
        assert!(repo.archived);
        assert_eq!(repo.language.as_deref(), Some("Rust"));
        assert_eq!(repo.size, 42);
        assert!(!repo.is_empty());
    }

    #[test]
    fn nulls_decode_to_defaults() {
        let repo: Repository = serde_json::from_str(
            r#"{"full_name": "acme/empty", "default_branch": null, "language": null, "size": 0}"#,
        )
        .unwrap();

        assert_eq!(repo.default_branch, "");
        assert_eq!(repo.language, None);
        assert!(repo.is_empty());
    }

    #[test]
    fn splits_owner_and_name() {
        let repo = Repository {
            name: "acme/widgets".to_string(),
            ..Default::default()
        };
        assert_eq!(repo.owner_and_name(), ("acme", "widgets"));

        let bare = Repository {
            name: "widgets".to_string(),
            ..Default::default()
        };
        assert_eq!(bare.owner_and_name(), ("", "widgets"));
    }
}
