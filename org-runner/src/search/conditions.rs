//! Filter dimensions for [`SearchOptions`](super::SearchOptions).
//!
//! With the `clap` feature the conditions derive `clap::ValueEnum` under the
//! same kebab-case names.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error returned when parsing a condition from its string form.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {kind} '{value}', expected one of: {expected}")]
pub struct ParseConditionError {
    kind: &'static str,
    value: String,
    expected: &'static str,
}

macro_rules! string_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            /// Returns the kebab-case name of the value.
            #[must_use]
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ParseConditionError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    _ => Err(ParseConditionError {
                        kind: $kind,
                        value: s.to_string(),
                        expected: concat!($($text, " "),+),
                    }),
                }
            }
        }
    };
}

/// Visibility filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "kebab-case")]
pub enum Visibility {
    /// No visibility filter.
    #[default]
    Any,
    Public,
    Private,
    Internal,
}

string_enum!(Visibility, "visibility", {
    Any => "any",
    Public => "public",
    Private => "private",
    Internal => "internal",
});

/// How archived repositories are treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "kebab-case")]
pub enum ArchiveCondition {
    #[default]
    IncludeArchived,
    OnlyArchived,
    OmitArchived,
}

string_enum!(ArchiveCondition, "archive condition", {
    IncludeArchived => "include-archived",
    OnlyArchived => "only-archived",
    OmitArchived => "omit-archived",
});

/// Fork filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "kebab-case")]
pub enum Source {
    #[default]
    All,
    OnlyForks,
    OnlyNonForks,
}

string_enum!(Source, "source", {
    All => "all",
    OnlyForks => "only-forks",
    OnlyNonForks => "only-non-forks",
});

/// Size filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "kebab-case")]
pub enum SizeCondition {
    #[default]
    All,
    NotEmpty,
    OnlyEmpty,
}

string_enum!(SizeCondition, "size condition", {
    All => "all",
    NotEmpty => "not-empty",
    OnlyEmpty => "only-empty",
});

/// Page selector for the listing call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    /// A specific page. Zero leaves the page unspecified.
    Number(i32),
    /// Fetch every page.
    All,
}

impl Default for Page {
    fn default() -> Self {
        Self::Number(0)
    }
}

impl From<i32> for Page {
    /// `-1` is the "all pages" sentinel.
    fn from(n: i32) -> Self {
        if n == -1 {
            Self::All
        } else {
            Self::Number(n)
        }
    }
}
