//! Decoding of the newline-delimited listing output.

use crate::repository::Repository;
use thiserror::Error;

/// Lines this short mark the end of the stream (blank lines, `[]`, stray
/// carriage returns).
const TERMINATOR_MAX_LEN: usize = 2;

/// Errors that can occur while decoding listing output.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// A page line was not a JSON array of repositories.
    #[error("unmarshaling repositories on line {line}: {source}")]
    Page {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    /// The single-repository payload was not a repository object.
    #[error("unmarshaling repository: {0}")]
    Repository(#[source] serde_json::Error),
}

/// Decodes listing output into pages of repositories.
///
/// Every line holds one page. Decoding stops at the first line of at most
/// two bytes; everything after it is ignored.
///
/// # Errors
///
/// Returns [`DecodeError::Page`] for the first malformed page; no pages are
/// returned in that case.
pub fn decode_pages(raw: &str) -> Result<Vec<Vec<Repository>>, DecodeError> {
    let mut pages = Vec::new();

    for (index, line) in raw.lines().enumerate() {
        if line.len() <= TERMINATOR_MAX_LEN {
            break;
        }

        let page: Vec<Repository> =
            serde_json::from_str(line).map_err(|source| DecodeError::Page {
                line: index + 1,
                source,
            })?;
        pages.push(page);
    }

    Ok(pages)
}

/// Decodes the payload of a single-repository lookup.
///
/// # Errors
///
/// Returns [`DecodeError::Repository`] if the payload is not a repository.
pub fn decode_repository(raw: &str) -> Result<Repository, DecodeError> {
    serde_json::from_str(raw.trim()).map_err(DecodeError::Repository)
}
