//! Run summary types.

use serde::Serialize;

/// Counts of an organization run.
///
/// `found >= inspected >= processed` holds for every summary returned by a
/// run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Repositories returned by the listing.
    pub found: usize,

    /// Repositories evaluated against the filters.
    pub inspected: usize,

    /// Repositories accepted by the filters and handed to the processor.
    pub processed: usize,
}

impl RunSummary {
    /// Creates a summary for a listing of `found` repositories.
    #[must_use]
    pub fn new(found: usize) -> Self {
        Self {
            found,
            ..Default::default()
        }
    }

    /// Records one inspected repository and whether it was accepted.
    pub fn record(&mut self, accepted: bool) {
        self.inspected += 1;
        if accepted {
            self.processed += 1;
        }
    }

    /// Repositories rejected by the filters.
    #[must_use]
    pub fn filtered_out(&self) -> usize {
        self.inspected - self.processed
    }
}
