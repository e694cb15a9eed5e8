//! Progress aggregate over tracked items

use backpack_common::{ItemStatus, StatusBucket};
use serde::Serialize;

/// Aggregate of the tracked item statuses
///
/// `completed + failed + processing == total` always holds, and
/// `all_complete` is true exactly when `total > 0 && processing == 0`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProgressSummary {
    pub completed: usize,
    pub failed: usize,
    pub processing: usize,
    pub total: usize,
    /// round((completed + failed) / total * 100), 0 when nothing is tracked
    pub percent: u8,
    pub all_complete: bool,
}

impl ProgressSummary {
    pub fn from_statuses<I>(statuses: I) -> Self
    where
        I: IntoIterator<Item = ItemStatus>,
    {
        let mut summary = ProgressSummary::default();
        for status in statuses {
            match status.bucket() {
                StatusBucket::Completed => summary.completed += 1,
                StatusBucket::Failed => summary.failed += 1,
                StatusBucket::Processing => summary.processing += 1,
            }
            summary.total += 1;
        }

        summary.percent = if summary.total > 0 {
            let settled = (summary.completed + summary.failed) as f64;
            (settled / summary.total as f64 * 100.0).round() as u8
        } else {
            0
        };
        summary.all_complete = summary.total > 0 && summary.processing == 0;
        summary
    }

    pub fn settled(&self) -> usize {
        self.completed + self.failed
    }
}
