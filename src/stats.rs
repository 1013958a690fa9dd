use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{ItemStatus, WorkItem};

/// Aggregate progress, derived from the item collection on every read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStatistics {
    pub total: usize,
    /// Completed + Failed.
    pub processed: usize,
    pub successful: usize,
    pub failed: usize,
    /// `processed / total`, or 0.0 for an empty collection.
    pub progress: f64,
    pub started_at: Option<DateTime<Utc>>,
    pub estimated_remaining_ms: Option<u64>,
}

impl RunStatistics {
    /// Count items by status. Timing fields are left empty.
    pub fn from_items(items: &[WorkItem]) -> Self {
        let mut successful = 0;
        let mut failed = 0;
        for item in items {
            match item.status {
                ItemStatus::Completed => successful += 1,
                ItemStatus::Failed => failed += 1,
                _ => {}
            }
        }

        let total = items.len();
        let processed = successful + failed;
        let progress = if total > 0 {
            processed as f64 / total as f64
        } else {
            0.0
        };

        Self {
            total,
            processed,
            successful,
            failed,
            progress,
            started_at: None,
            estimated_remaining_ms: None,
        }
    }

    /// Attach run timing to the counts.
    pub fn with_timing(
        mut self,
        started_at: Option<DateTime<Utc>>,
        estimated_remaining_ms: Option<u64>,
    ) -> Self {
        self.started_at = started_at;
        self.estimated_remaining_ms = estimated_remaining_ms;
        self
    }

    /// Progress as a percentage, for display.
    pub fn percent(&self) -> f64 {
        self.progress * 100.0
    }

    pub fn is_finished(&self) -> bool {
        self.total == self.processed
    }
}
