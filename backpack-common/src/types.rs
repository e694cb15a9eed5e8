//! Shared draft workflow types
//!
//! Item processing status and workflow state are carried by events, so they
//! live here rather than in the draft crate.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Processing status of an uploaded item
///
/// Closed set: any raw backend string outside the known values maps to
/// `Unknown`, which is also used for items the backend no longer knows (404).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    New,
    Queued,
    Running,
    Completed,
    Failed,
    Unknown,
}

/// Aggregation bucket for an item status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusBucket {
    Processing,
    Completed,
    Failed,
}

impl ItemStatus {
    /// Parse a raw backend status string
    ///
    /// Returns `None` for an empty string (the backend omitted the status);
    /// unrecognised values become `Unknown`.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        Some(match raw.to_ascii_lowercase().as_str() {
            "new" => ItemStatus::New,
            "queued" => ItemStatus::Queued,
            "running" => ItemStatus::Running,
            "completed" => ItemStatus::Completed,
            "failed" => ItemStatus::Failed,
            _ => ItemStatus::Unknown,
        })
    }

    /// Still being processed by the backend
    pub fn is_processing(self) -> bool {
        matches!(self, ItemStatus::New | ItemStatus::Queued | ItemStatus::Running)
    }

    /// No further status queries are issued for this item
    pub fn is_terminal(self) -> bool {
        !self.is_processing()
    }

    /// `Unknown` settles in the failed bucket: terminal but not completed
    pub fn bucket(self) -> StatusBucket {
        match self {
            ItemStatus::New | ItemStatus::Queued | ItemStatus::Running => StatusBucket::Processing,
            ItemStatus::Completed => StatusBucket::Completed,
            ItemStatus::Failed | ItemStatus::Unknown => StatusBucket::Failed,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ItemStatus::New => "new",
            ItemStatus::Queued => "queued",
            ItemStatus::Running => "running",
            ItemStatus::Completed => "completed",
            ItemStatus::Failed => "failed",
            ItemStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Module creation workflow state
///
/// `Idle → Uploading → PendingProcessing → Generating → ReadyToReview →
/// Committing → Done → Idle`, with cancel routing back to `Idle` through
/// `Cancelling`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowState {
    Idle,
    Uploading,
    PendingProcessing,
    Generating,
    ReadyToReview,
    Committing,
    Done,
    /// Pending items are being deleted; nothing else may start
    Cancelling,
}

impl WorkflowState {
    /// Whether `self → next` is a legal forward transition
    ///
    /// Cancellation is checked separately with [`WorkflowState::can_cancel`].
    pub fn can_transition_to(self, next: WorkflowState) -> bool {
        use WorkflowState::*;
        matches!(
            (self, next),
            (Idle, Uploading)
                | (Uploading, PendingProcessing)
                // every upload in the batch failed
                | (Uploading, Idle)
                | (PendingProcessing, Generating)
                | (Generating, ReadyToReview)
                // manual regeneration
                | (ReadyToReview, Generating)
                | (ReadyToReview, Committing)
                | (Committing, Done)
                // commit rejected, draft kept for another attempt
                | (Committing, ReadyToReview)
                | (Done, Idle)
                | (Cancelling, Idle)
        )
    }

    /// Cancel is allowed from every non-terminal state except while an
    /// upload batch, a commit or another cancel is in flight
    pub fn can_cancel(self) -> bool {
        !matches!(
            self,
            WorkflowState::Uploading
                | WorkflowState::Committing
                | WorkflowState::Done
                | WorkflowState::Cancelling
        )
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkflowState::Idle => "IDLE",
            WorkflowState::Uploading => "UPLOADING",
            WorkflowState::PendingProcessing => "PENDING_PROCESSING",
            WorkflowState::Generating => "GENERATING",
            WorkflowState::ReadyToReview => "READY_TO_REVIEW",
            WorkflowState::Committing => "COMMITTING",
            WorkflowState::Done => "DONE",
            WorkflowState::Cancelling => "CANCELLING",
        };
        f.write_str(name)
    }
}
