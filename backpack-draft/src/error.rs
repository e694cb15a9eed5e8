//! Error types for backpack-draft
//!
//! Two layers:
//! - [`BackendError`]: one failed request to the backend, classified so the
//!   caller can decide between retrying, giving up, or surfacing it
//! - [`DraftError`]: workflow-level failures (illegal transitions, in-flight
//!   guards, rejected commits) wrapping backend and common errors

use backpack_common::WorkflowState;
use thiserror::Error;
use uuid::Uuid;

/// Backend request failure
#[derive(Debug, Error)]
pub enum BackendError {
    /// Network communication error (connection refused, timeout, reset)
    #[error("Network error: {0}")]
    Transport(String),

    /// Resource not found (404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Payload rejected by the backend (400/422)
    #[error("Validation error {status}: {message}")]
    Validation { status: u16, message: String },

    /// Any other non-success response
    #[error("API error {status}: {message}")]
    Server { status: u16, message: String },

    /// Request could not be built or response body could not be parsed
    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl BackendError {
    /// Worth retrying (polling only)
    pub fn is_transient(&self) -> bool {
        match self {
            BackendError::Transport(_) => true,
            BackendError::Server { status, .. } => *status >= 500,
            _ => false,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, BackendError::NotFound(_))
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            BackendError::Protocol(err.to_string())
        } else {
            BackendError::Transport(err.to_string())
        }
    }
}

/// Draft workflow error
#[derive(Debug, Error)]
pub enum DraftError {
    /// Requested operation is not legal in the current workflow state
    #[error("Invalid transition: {from} -> {to}")]
    InvalidTransition { from: WorkflowState, to: WorkflowState },

    /// Cancel requested while an upload batch, a commit or another cancel
    /// is in flight
    #[error("Cancel not allowed while {0}")]
    CancelNotAllowed(WorkflowState),

    /// The session already ended with a commit or a cancel
    #[error("Draft session {0} has ended")]
    SessionClosed(Uuid),

    /// Another upload batch for this draft has not settled yet
    #[error("Upload batch already in flight")]
    UploadInFlight,

    /// Another generation call for this draft has not returned yet
    #[error("Content generation already in flight")]
    GenerationInFlight,

    /// Operation needs at least one pending item
    #[error("Draft has no pending items")]
    NoPendingItems,

    /// Learning goal index outside the list
    #[error("Learning goal index {index} out of range (len {len})")]
    GoalIndexOutOfRange { index: usize, len: usize },

    /// Invalid caller input (empty batch, missing module name, ...)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Workflow was cancelled while the operation was running
    #[error("Workflow cancelled")]
    Cancelled,

    /// Commit partially failed and the created module was rolled back
    #[error(
        "Commit of module {module_id} rolled back: {failed_links} link(s) and {failed_goals} goal(s) failed"
    )]
    PartialCommit {
        module_id: String,
        failed_links: usize,
        failed_goals: usize,
    },

    /// Backend request failed
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for draft workflow operations
pub type DraftResult<T> = Result<T, DraftError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(BackendError::Transport("reset".into()).is_transient());
        assert!(BackendError::Server { status: 503, message: String::new() }.is_transient());
        assert!(!BackendError::Server { status: 409, message: String::new() }.is_transient());
        assert!(!BackendError::NotFound("x".into()).is_transient());
        assert!(!BackendError::Validation { status: 422, message: String::new() }.is_transient());
    }

    #[test]
    fn test_backend_error_wraps_transparently() {
        let err: DraftError = BackendError::NotFound("source:1".into()).into();
        assert_eq!(err.to_string(), "Not found: source:1");
    }
}
