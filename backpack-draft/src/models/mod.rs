//! Data models for backpack-draft
//!
//! - Draft module (ephemeral module-in-creation state)
//! - Learning goal drafts
//! - Progress aggregate over tracked items
//! - Files queued for upload

pub mod draft_module;
pub mod learning_goal;
pub mod progress;
pub mod upload;

pub use backpack_common::{ItemStatus, StatusBucket, WorkflowState};
pub use draft_module::{DraftField, DraftModule, SharedDraft, StatusUpdate};
pub use learning_goal::{LearningGoalDraft, LearningGoalPatch};
pub use progress::ProgressSummary;
pub use upload::UploadFile;
