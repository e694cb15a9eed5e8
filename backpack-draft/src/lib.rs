//! backpack-draft library
//!
//! Module-creation workflow for the Backpack learning platform: upload
//! source material, track its ingestion, generate an overview and learning
//! goals, let the user review them, then commit a persistent module or
//! discard everything.

pub mod error;
pub mod models;
pub mod services;
pub mod workflow;

pub use error::{BackendError, DraftError, DraftResult};
pub use models::{DraftField, DraftModule, LearningGoalDraft, LearningGoalPatch, ProgressSummary, UploadFile};
pub use services::{CancelReport, CommitReport, HttpBackend, ModuleBackend, UploadReport};
pub use workflow::DraftWorkflow;
