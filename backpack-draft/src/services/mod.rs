//! Backend client and the workflow components built on it

pub mod backend;
pub mod commit_controller;
pub mod content_generator;
pub mod http_backend;
pub mod status_poller;
pub mod status_resolver;
pub mod upload_orchestrator;

pub use backend::{
    BatchDeleteResponse, ContentRequest, CreateModuleRequest, CreatedItem, GeneratedLearningGoal,
    ItemStatusResponse, LearningGoalRequest, ModuleBackend, ModuleRecord, PreviewContentResponse,
};
pub use commit_controller::{CancelReport, CommitController, CommitReport};
pub use content_generator::{normalize_goals, ContentGenerator, GeneratedContent};
pub use http_backend::HttpBackend;
pub use status_poller::{ItemSeed, StatusPoller};
pub use status_resolver::{resolve_status, StatusEvidence};
pub use upload_orchestrator::{UploadOrchestrator, UploadOutcome, UploadReport};
