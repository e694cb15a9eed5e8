//! Backend contract
//!
//! The ingestion service, the generative content service and the module
//! persistence API are external collaborators. Everything the draft workflow
//! needs from them goes through [`ModuleBackend`]; [`super::HttpBackend`] is
//! the production implementation.

use crate::error::BackendError;
use crate::models::{LearningGoalDraft, UploadFile};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Item record returned when an upload is acknowledged
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedItem {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    /// Status as reported in list/summary views
    #[serde(default)]
    pub status: Option<String>,
    /// Processing handle for asynchronous ingestion
    #[serde(default)]
    pub command_id: Option<String>,
    /// Whether the item already carries embedded content
    #[serde(default)]
    pub embedded: Option<bool>,
}

/// `GET /sources/{id}/status` response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemStatusResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub processing_info: Option<serde_json::Value>,
    #[serde(default)]
    pub command_id: Option<String>,
}

/// `POST /sources/batch-delete` request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchDeleteRequest {
    pub source_ids: Vec<String>,
}

/// `POST /sources/batch-delete` response
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchDeleteResponse {
    pub deleted: usize,
    #[serde(default)]
    pub failed: usize,
    #[serde(default)]
    pub errors: Option<Vec<String>>,
}

/// Input of every generation endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentRequest {
    pub source_ids: Vec<String>,
    #[serde(default)]
    pub name: String,
}

/// Learning goal as produced by the generative service
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedLearningGoal {
    pub description: String,
    #[serde(default)]
    pub takeaways: String,
    #[serde(default)]
    pub competencies: String,
}

/// `POST /modules/preview-content` response
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewContentResponse {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub overview: Option<String>,
    #[serde(default)]
    pub learning_goals: Vec<GeneratedLearningGoal>,
}

/// `POST /modules/generate-overview` response
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateOverviewResponse {
    pub overview: String,
}

/// `POST /modules/generate-learning-goals` response
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateLearningGoalsResponse {
    #[serde(default)]
    pub learning_goals: Vec<GeneratedLearningGoal>,
}

/// `POST /modules` request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateModuleRequest {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prerequisites: Option<String>,
}

/// Persisted module record (only the fields the workflow reads)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleRecord {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// `POST /modules/{id}/learning-goals` request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearningGoalRequest {
    pub description: String,
    pub takeaways: String,
    pub competencies: String,
    pub order: usize,
}

impl From<&LearningGoalDraft> for LearningGoalRequest {
    fn from(goal: &LearningGoalDraft) -> Self {
        Self {
            description: goal.description.clone(),
            takeaways: goal.takeaways.clone(),
            competencies: goal.competencies.clone(),
            order: goal.order,
        }
    }
}

/// Operations the draft workflow needs from the backend
#[async_trait]
pub trait ModuleBackend: Send + Sync {
    /// Upload a file as a new item with no module link and async processing
    async fn create_item(&self, file: &UploadFile) -> Result<CreatedItem, BackendError>;

    /// Query processing status of one item (`NotFound` for 404)
    async fn item_status(&self, item_id: &str) -> Result<ItemStatusResponse, BackendError>;

    /// Delete a set of items in one call
    async fn batch_delete_items(&self, item_ids: &[String]) -> Result<BatchDeleteResponse, BackendError>;

    /// Generate name, overview and learning goals from items
    async fn preview_content(&self, request: &ContentRequest) -> Result<PreviewContentResponse, BackendError>;

    /// Generate only an overview
    async fn generate_overview(&self, request: &ContentRequest) -> Result<String, BackendError>;

    /// Generate only learning goals
    async fn generate_learning_goals(
        &self,
        request: &ContentRequest,
    ) -> Result<Vec<GeneratedLearningGoal>, BackendError>;

    /// Create the persistent module
    async fn create_module(&self, request: &CreateModuleRequest) -> Result<ModuleRecord, BackendError>;

    /// Link an item to a module (idempotent on the backend)
    async fn link_item(&self, module_id: &str, item_id: &str) -> Result<(), BackendError>;

    /// Persist one learning goal for a module
    async fn create_learning_goal(
        &self,
        module_id: &str,
        goal: &LearningGoalRequest,
    ) -> Result<(), BackendError>;

    /// Delete a module (commit compensation)
    async fn delete_module(&self, module_id: &str) -> Result<(), BackendError>;
}
