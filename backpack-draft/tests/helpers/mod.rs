//! Shared test helpers
//!
//! `ScriptedBackend` is an in-memory `ModuleBackend`: uploads get sequential
//! ids, status queries replay a per-file script (the last step repeats), and
//! every call the workflow makes is recorded for assertions.

#![allow(dead_code)]

use async_trait::async_trait;
use backpack_common::config::{CommitPolicy, TomlConfig};
use backpack_common::EventBus;
use backpack_draft::error::BackendError;
use backpack_draft::services::{
    BatchDeleteResponse, ContentRequest, CreateModuleRequest, CreatedItem, GeneratedLearningGoal,
    ItemStatusResponse, LearningGoalRequest, ModuleBackend, ModuleRecord, PreviewContentResponse,
};
use backpack_draft::{DraftWorkflow, UploadFile};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One scripted answer to a status query
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Status(&'static str),
    NotFound,
    ServerError,
}

/// Everything the workflow asked the backend to do
#[derive(Debug, Default)]
pub struct Calls {
    pub uploads: HashMap<String, String>,
    pub status_queries: HashMap<String, usize>,
    pub batch_deletes: Vec<Vec<String>>,
    pub previews: Vec<ContentRequest>,
    pub overview_requests: usize,
    pub goal_requests: usize,
    pub created_modules: Vec<CreateModuleRequest>,
    pub links: Vec<(String, String)>,
    pub goals: Vec<LearningGoalRequest>,
    pub deleted_modules: Vec<String>,
}

#[derive(Default)]
pub struct ScriptedBackend {
    next_id: AtomicUsize,
    failing_uploads: HashSet<String>,
    scripts: HashMap<String, Vec<Step>>,
    upload_delay: Option<Duration>,
    batch_delete_delay: Option<Duration>,
    generation_delay: Option<Duration>,
    preview: Option<PreviewContentResponse>,
    fail_preview: bool,
    fail_overview: bool,
    fail_goals: bool,
    failing_links: HashSet<String>,
    reject_module: bool,
    cursors: Mutex<HashMap<String, usize>>,
    pub calls: Mutex<Calls>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_upload(mut self, file_name: &str) -> Self {
        self.failing_uploads.insert(file_name.to_string());
        self
    }

    /// Status answers for the item uploaded from `file_name`
    pub fn script(mut self, file_name: &str, steps: Vec<Step>) -> Self {
        self.scripts.insert(file_name.to_string(), steps);
        self
    }

    pub fn upload_delay(mut self, delay: Duration) -> Self {
        self.upload_delay = Some(delay);
        self
    }

    pub fn batch_delete_delay(mut self, delay: Duration) -> Self {
        self.batch_delete_delay = Some(delay);
        self
    }

    /// Delay applied to preview, overview and goal generation
    pub fn generation_delay(mut self, delay: Duration) -> Self {
        self.generation_delay = Some(delay);
        self
    }

    pub fn fail_overview(mut self) -> Self {
        self.fail_overview = true;
        self
    }

    pub fn fail_goals(mut self) -> Self {
        self.fail_goals = true;
        self
    }

    pub fn preview(mut self, response: PreviewContentResponse) -> Self {
        self.preview = Some(response);
        self
    }

    pub fn fail_preview(mut self) -> Self {
        self.fail_preview = true;
        self
    }

    pub fn failing_link(mut self, item_id: &str) -> Self {
        self.failing_links.insert(item_id.to_string());
        self
    }

    pub fn reject_module(mut self) -> Self {
        self.reject_module = true;
        self
    }

    pub fn item_id(&self, file_name: &str) -> String {
        self.calls.lock().unwrap().uploads[file_name].clone()
    }

    pub fn status_queries(&self, item_id: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .status_queries
            .get(item_id)
            .copied()
            .unwrap_or(0)
    }

    fn file_of(&self, item_id: &str) -> Option<String> {
        let calls = self.calls.lock().unwrap();
        calls
            .uploads
            .iter()
            .find(|(_, id)| id.as_str() == item_id)
            .map(|(file, _)| file.clone())
    }

    async fn generation_pause(&self) {
        if let Some(delay) = self.generation_delay {
            tokio::time::sleep(delay).await;
        }
    }
}

fn model_unavailable() -> BackendError {
    BackendError::Server {
        status: 500,
        message: "model unavailable".to_string(),
    }
}

pub fn goal(description: &str) -> GeneratedLearningGoal {
    GeneratedLearningGoal {
        description: description.to_string(),
        takeaways: format!("{} takeaways", description),
        competencies: String::new(),
    }
}

pub fn default_preview() -> PreviewContentResponse {
    PreviewContentResponse {
        name: Some("Photosynthesis".to_string()),
        overview: Some("How plants turn light into sugar.".to_string()),
        learning_goals: vec![goal("1. Explain the light reactions"), goal("2. Describe the Calvin cycle")],
    }
}

#[async_trait]
impl ModuleBackend for ScriptedBackend {
    async fn create_item(&self, file: &UploadFile) -> Result<CreatedItem, BackendError> {
        if self.failing_uploads.contains(&file.file_name) {
            return Err(BackendError::Validation {
                status: 400,
                message: format!("unsupported file {}", file.file_name),
            });
        }

        let id = format!("source:{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.calls
            .lock()
            .unwrap()
            .uploads
            .insert(file.file_name.clone(), id.clone());

        if let Some(delay) = self.upload_delay {
            tokio::time::sleep(delay).await;
        }

        Ok(CreatedItem {
            id,
            title: Some(file.file_name.clone()),
            status: None,
            command_id: Some("command:ingest".to_string()),
            embedded: Some(false),
        })
    }

    async fn item_status(&self, item_id: &str) -> Result<ItemStatusResponse, BackendError> {
        *self
            .calls
            .lock()
            .unwrap()
            .status_queries
            .entry(item_id.to_string())
            .or_default() += 1;

        let steps = self
            .file_of(item_id)
            .and_then(|file| self.scripts.get(&file).cloned())
            .unwrap_or_else(|| vec![Step::Status("completed")]);

        let step = {
            let mut cursors = self.cursors.lock().unwrap();
            let cursor = cursors.entry(item_id.to_string()).or_default();
            let step = steps[(*cursor).min(steps.len() - 1)].clone();
            *cursor += 1;
            step
        };

        match step {
            Step::Status(status) => Ok(ItemStatusResponse {
                status: Some(status.to_string()),
                message: String::new(),
                processing_info: None,
                command_id: Some("command:ingest".to_string()),
            }),
            Step::NotFound => Err(BackendError::NotFound(format!("source {}", item_id))),
            Step::ServerError => Err(BackendError::Server {
                status: 503,
                message: "busy".to_string(),
            }),
        }
    }

    async fn batch_delete_items(&self, item_ids: &[String]) -> Result<BatchDeleteResponse, BackendError> {
        self.calls.lock().unwrap().batch_deletes.push(item_ids.to_vec());
        if let Some(delay) = self.batch_delete_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(BatchDeleteResponse {
            deleted: item_ids.len(),
            failed: 0,
            errors: None,
        })
    }

    async fn preview_content(&self, request: &ContentRequest) -> Result<PreviewContentResponse, BackendError> {
        self.calls.lock().unwrap().previews.push(request.clone());
        self.generation_pause().await;
        if self.fail_preview {
            return Err(model_unavailable());
        }
        Ok(self.preview.clone().unwrap_or_else(default_preview))
    }

    async fn generate_overview(&self, _request: &ContentRequest) -> Result<String, BackendError> {
        self.calls.lock().unwrap().overview_requests += 1;
        self.generation_pause().await;
        if self.fail_overview {
            return Err(model_unavailable());
        }
        Ok("A fresh overview.".to_string())
    }

    async fn generate_learning_goals(
        &self,
        _request: &ContentRequest,
    ) -> Result<Vec<GeneratedLearningGoal>, BackendError> {
        self.calls.lock().unwrap().goal_requests += 1;
        self.generation_pause().await;
        if self.fail_goals {
            return Err(model_unavailable());
        }
        Ok(vec![goal("- Name the pigments"), goal("- Measure oxygen output"), goal("- Compare leaves")])
    }

    async fn create_module(&self, request: &CreateModuleRequest) -> Result<ModuleRecord, BackendError> {
        self.calls.lock().unwrap().created_modules.push(request.clone());
        if self.reject_module {
            return Err(BackendError::Validation {
                status: 422,
                message: "name already taken".to_string(),
            });
        }
        Ok(ModuleRecord {
            id: "module:1".to_string(),
            name: request.name.clone(),
        })
    }

    async fn link_item(&self, module_id: &str, item_id: &str) -> Result<(), BackendError> {
        self.calls
            .lock()
            .unwrap()
            .links
            .push((module_id.to_string(), item_id.to_string()));
        if self.failing_links.contains(item_id) {
            return Err(BackendError::Transport("connection reset".to_string()));
        }
        Ok(())
    }

    async fn create_learning_goal(
        &self,
        _module_id: &str,
        goal: &LearningGoalRequest,
    ) -> Result<(), BackendError> {
        self.calls.lock().unwrap().goals.push(goal.clone());
        Ok(())
    }

    async fn delete_module(&self, module_id: &str) -> Result<(), BackendError> {
        self.calls
            .lock()
            .unwrap()
            .deleted_modules
            .push(module_id.to_string());
        Ok(())
    }
}

/// Config with a short poll interval
pub fn test_config() -> TomlConfig {
    let mut config = TomlConfig::default();
    config.polling.interval_ms = 10;
    config
}

pub fn compensating_config() -> TomlConfig {
    let mut config = test_config();
    config.commit.policy = CommitPolicy::Compensate;
    config
}

pub fn workflow_with(backend: Arc<ScriptedBackend>, config: &TomlConfig) -> DraftWorkflow {
    DraftWorkflow::new(backend, config, EventBus::new(256))
}

pub fn text_file(name: &str) -> UploadFile {
    UploadFile::new(name, format!("contents of {}", name).into_bytes())
}

pub fn files(names: &[&str]) -> Vec<UploadFile> {
    names.iter().map(|name| text_file(name)).collect()
}
