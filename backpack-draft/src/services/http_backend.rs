//! HTTP client for the Backpack backend API
//!
//! All routes live under `{base_url}/api`. Status codes are mapped onto the
//! [`BackendError`] taxonomy: 404 → `NotFound`, 400/422 → `Validation`, any
//! other non-success → `Server`, connection problems → `Transport`.

use crate::error::BackendError;
use crate::models::UploadFile;
use crate::services::backend::{
    BatchDeleteRequest, BatchDeleteResponse, ContentRequest, CreateModuleRequest, CreatedItem,
    GenerateLearningGoalsResponse, GenerateOverviewResponse, GeneratedLearningGoal,
    ItemStatusResponse, LearningGoalRequest, ModuleBackend, ModuleRecord, PreviewContentResponse,
};
use async_trait::async_trait;
use backpack_common::config::ApiConfig;
use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;

const USER_AGENT: &str = concat!("backpack-draft/", env!("CARGO_PKG_VERSION"));

/// Backend API client
pub struct HttpBackend {
    http_client: reqwest::Client,
    api_root: String,
    token: Option<String>,
}

impl HttpBackend {
    /// Create new client from `[api]` configuration
    pub fn new(config: &ApiConfig) -> Result<Self, BackendError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        Ok(Self {
            http_client,
            api_root: format!("{}/api", config.base_url.trim_end_matches('/')),
            token: config.token.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_root, path)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder, context: &str) -> Result<Response, BackendError> {
        let response = self.authorized(builder).send().await?;
        let status = response.status();

        if status.is_success() {
            return Ok(response);
        }

        let error_text = response.text().await.unwrap_or_default();
        tracing::debug!(%status, context, body = %error_text, "Backend request rejected");

        Err(match status {
            StatusCode::NOT_FOUND => BackendError::NotFound(context.to_string()),
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => BackendError::Validation {
                status: status.as_u16(),
                message: error_text,
            },
            _ => BackendError::Server {
                status: status.as_u16(),
                message: error_text,
            },
        })
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        context: &str,
    ) -> Result<T, BackendError> {
        let response = self.send(builder, context).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| BackendError::Protocol(format!("{}: {}", context, e)))
    }
}

#[async_trait]
impl ModuleBackend for HttpBackend {
    async fn create_item(&self, file: &UploadFile) -> Result<CreatedItem, BackendError> {
        let part = Part::bytes(file.content.clone())
            .file_name(file.file_name.clone())
            .mime_str(&file.mime_type)
            .map_err(|e| BackendError::Protocol(format!("mime type {}: {}", file.mime_type, e)))?;

        // No module association yet: the link is made at commit time
        let form = Form::new()
            .text("type", "upload")
            .text("modules", "[]")
            .text("embed", "true")
            .text("async_processing", "true")
            .part("file", part);

        tracing::debug!(file = %file.file_name, bytes = file.size(), "Uploading item");

        self.send_json(
            self.http_client.post(self.url("/sources")).multipart(form),
            &format!("upload {}", file.file_name),
        )
        .await
    }

    async fn item_status(&self, item_id: &str) -> Result<ItemStatusResponse, BackendError> {
        self.send_json(
            self.http_client.get(self.url(&format!("/sources/{}/status", item_id))),
            &format!("source {}", item_id),
        )
        .await
    }

    async fn batch_delete_items(&self, item_ids: &[String]) -> Result<BatchDeleteResponse, BackendError> {
        let request = BatchDeleteRequest {
            source_ids: item_ids.to_vec(),
        };
        self.send_json(
            self.http_client
                .post(self.url("/sources/batch-delete"))
                .json(&request),
            "batch delete",
        )
        .await
    }

    async fn preview_content(&self, request: &ContentRequest) -> Result<PreviewContentResponse, BackendError> {
        self.send_json(
            self.http_client
                .post(self.url("/modules/preview-content"))
                .json(request),
            "preview content",
        )
        .await
    }

    async fn generate_overview(&self, request: &ContentRequest) -> Result<String, BackendError> {
        let response: GenerateOverviewResponse = self
            .send_json(
                self.http_client
                    .post(self.url("/modules/generate-overview"))
                    .json(request),
                "generate overview",
            )
            .await?;
        Ok(response.overview)
    }

    async fn generate_learning_goals(
        &self,
        request: &ContentRequest,
    ) -> Result<Vec<GeneratedLearningGoal>, BackendError> {
        let response: GenerateLearningGoalsResponse = self
            .send_json(
                self.http_client
                    .post(self.url("/modules/generate-learning-goals"))
                    .json(request),
                "generate learning goals",
            )
            .await?;
        Ok(response.learning_goals)
    }

    async fn create_module(&self, request: &CreateModuleRequest) -> Result<ModuleRecord, BackendError> {
        self.send_json(
            self.http_client.post(self.url("/modules")).json(request),
            "create module",
        )
        .await
    }

    async fn link_item(&self, module_id: &str, item_id: &str) -> Result<(), BackendError> {
        self.send(
            self.http_client
                .post(self.url(&format!("/modules/{}/sources/{}", module_id, item_id))),
            &format!("link {} -> {}", item_id, module_id),
        )
        .await?;
        Ok(())
    }

    async fn create_learning_goal(
        &self,
        module_id: &str,
        goal: &LearningGoalRequest,
    ) -> Result<(), BackendError> {
        self.send(
            self.http_client
                .post(self.url(&format!("/modules/{}/learning-goals", module_id)))
                .json(goal),
            &format!("learning goal {} of {}", goal.order, module_id),
        )
        .await?;
        Ok(())
    }

    async fn delete_module(&self, module_id: &str) -> Result<(), BackendError> {
        self.send(
            self.http_client
                .delete(self.url(&format!("/modules/{}", module_id))),
            &format!("module {}", module_id),
        )
        .await?;
        Ok(())
    }
}
