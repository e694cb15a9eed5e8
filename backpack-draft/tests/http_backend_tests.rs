//! HttpBackend against a fake backend served by axum on an ephemeral port

mod helpers;

use axum::extract::{Multipart, Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use backpack_common::config::{ApiConfig, TomlConfig};
use backpack_common::{EventBus, WorkflowState};
use backpack_draft::error::BackendError;
use backpack_draft::services::{ContentRequest, CreateModuleRequest, LearningGoalRequest, ModuleBackend};
use backpack_draft::{DraftWorkflow, HttpBackend};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// One request seen by the fake backend
#[derive(Debug, Clone)]
struct Hit {
    route: String,
    auth: Option<String>,
    body: Value,
}

type Hits = Arc<Mutex<Vec<Hit>>>;

fn record(hits: &Hits, route: impl Into<String>, headers: &HeaderMap, body: Value) {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    hits.lock().unwrap().push(Hit {
        route: route.into(),
        auth,
        body,
    });
}

async fn create_source(
    State(hits): State<Hits>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<Value>, StatusCode> {
    let mut fields = BTreeMap::new();
    while let Some(field) = multipart.next_field().await.map_err(|_| StatusCode::BAD_REQUEST)? {
        let name = field.name().unwrap_or_default().to_string();
        if name == "file" {
            let file_name = field.file_name().unwrap_or_default().to_string();
            let bytes = field.bytes().await.map_err(|_| StatusCode::BAD_REQUEST)?;
            fields.insert(name, json!({"file_name": file_name, "size": bytes.len()}));
        } else {
            let text = field.text().await.map_err(|_| StatusCode::BAD_REQUEST)?;
            fields.insert(name, Value::String(text));
        }
    }

    let file_name = fields["file"]["file_name"].as_str().unwrap_or_default().to_string();
    record(&hits, "POST /sources", &headers, json!(fields));
    if file_name.ends_with(".exe") {
        return Err(StatusCode::UNPROCESSABLE_ENTITY);
    }

    let count = hits.lock().unwrap().iter().filter(|h| h.route == "POST /sources").count();
    Ok(Json(json!({
        "id": format!("source:{}", count),
        "title": file_name,
        "command_id": "command:ingest"
    })))
}

async fn source_status(
    State(hits): State<Hits>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    record(&hits, format!("GET /sources/{}/status", id), &headers, Value::Null);
    if id == "source:missing" {
        return Err(StatusCode::NOT_FOUND);
    }
    Ok(Json(json!({"status": "completed", "message": "Done", "command_id": "command:ingest"})))
}

async fn batch_delete(State(hits): State<Hits>, headers: HeaderMap, Json(body): Json<Value>) -> Json<Value> {
    let count = body["source_ids"].as_array().map(Vec::len).unwrap_or(0);
    record(&hits, "POST /sources/batch-delete", &headers, body);
    Json(json!({"deleted": count, "failed": 0}))
}

async fn preview_content(State(hits): State<Hits>, headers: HeaderMap, Json(body): Json<Value>) -> Json<Value> {
    record(&hits, "POST /modules/preview-content", &headers, body);
    Json(json!({
        "name": "Cell biology",
        "overview": "Cells and their parts.",
        "learning_goals": [
            {"description": "1. Label a cell", "takeaways": "Organelles", "competencies": "Drawing"}
        ]
    }))
}

async fn generate_overview(State(hits): State<Hits>, headers: HeaderMap, Json(body): Json<Value>) -> Json<Value> {
    record(&hits, "POST /modules/generate-overview", &headers, body);
    Json(json!({"overview": "Regenerated overview."}))
}

async fn generate_goals(State(hits): State<Hits>, headers: HeaderMap, Json(body): Json<Value>) -> Json<Value> {
    record(&hits, "POST /modules/generate-learning-goals", &headers, body);
    Json(json!({"learning_goals": [{"description": "Explain mitosis"}]}))
}

async fn create_module(
    State(hits): State<Hits>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Json<Value>, (StatusCode, String)> {
    let name = body["name"].as_str().unwrap_or_default().to_string();
    record(&hits, "POST /modules", &headers, body);
    if name == "Duplicate" {
        return Err((StatusCode::UNPROCESSABLE_ENTITY, "name already taken".to_string()));
    }
    Ok(Json(json!({"id": "module:7", "name": name})))
}

async fn link_source(
    State(hits): State<Hits>,
    headers: HeaderMap,
    Path((module_id, source_id)): Path<(String, String)>,
) -> StatusCode {
    record(
        &hits,
        format!("POST /modules/{}/sources/{}", module_id, source_id),
        &headers,
        Value::Null,
    );
    StatusCode::OK
}

async fn create_goal(
    State(hits): State<Hits>,
    headers: HeaderMap,
    Path(module_id): Path<String>,
    Json(body): Json<Value>,
) -> StatusCode {
    record(&hits, format!("POST /modules/{}/learning-goals", module_id), &headers, body);
    StatusCode::CREATED
}

async fn delete_module(State(hits): State<Hits>, headers: HeaderMap, Path(module_id): Path<String>) -> StatusCode {
    record(&hits, format!("DELETE /modules/{}", module_id), &headers, Value::Null);
    StatusCode::NO_CONTENT
}

async fn spawn_fake_backend() -> (String, Hits) {
    let hits = Hits::default();
    let app = Router::new()
        .route("/api/sources", post(create_source))
        .route("/api/sources/batch-delete", post(batch_delete))
        .route("/api/sources/:id/status", get(source_status))
        .route("/api/modules", post(create_module))
        .route("/api/modules/preview-content", post(preview_content))
        .route("/api/modules/generate-overview", post(generate_overview))
        .route("/api/modules/generate-learning-goals", post(generate_goals))
        .route("/api/modules/:module_id", delete(delete_module))
        .route("/api/modules/:module_id/sources/:source_id", post(link_source))
        .route("/api/modules/:module_id/learning-goals", post(create_goal))
        .with_state(hits.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}", addr), hits)
}

fn client(base_url: &str, token: Option<&str>) -> HttpBackend {
    HttpBackend::new(&ApiConfig {
        base_url: base_url.to_string(),
        token: token.map(str::to_string),
        ..Default::default()
    })
    .unwrap()
}

fn routes(hits: &Hits) -> Vec<String> {
    hits.lock().unwrap().iter().map(|h| h.route.clone()).collect()
}

#[tokio::test]
async fn test_upload_sends_unlinked_async_multipart() {
    let (base_url, hits) = spawn_fake_backend().await;
    let backend = client(&base_url, None);

    let item = backend
        .create_item(&helpers::text_file("notes.md"))
        .await
        .unwrap();

    assert_eq!(item.id, "source:1");
    assert_eq!(item.command_id.as_deref(), Some("command:ingest"));

    let hit = hits.lock().unwrap()[0].clone();
    assert_eq!(hit.body["type"], "upload");
    assert_eq!(hit.body["modules"], "[]");
    assert_eq!(hit.body["embed"], "true");
    assert_eq!(hit.body["async_processing"], "true");
    assert_eq!(hit.body["file"]["file_name"], "notes.md");
    assert_eq!(hit.body["file"]["size"], "contents of notes.md".len());
}

#[tokio::test]
async fn test_rejected_upload_maps_to_validation_error() {
    let (base_url, _hits) = spawn_fake_backend().await;
    let backend = client(&base_url, None);

    let result = backend.create_item(&helpers::text_file("virus.exe")).await;

    assert!(matches!(result, Err(BackendError::Validation { status: 422, .. })));
}

#[tokio::test]
async fn test_status_query_and_not_found() {
    let (base_url, _hits) = spawn_fake_backend().await;
    let backend = client(&base_url, None);

    let status = backend.item_status("source:1").await.unwrap();
    assert_eq!(status.status.as_deref(), Some("completed"));
    assert_eq!(status.message, "Done");

    let missing = backend.item_status("source:missing").await;
    assert!(matches!(missing, Err(ref e) if e.is_not_found()));
}

#[tokio::test]
async fn test_batch_delete_sends_every_id() {
    let (base_url, hits) = spawn_fake_backend().await;
    let backend = client(&base_url, None);
    let ids = vec!["source:1".to_string(), "source:2".to_string()];

    let response = backend.batch_delete_items(&ids).await.unwrap();

    assert_eq!(response.deleted, 2);
    let hit = hits.lock().unwrap()[0].clone();
    assert_eq!(hit.route, "POST /sources/batch-delete");
    assert_eq!(hit.body, json!({"source_ids": ["source:1", "source:2"]}));
}

#[tokio::test]
async fn test_generation_endpoints() {
    let (base_url, hits) = spawn_fake_backend().await;
    let backend = client(&base_url, None);
    let request = ContentRequest {
        source_ids: vec!["source:1".to_string()],
        name: "Cells".to_string(),
    };

    let preview = backend.preview_content(&request).await.unwrap();
    assert_eq!(preview.name.as_deref(), Some("Cell biology"));
    assert_eq!(preview.learning_goals.len(), 1);

    let overview = backend.generate_overview(&request).await.unwrap();
    assert_eq!(overview, "Regenerated overview.");

    let goals = backend.generate_learning_goals(&request).await.unwrap();
    assert_eq!(goals[0].description, "Explain mitosis");
    assert_eq!(goals[0].takeaways, "");

    let hits = hits.lock().unwrap();
    assert_eq!(hits[0].body, json!({"source_ids": ["source:1"], "name": "Cells"}));
}

#[tokio::test]
async fn test_module_persistence_calls() {
    let (base_url, hits) = spawn_fake_backend().await;
    let backend = client(&base_url, Some("secret"));

    let module = backend
        .create_module(&CreateModuleRequest {
            name: "Cells".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(module.id, "module:7");

    backend.link_item(&module.id, "source:3").await.unwrap();
    backend
        .create_learning_goal(
            &module.id,
            &LearningGoalRequest {
                description: "Label a cell".to_string(),
                order: 0,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    backend.delete_module(&module.id).await.unwrap();

    assert_eq!(
        routes(&hits),
        vec![
            "POST /modules",
            "POST /modules/module:7/sources/source:3",
            "POST /modules/module:7/learning-goals",
            "DELETE /modules/module:7",
        ]
    );
    let hits = hits.lock().unwrap();
    assert!(hits.iter().all(|h| h.auth.as_deref() == Some("Bearer secret")));
    assert_eq!(hits[0].body, json!({"name": "Cells"}));
    assert_eq!(hits[2].body["order"], 0);
}

#[tokio::test]
async fn test_duplicate_module_maps_to_validation_error() {
    let (base_url, _hits) = spawn_fake_backend().await;
    let backend = client(&base_url, None);

    let result = backend
        .create_module(&CreateModuleRequest {
            name: "Duplicate".to_string(),
            ..Default::default()
        })
        .await;

    match result {
        Err(BackendError::Validation { status, message }) => {
            assert_eq!(status, 422);
            assert_eq!(message, "name already taken");
        }
        other => panic!("expected validation error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_unreachable_backend_is_transport_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let backend = client(&format!("http://{}", addr), None);
    let result = backend.item_status("source:1").await;

    assert!(matches!(result, Err(ref e @ BackendError::Transport(_)) if e.is_transient()));
}

#[tokio::test]
async fn test_workflow_over_http() {
    let (base_url, hits) = spawn_fake_backend().await;
    let mut config = TomlConfig::default();
    config.api.base_url = base_url.clone();
    config.polling.interval_ms = 10;

    let workflow = DraftWorkflow::new(Arc::new(client(&base_url, None)), &config, EventBus::new(64));
    workflow
        .upload(helpers::files(&["a.pdf", "b.pdf"]))
        .await
        .unwrap();
    workflow.process().await.unwrap();
    assert_eq!(workflow.state().await, WorkflowState::ReadyToReview);
    assert_eq!(workflow.snapshot().await.name(), "Cell biology");

    let committed = workflow.commit().await.unwrap();
    assert_eq!(committed.module_id, "module:7");
    assert_eq!(committed.linked_items, 2);
    assert_eq!(committed.persisted_goals, 1);

    let routes = routes(&hits);
    assert_eq!(routes.iter().filter(|r| *r == "POST /sources").count(), 2);
    assert_eq!(routes.iter().filter(|r| *r == "POST /modules/preview-content").count(), 1);
    assert_eq!(routes.iter().filter(|r| r.starts_with("POST /modules/module:7/sources/")).count(), 2);
}
