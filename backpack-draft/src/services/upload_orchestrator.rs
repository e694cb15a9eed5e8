//! Upload orchestration
//!
//! Submits every file of a batch as an independent "create item" request and
//! joins them all-settled: one rejected file never prevents the others from
//! being registered. Each acknowledged item id is added to the draft as soon
//! as its request returns. Acknowledgement means ingestion was queued, not
//! that it finished.
//!
//! Single-flight: while a batch is in flight, further batches are refused
//! with [`DraftError::UploadInFlight`].

use crate::error::{DraftError, DraftResult};
use crate::models::{SharedDraft, UploadFile};
use crate::services::backend::{CreatedItem, ModuleBackend};
use backpack_common::{DraftEvent, EventBus};
use chrono::Utc;
use futures::future::join_all;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Per-file result of an upload batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadOutcome {
    pub file_name: String,
    pub item_id: Option<String>,
    pub error: Option<String>,
}

impl UploadOutcome {
    pub fn is_success(&self) -> bool {
        self.item_id.is_some()
    }
}

/// Result of an upload batch
#[derive(Debug, Clone, Default)]
pub struct UploadReport {
    /// One entry per submitted file, in submission order
    pub outcomes: Vec<UploadOutcome>,
    /// Records of acknowledged items (status, processing handle)
    pub items: Vec<CreatedItem>,
}

impl UploadReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn item_ids(&self) -> Vec<String> {
        self.outcomes.iter().filter_map(|o| o.item_id.clone()).collect()
    }
}

/// Clears the in-flight flag when the batch settles or its future is dropped
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Concurrent batch uploader
pub struct UploadOrchestrator {
    backend: Arc<dyn ModuleBackend>,
    events: EventBus,
    session_id: Uuid,
    in_flight: AtomicBool,
}

impl UploadOrchestrator {
    pub fn new(backend: Arc<dyn ModuleBackend>, events: EventBus, session_id: Uuid) -> Self {
        Self {
            backend,
            events,
            session_id,
            in_flight: AtomicBool::new(false),
        }
    }

    /// Batch currently in flight
    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Upload a batch and register acknowledged ids in the draft
    pub async fn submit(&self, files: Vec<UploadFile>, draft: &SharedDraft) -> DraftResult<UploadReport> {
        if files.is_empty() {
            return Err(DraftError::InvalidInput("Upload batch is empty".to_string()));
        }

        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!(session_id = %self.session_id, "Upload batch ignored: another batch in flight");
            return Err(DraftError::UploadInFlight);
        }
        let _guard = InFlightGuard(&self.in_flight);

        info!(
            session_id = %self.session_id,
            files = files.len(),
            "Submitting upload batch"
        );

        let uploads = files.iter().map(|file| self.upload_one(file, draft));
        let results = join_all(uploads).await;

        let mut report = UploadReport::default();
        for (outcome, item) in results {
            report.outcomes.push(outcome);
            report.items.extend(item);
        }

        info!(
            session_id = %self.session_id,
            succeeded = report.succeeded(),
            failed = report.failed(),
            "Upload batch settled"
        );

        Ok(report)
    }

    async fn upload_one(
        &self,
        file: &UploadFile,
        draft: &SharedDraft,
    ) -> (UploadOutcome, Option<CreatedItem>) {
        match self.backend.create_item(file).await {
            Ok(item) => {
                let registered = draft.write().await.add_pending_item(item.id.clone());
                if registered {
                    self.events.emit_lossy(DraftEvent::ItemRegistered {
                        session_id: self.session_id,
                        item_id: item.id.clone(),
                        file_name: file.file_name.clone(),
                        timestamp: Utc::now(),
                    });
                }
                debug!(
                    session_id = %self.session_id,
                    file = %file.file_name,
                    item_id = %item.id,
                    "Upload acknowledged"
                );
                let outcome = UploadOutcome {
                    file_name: file.file_name.clone(),
                    item_id: Some(item.id.clone()),
                    error: None,
                };
                (outcome, Some(item))
            }
            Err(e) => {
                warn!(
                    session_id = %self.session_id,
                    file = %file.file_name,
                    error = %e,
                    "Upload rejected (other files continue)"
                );
                self.events.emit_lossy(DraftEvent::UploadFailed {
                    session_id: self.session_id,
                    file_name: file.file_name.clone(),
                    error: e.to_string(),
                    timestamp: Utc::now(),
                });
                let outcome = UploadOutcome {
                    file_name: file.file_name.clone(),
                    item_id: None,
                    error: Some(e.to_string()),
                };
                (outcome, None)
            }
        }
    }
}
