//! Finalize / commit controller
//!
//! Commit: create the module, then link every pending item and persist every
//! learning goal. Links and goals are independent best-effort calls issued
//! concurrently. Under [`CommitPolicy::BestEffort`] failed sub-steps are only
//! reported; under [`CommitPolicy::Compensate`] the freshly created module is
//! deleted again and the draft is kept for another attempt.
//!
//! Cancel: one batch-delete covering every pending item (including items
//! still processing), then reset the draft.

use crate::error::{DraftError, DraftResult};
use crate::models::{DraftModule, SharedDraft};
use crate::services::backend::{CreateModuleRequest, LearningGoalRequest, ModuleBackend};
use backpack_common::config::CommitPolicy;
use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Outcome of a successful commit
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommitReport {
    pub module_id: String,
    pub linked_items: usize,
    pub failed_links: Vec<String>,
    pub persisted_goals: usize,
    pub failed_goals: Vec<usize>,
}

impl CommitReport {
    pub fn is_complete(&self) -> bool {
        self.failed_links.is_empty() && self.failed_goals.is_empty()
    }
}

/// Outcome of a cancel
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CancelReport {
    /// Ids covered by the batch-delete request
    pub requested: Vec<String>,
    pub deleted: usize,
    pub failed: usize,
    pub errors: Vec<String>,
}

/// Commits or discards a draft
pub struct CommitController {
    backend: Arc<dyn ModuleBackend>,
    policy: CommitPolicy,
    session_id: Uuid,
}

impl CommitController {
    pub fn new(backend: Arc<dyn ModuleBackend>, policy: CommitPolicy, session_id: Uuid) -> Self {
        Self {
            backend,
            policy,
            session_id,
        }
    }

    /// Persist the draft as a module; the draft is reset on success
    ///
    /// Module creation failures (including validation rejections) are
    /// returned unchanged and leave the draft intact.
    pub async fn commit(&self, draft: &SharedDraft) -> DraftResult<CommitReport> {
        let snapshot = draft.read().await.clone();
        let request = module_request(&snapshot)?;

        info!(
            session_id = %self.session_id,
            name = %request.name,
            items = snapshot.pending_item_ids().len(),
            goals = snapshot.learning_goals().len(),
            "Committing draft module"
        );

        let module = self.backend.create_module(&request).await?;
        let module_id = module.id;

        let links = snapshot.pending_item_ids().iter().map(|item_id| {
            let module_id = module_id.as_str();
            async move {
                match self.backend.link_item(module_id, item_id).await {
                    Ok(()) => None,
                    Err(e) => {
                        warn!(module_id, item_id = %item_id, error = %e, "Link failed");
                        Some(item_id.clone())
                    }
                }
            }
        });
        let goals = snapshot.learning_goals().iter().map(|goal| {
            let module_id = module_id.as_str();
            let body = LearningGoalRequest::from(goal);
            async move {
                match self.backend.create_learning_goal(module_id, &body).await {
                    Ok(()) => None,
                    Err(e) => {
                        warn!(module_id, order = body.order, error = %e, "Goal persist failed");
                        Some(body.order)
                    }
                }
            }
        });

        let (link_results, goal_results) = futures::join!(join_all(links), join_all(goals));
        let failed_links: Vec<String> = link_results.into_iter().flatten().collect();
        let failed_goals: Vec<usize> = goal_results.into_iter().flatten().collect();

        let report = CommitReport {
            linked_items: snapshot.pending_item_ids().len() - failed_links.len(),
            persisted_goals: snapshot.learning_goals().len() - failed_goals.len(),
            module_id: module_id.clone(),
            failed_links,
            failed_goals,
        };

        if !report.is_complete() && self.policy == CommitPolicy::Compensate {
            warn!(
                session_id = %self.session_id,
                module_id = %module_id,
                failed_links = report.failed_links.len(),
                failed_goals = report.failed_goals.len(),
                "Partial commit, deleting created module"
            );
            if let Err(e) = self.backend.delete_module(&module_id).await {
                error!(module_id = %module_id, error = %e, "Compensating module delete failed");
            }
            return Err(DraftError::PartialCommit {
                module_id,
                failed_links: report.failed_links.len(),
                failed_goals: report.failed_goals.len(),
            });
        }

        draft.write().await.reset();

        info!(
            session_id = %self.session_id,
            module_id = %report.module_id,
            linked = report.linked_items,
            goals = report.persisted_goals,
            complete = report.is_complete(),
            "Draft committed"
        );
        Ok(report)
    }

    /// Delete every pending item and reset the draft
    ///
    /// The draft is reset even when the delete call fails; the failure is
    /// reported in the returned [`CancelReport`].
    pub async fn cancel(&self, draft: &SharedDraft) -> CancelReport {
        let requested = draft.read().await.pending_item_ids().to_vec();
        let mut report = CancelReport {
            requested: requested.clone(),
            ..Default::default()
        };

        if !requested.is_empty() {
            match self.backend.batch_delete_items(&requested).await {
                Ok(response) => {
                    report.deleted = response.deleted;
                    report.failed = response.failed;
                    report.errors = response.errors.unwrap_or_default();
                    if report.failed > 0 {
                        warn!(
                            session_id = %self.session_id,
                            failed = report.failed,
                            "Some items could not be deleted"
                        );
                    }
                }
                Err(e) => {
                    error!(session_id = %self.session_id, error = %e, "Batch delete failed");
                    report.failed = requested.len();
                    report.errors.push(e.to_string());
                }
            }
        }

        draft.write().await.reset();
        info!(
            session_id = %self.session_id,
            requested = report.requested.len(),
            deleted = report.deleted,
            "Draft discarded"
        );
        report
    }
}

/// Build the module-create payload; description falls back to the overview
fn module_request(draft: &DraftModule) -> DraftResult<CreateModuleRequest> {
    let name = draft.name().trim();
    if name.is_empty() {
        return Err(DraftError::InvalidInput("Module name is required".to_string()));
    }

    let description = Some(draft.description().trim())
        .filter(|d| !d.is_empty())
        .or_else(|| draft.overview().map(str::trim).filter(|o| !o.is_empty()))
        .map(str::to_string);

    Ok(CreateModuleRequest {
        name: name.to_string(),
        description,
        course_id: draft.target_course_id().map(str::to_string),
        due_date: draft.due_date(),
        prerequisites: draft.prerequisites().map(str::to_string),
    })
}
