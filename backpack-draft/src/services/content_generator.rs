//! Content generation
//!
//! Three entry points, all reading the pending item ids from the draft:
//! - [`ContentGenerator::generate_initial`]: name, overview and goals after
//!   ingestion settles
//! - [`ContentGenerator::regenerate_overview`]: overview only
//! - [`ContentGenerator::regenerate_learning_goals`]: destructive replace of
//!   the goal list
//!
//! At most one call is in flight per generator. Draft fields are written only
//! after the backend answered successfully, never partially.

use crate::error::{DraftError, DraftResult};
use crate::models::{DraftField, LearningGoalDraft, SharedDraft};
use crate::services::backend::{ContentRequest, GeneratedLearningGoal, ModuleBackend};
use backpack_common::{DraftEvent, EventBus};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

/// Content applied to the draft by initial generation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeneratedContent {
    pub name: Option<String>,
    pub overview: Option<String>,
    pub learning_goals: Vec<LearningGoalDraft>,
}

/// Generative content client bound to one draft
pub struct ContentGenerator {
    backend: Arc<dyn ModuleBackend>,
    events: EventBus,
    session_id: Uuid,
    in_flight: Mutex<()>,
}

impl ContentGenerator {
    pub fn new(backend: Arc<dyn ModuleBackend>, events: EventBus, session_id: Uuid) -> Self {
        Self {
            backend,
            events,
            session_id,
            in_flight: Mutex::new(()),
        }
    }

    /// A generation call is pending
    pub fn is_in_flight(&self) -> bool {
        self.in_flight.try_lock().is_err()
    }

    /// Generate name, overview and learning goals from all pending items
    ///
    /// `candidate_name` is sent as context when the draft has no name yet. A
    /// generated name replaces the draft name only when non-empty.
    pub async fn generate_initial(
        &self,
        draft: &SharedDraft,
        candidate_name: &str,
    ) -> DraftResult<GeneratedContent> {
        let _guard = self.in_flight.try_lock().map_err(|_| DraftError::GenerationInFlight)?;
        let mut request = self.request_from(draft).await?;
        if request.name.is_empty() {
            request.name = candidate_name.to_string();
        }

        info!(
            session_id = %self.session_id,
            sources = request.source_ids.len(),
            "Generating module content"
        );

        let response = self.backend.preview_content(&request).await.map_err(|e| {
            warn!(session_id = %self.session_id, error = %e, "Content generation failed");
            e
        })?;

        let content = GeneratedContent {
            name: response.name.filter(|n| !n.trim().is_empty()),
            overview: response.overview,
            learning_goals: normalize_goals(response.learning_goals),
        };

        {
            let mut draft = draft.write().await;
            if let Some(name) = &content.name {
                draft.set_field(DraftField::Name(name.clone()));
            }
            draft.set_generated_content(content.overview.clone(), content.learning_goals.clone());
        }

        self.events.emit_lossy(DraftEvent::ContentGenerated {
            session_id: self.session_id,
            overview_updated: true,
            learning_goals: Some(content.learning_goals.len()),
            timestamp: Utc::now(),
        });

        Ok(content)
    }

    /// Regenerate the overview; goals and name are left untouched
    pub async fn regenerate_overview(&self, draft: &SharedDraft) -> DraftResult<String> {
        let _guard = self.in_flight.try_lock().map_err(|_| DraftError::GenerationInFlight)?;
        let request = self.request_from(draft).await?;

        info!(session_id = %self.session_id, "Regenerating overview");
        let overview = self.backend.generate_overview(&request).await?;

        draft.write().await.set_overview(overview.clone());
        self.events.emit_lossy(DraftEvent::ContentGenerated {
            session_id: self.session_id,
            overview_updated: true,
            learning_goals: None,
            timestamp: Utc::now(),
        });

        Ok(overview)
    }

    /// Regenerate learning goals, replacing the whole list (manual edits are
    /// discarded)
    pub async fn regenerate_learning_goals(&self, draft: &SharedDraft) -> DraftResult<Vec<LearningGoalDraft>> {
        let _guard = self.in_flight.try_lock().map_err(|_| DraftError::GenerationInFlight)?;
        let request = self.request_from(draft).await?;

        info!(session_id = %self.session_id, "Regenerating learning goals");
        let goals = normalize_goals(self.backend.generate_learning_goals(&request).await?);

        let stored = {
            let mut draft = draft.write().await;
            draft.replace_learning_goals(goals);
            draft.learning_goals().to_vec()
        };
        self.events.emit_lossy(DraftEvent::ContentGenerated {
            session_id: self.session_id,
            overview_updated: false,
            learning_goals: Some(stored.len()),
            timestamp: Utc::now(),
        });

        Ok(stored)
    }

    async fn request_from(&self, draft: &SharedDraft) -> DraftResult<ContentRequest> {
        let draft = draft.read().await;
        if draft.pending_item_ids().is_empty() {
            return Err(DraftError::NoPendingItems);
        }
        Ok(ContentRequest {
            source_ids: draft.pending_item_ids().to_vec(),
            name: draft.name().to_string(),
        })
    }
}

/// Clean generated goals: strip list markers, drop empty entries, assign order
pub fn normalize_goals(goals: Vec<GeneratedLearningGoal>) -> Vec<LearningGoalDraft> {
    goals
        .into_iter()
        .filter_map(|goal| {
            let description = strip_list_marker(&goal.description);
            if description.is_empty() {
                return None;
            }
            Some(LearningGoalDraft::with_details(
                description,
                goal.takeaways.trim(),
                goal.competencies.trim(),
            ))
        })
        .enumerate()
        .map(|(order, goal)| LearningGoalDraft { order, ..goal })
        .collect()
}

fn strip_list_marker(text: &str) -> &str {
    text.trim()
        .trim_start_matches(|c: char| c.is_ascii_digit() || matches!(c, '.' | '-' | '*' | ')' | ' '))
        .trim()
}
