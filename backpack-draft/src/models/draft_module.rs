//! Draft module state container
//!
//! The draft is the ephemeral, unpersisted module-in-creation. It is written
//! by four producers (upload orchestrator, status poller, content generator,
//! user edits) and read by the commit controller. All transitions here are
//! pure in-memory updates; no I/O.
//!
//! Invariants kept by every mutation:
//! - the keys of `item_statuses` are exactly the ids in `pending_item_ids`
//! - `learning_goals[i].order == i`

use crate::error::{DraftError, DraftResult};
use crate::models::learning_goal::{LearningGoalDraft, LearningGoalPatch};
use crate::models::progress::ProgressSummary;
use backpack_common::config::GoalInsertPolicy;
use backpack_common::ItemStatus;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Draft shared between the workflow and its components
pub type SharedDraft = Arc<RwLock<DraftModule>>;

/// Scalar draft field assignment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DraftField {
    Name(String),
    Description(String),
    Overview(Option<String>),
    DueDate(Option<NaiveDate>),
    Prerequisites(Option<String>),
    TargetCourse(Option<String>),
}

/// Result of [`DraftModule::update_status`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusUpdate {
    /// Id is not tracked by this draft; nothing written
    Untracked,
    /// Same status already recorded; nothing written
    Unchanged,
    /// Status replaced
    Changed { old: ItemStatus },
}

/// In-progress module
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DraftModule {
    name: String,
    description: String,
    overview: Option<String>,
    due_date: Option<NaiveDate>,
    prerequisites: Option<String>,
    target_course_id: Option<String>,
    pending_item_ids: Vec<String>,
    item_statuses: HashMap<String, ItemStatus>,
    learning_goals: Vec<LearningGoalDraft>,
    has_generated_content: bool,
    #[serde(skip)]
    goal_insert: GoalInsertPolicy,
}

impl DraftModule {
    pub fn new(goal_insert: GoalInsertPolicy) -> Self {
        Self {
            goal_insert,
            ..Default::default()
        }
    }

    pub fn into_shared(self) -> SharedDraft {
        Arc::new(RwLock::new(self))
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn overview(&self) -> Option<&str> {
        self.overview.as_deref()
    }

    pub fn due_date(&self) -> Option<NaiveDate> {
        self.due_date
    }

    pub fn prerequisites(&self) -> Option<&str> {
        self.prerequisites.as_deref()
    }

    pub fn target_course_id(&self) -> Option<&str> {
        self.target_course_id.as_deref()
    }

    pub fn pending_item_ids(&self) -> &[String] {
        &self.pending_item_ids
    }

    pub fn item_status(&self, item_id: &str) -> Option<ItemStatus> {
        self.item_statuses.get(item_id).copied()
    }

    pub fn item_statuses(&self) -> &HashMap<String, ItemStatus> {
        &self.item_statuses
    }

    pub fn learning_goals(&self) -> &[LearningGoalDraft] {
        &self.learning_goals
    }

    pub fn has_generated_content(&self) -> bool {
        self.has_generated_content
    }

    pub fn is_tracked(&self, item_id: &str) -> bool {
        self.item_statuses.contains_key(item_id)
    }

    /// True when every field holds its initial default
    pub fn is_pristine(&self) -> bool {
        *self == DraftModule::new(self.goal_insert)
    }

    /// Aggregate over the tracked item statuses
    pub fn progress(&self) -> ProgressSummary {
        ProgressSummary::from_statuses(
            self.pending_item_ids
                .iter()
                .filter_map(|id| self.item_statuses.get(id).copied()),
        )
    }

    // ------------------------------------------------------------------
    // Pending items
    // ------------------------------------------------------------------

    /// Register an uploaded item in the processing bucket
    ///
    /// Returns false (and changes nothing) if the id is already tracked.
    pub fn add_pending_item(&mut self, item_id: impl Into<String>) -> bool {
        let item_id = item_id.into();
        if self.item_statuses.contains_key(&item_id) {
            return false;
        }
        self.item_statuses.insert(item_id.clone(), ItemStatus::New);
        self.pending_item_ids.push(item_id);
        true
    }

    /// Stop tracking an item; id and status are removed together
    pub fn remove_pending_item(&mut self, item_id: &str) -> bool {
        if self.item_statuses.remove(item_id).is_none() {
            return false;
        }
        self.pending_item_ids.retain(|id| id != item_id);
        true
    }

    /// Record a resolved status; writes only on delta
    pub fn update_status(&mut self, item_id: &str, status: ItemStatus) -> StatusUpdate {
        match self.item_statuses.get_mut(item_id) {
            None => StatusUpdate::Untracked,
            Some(current) if *current == status => StatusUpdate::Unchanged,
            Some(current) => {
                let old = *current;
                *current = status;
                StatusUpdate::Changed { old }
            }
        }
    }

    // ------------------------------------------------------------------
    // Scalar fields
    // ------------------------------------------------------------------

    pub fn set_field(&mut self, field: DraftField) {
        match field {
            DraftField::Name(name) => self.name = name,
            DraftField::Description(description) => self.description = description,
            DraftField::Overview(overview) => self.overview = overview,
            DraftField::DueDate(due_date) => self.due_date = due_date,
            DraftField::Prerequisites(prerequisites) => self.prerequisites = prerequisites,
            DraftField::TargetCourse(course_id) => self.target_course_id = course_id,
        }
    }

    // ------------------------------------------------------------------
    // Learning goals
    // ------------------------------------------------------------------

    /// Add a goal per the configured insert policy; returns its index
    pub fn add_learning_goal(&mut self, description: impl Into<String>) -> usize {
        let goal = LearningGoalDraft::new(description);
        let index = match self.goal_insert {
            GoalInsertPolicy::Append => {
                self.learning_goals.push(goal);
                self.learning_goals.len() - 1
            }
            GoalInsertPolicy::Prepend => {
                self.learning_goals.insert(0, goal);
                0
            }
        };
        self.reindex_goals();
        index
    }

    pub fn update_learning_goal(&mut self, index: usize, patch: LearningGoalPatch) -> DraftResult<()> {
        let len = self.learning_goals.len();
        let goal = self
            .learning_goals
            .get_mut(index)
            .ok_or(DraftError::GoalIndexOutOfRange { index, len })?;
        patch.apply(goal);
        Ok(())
    }

    pub fn remove_learning_goal(&mut self, index: usize) -> DraftResult<LearningGoalDraft> {
        let len = self.learning_goals.len();
        if index >= len {
            return Err(DraftError::GoalIndexOutOfRange { index, len });
        }
        let removed = self.learning_goals.remove(index);
        self.reindex_goals();
        Ok(removed)
    }

    /// Replace overview and the whole goal list in one step
    pub fn set_generated_content(&mut self, overview: Option<String>, goals: Vec<LearningGoalDraft>) {
        self.overview = overview;
        self.learning_goals = goals;
        self.reindex_goals();
        self.has_generated_content = true;
    }

    /// Overview-only regeneration; goals and name untouched
    pub fn set_overview(&mut self, overview: String) {
        self.overview = Some(overview);
    }

    /// Goals-only regeneration; discards manual edits
    pub fn replace_learning_goals(&mut self, goals: Vec<LearningGoalDraft>) {
        self.learning_goals = goals;
        self.reindex_goals();
    }

    /// Restore every field to its initial default (insert policy is kept)
    pub fn reset(&mut self) {
        *self = DraftModule::new(self.goal_insert);
    }

    fn reindex_goals(&mut self) {
        for (order, goal) in self.learning_goals.iter_mut().enumerate() {
            goal.order = order;
        }
    }
}
