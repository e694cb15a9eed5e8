//! Module-draft workflow controller
//!
//! Owns the draft and the workflow state machine, and hands the draft
//! explicitly to each component:
//!
//! ```text
//! Idle → Uploading → PendingProcessing → Generating → ReadyToReview → Committing → Done → Idle
//! ```
//!
//! Cancel routes any non-terminal state back to `Idle` through `Cancelling`
//! (batch-delete + reset), except while an upload batch or a commit is in
//! flight. All methods take `&self`, so a host can call `cancel` from another
//! task while `process` is polling.
//!
//! A session ends with its commit or its cancel; the workflow refuses new
//! uploads afterwards, so a new draft needs a new `DraftWorkflow`.

use crate::error::{DraftError, DraftResult};
use crate::models::{DraftModule, LearningGoalDraft, ProgressSummary, SharedDraft, UploadFile};
use crate::services::{
    CancelReport, CommitController, CommitReport, ContentGenerator, GeneratedContent, ItemSeed,
    ModuleBackend, StatusPoller, UploadOrchestrator, UploadReport,
};
use backpack_common::config::TomlConfig;
use backpack_common::{DraftEvent, EventBus, WorkflowState};
use chrono::Utc;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// One module-creation wizard session
pub struct DraftWorkflow {
    session_id: Uuid,
    draft: SharedDraft,
    state: RwLock<WorkflowState>,
    closed: AtomicBool,
    seeds: RwLock<HashMap<String, ItemSeed>>,
    cancel_token: RwLock<CancellationToken>,
    events: EventBus,
    uploader: UploadOrchestrator,
    poller: StatusPoller,
    generator: ContentGenerator,
    committer: CommitController,
}

impl DraftWorkflow {
    pub fn new(backend: Arc<dyn ModuleBackend>, config: &TomlConfig, events: EventBus) -> Self {
        let session_id = Uuid::new_v4();
        let draft = DraftModule::new(config.drafts.goal_insert).into_shared();

        Self {
            session_id,
            draft,
            state: RwLock::new(WorkflowState::Idle),
            closed: AtomicBool::new(false),
            seeds: RwLock::new(HashMap::new()),
            cancel_token: RwLock::new(CancellationToken::new()),
            uploader: UploadOrchestrator::new(Arc::clone(&backend), events.clone(), session_id),
            poller: StatusPoller::new(Arc::clone(&backend), events.clone(), session_id, &config.polling),
            generator: ContentGenerator::new(Arc::clone(&backend), events.clone(), session_id),
            committer: CommitController::new(backend, config.commit.policy, session_id),
            events,
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub async fn state(&self) -> WorkflowState {
        *self.state.read().await
    }

    /// Shared handle to the draft, for user edits and inspection
    pub fn draft(&self) -> SharedDraft {
        Arc::clone(&self.draft)
    }

    /// Copy of the current draft
    pub async fn snapshot(&self) -> DraftModule {
        self.draft.read().await.clone()
    }

    /// Apply a user edit to the draft
    pub async fn edit<R>(&self, f: impl FnOnce(&mut DraftModule) -> R) -> R {
        let mut draft = self.draft.write().await;
        f(&mut draft)
    }

    pub async fn progress(&self) -> ProgressSummary {
        self.draft.read().await.progress()
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Whether the session already ended with a commit or a cancel
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    // ------------------------------------------------------------------
    // Upload
    // ------------------------------------------------------------------

    /// Upload the session's batch
    ///
    /// Fires `Idle → Uploading` once; a second batch while the first is in
    /// flight is refused with [`DraftError::UploadInFlight`]. When at least
    /// one file was acknowledged the workflow moves to `PendingProcessing`;
    /// when every file failed it returns to `Idle` and may be retried. Once the
    /// session has been committed or cancelled, uploads are refused with
    /// [`DraftError::SessionClosed`].
    pub async fn upload(&self, files: Vec<UploadFile>) -> DraftResult<UploadReport> {
        if files.is_empty() {
            return Err(DraftError::InvalidInput("Upload batch is empty".to_string()));
        }

        {
            let mut state = self.state.write().await;
            if self.is_closed() {
                return Err(DraftError::SessionClosed(self.session_id));
            }
            match *state {
                WorkflowState::Idle => {}
                WorkflowState::Uploading => return Err(DraftError::UploadInFlight),
                from => {
                    return Err(DraftError::InvalidTransition {
                        from,
                        to: WorkflowState::Uploading,
                    })
                }
            }
            self.set_state(&mut state, WorkflowState::Uploading);
        }

        let result = self.uploader.submit(files, &self.draft).await;

        let report = match result {
            Ok(report) => report,
            Err(e) => {
                self.transition(WorkflowState::Idle).await?;
                return Err(e);
            }
        };

        {
            let mut seeds = self.seeds.write().await;
            for item in &report.items {
                seeds.insert(item.id.clone(), ItemSeed::from(item));
            }
        }

        if report.succeeded() > 0 {
            self.transition(WorkflowState::PendingProcessing).await?;
        } else {
            warn!(session_id = %self.session_id, "Every upload in the batch failed");
            self.transition(WorkflowState::Idle).await?;
        }
        Ok(report)
    }

    // ------------------------------------------------------------------
    // Processing + automatic generation
    // ------------------------------------------------------------------

    /// Poll until every item settles, then run automatic generation once
    ///
    /// `PendingProcessing → Generating → ReadyToReview`. A generation failure
    /// still lands in `ReadyToReview` (draft unchanged) and is returned so the
    /// caller can show it and offer manual regeneration.
    pub async fn process(&self) -> DraftResult<ProgressSummary> {
        self.require(WorkflowState::PendingProcessing, WorkflowState::Generating)
            .await?;

        let token = self.cancel_token.read().await.clone();
        let seeds = self.seeds.read().await.clone();
        let summary = self.poller.poll_until_settled(&self.draft, &seeds, &token).await;

        if token.is_cancelled() {
            return Err(DraftError::Cancelled);
        }
        if !summary.all_complete {
            debug!(session_id = %self.session_id, "Nothing left to process");
            return Ok(summary);
        }

        info!(
            session_id = %self.session_id,
            completed = summary.completed,
            failed = summary.failed,
            "Ingestion settled, starting automatic generation"
        );
        self.transition(WorkflowState::Generating).await?;

        let candidate_name = self.draft.read().await.name().to_string();
        let generated: DraftResult<GeneratedContent> = self
            .cancellable(&token, self.generator.generate_initial(&self.draft, &candidate_name))
            .await;

        if token.is_cancelled() {
            return Err(DraftError::Cancelled);
        }
        self.transition(WorkflowState::ReadyToReview).await?;
        generated.map(|_| summary)
    }

    // ------------------------------------------------------------------
    // Manual regeneration
    // ------------------------------------------------------------------

    /// Regenerate only the overview (`ReadyToReview → Generating → ReadyToReview`)
    pub async fn regenerate_overview(&self) -> DraftResult<String> {
        self.regenerate(move |draft| self.generator.regenerate_overview(draft)).await
    }

    /// Regenerate only the learning goals, replacing the whole list
    pub async fn regenerate_learning_goals(&self) -> DraftResult<Vec<LearningGoalDraft>> {
        self.regenerate(move |draft| self.generator.regenerate_learning_goals(draft))
            .await
    }

    async fn regenerate<'a, T, F, Fut>(&'a self, call: F) -> DraftResult<T>
    where
        F: FnOnce(&'a SharedDraft) -> Fut,
        Fut: Future<Output = DraftResult<T>> + 'a,
    {
        if self.generator.is_in_flight() {
            return Err(DraftError::GenerationInFlight);
        }
        {
            let mut state = self.state.write().await;
            if *state != WorkflowState::ReadyToReview {
                return Err(DraftError::InvalidTransition {
                    from: *state,
                    to: WorkflowState::Generating,
                });
            }
            self.set_state(&mut state, WorkflowState::Generating);
        }

        let token = self.cancel_token.read().await.clone();
        let result = self.cancellable(&token, call(&self.draft)).await;

        if token.is_cancelled() {
            return Err(DraftError::Cancelled);
        }
        self.transition(WorkflowState::ReadyToReview).await?;
        result
    }

    // ------------------------------------------------------------------
    // Commit / cancel
    // ------------------------------------------------------------------

    /// Persist the draft (explicit user confirmation)
    ///
    /// `ReadyToReview → Committing → Done → Idle` on success; back to
    /// `ReadyToReview` with the draft intact when the commit is rejected.
    pub async fn commit(&self) -> DraftResult<CommitReport> {
        // state check and entry share one write lock
        self.transition(WorkflowState::Committing).await?;

        match self.committer.commit(&self.draft).await {
            Ok(report) => {
                self.transition(WorkflowState::Done).await?;
                self.events.emit_lossy(DraftEvent::Committed {
                    session_id: self.session_id,
                    module_id: report.module_id.clone(),
                    linked_items: report.linked_items,
                    persisted_goals: report.persisted_goals,
                    timestamp: Utc::now(),
                });
                self.seeds.write().await.clear();
                self.closed.store(true, Ordering::SeqCst);
                self.transition(WorkflowState::Idle).await?;
                Ok(report)
            }
            Err(e) => {
                warn!(session_id = %self.session_id, error = %e, "Commit failed");
                self.transition(WorkflowState::ReadyToReview).await?;
                Err(e)
            }
        }
    }

    /// Discard the draft: delete every pending item, reset, return to `Idle`
    ///
    /// The workflow sits in `Cancelling` until the delete returns, so commit,
    /// upload and regeneration are refused meanwhile.
    pub async fn cancel(&self) -> DraftResult<CancelReport> {
        {
            let mut state = self.state.write().await;
            if !state.can_cancel() {
                return Err(DraftError::CancelNotAllowed(*state));
            }
            self.set_state(&mut state, WorkflowState::Cancelling);
        }

        // stop polling/generation before the draft is reset under them
        {
            let mut token = self.cancel_token.write().await;
            token.cancel();
            *token = CancellationToken::new();
        }

        let report = self.committer.cancel(&self.draft).await;
        self.seeds.write().await.clear();
        self.closed.store(true, Ordering::SeqCst);
        self.transition(WorkflowState::Idle).await?;

        self.events.emit_lossy(DraftEvent::Cancelled {
            session_id: self.session_id,
            deleted_items: report.deleted,
            timestamp: Utc::now(),
        });
        Ok(report)
    }

    // ------------------------------------------------------------------
    // State machine helpers
    // ------------------------------------------------------------------

    async fn require(&self, expected: WorkflowState, next: WorkflowState) -> DraftResult<()> {
        let state = *self.state.read().await;
        if state != expected {
            return Err(DraftError::InvalidTransition { from: state, to: next });
        }
        Ok(())
    }

    async fn transition(&self, next: WorkflowState) -> DraftResult<()> {
        let mut state = self.state.write().await;
        if !state.can_transition_to(next) {
            return Err(DraftError::InvalidTransition { from: *state, to: next });
        }
        self.set_state(&mut state, next);
        Ok(())
    }

    fn set_state(&self, state: &mut WorkflowState, next: WorkflowState) {
        let old_state = *state;
        *state = next;
        info!(session_id = %self.session_id, from = %old_state, to = %next, "Workflow state changed");
        self.events.emit_lossy(DraftEvent::StateChanged {
            session_id: self.session_id,
            old_state,
            new_state: next,
            timestamp: Utc::now(),
        });
    }

    /// Run `fut` unless the session is cancelled first; the future is dropped
    /// on cancel so it can never write into the reset draft
    async fn cancellable<T>(
        &self,
        token: &CancellationToken,
        fut: impl Future<Output = DraftResult<T>>,
    ) -> DraftResult<T> {
        tokio::select! {
            _ = token.cancelled() => Err(DraftError::Cancelled),
            result = fut => result,
        }
    }
}
