//! Item status polling
//!
//! Every pending item gets its own polling loop on a fixed interval. All
//! loops run concurrently inside the caller's task; there is no ordering
//! between items, and because draft updates are keyed by item id the
//! aggregate converges regardless of arrival order.
//!
//! Per item:
//! - query while the resolved status is new/queued/running
//! - stop on completed/failed
//! - 404 → `Unknown` (terminal, no retry)
//! - any other error → retry; after `max_attempts` consecutive failures
//!   the item is marked `Failed`
//!
//! Draft writes and events happen only when the resolved status changes.

use crate::error::BackendError;
use crate::models::{ProgressSummary, SharedDraft, StatusUpdate};
use crate::services::backend::{CreatedItem, ModuleBackend};
use crate::services::status_resolver::{resolve_status, StatusEvidence};
use backpack_common::config::PollingConfig;
use backpack_common::{DraftEvent, EventBus, ItemStatus};
use chrono::Utc;
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// What was known about an item when it was acknowledged
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemSeed {
    pub item_id: String,
    pub summary_status: Option<ItemStatus>,
    pub command_id: Option<String>,
    pub embedded: bool,
}

impl From<&CreatedItem> for ItemSeed {
    fn from(item: &CreatedItem) -> Self {
        Self {
            item_id: item.id.clone(),
            summary_status: item.status.as_deref().and_then(ItemStatus::parse),
            command_id: item.command_id.clone(),
            embedded: item.embedded.unwrap_or(false),
        }
    }
}

/// Concurrent per-item status poller
pub struct StatusPoller {
    backend: Arc<dyn ModuleBackend>,
    events: EventBus,
    session_id: Uuid,
    interval: Duration,
    max_attempts: u32,
}

impl StatusPoller {
    pub fn new(
        backend: Arc<dyn ModuleBackend>,
        events: EventBus,
        session_id: Uuid,
        config: &PollingConfig,
    ) -> Self {
        Self {
            backend,
            events,
            session_id,
            interval: config.interval(),
            max_attempts: config.max_attempts.max(1),
        }
    }

    /// Poll every pending item until all are terminal or `cancel` fires
    ///
    /// Items without a seed are polled with no prior knowledge. Returns the
    /// aggregate at the moment polling stopped.
    pub async fn poll_until_settled(
        &self,
        draft: &SharedDraft,
        seeds: &HashMap<String, ItemSeed>,
        cancel: &CancellationToken,
    ) -> ProgressSummary {
        let pending: Vec<String> = {
            let draft = draft.read().await;
            draft
                .pending_item_ids()
                .iter()
                .filter(|id| draft.item_status(id).is_some_and(ItemStatus::is_processing))
                .cloned()
                .collect()
        };

        info!(
            session_id = %self.session_id,
            items = pending.len(),
            interval_ms = self.interval.as_millis() as u64,
            "Polling item status"
        );

        let loops = pending.iter().map(|item_id| {
            let seed = seeds.get(item_id).cloned().unwrap_or_else(|| ItemSeed {
                item_id: item_id.clone(),
                ..Default::default()
            });
            self.poll_item(seed, draft, cancel)
        });
        join_all(loops).await;

        let summary = draft.read().await.progress();
        info!(
            session_id = %self.session_id,
            completed = summary.completed,
            failed = summary.failed,
            processing = summary.processing,
            cancelled = cancel.is_cancelled(),
            "Polling stopped"
        );
        summary
    }

    async fn poll_item(&self, seed: ItemSeed, draft: &SharedDraft, cancel: &CancellationToken) {
        let item_id = seed.item_id.clone();
        let mut command_id = seed.command_id.clone();
        let mut consecutive_errors = 0u32;

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = ticker.tick() => {}
            }

            // removed from the draft while we were waiting
            if !draft.read().await.is_tracked(&item_id) {
                debug!(item_id = %item_id, "Item no longer tracked, polling stopped");
                return;
            }

            let resolved = match self.backend.item_status(&item_id).await {
                Ok(response) => {
                    consecutive_errors = 0;
                    if response.command_id.is_some() {
                        command_id = response.command_id.clone();
                    }
                    resolve_status(&StatusEvidence {
                        query: Some(&response),
                        summary_status: seed.summary_status,
                        has_processing_handle: command_id.is_some(),
                        has_embedded_content: seed.embedded,
                    })
                }
                Err(BackendError::NotFound(_)) => {
                    warn!(item_id = %item_id, "Item not found, treating as terminal");
                    ItemStatus::Unknown
                }
                Err(e) => {
                    consecutive_errors += 1;
                    if consecutive_errors >= self.max_attempts {
                        warn!(
                            item_id = %item_id,
                            attempts = consecutive_errors,
                            error = %e,
                            "Status query failed, giving up"
                        );
                        ItemStatus::Failed
                    } else {
                        debug!(
                            item_id = %item_id,
                            attempt = consecutive_errors,
                            transient = e.is_transient(),
                            error = %e,
                            "Status query failed, will retry"
                        );
                        continue;
                    }
                }
            };

            if cancel.is_cancelled() {
                return;
            }
            self.record(draft, &item_id, resolved).await;

            if resolved.is_terminal() {
                return;
            }
        }
    }

    async fn record(&self, draft: &SharedDraft, item_id: &str, status: ItemStatus) {
        let (update, summary) = {
            let mut draft = draft.write().await;
            let update = draft.update_status(item_id, status);
            (update, draft.progress())
        };

        let StatusUpdate::Changed { old } = update else {
            return;
        };

        debug!(item_id, old = %old, new = %status, "Item status changed");
        let now = Utc::now();
        self.events.emit_lossy(DraftEvent::ItemStatusChanged {
            session_id: self.session_id,
            item_id: item_id.to_string(),
            old_status: Some(old),
            new_status: status,
            timestamp: now,
        });
        self.events.emit_lossy(DraftEvent::ProgressUpdated {
            session_id: self.session_id,
            completed: summary.completed,
            failed: summary.failed,
            processing: summary.processing,
            total: summary.total,
            percent: summary.percent,
            timestamp: now,
        });
    }
}
