//! Draft workflow events and event bus
//!
//! Every producer writing into a draft (uploader, poller, generator,
//! committer) announces the change here so that observers such as a UI
//! bridge or the CLI progress printer never have to poll the draft.

use crate::types::{ItemStatus, WorkflowState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Event emitted during a module-draft workflow session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DraftEvent {
    /// Workflow moved between states
    StateChanged {
        session_id: Uuid,
        old_state: WorkflowState,
        new_state: WorkflowState,
        timestamp: DateTime<Utc>,
    },

    /// Upload acknowledged and item id registered in the draft
    ItemRegistered {
        session_id: Uuid,
        item_id: String,
        file_name: String,
        timestamp: DateTime<Utc>,
    },

    /// Upload of one file was rejected
    UploadFailed {
        session_id: Uuid,
        file_name: String,
        error: String,
        timestamp: DateTime<Utc>,
    },

    /// Resolved status of an item changed
    ItemStatusChanged {
        session_id: Uuid,
        item_id: String,
        old_status: Option<ItemStatus>,
        new_status: ItemStatus,
        timestamp: DateTime<Utc>,
    },

    /// Aggregate progress over all pending items
    ProgressUpdated {
        session_id: Uuid,
        completed: usize,
        failed: usize,
        processing: usize,
        total: usize,
        percent: u8,
        timestamp: DateTime<Utc>,
    },

    /// Generated content written into the draft
    ContentGenerated {
        session_id: Uuid,
        overview_updated: bool,
        learning_goals: Option<usize>,
        timestamp: DateTime<Utc>,
    },

    /// Draft committed as a persistent module
    Committed {
        session_id: Uuid,
        module_id: String,
        linked_items: usize,
        persisted_goals: usize,
        timestamp: DateTime<Utc>,
    },

    /// Draft discarded and its items deleted
    Cancelled {
        session_id: Uuid,
        deleted_items: usize,
        timestamp: DateTime<Utc>,
    },
}

impl DraftEvent {
    /// Session the event belongs to
    pub fn session_id(&self) -> Uuid {
        match self {
            DraftEvent::StateChanged { session_id, .. }
            | DraftEvent::ItemRegistered { session_id, .. }
            | DraftEvent::UploadFailed { session_id, .. }
            | DraftEvent::ItemStatusChanged { session_id, .. }
            | DraftEvent::ProgressUpdated { session_id, .. }
            | DraftEvent::ContentGenerated { session_id, .. }
            | DraftEvent::Committed { session_id, .. }
            | DraftEvent::Cancelled { session_id, .. } => *session_id,
        }
    }
}

/// Broadcast bus for draft events
///
/// Cloning the bus shares the underlying channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<DraftEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Arguments
    ///
    /// * `capacity` - Number of events to buffer before lagging receivers
    ///   start losing the oldest events
    ///
    /// # Examples
    ///
    /// ```
    /// use backpack_common::events::EventBus;
    ///
    /// let event_bus = EventBus::new(100);
    /// assert_eq!(event_bus.capacity(), 100);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<DraftEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: DraftEvent,
    ) -> Result<usize, broadcast::error::SendError<DraftEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: DraftEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
