//! # Backpack Common Library
//!
//! Shared code for the Backpack dashboard tooling:
//! - Configuration loading (TOML bootstrap + environment overrides)
//! - Draft workflow types (item status, workflow state)
//! - Event types (DraftEvent enum) and the broadcast event bus
//! - Common error type

pub mod config;
pub mod error;
pub mod events;
pub mod types;

pub use error::{Error, Result};
pub use events::{DraftEvent, EventBus};
pub use types::{ItemStatus, StatusBucket, WorkflowState};
