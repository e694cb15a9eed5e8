//! Effective item status resolution
//!
//! A single status query may omit the status or describe an item that
//! predates asynchronous processing. The effective status is chosen by a
//! fixed precedence, top to bottom, first match wins:
//!
//! 1. explicit status returned by the query
//! 2. query message marks a legacy (pre-pipeline) item → completed
//! 3. query answered without a status and the item has embedded content → completed
//! 4. status reported earlier in a list/summary view
//! 5. processing handle present but no query answer yet → new
//! 6. embedded content → completed
//! 7. processing handle present → new
//! 8. otherwise → completed (old items without processing metadata)
//!
//! [`resolve_status`] is pure: identical evidence always yields the same status.

use crate::services::backend::ItemStatusResponse;
use backpack_common::ItemStatus;

/// Everything known about an item at resolution time
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusEvidence<'a> {
    /// Latest status query answer, if one has arrived
    pub query: Option<&'a ItemStatusResponse>,
    /// Status previously reported by a list/summary view
    pub summary_status: Option<ItemStatus>,
    /// Item has an async processing handle (`command_id`)
    pub has_processing_handle: bool,
    /// Item already carries embedded content
    pub has_embedded_content: bool,
}

/// Resolve the effective status
pub fn resolve_status(evidence: &StatusEvidence<'_>) -> ItemStatus {
    if let Some(query) = evidence.query {
        if let Some(status) = query.status.as_deref().and_then(ItemStatus::parse) {
            return status;
        }
        if is_legacy_message(&query.message) {
            return ItemStatus::Completed;
        }
        if evidence.has_embedded_content {
            return ItemStatus::Completed;
        }
    }

    if let Some(status) = evidence.summary_status {
        return status;
    }

    if evidence.has_processing_handle && evidence.query.is_none() {
        return ItemStatus::New;
    }

    if evidence.has_embedded_content {
        return ItemStatus::Completed;
    }

    if evidence.has_processing_handle {
        return ItemStatus::New;
    }

    ItemStatus::Completed
}

/// Backend message describing an item processed before the async pipeline
pub fn is_legacy_message(message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    message.contains("legacy") || message.contains("pre-pipeline")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: Option<&str>, message: &str) -> ItemStatusResponse {
        ItemStatusResponse {
            status: status.map(str::to_string),
            message: message.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_rule_1_explicit_status_wins() {
        let query = response(Some("running"), "Legacy source");
        let evidence = StatusEvidence {
            query: Some(&query),
            summary_status: Some(ItemStatus::Completed),
            has_processing_handle: true,
            has_embedded_content: true,
        };
        assert_eq!(resolve_status(&evidence), ItemStatus::Running);
    }

    #[test]
    fn test_rule_2_legacy_message_completes() {
        let query = response(None, "Legacy source (completed before async processing)");
        let evidence = StatusEvidence {
            query: Some(&query),
            summary_status: Some(ItemStatus::Queued),
            has_processing_handle: true,
            ..Default::default()
        };
        assert_eq!(resolve_status(&evidence), ItemStatus::Completed);
    }

    #[test]
    fn test_rule_3_empty_status_with_embedding_completes() {
        let query = response(Some(""), "No status available");
        let evidence = StatusEvidence {
            query: Some(&query),
            summary_status: Some(ItemStatus::Running),
            has_embedded_content: true,
            ..Default::default()
        };
        assert_eq!(resolve_status(&evidence), ItemStatus::Completed);
    }

    #[test]
    fn test_rule_4_summary_status_fallback() {
        let query = response(None, "No status available");
        let evidence = StatusEvidence {
            query: Some(&query),
            summary_status: Some(ItemStatus::Queued),
            has_processing_handle: true,
            ..Default::default()
        };
        assert_eq!(resolve_status(&evidence), ItemStatus::Queued);
    }

    #[test]
    fn test_rule_5_handle_without_answer_is_new() {
        let evidence = StatusEvidence {
            has_processing_handle: true,
            has_embedded_content: true,
            ..Default::default()
        };
        assert_eq!(resolve_status(&evidence), ItemStatus::New);
    }

    #[test]
    fn test_rule_6_embedded_content_completes() {
        let evidence = StatusEvidence {
            has_embedded_content: true,
            ..Default::default()
        };
        assert_eq!(resolve_status(&evidence), ItemStatus::Completed);
    }

    #[test]
    fn test_rule_7_handle_after_answer_is_new() {
        let query = response(None, "Processing");
        let evidence = StatusEvidence {
            query: Some(&query),
            has_processing_handle: true,
            ..Default::default()
        };
        assert_eq!(resolve_status(&evidence), ItemStatus::New);
    }

    #[test]
    fn test_rule_8_default_completed() {
        assert_eq!(resolve_status(&StatusEvidence::default()), ItemStatus::Completed);

        let query = response(None, "");
        let evidence = StatusEvidence {
            query: Some(&query),
            ..Default::default()
        };
        assert_eq!(resolve_status(&evidence), ItemStatus::Completed);
    }

    #[test]
    fn test_unrecognised_explicit_status_is_unknown() {
        let query = response(Some("exploded"), "");
        let evidence = StatusEvidence {
            query: Some(&query),
            ..Default::default()
        };
        assert_eq!(resolve_status(&evidence), ItemStatus::Unknown);
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let query = response(None, "Processing");
        let evidence = StatusEvidence {
            query: Some(&query),
            summary_status: None,
            has_processing_handle: true,
            has_embedded_content: false,
        };
        assert_eq!(resolve_status(&evidence), resolve_status(&evidence));
    }
}
