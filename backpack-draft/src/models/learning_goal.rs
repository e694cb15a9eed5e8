//! Learning goal drafts
//!
//! Goals stay local to the draft until commit, where each one is persisted
//! with its `order`.

use serde::{Deserialize, Serialize};

/// A learning goal in the draft
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearningGoalDraft {
    /// Action-verb goal statement
    pub description: String,
    /// Key concepts or ideas
    #[serde(default)]
    pub takeaways: String,
    /// Demonstrable skills
    #[serde(default)]
    pub competencies: String,
    /// Position in the list; maintained by [`crate::models::DraftModule`]
    #[serde(default)]
    pub order: usize,
}

impl LearningGoalDraft {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ..Default::default()
        }
    }

    pub fn with_details(
        description: impl Into<String>,
        takeaways: impl Into<String>,
        competencies: impl Into<String>,
    ) -> Self {
        Self {
            description: description.into(),
            takeaways: takeaways.into(),
            competencies: competencies.into(),
            order: 0,
        }
    }
}

/// Partial update of a learning goal; `None` fields are left unchanged
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LearningGoalPatch {
    pub description: Option<String>,
    pub takeaways: Option<String>,
    pub competencies: Option<String>,
}

impl LearningGoalPatch {
    pub fn description(value: impl Into<String>) -> Self {
        Self {
            description: Some(value.into()),
            ..Default::default()
        }
    }

    pub(crate) fn apply(self, goal: &mut LearningGoalDraft) {
        if let Some(description) = self.description {
            goal.description = description;
        }
        if let Some(takeaways) = self.takeaways {
            goal.takeaways = takeaways;
        }
        if let Some(competencies) = self.competencies {
            goal.competencies = competencies;
        }
    }
}
