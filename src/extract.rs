//! Typed contracts for the extraction, task-tracker, and notification
//! collaborators. The pipeline hands a highlight lane plus book metadata to
//! these seams and receives typed records back; it never parses a
//! collaborator's raw response itself.

#![allow(async_fn_in_trait)]

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::model::{BookMetadata, Highlight, ParsedBook};

/// A concept distilled from the yellow lane.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedConcept {
    /// Short, memorable concept name.
    pub name: String,
    /// One-sentence summary.
    pub description: String,
    /// Indices into the lane the concept was extracted from.
    pub supporting_highlights: Vec<usize>,
    /// Relevance to the reader's profile, 0.0 to 1.0.
    pub relevance_score: f64,
}

/// An actionable task distilled from the pink lane.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedAction {
    pub title: String,
    pub description: String,
    /// Index of the primary supporting highlight in the lane.
    pub source_highlight: usize,
    pub priority: ActionPriority,
    pub category: String,
}

/// Declaration order doubles as sort order: high priority first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionPriority {
    High,
    Medium,
    Low,
}

pub trait ConceptExtractor {
    async fn extract_concepts(
        &self,
        highlights: &[&Highlight],
        metadata: &BookMetadata,
        profile: &str,
    ) -> Result<Vec<ExtractedConcept>>;
}

pub trait ActionExtractor {
    async fn extract_actions(
        &self,
        highlights: &[&Highlight],
        metadata: &BookMetadata,
        profile: &str,
    ) -> Result<Vec<ExtractedAction>>;
}

/// Pushes one extracted action into an external task tracker. Returns the
/// created task's URL when the tracker provides one.
pub trait TaskSink {
    async fn create_task(
        &self,
        action: &ExtractedAction,
        metadata: &BookMetadata,
        highlight_text: &str,
    ) -> Result<Option<String>>;
}

/// Outbound notifications. Returning `false` means the channel is not
/// configured; it is never an error.
pub trait Notifier {
    async fn notify_processed(
        &self,
        book: &ParsedBook,
        concepts: &[ExtractedConcept],
        actions: &[ExtractedAction],
    ) -> Result<bool>;
}

/// The feature-unavailable collaborator. Returns empty results everywhere;
/// wired in wherever an integration is not configured.
pub struct Disabled;

impl ConceptExtractor for Disabled {
    async fn extract_concepts(
        &self,
        _highlights: &[&Highlight],
        _metadata: &BookMetadata,
        _profile: &str,
    ) -> Result<Vec<ExtractedConcept>> {
        Ok(Vec::new())
    }
}

impl ActionExtractor for Disabled {
    async fn extract_actions(
        &self,
        _highlights: &[&Highlight],
        _metadata: &BookMetadata,
        _profile: &str,
    ) -> Result<Vec<ExtractedAction>> {
        Ok(Vec::new())
    }
}

impl TaskSink for Disabled {
    async fn create_task(
        &self,
        _action: &ExtractedAction,
        _metadata: &BookMetadata,
        _highlight_text: &str,
    ) -> Result<Option<String>> {
        Ok(None)
    }
}

impl Notifier for Disabled {
    async fn notify_processed(
        &self,
        _book: &ParsedBook,
        _concepts: &[ExtractedConcept],
        _actions: &[ExtractedAction],
    ) -> Result<bool> {
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_orders_high_first() {
        let mut priorities = vec![
            ActionPriority::Low,
            ActionPriority::High,
            ActionPriority::Medium,
        ];
        priorities.sort();
        assert_eq!(
            priorities,
            vec![
                ActionPriority::High,
                ActionPriority::Medium,
                ActionPriority::Low,
            ]
        );
    }

    #[test]
    fn test_priority_serde_names() {
        assert_eq!(
            serde_json::to_string(&ActionPriority::High).unwrap(),
            "\"high\""
        );
        let back: ActionPriority = serde_json::from_str("\"medium\"").unwrap();
        assert_eq!(back, ActionPriority::Medium);
    }
}
