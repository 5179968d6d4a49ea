//! Durable processing/review ledger.
//!
//! One `MemoryTracker` owns one state document at a time. State is loaded
//! lazily on first access and every mutation rewrites the whole file, so two
//! processes sharing a ledger file race and the last writer wins. Callers
//! that need multi-process safety must add their own lock around the file.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Days, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Review intervals in days, indexed by completed review count and
/// saturating at the final entry.
pub const REVIEW_INTERVALS: [u64; 6] = [1, 3, 7, 14, 30, 90];

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger document failed validation: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Record of one processed export. Append-only once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedRecord {
    /// Export filename, not the full path.
    pub source_file: String,
    pub book_title: String,
    pub book_author: String,
    pub processed_at: DateTime<Utc>,
    #[serde(default)]
    pub highlight_counts: BTreeMap<String, u32>,
    #[serde(default)]
    pub concepts_created: Vec<String>,
    #[serde(default)]
    pub actions_created: Vec<String>,
    pub book_note_path: String,
}

/// One concept enrolled in the spaced-repetition rotation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpacedRepetitionEntry {
    pub concept_name: String,
    pub concept_path: String,
    pub source_book: String,
    pub created_at: NaiveDate,
    #[serde(default)]
    pub last_reviewed: Option<NaiveDate>,
    #[serde(default)]
    pub review_count: u32,
    pub next_review: NaiveDate,
}

impl SpacedRepetitionEntry {
    /// New entries are due immediately.
    pub fn new(concept_name: &str, concept_path: &str, source_book: &str) -> Self {
        let today = Local::now().date_naive();
        SpacedRepetitionEntry {
            concept_name: concept_name.to_string(),
            concept_path: concept_path.to_string(),
            source_book: source_book.to_string(),
            created_at: today,
            last_reviewed: None,
            review_count: 0,
            next_review: today,
        }
    }

    pub fn schedule_next_review(&mut self) {
        self.schedule_next_review_on(Local::now().date_naive());
    }

    /// The interval is picked by the review count before it is incremented,
    /// so successive reviews land 1, 3, 7, 14, 30, 90, 90, ... days out.
    pub fn schedule_next_review_on(&mut self, today: NaiveDate) {
        let index = (self.review_count as usize).min(REVIEW_INTERVALS.len() - 1);
        let days = REVIEW_INTERVALS[index];

        self.last_reviewed = Some(today);
        self.review_count += 1;
        self.next_review = today + Days::new(days);
    }
}

/// The whole persisted document. Unknown extra fields are ignored on load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryState {
    #[serde(default)]
    pub processed_books: Vec<ProcessedRecord>,
    #[serde(default)]
    pub spaced_repetition: Vec<SpacedRepetitionEntry>,
    #[serde(default = "Utc::now")]
    pub last_updated: DateTime<Utc>,
}

impl Default for MemoryState {
    fn default() -> Self {
        MemoryState {
            processed_books: Vec::new(),
            spaced_repetition: Vec::new(),
            last_updated: Utc::now(),
        }
    }
}

/// Aggregate statistics over the current ledger state.
#[derive(Debug, Clone, Serialize)]
pub struct MemoryStats {
    pub books_processed: usize,
    pub total_highlights: u64,
    pub concepts_created: usize,
    pub actions_created: usize,
    pub pending_reviews: usize,
    pub total_in_rotation: usize,
}

pub struct MemoryTracker {
    memory_file: PathBuf,
    state: Option<MemoryState>,
}

impl MemoryTracker {
    pub fn new(memory_file: impl Into<PathBuf>) -> Self {
        MemoryTracker {
            memory_file: memory_file.into(),
            state: None,
        }
    }

    fn validate_document(raw: &str) -> Result<MemoryState, LedgerError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Absent or unreadable ledger files start from an empty state rather
    /// than failing the run.
    fn load_state(path: &Path) -> MemoryState {
        if !path.exists() {
            return MemoryState::default();
        }

        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!("failed to read ledger {}, starting fresh: {}", path.display(), e);
                return MemoryState::default();
            }
        };

        match Self::validate_document(&raw) {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!("corrupt ledger {}, starting fresh: {}", path.display(), e);
                MemoryState::default()
            }
        }
    }

    fn state_mut(&mut self) -> &mut MemoryState {
        let path = &self.memory_file;
        self.state.get_or_insert_with(|| Self::load_state(path))
    }

    fn save(&mut self) -> Result<()> {
        let path = self.memory_file.clone();
        let state = self.state_mut();
        state.last_updated = Utc::now();

        let body = serde_json::to_string_pretty(state)?;
        fs::write(&path, body)
            .with_context(|| format!("failed to write ledger {}", path.display()))?;
        Ok(())
    }

    /// Exact-match pre-check against stored record filenames. The ledger
    /// itself never deduplicates on insert; callers check first.
    pub fn is_processed(&mut self, source_file: &str) -> bool {
        self.state_mut()
            .processed_books
            .iter()
            .any(|r| r.source_file == source_file)
    }

    pub fn add_processed_record(&mut self, record: ProcessedRecord) -> Result<()> {
        self.state_mut().processed_books.push(record);
        self.save()
    }

    pub fn add_spaced_repetition_entry(&mut self, entry: SpacedRepetitionEntry) -> Result<()> {
        self.state_mut().spaced_repetition.push(entry);
        self.save()
    }

    pub fn get_due_reviews(&mut self) -> Vec<SpacedRepetitionEntry> {
        self.due_reviews_on(Local::now().date_naive())
    }

    /// Entries with `next_review <= today`, boundary inclusive.
    pub fn due_reviews_on(&mut self, today: NaiveDate) -> Vec<SpacedRepetitionEntry> {
        self.state_mut()
            .spaced_repetition
            .iter()
            .filter(|e| e.next_review <= today)
            .cloned()
            .collect()
    }

    /// Mark the first entry with a matching concept name as reviewed and
    /// push its next review out.
    pub fn mark_reviewed(&mut self, concept_name: &str) -> Result<()> {
        let state = self.state_mut();
        if let Some(entry) = state
            .spaced_repetition
            .iter_mut()
            .find(|e| e.concept_name == concept_name)
        {
            entry.schedule_next_review();
        }
        self.save()
    }

    pub fn get_stats(&mut self) -> MemoryStats {
        let pending_reviews = self.get_due_reviews().len();
        let state = self.state_mut();

        let total_highlights: u64 = state
            .processed_books
            .iter()
            .map(|r| r.highlight_counts.values().map(|c| *c as u64).sum::<u64>())
            .sum();

        MemoryStats {
            books_processed: state.processed_books.len(),
            total_highlights,
            concepts_created: state
                .processed_books
                .iter()
                .map(|r| r.concepts_created.len())
                .sum(),
            actions_created: state
                .processed_books
                .iter()
                .map(|r| r.actions_created.len())
                .sum(),
            pending_reviews,
            total_in_rotation: state.spaced_repetition.len(),
        }
    }

    /// The `limit` most recently processed records, newest first.
    pub fn get_recent_books(&mut self, limit: usize) -> Vec<ProcessedRecord> {
        let mut books = self.state_mut().processed_books.clone();
        books.sort_by(|a, b| b.processed_at.cmp(&a.processed_at));
        books.truncate(limit);
        books
    }
}
