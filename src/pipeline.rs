//! Per-export orchestration: ledger pre-check, parse, route, collaborator
//! extraction, note generation, ledger record, archive. Collaborator
//! failures degrade to empty results; only I/O on the export itself or on
//! the vault/ledger aborts a book.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{info, warn};

use crate::config::Config;
use crate::extract::{
    ActionExtractor, ConceptExtractor, ExtractedAction, ExtractedConcept, Notifier, TaskSink,
};
use crate::memory::{MemoryTracker, ProcessedRecord, SpacedRepetitionEntry};
use crate::notes::{write_book_note, write_concept_note};
use crate::parser::parse_export;
use crate::router::route_highlights;

#[derive(Debug, Default, Clone)]
pub struct ProcessOptions {
    pub dry_run: bool,
    pub skip_email: bool,
    pub skip_tasks: bool,
}

/// The four external seams the pipeline talks to. Wire `extract::Disabled`
/// into any seam that is not configured.
pub struct Collaborators<C, A, T, N> {
    pub concepts: C,
    pub actions: A,
    pub tasks: T,
    pub notifier: N,
}

/// Process one export end to end. Returns `None` when the export was
/// already processed or the run was a dry run.
pub async fn process_export<C, A, T, N>(
    path: &Path,
    cfg: &Config,
    tracker: &mut MemoryTracker,
    collab: &Collaborators<C, A, T, N>,
    opts: &ProcessOptions,
) -> Result<Option<ProcessedRecord>>
where
    C: ConceptExtractor,
    A: ActionExtractor,
    T: TaskSink,
    N: Notifier,
{
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("export path has no file name: {}", path.display()))?;

    if tracker.is_processed(&file_name) {
        info!("skipping already processed export: {}", file_name);
        return Ok(None);
    }

    info!("processing export: {}", file_name);
    let book = parse_export(path)?;
    let counts = book.highlight_counts();
    info!(
        "parsed {} highlights from \"{}\" by {}",
        book.total_highlights(),
        book.metadata.title,
        book.metadata.author
    );

    let routed = route_highlights(&book);
    let profile = load_profile(cfg);

    let concepts: Vec<ExtractedConcept> = if routed.concepts.is_empty() {
        Vec::new()
    } else {
        match collab
            .concepts
            .extract_concepts(&routed.concepts, &book.metadata, &profile)
            .await
        {
            Ok(concepts) => concepts,
            Err(e) => {
                warn!("concept extraction unavailable: {}", e);
                Vec::new()
            }
        }
    };

    let actions: Vec<ExtractedAction> = if routed.actions.is_empty() {
        Vec::new()
    } else {
        match collab
            .actions
            .extract_actions(&routed.actions, &book.metadata, &profile)
            .await
        {
            Ok(actions) => actions,
            Err(e) => {
                warn!("action extraction unavailable: {}", e);
                Vec::new()
            }
        }
    };

    if opts.dry_run {
        info!("[dry run] would create book note: {}.md", book.metadata.title);
        for concept in &concepts {
            info!("[dry run] would create concept note: {}.md", concept.name);
        }
        for action in &actions {
            info!("[dry run] would create task: {}", action.title);
        }
        return Ok(None);
    }

    let mut task_urls: BTreeMap<String, String> = BTreeMap::new();
    if !opts.skip_tasks {
        for action in &actions {
            let highlight_text = routed
                .actions
                .get(action.source_highlight)
                .map(|h| h.text.as_str())
                .unwrap_or("");

            match collab
                .tasks
                .create_task(action, &book.metadata, highlight_text)
                .await
            {
                Ok(Some(url)) => {
                    task_urls.insert(action.title.clone(), url);
                }
                Ok(None) => {}
                Err(e) => warn!("task creation failed for \"{}\": {}", action.title, e),
            }
        }
    }

    let mut concept_names = Vec::new();
    for concept in &concepts {
        let supporting: Vec<_> = concept
            .supporting_highlights
            .iter()
            .filter_map(|i| routed.concepts.get(*i).copied())
            .collect();

        let note_path =
            write_concept_note(concept, &book.metadata, &cfg.app.ideas_dir(), &supporting)?;

        tracker.add_spaced_repetition_entry(SpacedRepetitionEntry::new(
            &concept.name,
            &note_path.to_string_lossy(),
            &book.metadata.title,
        ))?;
        concept_names.push(concept.name.clone());
    }
    if !concept_names.is_empty() {
        info!("created {} concept notes", concept_names.len());
    }

    let book_note_path =
        write_book_note(&book, &concepts, &actions, &cfg.app.books_dir(), &task_urls)?;
    info!("created book note: {}", book_note_path.display());

    let record = ProcessedRecord {
        source_file: file_name,
        book_title: book.metadata.title.clone(),
        book_author: book.metadata.author.clone(),
        processed_at: Utc::now(),
        highlight_counts: counts,
        concepts_created: concept_names,
        actions_created: actions.iter().map(|a| a.title.clone()).collect(),
        book_note_path: book_note_path.to_string_lossy().into_owned(),
    };
    tracker.add_processed_record(record.clone())?;

    move_to_processed(path, &cfg.app.processed_dir())?;

    if !opts.skip_email {
        match collab.notifier.notify_processed(&book, &concepts, &actions).await {
            Ok(true) => info!("notification sent"),
            Ok(false) => info!("notification skipped (not configured)"),
            Err(e) => warn!("notification failed: {}", e),
        }
    }

    Ok(Some(record))
}

fn load_profile(cfg: &Config) -> String {
    let Some(path) = cfg.app.profile_path() else {
        return String::new();
    };

    match fs::read_to_string(&path) {
        Ok(profile) => profile,
        Err(e) => {
            warn!("profile {} unavailable, using empty profile: {}", path.display(), e);
            String::new()
        }
    }
}

fn move_to_processed(path: &Path, processed_dir: &Path) -> Result<()> {
    fs::create_dir_all(processed_dir).with_context(|| {
        format!("failed to create processed directory {}", processed_dir.display())
    })?;

    let target = match path.file_name() {
        Some(name) => processed_dir.join(name),
        None => return Ok(()),
    };

    fs::rename(path, &target)
        .with_context(|| format!("failed to move export to {}", target.display()))?;
    info!("moved export to {}", target.display());
    Ok(())
}
