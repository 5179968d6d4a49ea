//! Markdown note assembly for the vault: one note per processed book and one
//! note per extracted concept. Pure string building plus a file write; all
//! prose comes from the typed inputs.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;

use crate::extract::{ExtractedAction, ExtractedConcept};
use crate::model::{BookMetadata, Highlight, HighlightColor, ParsedBook};

fn format_quote(highlight: &Highlight) -> String {
    format!(
        "> \"{}\"\n> — *{}*",
        highlight.text,
        highlight.location_str()
    )
}

fn format_concept_link(concept: &ExtractedConcept) -> String {
    format!(
        "- [[{}]] (relevance: {:.0}%)",
        concept.name,
        concept.relevance_score * 100.0
    )
}

fn format_action_item(action: &ExtractedAction, task_url: Option<&String>) -> String {
    match task_url {
        Some(url) => format!("- [ ] {} — [Task]({})", action.title, url),
        None => format!("- [ ] {}", action.title),
    }
}

/// Reduce a title to something safe for a filename.
fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_alphanumeric() || " -_".contains(c) {
                c
            } else {
                '_'
            }
        })
        .collect::<String>()
        .trim()
        .to_string()
}

/// Assemble the complete markdown body of a book note.
pub fn generate_book_note(
    book: &ParsedBook,
    concepts: &[ExtractedConcept],
    actions: &[ExtractedAction],
    task_urls: &BTreeMap<String, String>,
) -> String {
    let today = Local::now().date_naive();
    let metadata = &book.metadata;
    let counts = book.highlight_counts();
    let source_name = metadata
        .source_file
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown");

    let mut sections = String::new();

    if !concepts.is_empty() {
        let list = concepts
            .iter()
            .map(format_concept_link)
            .collect::<Vec<_>>()
            .join("\n");
        sections.push_str(&format!("## Key Concepts\n\n{}\n\n", list));
    }

    if !actions.is_empty() {
        let list = actions
            .iter()
            .map(|a| format_action_item(a, task_urls.get(&a.title)))
            .collect::<Vec<_>>()
            .join("\n");
        sections.push_str(&format!("## Action Items\n\n{}\n\n", list));
    }

    let quotes = book.by_color(HighlightColor::Blue);
    if !quotes.is_empty() {
        let list = quotes
            .iter()
            .map(|h| format_quote(h))
            .collect::<Vec<_>>()
            .join("\n\n");
        sections.push_str(&format!("## Beautiful Quotes\n\n{}\n\n", list));
    }

    let disagreements = book.by_color(HighlightColor::Orange);
    if !disagreements.is_empty() {
        let list = disagreements
            .iter()
            .map(|h| {
                format!(
                    "{}\n\n*My thoughts:* [Add your response here]",
                    format_quote(h)
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n");
        sections.push_str(&format!("## Disagreements\n\n{}\n\n", list));
    }

    format!(
        "---\n\
         title: \"{title}\"\n\
         author: \"{author}\"\n\
         processed: {today}\n\
         source_file: \"{source_name}\"\n\
         highlights:\n\
         \x20 yellow: {yellow}\n\
         \x20 pink: {pink}\n\
         \x20 blue: {blue}\n\
         \x20 orange: {orange}\n\
         tags:\n\
         \x20 - book\n\
         \x20 - processed\n\
         ---\n\
         \n\
         # {title}\n\
         \n\
         **Author:** {author}\n\
         **Processed:** {today}\n\
         **Highlights:** {total} total ({yellow} concepts, {pink} actions, {blue} quotes, {orange} disagreements)\n\
         \n\
         ---\n\
         \n\
         {sections}---\n\
         \n\
         ## Reading Notes\n\
         \n\
         *Add any additional thoughts, connections, or reflections here.*\n",
        title = metadata.title,
        author = metadata.author,
        today = today,
        source_name = source_name,
        yellow = counts["yellow"],
        pink = counts["pink"],
        blue = counts["blue"],
        orange = counts["orange"],
        total = book.total_highlights(),
        sections = sections,
    )
}

pub fn write_book_note(
    book: &ParsedBook,
    concepts: &[ExtractedConcept],
    actions: &[ExtractedAction],
    output_dir: &Path,
    task_urls: &BTreeMap<String, String>,
) -> Result<PathBuf> {
    let content = generate_book_note(book, concepts, actions, task_urls);
    write_note(output_dir, &book.metadata.title, &content)
}

/// Assemble the markdown body of a standalone concept note.
pub fn generate_concept_note(
    concept: &ExtractedConcept,
    metadata: &BookMetadata,
    supporting: &[&Highlight],
) -> String {
    let today = Local::now().date_naive();

    let highlights_section = if supporting.is_empty() {
        "> No highlights captured".to_string()
    } else {
        supporting
            .iter()
            .map(|h| format!("> \"{}\"\n> — {}", h.text, h.location_str()))
            .collect::<Vec<_>>()
            .join("\n\n")
    };

    format!(
        "---\n\
         title: \"{name}\"\n\
         source: \"[[{title}]]\"\n\
         author: \"{author}\"\n\
         created: {today}\n\
         relevance: {relevance:.2}\n\
         tags:\n\
         \x20 - concept\n\
         \x20 - from-reading\n\
         ---\n\
         \n\
         # {name}\n\
         \n\
         > {description}\n\
         \n\
         ---\n\
         \n\
         ## Original Highlights\n\
         *(The source passages that inspired this concept.)*\n\
         \n\
         {highlights}\n",
        name = concept.name,
        title = metadata.title,
        author = metadata.author,
        today = today,
        relevance = concept.relevance_score,
        description = concept.description,
        highlights = highlights_section,
    )
}

pub fn write_concept_note(
    concept: &ExtractedConcept,
    metadata: &BookMetadata,
    output_dir: &Path,
    supporting: &[&Highlight],
) -> Result<PathBuf> {
    let content = generate_concept_note(concept, metadata, supporting);
    write_note(output_dir, &concept.name, &content)
}

fn write_note(output_dir: &Path, name: &str, content: &str) -> Result<PathBuf> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create note directory {}", output_dir.display()))?;

    let path = output_dir.join(format!("{}.md", sanitize_filename(name)));
    fs::write(&path, content)
        .with_context(|| format!("failed to write note {}", path.display()))?;
    Ok(path)
}
