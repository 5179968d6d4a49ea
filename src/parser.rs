use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;

use crate::model::{BookMetadata, Highlight, HighlightColor, ParsedBook, UNKNOWN_AUTHOR, UNKNOWN_TITLE};

static TITLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<div\s+class=['"]bookTitle['"][^>]*>(.*?)</div>"#).expect("bookTitle pattern")
});

static AUTHOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<div\s+class=['"]authors['"][^>]*>(.*?)</div>"#).expect("authors pattern")
});

static SECTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<h2\s+class=['"]sectionHeading['"][^>]*>(.*?)</h2>"#).expect("sectionHeading pattern")
});

// The export generator frequently swaps the closing tags of the heading/body
// pair (</div> on the h3, </h3> on the div), so either closer is accepted on
// both elements.
static NOTE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?is)<h3\s+class=['"]noteHeading['"][^>]*>(.*?)</(?:h3|div)>\s*<div\s+class=['"]noteText['"][^>]*>(.*?)</(?:h3|div)>"#,
    )
    .expect("noteHeading pattern")
});

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("tag pattern"));

static PAGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Page\s+(\d+)").expect("page pattern"));

static LOCATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Location\s+(\d+)").expect("location pattern"));

/// One structural marker found in the raw document, tagged by kind.
enum Marker {
    /// A chapter/section heading. Replaces the current chapter context.
    Section(String),
    /// A noteHeading/noteText pair. `heading_raw` keeps the inner markup so
    /// color spans survive, `heading` and `body` are plain text.
    Note {
        heading_raw: String,
        heading: String,
        body: String,
    },
}

/// Strip markup and collapse whitespace from an extracted fragment.
fn clean_html(fragment: &str) -> String {
    let text = TAG_RE.replace_all(fragment, " ");
    let text = decode_entities(&text);
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

/// A free-standing user annotation rather than a highlight.
fn is_user_annotation(heading: &str) -> bool {
    let lower = heading.to_lowercase();
    let lower = lower.trim();
    lower.starts_with("note -") || lower.starts_with("note-")
}

/// Anything that is neither an annotation nor a highlight heading is ignored.
fn is_highlight_heading(heading: &str) -> bool {
    let lower = heading.to_lowercase();
    lower.contains("highlight") || lower.contains("note -")
}

fn extract_color(heading_raw: &str, heading: &str) -> HighlightColor {
    // Nested color span wins, checked in enumeration order.
    for color in HighlightColor::ALL {
        if heading_raw.contains(&format!("highlight_{}", color.as_str())) {
            return color;
        }
    }

    // Fallback: a color word in the heading text.
    let lower = heading.to_lowercase();
    for color in HighlightColor::ALL {
        if lower.contains(color.as_str()) {
            return color;
        }
    }

    HighlightColor::Yellow
}

fn extract_position(heading: &str) -> (Option<u32>, Option<u32>) {
    let page = PAGE_RE
        .captures(heading)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok());
    let location = LOCATION_RE
        .captures(heading)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok());
    (page, location)
}

/// Scan both marker classes independently and merge them by byte offset.
/// The sort is stable and sections are collected first, so a section at the
/// same offset as a note sorts before it.
fn scan_markers(content: &str) -> Vec<(usize, Marker)> {
    let mut markers = Vec::new();

    for caps in SECTION_RE.captures_iter(content) {
        let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        markers.push((whole.start(), Marker::Section(clean_html(inner.as_str()))));
    }

    for caps in NOTE_RE.captures_iter(content) {
        let (Some(whole), Some(heading), Some(body)) = (caps.get(0), caps.get(1), caps.get(2))
        else {
            continue;
        };
        markers.push((
            whole.start(),
            Marker::Note {
                heading_raw: heading.as_str().to_string(),
                heading: clean_html(heading.as_str()),
                body: clean_html(body.as_str()),
            },
        ));
    }

    markers.sort_by_key(|(offset, _)| *offset);
    markers
}

/// Parse a notebook export file. I/O failure is the only error path; a
/// document with missing metadata or no recognizable markers parses to
/// defaults and an empty highlight list.
pub fn parse_export(path: &Path) -> Result<ParsedBook> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read export {}", path.display()))?;
    Ok(parse_export_content(&content, path))
}

/// Reconstruct a `ParsedBook` from raw export markup. Infallible by design.
pub fn parse_export_content(content: &str, source_path: &Path) -> ParsedBook {
    let title = TITLE_RE
        .captures(content)
        .and_then(|c| c.get(1))
        .map(|m| clean_html(m.as_str()))
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| UNKNOWN_TITLE.to_string());

    let author = AUTHOR_RE
        .captures(content)
        .and_then(|c| c.get(1))
        .map(|m| clean_html(m.as_str()))
        .filter(|a| !a.is_empty())
        .unwrap_or_else(|| UNKNOWN_AUTHOR.to_string());

    let metadata = BookMetadata {
        title,
        author,
        source_file: source_path.to_path_buf(),
    };

    let mut highlights: Vec<Highlight> = Vec::new();
    let mut current_chapter: Option<String> = None;

    for (_, marker) in scan_markers(content) {
        match marker {
            Marker::Section(text) => {
                current_chapter = Some(text);
            }
            Marker::Note {
                heading_raw,
                heading,
                body,
            } => {
                if is_user_annotation(&heading) {
                    // Annotations are recognized and skipped; they are not
                    // linked to the preceding highlight's note field. See the
                    // pinning test below before changing this.
                    continue;
                }

                if !is_highlight_heading(&heading) {
                    continue;
                }

                if body.is_empty() {
                    continue;
                }

                let color = extract_color(&heading_raw, &heading);
                let (page, location) = extract_position(&heading);

                highlights.push(Highlight {
                    text: body,
                    color,
                    page,
                    location,
                    chapter: current_chapter.clone(),
                    note: None,
                });
            }
        }
    }

    ParsedBook::new(metadata, highlights)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_EXPORT: &str = r#"
<!DOCTYPE html>
<html>
<head><meta charset="UTF-8"><title>Notebook Export</title></head>
<body>
    <div class="bookTitle">The Art of Doing Science and Engineering</div>
    <div class="authors">Richard W. Hamming</div>

    <h2 class="sectionHeading">Chapter 1 - Introduction</h2>

    <h3 class="noteHeading">
        Highlight (<span class="highlight_yellow">yellow</span>) - Page 15 &#183; Location 234
    </h3>
    <div class="noteText">
        The purpose of computing is insight, not numbers.
    </div>

    <h3 class="noteHeading">
        Highlight (<span class="highlight_pink">pink</span>) - Page 23 &#183; Location 456
    </h3>
    <div class="noteText">
        You must study the lives of great scientists to learn how to be one.
    </div>

    <h2 class="sectionHeading">Chapter 2 - Foundations</h2>

    <h3 class="noteHeading">
        Highlight (<span class="highlight_blue">blue</span>) - Page 45 &#183; Location 789
    </h3>
    <div class="noteText">
        In science if you know what you are doing you should not be doing it.
    </div>

    <h3 class="noteHeading">
        Highlight (<span class="highlight_orange">orange</span>) - Page 67 &#183; Location 1011
    </h3>
    <div class="noteText">
        What you learn from others you can use to follow.
    </div>
</body>
</html>
"#;

    fn parse(content: &str) -> ParsedBook {
        parse_export_content(content, Path::new("test.html"))
    }

    #[test]
    fn test_metadata_extracted() {
        let book = parse(SAMPLE_EXPORT);
        assert_eq!(book.metadata.title, "The Art of Doing Science and Engineering");
        assert_eq!(book.metadata.author, "Richard W. Hamming");
        assert_eq!(book.metadata.source_file, Path::new("test.html"));
    }

    #[test]
    fn test_missing_metadata_falls_back_to_defaults() {
        let book = parse("<html><body><p>nothing to see</p></body></html>");
        assert_eq!(book.metadata.title, UNKNOWN_TITLE);
        assert_eq!(book.metadata.author, UNKNOWN_AUTHOR);
        assert!(book.highlights.is_empty());
    }

    #[test]
    fn test_highlights_in_document_order() {
        let book = parse(SAMPLE_EXPORT);
        assert_eq!(book.highlights.len(), 4);

        let colors: Vec<HighlightColor> = book.highlights.iter().map(|h| h.color).collect();
        assert_eq!(
            colors,
            vec![
                HighlightColor::Yellow,
                HighlightColor::Pink,
                HighlightColor::Blue,
                HighlightColor::Orange,
            ]
        );

        assert!(book.highlights[0].text.contains("insight"));
        assert!(book.highlights[1].text.contains("great scientists"));
    }

    #[test]
    fn test_page_and_location_extracted() {
        let book = parse(SAMPLE_EXPORT);
        assert_eq!(book.highlights[0].page, Some(15));
        assert_eq!(book.highlights[0].location, Some(234));
        assert_eq!(book.highlights[1].page, Some(23));
        assert_eq!(book.highlights[1].location, Some(456));
    }

    #[test]
    fn test_chapter_context_tracked() {
        let book = parse(SAMPLE_EXPORT);
        assert_eq!(
            book.highlights[0].chapter.as_deref(),
            Some("Chapter 1 - Introduction")
        );
        assert_eq!(
            book.highlights[1].chapter.as_deref(),
            Some("Chapter 1 - Introduction")
        );
        assert_eq!(
            book.highlights[2].chapter.as_deref(),
            Some("Chapter 2 - Foundations")
        );
        assert_eq!(
            book.highlights[3].chapter.as_deref(),
            Some("Chapter 2 - Foundations")
        );
    }

    #[test]
    fn test_mismatched_closing_tags_reconstructed() {
        // The heading is closed with </div> and the body with </h3>, the way
        // real exports come out.
        let content = r#"
            <div class="bookTitle">Broken Export</div>
            <h3 class='noteHeading'>Highlight (<span class="highlight_pink">pink</span>) - Page 3 &#183; Location 40</div>
            <div class='noteText'>Malformed but recoverable.</h3>
        "#;

        let book = parse(content);
        assert_eq!(book.highlights.len(), 1);
        assert_eq!(book.highlights[0].color, HighlightColor::Pink);
        assert_eq!(book.highlights[0].page, Some(3));
        assert_eq!(book.highlights[0].location, Some(40));
        assert_eq!(book.highlights[0].text, "Malformed but recoverable.");
    }

    #[test]
    fn test_color_word_fallback_without_span() {
        let content = r#"
            <h3 class="noteHeading">Highlight (blue) - Page 45 &#183; Location 789</h3>
            <div class="noteText">A quotable passage.</div>
        "#;

        let book = parse(content);
        assert_eq!(book.highlights.len(), 1);
        assert_eq!(book.highlights[0].color, HighlightColor::Blue);
        assert_eq!(book.highlights[0].page, Some(45));
        assert_eq!(book.highlights[0].location, Some(789));
    }

    #[test]
    fn test_unknown_color_defaults_to_yellow() {
        let content = r#"
            <h3 class="noteHeading">Highlight - Page 2</h3>
            <div class="noteText">No color marker anywhere.</div>
        "#;

        let book = parse(content);
        assert_eq!(book.highlights.len(), 1);
        assert_eq!(book.highlights[0].color, HighlightColor::Yellow);
        assert_eq!(book.highlights[0].page, Some(2));
        assert_eq!(book.highlights[0].location, None);
    }

    #[test]
    fn test_unrecognized_headings_ignored() {
        let content = r#"
            <h3 class="noteHeading">Bookmark - Page 5</h3>
            <div class="noteText">Bookmarks carry no passage.</div>
        "#;

        let book = parse(content);
        assert!(book.highlights.is_empty());
    }

    #[test]
    fn test_user_annotations_parsed_but_never_attached() {
        // Pins the long-standing behavior: annotation bodies are dropped, not
        // linked to the preceding highlight. Changing this means changing
        // product intent, not fixing a parser bug.
        let content = r#"
            <h3 class="noteHeading">Highlight (<span class="highlight_yellow">yellow</span>) - Page 10 &#183; Location 100</h3>
            <div class="noteText">The highlighted passage.</div>
            <h3 class="noteHeading">Note - Page 10 &#183; Location 100</h3>
            <div class="noteText">My own thinking about the passage.</div>
        "#;

        let book = parse(content);
        assert_eq!(book.highlights.len(), 1);
        assert_eq!(book.highlights[0].text, "The highlighted passage.");
        assert_eq!(book.highlights[0].note, None);
    }

    #[test]
    fn test_parse_is_idempotent() {
        let first = parse(SAMPLE_EXPORT);
        let second = parse(SAMPLE_EXPORT);
        assert_eq!(first.metadata, second.metadata);
        assert_eq!(first.highlights, second.highlights);
    }

    #[test]
    fn test_entities_decoded_in_text() {
        let content = r#"
            <div class="bookTitle">Ideas &amp; Arguments</div>
            <h3 class="noteHeading">Highlight (yellow) - Page 1</h3>
            <div class="noteText">Socrates &quot;knew&quot; nothing.</div>
        "#;

        let book = parse(content);
        assert_eq!(book.metadata.title, "Ideas & Arguments");
        assert_eq!(book.highlights[0].text, "Socrates \"knew\" nothing.");
    }

    #[test]
    fn test_unreadable_file_is_io_error() {
        let err = parse_export(Path::new("/nonexistent/export.html")).unwrap_err();
        assert!(err.to_string().contains("failed to read export"));
    }
}
