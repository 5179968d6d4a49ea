use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const UNKNOWN_TITLE: &str = "Unknown Title";
pub const UNKNOWN_AUTHOR: &str = "Unknown Author";

/// Highlight colors and the processing lane each one feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HighlightColor {
    /// Key concepts, extracted into standalone concept notes.
    Yellow,
    /// Action items, extracted into tracker tasks.
    Pink,
    /// Quotes, stored directly in the book note.
    Blue,
    /// Disagreements, stored directly in the book note.
    Orange,
}

impl HighlightColor {
    /// Fixed check order for color detection in note headings.
    pub const ALL: [HighlightColor; 4] = [
        HighlightColor::Yellow,
        HighlightColor::Pink,
        HighlightColor::Blue,
        HighlightColor::Orange,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HighlightColor::Yellow => "yellow",
            HighlightColor::Pink => "pink",
            HighlightColor::Blue => "blue",
            HighlightColor::Orange => "orange",
        }
    }
}

/// A single highlighted passage. Built only by the parser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Highlight {
    pub text: String,
    pub color: HighlightColor,
    pub page: Option<u32>,
    pub location: Option<u32>,
    pub chapter: Option<String>,
    pub note: Option<String>,
}

impl Highlight {
    pub fn location_str(&self) -> String {
        let mut parts = Vec::new();
        if let Some(page) = self.page {
            parts.push(format!("Page {}", page));
        }
        if let Some(location) = self.location {
            parts.push(format!("Location {}", location));
        }
        if parts.is_empty() {
            return "Unknown location".to_string();
        }
        parts.join(", ")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookMetadata {
    pub title: String,
    pub author: String,
    pub source_file: PathBuf,
}

/// A fully reconstructed export: metadata plus highlights in document order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedBook {
    pub metadata: BookMetadata,
    pub highlights: Vec<Highlight>,
    pub parsed_at: DateTime<Utc>,
}

impl ParsedBook {
    pub fn new(metadata: BookMetadata, highlights: Vec<Highlight>) -> Self {
        ParsedBook {
            metadata,
            highlights,
            parsed_at: Utc::now(),
        }
    }

    pub fn by_color(&self, color: HighlightColor) -> Vec<&Highlight> {
        self.highlights.iter().filter(|h| h.color == color).collect()
    }

    /// Per-color counts keyed by color name, as stored on processing records.
    pub fn highlight_counts(&self) -> BTreeMap<String, u32> {
        let mut counts = BTreeMap::new();
        for color in HighlightColor::ALL {
            counts.insert(color.as_str().to_string(), 0);
        }
        for h in &self.highlights {
            if let Some(count) = counts.get_mut(h.color.as_str()) {
                *count += 1;
            }
        }
        counts
    }

    pub fn total_highlights(&self) -> usize {
        self.highlights.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn highlight(text: &str, color: HighlightColor) -> Highlight {
        Highlight {
            text: text.to_string(),
            color,
            page: None,
            location: None,
            chapter: None,
            note: None,
        }
    }

    #[test]
    fn test_location_str_variants() {
        let mut h = highlight("x", HighlightColor::Yellow);
        assert_eq!(h.location_str(), "Unknown location");

        h.page = Some(15);
        assert_eq!(h.location_str(), "Page 15");

        h.location = Some(234);
        assert_eq!(h.location_str(), "Page 15, Location 234");

        h.page = None;
        assert_eq!(h.location_str(), "Location 234");
    }

    #[test]
    fn test_highlight_counts_cover_every_color() {
        let metadata = BookMetadata {
            title: "Test Book".to_string(),
            author: "Test Author".to_string(),
            source_file: PathBuf::from("test.html"),
        };
        let book = ParsedBook::new(
            metadata,
            vec![
                highlight("a", HighlightColor::Yellow),
                highlight("b", HighlightColor::Yellow),
                highlight("c", HighlightColor::Blue),
            ],
        );

        let counts = book.highlight_counts();
        assert_eq!(counts["yellow"], 2);
        assert_eq!(counts["pink"], 0);
        assert_eq!(counts["blue"], 1);
        assert_eq!(counts["orange"], 0);
    }

    #[test]
    fn test_color_serde_round_trip() {
        let json = serde_json::to_string(&HighlightColor::Pink).unwrap();
        assert_eq!(json, "\"pink\"");
        let back: HighlightColor = serde_json::from_str(&json).unwrap();
        assert_eq!(back, HighlightColor::Pink);
    }
}
