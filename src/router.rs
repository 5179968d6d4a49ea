use crate::model::{Highlight, HighlightColor, ParsedBook};

/// A parsed book's highlights partitioned into the four processing lanes.
/// Borrows from the book; every highlight lands in exactly one lane and lane
/// order matches document order.
#[derive(Debug)]
pub struct RoutedHighlights<'a> {
    /// Yellow: fed to concept extraction.
    pub concepts: Vec<&'a Highlight>,
    /// Pink: fed to action extraction.
    pub actions: Vec<&'a Highlight>,
    /// Blue: stored in the book note.
    pub quotes: Vec<&'a Highlight>,
    /// Orange: stored in the book note.
    pub disagreements: Vec<&'a Highlight>,
}

impl RoutedHighlights<'_> {
    pub fn total(&self) -> usize {
        self.concepts.len() + self.actions.len() + self.quotes.len() + self.disagreements.len()
    }
}

/// Stable partition of a book's highlights by color.
pub fn route_highlights(book: &ParsedBook) -> RoutedHighlights<'_> {
    let mut routed = RoutedHighlights {
        concepts: Vec::new(),
        actions: Vec::new(),
        quotes: Vec::new(),
        disagreements: Vec::new(),
    };

    for highlight in &book.highlights {
        match highlight.color {
            HighlightColor::Yellow => routed.concepts.push(highlight),
            HighlightColor::Pink => routed.actions.push(highlight),
            HighlightColor::Blue => routed.quotes.push(highlight),
            HighlightColor::Orange => routed.disagreements.push(highlight),
        }
    }

    routed
}
