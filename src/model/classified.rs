//! Structural roles and classified spans.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{InlineRun, Span};

/// Structural role of a span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Section heading, level 1-6
    Heading,
    /// Body paragraph
    Paragraph,
    /// List item, level = nesting depth
    ListItem,
    /// Table cell
    TableCell,
    /// Image or table caption
    Caption,
    /// No visible content; dropped before tree building
    Blank,
}

impl Role {
    /// Whether `level` is meaningful for this role.
    pub fn has_level(self) -> bool {
        matches!(self, Role::Heading | Role::ListItem)
    }

    /// Check a level against the per-role invariant.
    pub fn accepts_level(self, level: i64) -> bool {
        match self {
            Role::Heading => (1..=6).contains(&level),
            Role::ListItem => (0..=u8::MAX as i64).contains(&level),
            _ => true,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Heading => "heading",
            Role::Paragraph => "paragraph",
            Role::ListItem => "list_item",
            Role::TableCell => "table_cell",
            Role::Caption => "caption",
            Role::Blank => "blank",
        };
        f.write_str(name)
    }
}

/// Where a classification came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    /// Built-in font/pattern heuristics
    #[default]
    Heuristic,
    /// A validated hint from the semantic provider
    External,
}

/// The bullet or number that introduced a list item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListMarker {
    /// Numbered or lettered marker
    pub ordered: bool,
    /// The marker text as written (e.g. "•", "3.", "b)")
    pub marker: String,
    /// Byte offset where the item content starts in the span text
    pub content_start: usize,
}

/// A span with its final structural decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedSpan {
    /// The normalized span
    #[serde(flatten)]
    pub span: Span,
    /// Structural role
    pub role: Role,
    /// Heading level (1-6), list depth, or 0
    pub level: u8,
    /// Heuristic or external
    pub confidence: Confidence,
    /// List marker when the text carried one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marker: Option<ListMarker>,
    /// Display runs (marker stripped, links attached later)
    pub inline_runs: Vec<InlineRun>,
}

impl ClassifiedSpan {
    /// Assemble a classified span, deriving its display runs from the role.
    pub fn new(
        span: Span,
        role: Role,
        level: u8,
        confidence: Confidence,
        marker: Option<ListMarker>,
    ) -> Self {
        let level = if role.has_level() { level } else { 0 };
        let text = display_text(&span, role, marker.as_ref());
        let inline_runs = if text.is_empty() {
            Vec::new()
        } else {
            vec![InlineRun::styled(text, span.is_bold, span.is_italic)]
        };
        Self {
            span,
            role,
            level,
            confidence,
            marker,
            inline_runs,
        }
    }

    /// Shorthand for the span's reading-order key.
    pub fn order_index(&self) -> usize {
        self.span.order_index
    }

    /// Shorthand for the span's page.
    pub fn page_index(&self) -> u32 {
        self.span.page_index
    }

    /// Whether the list marker is numeric/lettered.
    pub fn is_ordered_item(&self) -> bool {
        self.marker.as_ref().map(|m| m.ordered).unwrap_or(false)
    }
}

fn display_text(span: &Span, role: Role, marker: Option<&ListMarker>) -> String {
    match (role, marker) {
        (Role::ListItem, Some(m)) => span
            .text
            .get(m.content_start..)
            .unwrap_or(&span.text)
            .trim()
            .to_string(),
        _ => span.text.trim().to_string(),
    }
}
