//! Inline text runs.

use serde::{Deserialize, Serialize};

/// A link attached to a run, already resolved against the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum RunLink {
    /// External URL
    Url(String),
    /// Page inside the document (0-indexed)
    Page(u32),
    /// Target could not be resolved; the note is rendered after the text
    Unresolved(String),
}

/// A run of text with consistent styling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineRun {
    /// The text content
    pub text: String,

    /// Bold text
    #[serde(default)]
    pub bold: bool,

    /// Italic text
    #[serde(default)]
    pub italic: bool,

    /// Link target, if the run is a link
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<RunLink>,
}

impl InlineRun {
    /// Create a plain text run.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            bold: false,
            italic: false,
            link: None,
        }
    }

    /// Create a run with explicit styling.
    pub fn styled(text: impl Into<String>, bold: bool, italic: bool) -> Self {
        Self {
            text: text.into(),
            bold,
            italic,
            link: None,
        }
    }

    /// Create a bold text run.
    pub fn bold(text: impl Into<String>) -> Self {
        Self::styled(text, true, false)
    }

    /// Create an italic text run.
    pub fn italic(text: impl Into<String>) -> Self {
        Self::styled(text, false, true)
    }

    /// Attach a link.
    pub fn with_link(mut self, link: RunLink) -> Self {
        self.link = Some(link);
        self
    }

    /// Check if this run is empty.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Concatenate the text of a run sequence.
pub fn plain_text(runs: &[InlineRun]) -> String {
    runs.iter().map(|r| r.text.as_str()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text() {
        let runs = vec![
            InlineRun::new("Hello "),
            InlineRun::bold("world"),
            InlineRun::new("!"),
        ];
        assert_eq!(plain_text(&runs), "Hello world!");
    }

    #[test]
    fn test_run_styling() {
        let plain = InlineRun::new("x");
        assert!(!plain.bold && !plain.italic);
        assert!(InlineRun::bold("x").bold);
        assert!(InlineRun::italic("x").italic);
    }
}
