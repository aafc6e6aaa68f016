//! Rendering result with image files and statistics.

use serde::{Deserialize, Serialize};

/// An image file to write next to the Markdown output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageFile {
    /// File name (e.g., "3f2a9c1d.png")
    pub filename: String,
    /// Path used in the Markdown (prefix + filename)
    pub relative_path: String,
    /// Encoded image bytes
    #[serde(skip)]
    pub bytes: Vec<u8>,
}

/// Rendered Markdown plus the files it references.
#[derive(Debug, Clone, Default)]
pub struct RenderOutput {
    /// The Markdown text
    pub markdown: String,
    /// Unique image files, in first-reference order
    pub images: Vec<ImageFile>,
    /// Counts collected while rendering
    pub stats: ConversionStats,
}

/// Statistics collected during a conversion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionStats {
    /// Total number of pages
    pub page_count: u32,

    /// Number of spans after normalization
    pub span_count: u32,

    /// Spans whose role came from the semantic provider
    pub external_count: u32,

    /// Number of headings rendered
    pub heading_count: u32,

    /// Number of paragraphs rendered (captions excluded)
    pub paragraph_count: u32,

    /// Number of captions rendered
    pub caption_count: u32,

    /// Number of list items rendered
    pub list_item_count: u32,

    /// Number of tables rendered
    pub table_count: u32,

    /// Number of image references rendered
    pub image_count: u32,

    /// Number of distinct image files
    pub image_file_count: u32,

    /// Approximate word count (whitespace-separated tokens)
    pub word_count: u32,

    /// Character count (excluding whitespace)
    pub char_count: u32,

    /// Number of warnings recorded
    pub warning_count: u32,
}

impl ConversionStats {
    /// Create new empty statistics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment heading count.
    pub fn add_heading(&mut self) {
        self.heading_count += 1;
    }

    /// Increment paragraph or caption count.
    pub fn add_paragraph(&mut self, caption: bool) {
        if caption {
            self.caption_count += 1;
        } else {
            self.paragraph_count += 1;
        }
    }

    /// Increment list item count.
    pub fn add_list_item(&mut self) {
        self.list_item_count += 1;
    }

    /// Increment table count.
    pub fn add_table(&mut self) {
        self.table_count += 1;
    }

    /// Increment image reference count.
    pub fn add_image(&mut self) {
        self.image_count += 1;
    }

    /// Add word and character counts from text.
    pub fn count_text(&mut self, text: &str) {
        // Word count: whitespace-separated tokens
        self.word_count += text.split_whitespace().count() as u32;

        // Character count: non-whitespace characters
        self.char_count += text.chars().filter(|c| !c.is_whitespace()).count() as u32;
    }

    /// Merge another stats instance into this one.
    pub fn merge(&mut self, other: &ConversionStats) {
        self.page_count += other.page_count;
        self.span_count += other.span_count;
        self.external_count += other.external_count;
        self.heading_count += other.heading_count;
        self.paragraph_count += other.paragraph_count;
        self.caption_count += other.caption_count;
        self.list_item_count += other.list_item_count;
        self.table_count += other.table_count;
        self.image_count += other.image_count;
        self.image_file_count += other.image_file_count;
        self.word_count += other.word_count;
        self.char_count += other.char_count;
        self.warning_count += other.warning_count;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversion_stats_count_text() {
        let mut stats = ConversionStats::new();
        stats.count_text("Hello, world! This is a test.");

        assert_eq!(stats.word_count, 6);
        assert_eq!(stats.char_count, 24);
    }

    #[test]
    fn test_conversion_stats_merge() {
        let mut stats1 = ConversionStats::new();
        stats1.paragraph_count = 5;
        stats1.table_count = 2;

        let stats2 = ConversionStats {
            paragraph_count: 3,
            table_count: 1,
            image_count: 4,
            ..Default::default()
        };

        stats1.merge(&stats2);

        assert_eq!(stats1.paragraph_count, 8);
        assert_eq!(stats1.table_count, 3);
        assert_eq!(stats1.image_count, 4);
    }

    #[test]
    fn test_add_paragraph_splits_captions() {
        let mut stats = ConversionStats::new();
        stats.add_paragraph(false);
        stats.add_paragraph(true);
        assert_eq!((stats.paragraph_count, stats.caption_count), (1, 1));
    }
}
