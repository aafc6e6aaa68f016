//! Analysis options and configuration.

use crate::error::{Error, Result};

/// Tuning knobs for normalization and heuristic classification.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzeOptions {
    /// Maximum horizontal gap, as a fraction of the font size, for two
    /// same-line spans to merge
    pub merge_gap_ratio: f32,

    /// Minimum trimmed character count for a span to vote on the body size
    pub min_body_chars: usize,

    /// A heading must be larger than `body_size * heading_ratio`
    pub heading_ratio: f32,

    /// Non-bold heading candidates must have at most this many words
    pub heading_max_words: usize,

    /// Heading sizes within this many points share a level
    pub size_tolerance: f32,

    /// Indent unit used when no nonzero list indent is observed, in
    /// whitespace columns
    pub default_indent_columns: f32,

    /// Indent unit used when no nonzero list indent is observed, in points
    pub default_indent_points: f32,

    /// Captions have at most this many words
    pub caption_max_words: usize,

    /// Captions start at most `caption_max_gap_ratio * font_size` below the image
    pub caption_max_gap_ratio: f32,

    /// Whether to run the caption rule at all
    pub detect_captions: bool,
}

impl AnalyzeOptions {
    /// Create new analyze options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the heading size ratio.
    pub fn with_heading_ratio(mut self, ratio: f32) -> Self {
        self.heading_ratio = ratio;
        self
    }

    /// Set the word ceiling for non-bold headings.
    pub fn with_heading_max_words(mut self, words: usize) -> Self {
        self.heading_max_words = words;
        self
    }

    /// Set the heading size tolerance band.
    pub fn with_size_tolerance(mut self, points: f32) -> Self {
        self.size_tolerance = points;
        self
    }

    /// Set the minimum character count for body-size voting.
    pub fn with_min_body_chars(mut self, chars: usize) -> Self {
        self.min_body_chars = chars;
        self
    }

    /// Set the span merge gap ratio.
    pub fn with_merge_gap_ratio(mut self, ratio: f32) -> Self {
        self.merge_gap_ratio = ratio;
        self
    }

    /// Enable or disable caption detection.
    pub fn with_captions(mut self, detect: bool) -> Self {
        self.detect_captions = detect;
        self
    }

    /// Check that every threshold is usable.
    pub fn validate(&self) -> Result<()> {
        if !self.heading_ratio.is_finite() || self.heading_ratio < 1.0 {
            return Err(Error::InvalidOptions(format!(
                "heading_ratio must be >= 1.0, got {}",
                self.heading_ratio
            )));
        }
        if !self.size_tolerance.is_finite() || self.size_tolerance < 0.0 {
            return Err(Error::InvalidOptions(format!(
                "size_tolerance must be >= 0, got {}",
                self.size_tolerance
            )));
        }
        if !self.merge_gap_ratio.is_finite() || self.merge_gap_ratio < 0.0 {
            return Err(Error::InvalidOptions(format!(
                "merge_gap_ratio must be >= 0, got {}",
                self.merge_gap_ratio
            )));
        }
        if self.default_indent_columns <= 0.0 || self.default_indent_points <= 0.0 {
            return Err(Error::InvalidOptions(
                "default indent units must be positive".into(),
            ));
        }
        Ok(())
    }
}

impl Default for AnalyzeOptions {
    fn default() -> Self {
        Self {
            merge_gap_ratio: 0.15,
            min_body_chars: 10,
            heading_ratio: 1.15,
            heading_max_words: 12,
            size_tolerance: 0.5,
            default_indent_columns: 2.0,
            default_indent_points: 18.0,
            caption_max_words: 15,
            caption_max_gap_ratio: 2.0,
            detect_captions: true,
        }
    }
}
