//! Span-level types: raw extractor output and normalized spans.

use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle in points, top-left origin, y grows downward.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "[f32; 4]", into = "[f32; 4]")]
pub struct BBox {
    /// Left edge
    pub x0: f32,
    /// Top edge
    pub y0: f32,
    /// Right edge
    pub x1: f32,
    /// Bottom edge
    pub y1: f32,
}

impl BBox {
    /// Create a new rectangle.
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// Width of the rectangle.
    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    /// Height of the rectangle.
    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }

    /// Horizontal centre.
    pub fn center_x(&self) -> f32 {
        (self.x0 + self.x1) / 2.0
    }

    /// Check that all coordinates are finite and the box is not inverted.
    pub fn is_valid(&self) -> bool {
        [self.x0, self.y0, self.x1, self.y1]
            .iter()
            .all(|v| v.is_finite())
            && self.x1 >= self.x0
            && self.y1 >= self.y0
    }

    /// Smallest rectangle containing both.
    pub fn union(&self, other: &BBox) -> BBox {
        BBox {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }

    /// Check whether the horizontal extents overlap.
    pub fn overlaps_x(&self, other: &BBox) -> bool {
        self.x0 <= other.x1 && other.x0 <= self.x1
    }
}

impl From<[f32; 4]> for BBox {
    fn from(v: [f32; 4]) -> Self {
        BBox::new(v[0], v[1], v[2], v[3])
    }
}

impl From<BBox> for [f32; 4] {
    fn from(b: BBox) -> Self {
        [b.x0, b.y0, b.x1, b.y1]
    }
}

/// A span as delivered by the page extractor, before normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSpan {
    /// Text content
    pub text: String,
    /// Font size in points
    #[serde(alias = "size")]
    pub font_size: f32,
    /// Bold flag; inferred from the font name when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_bold: Option<bool>,
    /// Italic flag; inferred from the font name when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_italic: Option<bool>,
    /// Font name (e.g., "Helvetica-Bold")
    #[serde(default, alias = "font")]
    pub font_name: String,
    /// Placement on the page
    #[serde(default)]
    pub bbox: BBox,
}

impl RawSpan {
    /// Create a raw span with default geometry and a regular font.
    pub fn new(text: impl Into<String>, font_size: f32) -> Self {
        Self {
            text: text.into(),
            font_size,
            is_bold: None,
            is_italic: None,
            font_name: String::new(),
            bbox: BBox::default(),
        }
    }

    /// Set the bold flag.
    pub fn with_bold(mut self, bold: bool) -> Self {
        self.is_bold = Some(bold);
        self
    }

    /// Set the italic flag.
    pub fn with_italic(mut self, italic: bool) -> Self {
        self.is_italic = Some(italic);
        self
    }

    /// Set the font name.
    pub fn with_font(mut self, name: impl Into<String>) -> Self {
        self.font_name = name.into();
        self
    }

    /// Set the bounding box.
    pub fn with_bbox(mut self, bbox: BBox) -> Self {
        self.bbox = bbox;
        self
    }

    /// Bold flag, falling back to the font name.
    pub fn bold(&self) -> bool {
        self.is_bold.unwrap_or_else(|| {
            let name = self.font_name.to_lowercase();
            name.contains("bold") || name.contains("black") || name.contains("heavy")
        })
    }

    /// Italic flag, falling back to the font name.
    pub fn italic(&self) -> bool {
        self.is_italic.unwrap_or_else(|| {
            let name = self.font_name.to_lowercase();
            name.contains("italic") || name.contains("oblique")
        })
    }
}

/// An embedded raster image as delivered by the extractor.
#[derive(Debug, Clone, PartialEq)]
pub struct RawImage {
    /// Encoded image bytes (PNG, JPEG, ...)
    pub bytes: Vec<u8>,
    /// Placement on the page
    pub bbox: BBox,
}

impl RawImage {
    /// Create a raw image.
    pub fn new(bytes: Vec<u8>, bbox: BBox) -> Self {
        Self { bytes, bbox }
    }
}

/// Where a link points.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LinkTarget {
    /// An external URL
    External {
        /// Target URL
        url: String,
    },
    /// A page inside the same document (0-indexed)
    Page {
        /// Target page index
        page_index: u32,
    },
}

/// A link as delivered by the extractor, addressed by raw span position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawLink {
    /// Index into the page's raw span list
    pub span_index: usize,
    /// Link destination
    pub target: LinkTarget,
}

/// A link attached to a normalized span.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkSpan {
    /// `order_index` of the span carrying the link
    pub source_span_order_index: usize,
    /// Link destination
    pub target: LinkTarget,
}

/// Everything the extractor produced for one page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageInput {
    /// Page index (0-indexed)
    pub page_index: u32,
    /// Spans in extraction order
    pub spans: Vec<RawSpan>,
    /// Embedded images in extraction order
    pub images: Vec<RawImage>,
    /// Links on the page
    pub links: Vec<RawLink>,
}

impl PageInput {
    /// Create an empty page.
    pub fn new(page_index: u32) -> Self {
        Self {
            page_index,
            ..Default::default()
        }
    }

    /// Add a span.
    pub fn with_span(mut self, span: RawSpan) -> Self {
        self.spans.push(span);
        self
    }

    /// Add an image.
    pub fn with_image(mut self, image: RawImage) -> Self {
        self.images.push(image);
        self
    }

    /// Add a link from the span at `span_index`.
    pub fn with_link(mut self, span_index: usize, target: LinkTarget) -> Self {
        self.links.push(RawLink { span_index, target });
        self
    }
}

/// A normalized span with a document-wide reading-order key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Span {
    /// Text content (leading whitespace preserved)
    pub text: String,
    /// Font size in points
    pub font_size: f32,
    /// Bold font
    pub is_bold: bool,
    /// Italic font
    pub is_italic: bool,
    /// Font name
    pub font_name: String,
    /// Placement on the page
    pub bbox: BBox,
    /// Page index (0-indexed)
    pub page_index: u32,
    /// Document-wide reading order
    pub order_index: usize,
}

impl Span {
    /// Number of whitespace-separated words.
    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }

    /// Number of characters after trimming.
    pub fn char_count(&self) -> usize {
        self.text.trim().chars().count()
    }

    /// Check whether the span has no visible text.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// Check whether two spans share font attributes.
    pub fn same_font(&self, other: &Span) -> bool {
        (self.font_size - other.font_size).abs() < 0.01
            && self.is_bold == other.is_bold
            && self.is_italic == other.is_italic
            && self.font_name == other.font_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bbox_union_and_validity() {
        let a = BBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BBox::new(5.0, -2.0, 20.0, 8.0);
        assert_eq!(a.union(&b), BBox::new(0.0, -2.0, 20.0, 10.0));
        assert!(a.is_valid());
        assert!(!BBox::new(10.0, 0.0, 0.0, 5.0).is_valid());
        assert!(!BBox::new(f32::NAN, 0.0, 1.0, 1.0).is_valid());
    }

    #[test]
    fn test_raw_span_style_inference() {
        let span = RawSpan::new("Test", 12.0).with_font("Helvetica-Bold");
        assert!(span.bold());
        assert!(!span.italic());

        let span = RawSpan::new("Test", 12.0).with_font("Times-Oblique");
        assert!(!span.bold());
        assert!(span.italic());

        let span = RawSpan::new("Test", 12.0)
            .with_font("Helvetica-Bold")
            .with_bold(false);
        assert!(!span.bold());
    }

    #[test]
    fn test_bbox_serde_as_array() {
        let json = serde_json::to_string(&BBox::new(1.0, 2.0, 3.0, 4.0)).unwrap();
        assert_eq!(json, "[1.0,2.0,3.0,4.0]");
        let back: BBox = serde_json::from_str("[1, 2, 3, 4]").unwrap();
        assert_eq!(back, BBox::new(1.0, 2.0, 3.0, 4.0));
    }
}
