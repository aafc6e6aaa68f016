//! Document model types.
//!
//! This module defines the data that flows through the pipeline: raw
//! extractor output, normalized spans, classified spans, and the document
//! tree the renderer consumes.

mod classified;
mod image;
mod inline;
mod span;
mod tree;

pub use classified::{ClassifiedSpan, Confidence, ListMarker, Role};
pub use image::{content_hash, detect_mime_type, ImageAsset};
pub use inline::{plain_text, InlineRun, RunLink};
pub use span::{BBox, LinkSpan, LinkTarget, PageInput, RawImage, RawLink, RawSpan, Span};
pub use tree::{AssetId, DocumentTree, Node, NodeId, NodeKind};
