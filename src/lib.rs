//! # structmd
//!
//! Structure classification and Markdown synthesis for extracted documents.
//!
//! This library takes the positioned, font-annotated text spans, images and
//! links that a page extractor produced, decides the structural role of
//! every span (heading, paragraph, list item, table cell, caption), builds a
//! document tree, and renders it to Markdown.
//!
//! ## Quick Start
//!
//! ```no_run
//! use structmd::{Converter, JsonPageSource};
//!
//! fn main() -> structmd::Result<()> {
//!     let result = Converter::new().convert(JsonPageSource::open("report.json")?)?;
//!     println!("{}", result.markdown);
//!     Ok(())
//! }
//! ```
//!
//! ## Pipeline
//!
//! - **Normalize**: clean text, merge split fragments, assign reading order
//! - **Classify**: font-size and pattern heuristics relative to the body size
//! - **Overlay**: optional hints from a [`provider::SemanticProvider`], with
//!   timeout and fallback to the heuristics
//! - **Build**: nest content under headings and lists, anchor images
//! - **Render**: Markdown with deduplicated, content-addressed image files
//!
//! Problems that do not stop the conversion are returned as
//! [`diagnostics::Warning`]s alongside the output.

pub mod analyze;
pub mod convert;
pub mod diagnostics;
pub mod error;
pub mod model;
pub mod provider;
pub mod render;
pub mod structure;

// Re-export commonly used types
pub use analyze::AnalyzeOptions;
pub use convert::{
    Analysis, CancelToken, ConversionResult, ConvertOptions, Converter, JsonPageSource,
    PageSource, Structure,
};
pub use diagnostics::{Diagnostics, Warning, WarningKind};
pub use error::{Error, ProviderError, Result};
pub use model::{
    BBox, ClassifiedSpan, Confidence, DocumentTree, ImageAsset, InlineRun, LinkTarget, PageInput,
    RawImage, RawSpan, Role, Span,
};
pub use provider::{HintBatching, SemanticProvider, StaticProvider};
pub use render::{ConversionStats, ImageFile, JsonFormat, RenderOptions};

use std::path::Path;

/// Convert extracted pages to Markdown with default options.
///
/// # Example
///
/// ```
/// use structmd::{to_markdown, PageInput, RawSpan};
///
/// let page = PageInput::new(0)
///     .with_span(RawSpan::new("INTRO", 24.0).with_bold(true))
///     .with_span(RawSpan::new("Some body text.", 12.0));
/// let markdown = to_markdown(vec![page]).unwrap();
/// assert_eq!(markdown, "# INTRO\n\nSome body text.\n");
/// ```
pub fn to_markdown<S: PageSource>(source: S) -> Result<String> {
    Ok(Converter::new().convert(source)?.markdown)
}

/// Convert a JSON page dump to Markdown.
///
/// # Example
///
/// ```no_run
/// let markdown = structmd::convert_file("report.json").unwrap();
/// std::fs::write("report.md", markdown).unwrap();
/// ```
pub fn convert_file<P: AsRef<Path>>(path: P) -> Result<String> {
    to_markdown(JsonPageSource::open(path)?)
}

/// Classify a JSON page dump and serialize the analysis.
///
/// # Example
///
/// ```no_run
/// use structmd::{analyze_file, JsonFormat};
///
/// let json = analyze_file("report.json", JsonFormat::Pretty).unwrap();
/// println!("{}", json);
/// ```
pub fn analyze_file<P: AsRef<Path>>(path: P, format: JsonFormat) -> Result<String> {
    let analysis = Converter::new().analyze(JsonPageSource::open(path)?)?;
    render::to_json(&analysis, format)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_markdown_empty() {
        assert_eq!(to_markdown(Vec::<PageInput>::new()).unwrap(), "");
    }

    #[test]
    fn test_analyze_file_missing() {
        let err = analyze_file("/nonexistent/dump.json", JsonFormat::Compact).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
