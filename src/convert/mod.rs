//! Conversion pipeline: page source to Markdown.
//!
//! [`Converter`] runs the stages in order (normalize, classify, overlay,
//! build, render) and collects every warning they record.
//!
//! # Example
//!
//! ```no_run
//! use structmd::convert::{Converter, JsonPageSource};
//!
//! fn main() -> structmd::Result<()> {
//!     let result = Converter::new()
//!         .with_heading_ratio(1.2)
//!         .convert(JsonPageSource::open("report.json")?)?;
//!
//!     for warning in &result.warnings {
//!         eprintln!("{}", warning);
//!     }
//!     result.write_to("out", "report")?;
//!     Ok(())
//! }
//! ```

mod source;

pub use source::{JsonPageSource, PageSource};

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::analyze::{
    classify, merge, normalize, AnalyzeOptions, FontStatistics, OverlayOptions,
};
use crate::diagnostics::{Diagnostics, Warning};
use crate::error::{Error, Result};
use crate::model::{ClassifiedSpan, Confidence, DocumentTree, ImageAsset, LinkSpan, Role};
use crate::provider::{HintBatching, SemanticProvider};
use crate::render::{to_markdown, ConversionStats, ImageFile, RenderOptions};
use crate::structure::build_tree;

/// Cooperative cancellation flag shared with the caller.
///
/// Checked between pages while normalizing and building the tree.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Create a token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Every clone observes it.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Check whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Fail with [`Error::Cancelled`] once cancellation was requested.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Options for a whole conversion.
#[derive(Debug, Clone, Default)]
pub struct ConvertOptions {
    /// Normalization and heuristic thresholds
    pub analyze: AnalyzeOptions,

    /// Markdown rendering options
    pub render: RenderOptions,

    /// Provider batching and timeout
    pub overlay: OverlayOptions,
}

impl ConvertOptions {
    /// Create new conversion options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set analysis options.
    pub fn with_analyze_options(mut self, options: AnalyzeOptions) -> Self {
        self.analyze = options;
        self
    }

    /// Set rendering options.
    pub fn with_render_options(mut self, options: RenderOptions) -> Self {
        self.render = options;
        self
    }

    /// Set how spans are grouped into provider requests.
    pub fn with_batching(mut self, batching: HintBatching) -> Self {
        self.overlay.batching = batching;
        self
    }

    /// Set the per-request provider timeout.
    pub fn with_provider_timeout(mut self, timeout: Duration) -> Self {
        self.overlay.timeout = timeout;
        self
    }

    /// Set the document name shown to the provider.
    pub fn with_document_name(mut self, name: impl Into<String>) -> Self {
        self.overlay.document_name = Some(name.into());
        self
    }

    /// Check that every option is usable.
    pub fn validate(&self) -> Result<()> {
        self.analyze.validate()?;
        if self.overlay.timeout.is_zero() {
            return Err(Error::InvalidOptions(
                "provider timeout must be positive".into(),
            ));
        }
        if self.overlay.batching == HintBatching::Spans(0) {
            return Err(Error::InvalidOptions(
                "span batch size must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Result of converting a document to Markdown.
#[derive(Debug, Clone, Default)]
pub struct ConversionResult {
    /// The Markdown text
    pub markdown: String,

    /// Unique image files referenced by the Markdown
    pub images: Vec<ImageFile>,

    /// Non-fatal problems, in the order they were recorded
    pub warnings: Vec<Warning>,

    /// Conversion statistics
    pub stats: ConversionStats,
}

impl ConversionResult {
    /// Check if any warning was recorded.
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Write `<name>.md` into `dir` and every image next to it under its
    /// relative path. Returns the Markdown file path.
    pub fn write_to<P: AsRef<Path>>(&self, dir: P, name: &str) -> Result<PathBuf> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let md_path = dir.join(format!("{}.md", name));
        fs::write(&md_path, &self.markdown)?;

        for image in &self.images {
            let path = dir.join(&image.relative_path);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&path, &image.bytes)?;
        }

        log::debug!(
            "wrote {} and {} images",
            md_path.display(),
            self.images.len()
        );
        Ok(md_path)
    }
}

/// Classified spans without rendering.
#[derive(Debug, Clone, Serialize)]
pub struct Analysis {
    /// Number of pages in the source
    pub page_count: u32,

    /// Body font size the heading rule compared against
    pub body_font_size: f32,

    /// Every span with its final role, in reading order
    pub spans: Vec<ClassifiedSpan>,

    /// Links attached to spans
    pub links: Vec<LinkSpan>,

    /// Non-fatal problems
    pub warnings: Vec<Warning>,
}

impl Analysis {
    /// Number of spans with the given role.
    pub fn count_role(&self, role: Role) -> usize {
        self.spans.iter().filter(|s| s.role == role).count()
    }

    /// Number of spans classified by the provider.
    pub fn external_count(&self) -> usize {
        self.spans
            .iter()
            .filter(|s| s.confidence == Confidence::External)
            .count()
    }
}

/// The document tree before rendering.
#[derive(Debug, Clone)]
pub struct Structure {
    /// The assembled tree
    pub tree: DocumentTree,

    /// Non-fatal problems
    pub warnings: Vec<Warning>,
}

/// Output of the analysis stages, ready for tree building.
struct Classified {
    spans: Vec<ClassifiedSpan>,
    images: Vec<ImageAsset>,
    links: Vec<LinkSpan>,
    page_count: u32,
    body_size: f32,
}

/// Builder for converting extracted pages to Markdown.
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use structmd::provider::StaticProvider;
/// use structmd::{Converter, JsonPageSource};
///
/// let hints = std::fs::read_to_string("hints.json")?;
/// let markdown = Converter::new()
///     .with_provider(StaticProvider::from_json(&hints).expect("valid hints"))
///     .with_provider_timeout(Duration::from_secs(5))
///     .with_page_anchors(true)
///     .convert(JsonPageSource::open("report.json")?)?
///     .markdown;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Clone, Default)]
pub struct Converter {
    options: ConvertOptions,
    provider: Option<Arc<dyn SemanticProvider>>,
    cancel: CancelToken,
}

impl Converter {
    /// Create a converter with default options and no provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace all options.
    pub fn with_options(mut self, options: ConvertOptions) -> Self {
        self.options = options;
        self
    }

    /// Use a semantic classification provider.
    pub fn with_provider(self, provider: impl SemanticProvider + 'static) -> Self {
        self.with_shared_provider(Arc::new(provider))
    }

    /// Use a provider shared with other converters.
    pub fn with_shared_provider(mut self, provider: Arc<dyn SemanticProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Observe an externally owned cancellation token.
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Set the heading size ratio.
    pub fn with_heading_ratio(mut self, ratio: f32) -> Self {
        self.options.analyze = self.options.analyze.with_heading_ratio(ratio);
        self
    }

    /// Enable or disable caption detection.
    pub fn with_captions(mut self, detect: bool) -> Self {
        self.options.analyze = self.options.analyze.with_captions(detect);
        self
    }

    /// Set provider request batching.
    pub fn with_batching(mut self, batching: HintBatching) -> Self {
        self.options = self.options.with_batching(batching);
        self
    }

    /// Set the per-request provider timeout.
    pub fn with_provider_timeout(mut self, timeout: Duration) -> Self {
        self.options = self.options.with_provider_timeout(timeout);
        self
    }

    /// Set the image path prefix used in the Markdown.
    pub fn with_image_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.options.render = self.options.render.with_image_prefix(prefix);
        self
    }

    /// Emit page anchors.
    pub fn with_page_anchors(mut self, anchors: bool) -> Self {
        self.options.render = self.options.render.with_page_anchors(anchors);
        self
    }

    /// Current options.
    pub fn options(&self) -> &ConvertOptions {
        &self.options
    }

    /// A handle that cancels conversions run by this converter.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Classify every span without building or rendering.
    pub fn analyze<S: PageSource>(&self, source: S) -> Result<Analysis> {
        let mut diag = Diagnostics::new();
        let classified = self.classify_source(source, &mut diag)?;
        Ok(Analysis {
            page_count: classified.page_count,
            body_font_size: classified.body_size,
            spans: classified.spans,
            links: classified.links,
            warnings: diag.into_warnings(),
        })
    }

    /// Build the document tree without rendering.
    pub fn structure<S: PageSource>(&self, source: S) -> Result<Structure> {
        let mut diag = Diagnostics::new();
        let classified = self.classify_source(source, &mut diag)?;
        let tree = build_tree(
            classified.spans,
            classified.images,
            classified.links,
            classified.page_count,
            &self.cancel,
            &mut diag,
        )?;
        Ok(Structure {
            tree,
            warnings: diag.into_warnings(),
        })
    }

    /// Convert a page source to Markdown.
    pub fn convert<S: PageSource>(&self, source: S) -> Result<ConversionResult> {
        let mut diag = Diagnostics::new();
        let classified = self.classify_source(source, &mut diag)?;

        let span_count = classified.spans.len() as u32;
        let external_count = classified
            .spans
            .iter()
            .filter(|s| s.confidence == Confidence::External)
            .count() as u32;

        let tree = build_tree(
            classified.spans,
            classified.images,
            classified.links,
            classified.page_count,
            &self.cancel,
            &mut diag,
        )?;
        let output = to_markdown(&tree, &self.options.render, &mut diag);

        let mut stats = output.stats;
        stats.span_count = span_count;
        stats.external_count = external_count;
        stats.warning_count = diag.warnings().len() as u32;

        log::debug!(
            "converted {} spans into {} headings, {} paragraphs, {} list items ({} warnings)",
            stats.span_count,
            stats.heading_count,
            stats.paragraph_count,
            stats.list_item_count,
            stats.warning_count
        );

        Ok(ConversionResult {
            markdown: output.markdown,
            images: output.images,
            warnings: diag.into_warnings(),
            stats,
        })
    }

    fn classify_source<S: PageSource>(
        &self,
        source: S,
        diag: &mut Diagnostics,
    ) -> Result<Classified> {
        self.options.validate()?;
        self.cancel.check()?;

        let mut overlay = self.options.overlay.clone();
        if overlay.document_name.is_none() {
            overlay.document_name = source.name();
        }

        let pages = source.load()?;
        let analyze = &self.options.analyze;
        let doc = normalize(pages, analyze, &self.cancel, diag)?;

        let body_size = FontStatistics::from_spans(&doc.spans, analyze.min_body_chars).body_size;
        let labels = classify(&doc.spans, &doc.images, analyze);
        self.cancel.check()?;

        let spans = merge(
            doc.spans,
            labels,
            self.provider.as_ref(),
            &overlay,
            doc.page_count,
            diag,
        );
        self.cancel.check()?;

        Ok(Classified {
            spans,
            images: doc.images,
            links: doc.links,
            page_count: doc.page_count,
            body_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::WarningKind;
    use crate::model::{PageInput, RawSpan};
    use crate::error::ProviderError;
    use crate::provider::{ClassificationRequest, FnProvider, HintMap, ProviderReply, RawHint};

    fn pages() -> Vec<PageInput> {
        vec![PageInput::new(0)
            .with_span(RawSpan::new("Overview", 20.0).with_bold(true))
            .with_span(RawSpan::new("The body text of the section.", 12.0))
            .with_span(RawSpan::new("More body text follows here.", 12.0))]
    }

    #[test]
    fn test_cancel_token_shared_between_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(token.check().is_ok());

        clone.cancel();
        assert!(token.is_cancelled());
        assert!(matches!(token.check(), Err(Error::Cancelled)));
    }

    #[test]
    fn test_convert_options_builder() {
        let options = ConvertOptions::new()
            .with_batching(HintBatching::Page)
            .with_provider_timeout(Duration::from_millis(250))
            .with_document_name("report.pdf");

        assert_eq!(options.overlay.batching, HintBatching::Page);
        assert_eq!(options.overlay.timeout, Duration::from_millis(250));
        assert_eq!(options.overlay.document_name.as_deref(), Some("report.pdf"));
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_invalid_options_rejected() {
        let options = ConvertOptions::new().with_provider_timeout(Duration::ZERO);
        assert!(matches!(options.validate(), Err(Error::InvalidOptions(_))));

        let result = Converter::new()
            .with_batching(HintBatching::Spans(0))
            .convert(pages());
        assert!(matches!(result, Err(Error::InvalidOptions(_))));
    }

    #[test]
    fn test_convert_collects_stats() {
        let result = Converter::new().convert(pages()).unwrap();

        assert_eq!(
            result.markdown,
            "# Overview\n\nThe body text of the section.\n\nMore body text follows here.\n"
        );
        assert_eq!(result.stats.span_count, 3);
        assert_eq!(result.stats.heading_count, 1);
        assert_eq!(result.stats.paragraph_count, 2);
        assert_eq!(result.stats.external_count, 0);
        assert!(!result.has_warnings());
    }

    #[test]
    fn test_cancelled_before_start() {
        let converter = Converter::new();
        converter.cancel_token().cancel();
        assert!(matches!(converter.convert(pages()), Err(Error::Cancelled)));
    }

    #[test]
    fn test_analyze_reports_body_size() {
        let analysis = Converter::new().analyze(pages()).unwrap();
        assert_eq!(analysis.body_font_size, 12.0);
        assert_eq!(analysis.count_role(Role::Heading), 1);
        assert_eq!(analysis.count_role(Role::Paragraph), 2);
        assert_eq!(analysis.page_count, 1);
    }

    #[test]
    fn test_provider_override_counted() {
        let provider = FnProvider::new(|_request: &ClassificationRequest| {
            let mut hints = HintMap::new();
            hints.insert(2, RawHint::new("heading", Some(2)));
            Ok::<_, ProviderError>(ProviderReply::Hints(hints))
        });
        let result = Converter::new()
            .with_provider(provider)
            .convert(pages())
            .unwrap();

        assert_eq!(result.stats.external_count, 1);
        assert!(result.markdown.contains("## More body text follows here."));
    }

    #[test]
    fn test_failing_provider_becomes_warning() {
        let provider = FnProvider::new(|_request: &ClassificationRequest| {
            Err::<ProviderReply, _>(ProviderError::Failed("offline".into()))
        });
        let result = Converter::new()
            .with_provider(provider)
            .convert(pages())
            .unwrap();

        assert_eq!(result.warnings.len(), 1);
        assert_eq!(
            result.warnings[0].kind,
            WarningKind::ClassificationProviderFailure
        );
        assert_eq!(result.stats.warning_count, 1);
        assert!(result.markdown.starts_with("# Overview\n"));
    }

    #[test]
    fn test_write_to_creates_sidecar_images() {
        let dir = tempfile::tempdir().unwrap();
        let result = ConversionResult {
            markdown: "![Image](images/abc.png)\n".into(),
            images: vec![ImageFile {
                filename: "abc.png".into(),
                relative_path: "images/abc.png".into(),
                bytes: vec![1, 2, 3],
            }],
            ..Default::default()
        };

        let md = result.write_to(dir.path().join("out"), "doc").unwrap();
        assert_eq!(fs::read_to_string(&md).unwrap(), result.markdown);
        assert_eq!(
            fs::read(dir.path().join("out/images/abc.png")).unwrap(),
            vec![1, 2, 3]
        );
    }
}
