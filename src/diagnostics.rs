//! Non-fatal diagnostics collected across all pipeline stages.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Category of a non-fatal problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// The semantic provider timed out, failed, or sent an unusable hint.
    ClassificationProviderFailure,
    /// A link pointed nowhere usable and was rendered as plain text.
    UnresolvedLinkTarget,
    /// A span or image from the extractor was malformed and dropped.
    MalformedSpanData,
    /// The renderer fell back to plain output for some content.
    RenderDegraded,
}

impl fmt::Display for WarningKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WarningKind::ClassificationProviderFailure => write!(f, "provider"),
            WarningKind::UnresolvedLinkTarget => write!(f, "link"),
            WarningKind::MalformedSpanData => write!(f, "span"),
            WarningKind::RenderDegraded => write!(f, "render"),
        }
    }
}

/// A single warning, optionally tied to a span by `order_index`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Warning {
    /// Span the warning refers to, if any
    pub order_index: Option<usize>,
    /// Warning category
    pub kind: WarningKind,
    /// Human-readable description
    pub message: String,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.order_index {
            Some(idx) => write!(f, "[{}] span {}: {}", self.kind, idx, self.message),
            None => write!(f, "[{}] {}", self.kind, self.message),
        }
    }
}

/// Ordered warning collector threaded through the pipeline.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    /// Create an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a warning and log it.
    pub fn warn(&mut self, kind: WarningKind, order_index: Option<usize>, message: impl Into<String>) {
        let warning = Warning {
            order_index,
            kind,
            message: message.into(),
        };
        log::warn!("{}", warning);
        self.warnings.push(warning);
    }

    /// Record a warning about a specific span.
    pub fn warn_span(&mut self, kind: WarningKind, order_index: usize, message: impl Into<String>) {
        self.warn(kind, Some(order_index), message);
    }

    /// Warnings recorded so far, in order.
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Number of warnings of the given kind.
    pub fn count(&self, kind: WarningKind) -> usize {
        self.warnings.iter().filter(|w| w.kind == kind).count()
    }

    /// Check if no warnings were recorded.
    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }

    /// Consume the collector, returning the warnings.
    pub fn into_warnings(self) -> Vec<Warning> {
        self.warnings
    }
}
