//! Semantic classification providers.
//!
//! A provider is an optional oracle that labels spans with structural roles.
//! It may be an interactive prompt, a callback, or a static hint file. The
//! pipeline never depends on it: every call is bounded by a timeout, and any
//! failure falls back to the heuristic labels.

pub mod prompt;

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, RecvTimeoutError};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProviderError;
use crate::model::{BBox, Span};

pub use prompt::{build_analysis_prompt, PromptProvider};

/// Default time to wait for a provider answer.
pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(30);

/// What the provider sees of one span.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpanSummary {
    /// Reading-order key; hints are addressed by it
    pub order_index: usize,
    /// Span text
    pub text: String,
    /// Font size in points
    pub font_size: f32,
    /// Bold font
    pub is_bold: bool,
    /// Italic font
    pub is_italic: bool,
    /// Page index (0-indexed)
    pub page_index: u32,
    /// Font name
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub font_name: String,
    /// Placement on the page
    #[serde(default)]
    pub bbox: BBox,
}

impl From<&Span> for SpanSummary {
    fn from(span: &Span) -> Self {
        Self {
            order_index: span.order_index,
            text: span.text.trim().to_string(),
            font_size: span.font_size,
            is_bold: span.is_bold,
            is_italic: span.is_italic,
            page_index: span.page_index,
            font_name: span.font_name.clone(),
            bbox: span.bbox,
        }
    }
}

/// One batch of spans submitted to a provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassificationRequest {
    /// Source document name, if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_name: Option<String>,
    /// Page this batch covers when batching per page
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_index: Option<u32>,
    /// Total pages in the document
    pub page_count: u32,
    /// Spans in reading order
    pub spans: Vec<SpanSummary>,
}

impl ClassificationRequest {
    /// Build a request for a slice of spans.
    pub fn from_spans(spans: &[Span], page_count: u32) -> Self {
        Self {
            document_name: None,
            page_index: None,
            page_count,
            spans: spans.iter().map(SpanSummary::from).collect(),
        }
    }

    /// Set the document name shown to the provider.
    pub fn with_document_name(mut self, name: impl Into<String>) -> Self {
        self.document_name = Some(name.into());
        self
    }

    /// Set the page this batch covers.
    pub fn with_page(mut self, page_index: u32) -> Self {
        self.page_index = Some(page_index);
        self
    }
}

/// An unvalidated role hint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawHint {
    /// Role name as the provider wrote it
    #[serde(alias = "type")]
    pub role: String,
    /// Heading level or list depth
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<i64>,
}

impl RawHint {
    /// Create a hint.
    pub fn new(role: impl Into<String>, level: Option<i64>) -> Self {
        Self {
            role: role.into(),
            level,
        }
    }
}

/// Hints keyed by `order_index`.
pub type HintMap = BTreeMap<usize, RawHint>;

/// Hints recovered from a reply, plus the keys that could not be used.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedHints {
    /// Hints addressed by span index
    pub hints: HintMap,
    /// Keys that were not span indices
    pub skipped_keys: Vec<String>,
}

impl From<HintMap> for ParsedHints {
    fn from(hints: HintMap) -> Self {
        Self {
            hints,
            skipped_keys: Vec::new(),
        }
    }
}

/// A provider's answer to one request.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderReply {
    /// Structured hints
    Hints(HintMap),
    /// Free text expected to contain JSON hints
    Text(String),
    /// The provider declined to answer
    NoAnswer,
}

/// How spans are grouped into provider requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HintBatching {
    /// One request for the whole document
    #[default]
    Document,
    /// One request per page
    Page,
    /// Requests of at most this many spans
    Spans(usize),
}

/// A semantic classification oracle.
pub trait SemanticProvider: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str {
        "provider"
    }

    /// Label the spans in `request`.
    fn classify(&self, request: &ClassificationRequest) -> Result<ProviderReply, ProviderError>;
}

/// A provider backed by a closure.
pub struct FnProvider<F> {
    func: F,
}

impl<F> FnProvider<F>
where
    F: Fn(&ClassificationRequest) -> Result<ProviderReply, ProviderError> + Send + Sync,
{
    /// Wrap a closure.
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F> SemanticProvider for FnProvider<F>
where
    F: Fn(&ClassificationRequest) -> Result<ProviderReply, ProviderError> + Send + Sync,
{
    fn name(&self) -> &str {
        "callback"
    }

    fn classify(&self, request: &ClassificationRequest) -> Result<ProviderReply, ProviderError> {
        (self.func)(request)
    }
}

/// A provider that answers from a fixed hint map, e.g. a hints file.
#[derive(Debug, Clone, Default)]
pub struct StaticProvider {
    hints: HintMap,
}

impl StaticProvider {
    /// Create a provider from hints.
    pub fn new(hints: HintMap) -> Self {
        Self { hints }
    }

    /// Parse hints from any accepted JSON reply shape.
    ///
    /// Keys that are not span indices are skipped with a log warning.
    pub fn from_json(text: &str) -> Result<Self, ProviderError> {
        let parsed = parse_reply_text(text)?;
        for key in &parsed.skipped_keys {
            log::warn!("hints file: ignoring key {:?}, not a span index", key);
        }
        Ok(Self::new(parsed.hints))
    }

    /// Number of hints held.
    pub fn len(&self) -> usize {
        self.hints.len()
    }

    /// Check if no hints are held.
    pub fn is_empty(&self) -> bool {
        self.hints.is_empty()
    }
}

impl SemanticProvider for StaticProvider {
    fn name(&self) -> &str {
        "static"
    }

    fn classify(&self, request: &ClassificationRequest) -> Result<ProviderReply, ProviderError> {
        let hints: HintMap = request
            .spans
            .iter()
            .filter_map(|s| self.hints.get(&s.order_index).map(|h| (s.order_index, h.clone())))
            .collect();
        if hints.is_empty() {
            Ok(ProviderReply::NoAnswer)
        } else {
            Ok(ProviderReply::Hints(hints))
        }
    }
}

/// Ask a provider for hints, waiting at most `timeout`.
///
/// Returns `Ok(None)` when the provider declined to answer. A provider that
/// panics is reported as disconnected; one that overruns the timeout is left
/// running on its own thread and its answer is discarded.
pub fn request_hints(
    provider: &Arc<dyn SemanticProvider>,
    request: ClassificationRequest,
    timeout: Duration,
) -> Result<Option<ParsedHints>, ProviderError> {
    let (tx, rx) = bounded(1);
    let worker = Arc::clone(provider);

    thread::Builder::new()
        .name(format!("structmd-{}", provider.name()))
        .spawn(move || {
            let reply = worker.classify(&request);
            // The receiver is gone after a timeout; nothing left to do.
            let _ = tx.send(reply);
        })
        .map_err(|e| ProviderError::Failed(format!("could not start provider thread: {}", e)))?;

    let reply = match rx.recv_timeout(timeout) {
        Ok(reply) => reply?,
        Err(RecvTimeoutError::Timeout) => return Err(ProviderError::Timeout(timeout)),
        Err(RecvTimeoutError::Disconnected) => return Err(ProviderError::Disconnected),
    };

    match reply {
        ProviderReply::Hints(hints) => Ok(Some(hints.into())),
        ProviderReply::Text(text) => parse_reply_text(&text).map(Some),
        ProviderReply::NoAnswer => Ok(None),
    }
}

fn code_fence_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)```[A-Za-z]*\s*(.*?)```").expect("code fence regex is valid")
    })
}

/// Parse a free-text provider answer into hints.
///
/// Accepts `{"hints": {...}}`, a bare `{"<order_index>": {...}}` map, or
/// `{"structure": [{"block_id": N, "type": "..."}]}`, optionally wrapped in a
/// Markdown code fence or surrounded by prose. Keys that are not span
/// indices are skipped unless no key is usable.
pub fn parse_reply_text(text: &str) -> Result<ParsedHints, ProviderError> {
    let body = code_fence_regex()
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or(text)
        .trim();

    let json = match (body.find('{'), body.rfind('}')) {
        (Some(start), Some(end)) if start < end => &body[start..=end],
        _ => return Err(ProviderError::Malformed("reply contains no JSON object".into())),
    };

    let value: Value =
        serde_json::from_str(json).map_err(|e| ProviderError::Malformed(e.to_string()))?;
    let object = value
        .as_object()
        .ok_or_else(|| ProviderError::Malformed("reply is not a JSON object".into()))?;

    if let Some(hints) = object.get("hints") {
        return parse_hint_object(hints);
    }
    if let Some(structure) = object.get("structure") {
        return parse_structure_list(structure).map(ParsedHints::from);
    }
    parse_hint_object(&value)
}

fn parse_hint_object(value: &Value) -> Result<ParsedHints, ProviderError> {
    let object = value
        .as_object()
        .ok_or_else(|| ProviderError::Malformed("hints must be an object".into()))?;

    let mut parsed = ParsedHints::default();
    for (key, entry) in object {
        match key.trim().parse::<usize>() {
            Ok(order_index) => {
                parsed.hints.insert(order_index, raw_hint(entry));
            }
            Err(_) => parsed.skipped_keys.push(key.clone()),
        }
    }

    if parsed.hints.is_empty() && !parsed.skipped_keys.is_empty() {
        return Err(ProviderError::Malformed(format!(
            "no hint key is a span index: {:?}",
            parsed.skipped_keys
        )));
    }
    Ok(parsed)
}

fn parse_structure_list(value: &Value) -> Result<HintMap, ProviderError> {
    let items = value
        .as_array()
        .ok_or_else(|| ProviderError::Malformed("structure must be an array".into()))?;

    let mut hints = HintMap::new();
    for item in items {
        let id = match item.get("block_id") {
            Some(Value::Number(n)) => n.as_u64().map(|n| n as usize),
            Some(Value::String(s)) => s.trim().parse().ok(),
            _ => None,
        };
        match id {
            Some(id) => {
                hints.insert(id, raw_hint(item));
            }
            None => log::debug!("skipping structure entry without block_id: {}", item),
        }
    }
    Ok(hints)
}

/// Lenient per-entry extraction; validation happens in the overlay.
fn raw_hint(entry: &Value) -> RawHint {
    match entry {
        Value::String(role) => RawHint::new(role.clone(), None),
        _ => {
            let role = entry
                .get("role")
                .or_else(|| entry.get("type"))
                .and_then(Value::as_str)
                .unwrap_or_default();
            let level = entry.get("level").and_then(Value::as_i64);
            RawHint::new(role, level)
        }
    }
}
