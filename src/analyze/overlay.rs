//! Merge provider hints over heuristic labels.

use std::collections::HashMap;
use std::ops::Range;
use std::sync::Arc;
use std::time::Duration;

use super::classify::{parse_list_marker, HeuristicLabel};
use crate::diagnostics::{Diagnostics, WarningKind};
use crate::model::{ClassifiedSpan, Confidence, Role, Span};
use crate::provider::{
    request_hints, ClassificationRequest, HintBatching, RawHint, SemanticProvider,
    DEFAULT_PROVIDER_TIMEOUT,
};

/// How the merger talks to the provider.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayOptions {
    /// Request grouping
    pub batching: HintBatching,
    /// Per-request timeout
    pub timeout: Duration,
    /// Document name shown to the provider
    pub document_name: Option<String>,
}

impl Default for OverlayOptions {
    fn default() -> Self {
        Self {
            batching: HintBatching::Document,
            timeout: DEFAULT_PROVIDER_TIMEOUT,
            document_name: None,
        }
    }
}

/// Combine heuristic labels with provider hints into final classifications.
///
/// `labels` must be index-aligned with `spans`. Provider failures never
/// propagate; they become warnings and the affected spans keep their
/// heuristic label.
pub fn merge(
    spans: Vec<Span>,
    labels: Vec<HeuristicLabel>,
    provider: Option<&Arc<dyn SemanticProvider>>,
    options: &OverlayOptions,
    page_count: u32,
    diag: &mut Diagnostics,
) -> Vec<ClassifiedSpan> {
    let overrides = match provider {
        Some(provider) if !spans.is_empty() => {
            collect_overrides(&spans, provider, options, page_count, diag)
        }
        _ => HashMap::new(),
    };

    if !overrides.is_empty() {
        log::debug!("{} spans classified by the provider", overrides.len());
    }

    spans
        .into_iter()
        .zip(labels)
        .map(|(span, label)| match overrides.get(&span.order_index) {
            Some(&(role, level)) => {
                let marker = match role {
                    Role::ListItem => label
                        .marker
                        .or_else(|| parse_list_marker(&span.text).map(|(_, m)| m)),
                    _ => None,
                };
                ClassifiedSpan::new(span, role, level, Confidence::External, marker)
            }
            None => ClassifiedSpan::new(
                span,
                label.role,
                label.level,
                Confidence::Heuristic,
                label.marker,
            ),
        })
        .collect()
}

fn collect_overrides(
    spans: &[Span],
    provider: &Arc<dyn SemanticProvider>,
    options: &OverlayOptions,
    page_count: u32,
    diag: &mut Diagnostics,
) -> HashMap<usize, (Role, u8)> {
    let mut overrides = HashMap::new();

    for range in batches(spans, options.batching) {
        let batch = &spans[range];
        let members: HashMap<usize, &Span> = batch.iter().map(|s| (s.order_index, s)).collect();

        let mut request = ClassificationRequest::from_spans(batch, page_count);
        if let Some(name) = &options.document_name {
            request = request.with_document_name(name.clone());
        }
        if options.batching == HintBatching::Page {
            if let Some(first) = batch.first() {
                request = request.with_page(first.page_index);
            }
        }

        let first = batch.first().map(|s| s.order_index).unwrap_or(0);
        let hints = match request_hints(provider, request, options.timeout) {
            Ok(Some(parsed)) => {
                for key in &parsed.skipped_keys {
                    diag.warn(
                        WarningKind::ClassificationProviderFailure,
                        Some(first),
                        format!("ignored hint key {:?}: not a span index", key),
                    );
                }
                parsed.hints
            }
            Ok(None) => {
                log::info!(
                    "{} gave no answer for {} spans starting at {}; using heuristics",
                    provider.name(),
                    batch.len(),
                    first
                );
                continue;
            }
            Err(e) => {
                diag.warn(
                    WarningKind::ClassificationProviderFailure,
                    Some(first),
                    format!("{} spans fell back to heuristics: {}", batch.len(), e),
                );
                continue;
            }
        };

        for (&order_index, hint) in &hints {
            let Some(span) = members.get(&order_index) else {
                diag.warn_span(
                    WarningKind::ClassificationProviderFailure,
                    order_index,
                    "hint addresses a span outside the request",
                );
                continue;
            };
            match validate_hint(hint, span) {
                Ok(decision) => {
                    overrides.insert(order_index, decision);
                }
                Err(reason) => diag.warn_span(
                    WarningKind::ClassificationProviderFailure,
                    order_index,
                    format!("rejected hint {:?}: {}", hint.role, reason),
                ),
            }
        }

        for span in batch {
            if !hints.contains_key(&span.order_index) {
                diag.warn_span(
                    WarningKind::ClassificationProviderFailure,
                    span.order_index,
                    "no hint returned; using heuristics",
                );
            }
        }
    }

    overrides
}

/// Split spans into request ranges.
fn batches(spans: &[Span], batching: HintBatching) -> Vec<Range<usize>> {
    match batching {
        HintBatching::Document => vec![0..spans.len()],
        HintBatching::Spans(n) => {
            let n = n.max(1);
            (0..spans.len())
                .step_by(n)
                .map(|start| start..(start + n).min(spans.len()))
                .collect()
        }
        HintBatching::Page => {
            let mut ranges = Vec::new();
            let mut start = 0;
            for i in 1..=spans.len() {
                if i == spans.len() || spans[i].page_index != spans[start].page_index {
                    ranges.push(start..i);
                    start = i;
                }
            }
            ranges
        }
    }
}

/// Check a hint against the role set and per-role level rules.
pub fn validate_hint(hint: &RawHint, span: &Span) -> Result<(Role, u8), String> {
    let name = hint
        .role
        .trim()
        .to_lowercase()
        .replace(['-', ' '], "_");

    if let Some(level) = name.strip_prefix("heading").and_then(|l| l.parse::<i64>().ok()) {
        return heading(level);
    }

    match name.as_str() {
        "title" => Ok((Role::Heading, 1)),
        "heading" => match hint.level {
            Some(level) => heading(level),
            None => Err("heading hint without a level".into()),
        },
        "paragraph" => Ok((Role::Paragraph, 0)),
        "list" | "list_item" | "listitem" => {
            let level = hint.level.unwrap_or(0);
            if Role::ListItem.accepts_level(level) {
                Ok((Role::ListItem, level as u8))
            } else {
                Err(format!("list level {} out of range", level))
            }
        }
        "table_cell" | "tablecell" => Ok((Role::TableCell, 0)),
        "caption" => Ok((Role::Caption, 0)),
        "blank" if span.is_blank() => Ok((Role::Blank, 0)),
        "blank" => Err("span has visible text".into()),
        "" => Err("missing role".into()),
        _ => Err("unknown role".into()),
    }
}

fn heading(level: i64) -> Result<(Role, u8), String> {
    if Role::Heading.accepts_level(level) {
        Ok((Role::Heading, level as u8))
    } else {
        Err(format!("heading level {} out of range", level))
    }
}
