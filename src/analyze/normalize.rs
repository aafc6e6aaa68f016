//! Span normalization: cleanup, merging, and document-wide ordering.

use std::collections::HashSet;

use unicode_normalization::UnicodeNormalization;

use super::AnalyzeOptions;
use crate::convert::CancelToken;
use crate::diagnostics::{Diagnostics, WarningKind};
use crate::error::Result;
use crate::model::{ImageAsset, LinkSpan, PageInput, RawSpan, Span};

/// Canonical pipeline input produced from raw extractor pages.
#[derive(Debug, Clone, Default)]
pub struct NormalizedDocument {
    /// Spans in reading order; `spans[i].order_index == i`
    pub spans: Vec<Span>,
    /// Images in page/sequence order
    pub images: Vec<ImageAsset>,
    /// Links keyed by span `order_index`
    pub links: Vec<LinkSpan>,
    /// Number of pages in the source document
    pub page_count: u32,
}

/// Normalize extractor output.
///
/// Drops blank and malformed spans, merges same-line fragments that share
/// font attributes, and assigns `order_index` in extraction order.
pub fn normalize(
    pages: Vec<PageInput>,
    options: &AnalyzeOptions,
    cancel: &CancelToken,
    diag: &mut Diagnostics,
) -> Result<NormalizedDocument> {
    let mut doc = NormalizedDocument {
        page_count: pages.iter().map(|p| p.page_index + 1).max().unwrap_or(0),
        ..Default::default()
    };

    let mut last_page: Option<u32> = None;
    for page in pages {
        cancel.check()?;
        if let Some(prev) = last_page {
            if page.page_index <= prev {
                log::debug!(
                    "page {} arrived after page {}; keeping extraction order",
                    page.page_index,
                    prev
                );
            }
        }
        last_page = Some(page.page_index);
        normalize_page(page, options, &mut doc, diag);
    }

    log::debug!(
        "normalized {} spans, {} images, {} links over {} pages",
        doc.spans.len(),
        doc.images.len(),
        doc.links.len(),
        doc.page_count
    );
    Ok(doc)
}

fn normalize_page(
    page: PageInput,
    options: &AnalyzeOptions,
    doc: &mut NormalizedDocument,
    diag: &mut Diagnostics,
) {
    let page_index = page.page_index;
    let link_sources: HashSet<usize> = page.links.iter().map(|l| l.span_index).collect();
    let mut raw_to_order: Vec<Option<usize>> = vec![None; page.spans.len()];
    // Whether the last span pushed for this page may absorb the next one.
    let mut tail_mergeable = false;

    for (raw_index, raw) in page.spans.into_iter().enumerate() {
        if let Some(problem) = malformed(&raw) {
            diag.warn(
                WarningKind::MalformedSpanData,
                None,
                format!("page {} span {}: {}", page_index + 1, raw_index, problem),
            );
            continue;
        }

        let text = clean_text(&raw.text);
        if text.trim().is_empty() {
            continue;
        }

        let is_link = link_sources.contains(&raw_index);
        let candidate = Span {
            is_bold: raw.bold(),
            is_italic: raw.italic(),
            text,
            font_size: raw.font_size,
            font_name: raw.font_name,
            bbox: raw.bbox,
            page_index,
            order_index: doc.spans.len(),
        };

        if tail_mergeable && !is_link {
            if let Some(prev) = doc.spans.last_mut() {
                if prev.page_index == page_index && should_merge(prev, &candidate, options) {
                    prev.text.push_str(&candidate.text);
                    prev.bbox = prev.bbox.union(&candidate.bbox);
                    raw_to_order[raw_index] = Some(prev.order_index);
                    continue;
                }
            }
        }

        raw_to_order[raw_index] = Some(candidate.order_index);
        doc.spans.push(candidate);
        tail_mergeable = !is_link;
    }

    for (sequence, image) in page.images.into_iter().enumerate() {
        if image.bytes.is_empty() || !image.bbox.is_valid() {
            diag.warn(
                WarningKind::MalformedSpanData,
                None,
                format!(
                    "page {} image {}: empty payload or invalid placement",
                    page_index + 1,
                    sequence
                ),
            );
            continue;
        }
        doc.images.push(ImageAsset::new(
            page_index,
            sequence as u32,
            image.bytes,
            image.bbox,
        ));
    }

    for link in page.links {
        match raw_to_order.get(link.span_index).copied().flatten() {
            Some(order_index) => doc.links.push(LinkSpan {
                source_span_order_index: order_index,
                target: link.target,
            }),
            None => diag.warn(
                WarningKind::UnresolvedLinkTarget,
                None,
                format!(
                    "page {} link source span {} was dropped or does not exist",
                    page_index + 1,
                    link.span_index
                ),
            ),
        }
    }
}

fn malformed(raw: &RawSpan) -> Option<&'static str> {
    if !raw.font_size.is_finite() || raw.font_size <= 0.0 {
        return Some("font size is not a positive number");
    }
    if !raw.bbox.is_valid() {
        return Some("bounding box is not finite or is inverted");
    }
    None
}

/// NFC-normalize and strip characters that never belong in output text.
///
/// Line breaks become spaces, trailing whitespace is trimmed, and leading
/// whitespace is kept because it carries list indentation.
fn clean_text(text: &str) -> String {
    let cleaned: String = text
        .nfc()
        .filter_map(|c| match c {
            '\n' | '\r' => Some(' '),
            '\t' => Some('\t'),
            '\u{FFFD}' => None,
            c if c.is_control() => None,
            c => Some(c),
        })
        .collect();
    cleaned.trim_end().to_string()
}

fn has_geometry(span: &Span) -> bool {
    span.bbox.width() > 0.0 || span.bbox.height() > 0.0
}

/// Same visual line, same font, and no horizontal gap.
fn should_merge(prev: &Span, next: &Span, options: &AnalyzeOptions) -> bool {
    if !prev.same_font(next) || !has_geometry(prev) || !has_geometry(next) {
        return false;
    }

    let line_tolerance = prev.font_size * 0.3;
    let same_line = (prev.bbox.y0 - next.bbox.y0).abs() <= line_tolerance
        && (prev.bbox.y1 - next.bbox.y1).abs() <= line_tolerance;
    if !same_line {
        return false;
    }

    let gap = next.bbox.x0 - prev.bbox.x1;
    gap <= options.merge_gap_ratio * prev.font_size && gap >= -prev.font_size
}
