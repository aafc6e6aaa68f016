//! Heuristic structure classification.
//!
//! Each span gets a role from font statistics and text patterns:
//!
//! 1. List item: the text starts with a bullet, number, or letter marker
//! 2. Heading: the font is notably larger than body text
//! 3. Caption: a short span directly below an image
//! 4. Paragraph: everything else

use std::collections::{BTreeMap, HashMap};
use std::sync::OnceLock;

use regex::Regex;

use super::AnalyzeOptions;
use crate::model::{ImageAsset, ListMarker, Role, Span};

/// Body size used when the document has no spans at all.
const DEFAULT_BODY_SIZE: f32 = 12.0;

/// Levels closer than this to the next integer round up.
const INDENT_EPSILON: f32 = 0.1;

/// The heuristic decision for one span.
#[derive(Debug, Clone, PartialEq)]
pub struct HeuristicLabel {
    /// Assigned role
    pub role: Role,
    /// Heading level or list depth; 0 for other roles
    pub level: u8,
    /// List marker when the text matched a list pattern
    pub marker: Option<ListMarker>,
}

impl HeuristicLabel {
    fn new(role: Role, level: u8) -> Self {
        Self {
            role,
            level,
            marker: None,
        }
    }
}

/// Font statistics for heading detection.
#[derive(Debug, Clone, Default)]
pub struct FontStatistics {
    /// Body text font size (most common among substantial spans)
    pub body_size: f32,
    /// Sizes of spans with enough text to vote, keyed in tenths of a point
    size_histogram: BTreeMap<i32, usize>,
    /// Sizes of every span, used when no span is long enough to vote
    fallback_histogram: BTreeMap<i32, usize>,
}

impl FontStatistics {
    /// Collect statistics over a document's spans.
    pub fn from_spans(spans: &[Span], min_body_chars: usize) -> Self {
        let mut stats = Self::default();
        for span in spans.iter().filter(|s| !s.is_blank()) {
            stats.add_size(span.font_size, span.char_count() >= min_body_chars);
        }
        stats.analyze();
        stats
    }

    /// Add a font size observation.
    pub fn add_size(&mut self, size: f32, votes_for_body: bool) {
        let key = size_key(size);
        *self.fallback_histogram.entry(key).or_insert(0) += 1;
        if votes_for_body {
            *self.size_histogram.entry(key).or_insert(0) += 1;
        }
    }

    /// Calculate the body size.
    pub fn analyze(&mut self) {
        let histogram = if self.size_histogram.is_empty() {
            &self.fallback_histogram
        } else {
            &self.size_histogram
        };

        // Ascending key order with a strict comparison keeps the smaller size on ties.
        let mut best: Option<(i32, usize)> = None;
        for (&key, &count) in histogram {
            if best.map(|(_, c)| count > c).unwrap_or(true) {
                best = Some((key, count));
            }
        }

        self.body_size = best
            .map(|(key, _)| key as f32 / 10.0)
            .unwrap_or(DEFAULT_BODY_SIZE);
    }
}

fn size_key(size: f32) -> i32 {
    (size * 10.0).round() as i32
}

fn list_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\s*)([•‣◦⁃∙●○▪\-*+]|\d+[.)]|[A-Za-z]\))\s+(\S.*)$")
            .expect("list marker regex is valid")
    })
}

/// Match a list marker at the start of `text`.
///
/// Returns the leading whitespace width in columns (tab = 4) and the marker.
pub fn parse_list_marker(text: &str) -> Option<(usize, ListMarker)> {
    let caps = list_regex().captures(text)?;
    let leading = caps.get(1).map(|m| m.as_str()).unwrap_or("");
    let marker = caps.get(2)?.as_str();
    let content = caps.get(3)?;

    let columns = leading
        .chars()
        .map(|c| if c == '\t' { 4 } else { 1 })
        .sum();
    let ordered = marker
        .chars()
        .next()
        .map(|c| c.is_ascii_alphanumeric())
        .unwrap_or(false);

    Some((
        columns,
        ListMarker {
            ordered,
            marker: marker.to_string(),
            content_start: content.start(),
        },
    ))
}

/// Classify every span. The result is index-aligned with `spans`.
pub fn classify(
    spans: &[Span],
    images: &[ImageAsset],
    options: &AnalyzeOptions,
) -> Vec<HeuristicLabel> {
    let stats = FontStatistics::from_spans(spans, options.min_body_chars);
    log::debug!("body font size: {:.1}pt", stats.body_size);

    let mut labels: Vec<HeuristicLabel> = spans
        .iter()
        .map(|span| {
            if span.is_blank() {
                HeuristicLabel::new(Role::Blank, 0)
            } else {
                HeuristicLabel::new(Role::Paragraph, 0)
            }
        })
        .collect();

    assign_list_items(spans, &mut labels, options);
    assign_headings(spans, &mut labels, stats.body_size, options);
    if options.detect_captions {
        assign_captions(spans, images, &mut labels, options);
    }

    labels
}

struct ListCandidate {
    index: usize,
    columns: usize,
    marker: ListMarker,
}

fn assign_list_items(spans: &[Span], labels: &mut [HeuristicLabel], options: &AnalyzeOptions) {
    let candidates: Vec<ListCandidate> = spans
        .iter()
        .enumerate()
        .filter(|(i, _)| labels[*i].role == Role::Paragraph)
        .filter_map(|(index, span)| {
            parse_list_marker(&span.text).map(|(columns, marker)| ListCandidate {
                index,
                columns,
                marker,
            })
        })
        .collect();

    if candidates.is_empty() {
        return;
    }

    let textual = candidates.iter().any(|c| c.columns > 0);
    let indents: Vec<f32> = if textual {
        candidates.iter().map(|c| c.columns as f32).collect()
    } else {
        let mut page_min: HashMap<u32, f32> = HashMap::new();
        for c in &candidates {
            let span = &spans[c.index];
            let entry = page_min.entry(span.page_index).or_insert(span.bbox.x0);
            *entry = entry.min(span.bbox.x0);
        }
        candidates
            .iter()
            .map(|c| {
                let span = &spans[c.index];
                let min = page_min.get(&span.page_index).copied().unwrap_or(span.bbox.x0);
                (span.bbox.x0 - min).max(0.0)
            })
            .collect()
    };

    let default_unit = if textual {
        options.default_indent_columns
    } else {
        options.default_indent_points
    };
    // Sub-point offsets are extraction noise, not indentation.
    let threshold = if textual { 0.0 } else { 0.5 };
    let unit = indents
        .iter()
        .copied()
        .filter(|&i| i > threshold)
        .fold(None, |acc: Option<f32>, i| Some(acc.map_or(i, |a| a.min(i))))
        .unwrap_or(default_unit);

    for (candidate, indent) in candidates.into_iter().zip(indents) {
        let level = if indent > threshold {
            (indent / unit + INDENT_EPSILON).floor().min(u8::MAX as f32) as u8
        } else {
            0
        };
        labels[candidate.index] = HeuristicLabel {
            role: Role::ListItem,
            level,
            marker: Some(candidate.marker),
        };
    }
}

fn assign_headings(
    spans: &[Span],
    labels: &mut [HeuristicLabel],
    body_size: f32,
    options: &AnalyzeOptions,
) {
    let threshold = body_size * options.heading_ratio;
    let candidates: Vec<usize> = spans
        .iter()
        .enumerate()
        .filter(|(i, span)| {
            labels[*i].role == Role::Paragraph
                && span.font_size > threshold
                && (span.is_bold || span.word_count() <= options.heading_max_words)
        })
        .map(|(i, _)| i)
        .collect();

    if candidates.is_empty() {
        return;
    }

    // Cluster sizes from largest down; a size joins the current cluster while
    // it stays within tolerance of the cluster's largest member.
    let mut sizes: Vec<i32> = candidates.iter().map(|&i| size_key(spans[i].font_size)).collect();
    sizes.sort_unstable_by(|a, b| b.cmp(a));
    sizes.dedup();

    let tolerance = size_key(options.size_tolerance);
    let mut cluster_of: HashMap<i32, usize> = HashMap::new();
    let mut cluster = 0usize;
    let mut anchor = sizes[0];
    for &size in &sizes {
        if anchor - size > tolerance {
            cluster += 1;
            anchor = size;
        }
        cluster_of.insert(size, cluster);
    }

    // Bucket key (cluster, !bold) sorts larger sizes first, then bold first.
    let mut buckets: Vec<(usize, bool)> = candidates
        .iter()
        .map(|&i| {
            let span = &spans[i];
            let c = cluster_of.get(&size_key(span.font_size)).copied().unwrap_or(0);
            (c, !span.is_bold)
        })
        .collect();
    buckets.sort_unstable();
    buckets.dedup();

    for &i in &candidates {
        let span = &spans[i];
        let c = cluster_of.get(&size_key(span.font_size)).copied().unwrap_or(0);
        let rank = buckets
            .iter()
            .position(|&b| b == (c, !span.is_bold))
            .unwrap_or(0);
        labels[i] = HeuristicLabel::new(Role::Heading, (rank + 1).min(6) as u8);
    }

    log::debug!(
        "{} heading candidates in {} level buckets",
        candidates.len(),
        buckets.len()
    );
}

fn assign_captions(
    spans: &[Span],
    images: &[ImageAsset],
    labels: &mut [HeuristicLabel],
    options: &AnalyzeOptions,
) {
    for image in images {
        let below = spans
            .iter()
            .enumerate()
            .filter(|(_, s)| s.page_index == image.page_index && !s.is_blank())
            .filter(|(_, s)| s.bbox.y0 >= image.bbox.y1 - s.font_size * 0.3)
            .filter(|(_, s)| {
                s.bbox.overlaps_x(&image.bbox)
                    || (image.bbox.x0..=image.bbox.x1).contains(&s.bbox.center_x())
            })
            .min_by(|(ia, a), (ib, b)| {
                a.bbox
                    .y0
                    .partial_cmp(&b.bbox.y0)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(ia.cmp(ib))
            });

        let Some((index, span)) = below else {
            continue;
        };

        let gap = span.bbox.y0 - image.bbox.y1;
        if labels[index].role == Role::Paragraph
            && gap <= options.caption_max_gap_ratio * span.font_size
            && span.word_count() <= options.caption_max_words
        {
            labels[index] = HeuristicLabel::new(Role::Caption, 0);
        }
    }
}
