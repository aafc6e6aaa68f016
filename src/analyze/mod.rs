//! Span analysis: normalization, heuristic classification, and the
//! semantic overlay.
//!
//! The stages run in order:
//!
//! 1. [`normalize`] cleans text, merges split fragments, and assigns
//!    document-wide reading order.
//! 2. [`classify`] labels each span from font statistics and text patterns.
//! 3. [`merge`] lays validated provider hints over the heuristic labels.

pub mod classify;
pub mod normalize;
mod options;
pub mod overlay;

pub use classify::{classify, parse_list_marker, FontStatistics, HeuristicLabel};
pub use normalize::{normalize, NormalizedDocument};
pub use options::AnalyzeOptions;
pub use overlay::{merge, validate_hint, OverlayOptions};
