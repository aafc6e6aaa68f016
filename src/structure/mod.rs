//! Document tree synthesis from classified spans.

mod builder;

pub use builder::{build_tree, DEFAULT_ALT_TEXT};
