//! Rendering module for converting document trees to output formats.

mod assets;
mod json;
mod markdown;
mod options;
mod result;

pub use assets::AssetNamer;
pub use json::{to_json, JsonFormat};
pub use markdown::{escape_markdown, to_markdown, MarkdownRenderer};
pub use options::RenderOptions;
pub use result::{ConversionStats, ImageFile, RenderOutput};
