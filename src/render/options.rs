//! Rendering options and configuration.

/// Options for rendering a document tree to Markdown.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderOptions {
    /// Prefix for image paths in output (e.g., "images/")
    pub image_path_prefix: String,

    /// Character to use for unordered list markers
    pub list_marker: char,

    /// Spaces of indentation per list nesting level
    pub list_indent: usize,

    /// Maximum heading level (1-6)
    pub max_heading_level: u8,

    /// Escape special Markdown characters
    pub escape_special_chars: bool,

    /// Insert a `---` rule where a new page starts
    pub page_breaks: bool,

    /// Emit `<a id="page-N"></a>` at the start of each page
    pub page_anchors: bool,
}

impl RenderOptions {
    /// Create new render options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the image path prefix.
    pub fn with_image_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.image_path_prefix = prefix.into();
        self
    }

    /// Set the list marker character.
    pub fn with_list_marker(mut self, marker: char) -> Self {
        self.list_marker = marker;
        self
    }

    /// Set the indentation per list level.
    pub fn with_list_indent(mut self, spaces: usize) -> Self {
        self.list_indent = spaces;
        self
    }

    /// Set the maximum heading level.
    pub fn with_max_heading(mut self, level: u8) -> Self {
        self.max_heading_level = level.clamp(1, 6);
        self
    }

    /// Enable or disable Markdown escaping.
    pub fn with_escaping(mut self, escape: bool) -> Self {
        self.escape_special_chars = escape;
        self
    }

    /// Enable or disable page break rules.
    pub fn with_page_breaks(mut self, enabled: bool) -> Self {
        self.page_breaks = enabled;
        self
    }

    /// Enable or disable page anchors.
    pub fn with_page_anchors(mut self, enabled: bool) -> Self {
        self.page_anchors = enabled;
        self
    }
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            image_path_prefix: "images/".to_string(),
            list_marker: '-',
            list_indent: 2,
            max_heading_level: 6,
            escape_special_chars: true,
            page_breaks: true,
            page_anchors: false,
        }
    }
}
