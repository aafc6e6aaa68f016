//! Markdown rendering for document trees.

use std::collections::BTreeSet;

use crate::diagnostics::{Diagnostics, WarningKind};
use crate::model::{DocumentTree, InlineRun, NodeId, NodeKind, RunLink};

use super::{AssetNamer, ConversionStats, RenderOptions, RenderOutput};

/// Convert a document tree to Markdown.
///
/// Rendering never fails; anything that cannot be expressed faithfully is
/// degraded and reported through `diag`.
pub fn to_markdown(
    tree: &DocumentTree,
    options: &RenderOptions,
    diag: &mut Diagnostics,
) -> RenderOutput {
    MarkdownRenderer::new(options.clone(), diag).render(tree)
}

/// A rendered top-level block and the page it starts on.
struct Block {
    page: u32,
    heading: bool,
    text: String,
}

/// Markdown renderer.
pub struct MarkdownRenderer<'d> {
    options: RenderOptions,
    stats: ConversionStats,
    assets: AssetNamer,
    /// Pages that internal links point at; they always get an anchor
    linked_pages: BTreeSet<u32>,
    diag: &'d mut Diagnostics,
}

impl<'d> MarkdownRenderer<'d> {
    /// Create a new Markdown renderer.
    pub fn new(options: RenderOptions, diag: &'d mut Diagnostics) -> Self {
        let assets = AssetNamer::new(options.image_path_prefix.clone());
        Self {
            options,
            stats: ConversionStats::new(),
            assets,
            linked_pages: BTreeSet::new(),
            diag,
        }
    }

    /// Render a tree to Markdown with its image files and statistics.
    pub fn render(mut self, tree: &DocumentTree) -> RenderOutput {
        let mut blocks = Vec::new();
        for &root in tree.roots() {
            self.render_node(tree, root, &mut blocks);
        }

        let markdown = self.assemble(blocks);

        self.stats.page_count = tree.page_count();
        self.stats.image_file_count = self.assets.len() as u32;
        self.stats.count_text(&markdown);

        RenderOutput {
            markdown,
            images: self.assets.into_files(),
            stats: self.stats,
        }
    }

    /// Join blocks with blank lines, adding page rules and anchors.
    fn assemble(&self, blocks: Vec<Block>) -> String {
        let mut parts: Vec<String> = Vec::with_capacity(blocks.len());
        let mut previous: Option<(u32, bool)> = None;
        let mut anchored: Option<u32> = None;

        for block in blocks {
            if let Some((page, was_heading)) = previous {
                if self.options.page_breaks && block.page > page && !was_heading {
                    parts.push("---".to_string());
                }
            }

            let first = anchored.map_or(0, |p| p + 1);
            if first <= block.page {
                let anchors = self.page_anchors(first..=block.page);
                if !anchors.is_empty() {
                    parts.push(anchors);
                }
                anchored = Some(block.page);
            }

            previous = Some((block.page, block.heading));
            parts.push(block.text);
        }

        // Linked pages after the last block still need a target.
        let first = anchored.map_or(0, |p| p + 1);
        let trailing = self.page_anchors(self.linked_pages.range(first..).copied());
        if !trailing.is_empty() {
            parts.push(trailing);
        }

        if parts.is_empty() {
            return String::new();
        }
        let mut output = parts.join("\n\n");
        output.push('\n');
        output
    }

    fn page_anchors(&self, pages: impl Iterator<Item = u32>) -> String {
        pages
            .filter(|p| self.options.page_anchors || self.linked_pages.contains(p))
            .map(|p| format!("<a id=\"page-{}\"></a>", p + 1))
            .collect()
    }

    fn render_node(&mut self, tree: &DocumentTree, id: NodeId, blocks: &mut Vec<Block>) {
        let node = tree.node(id);
        let page = node.page_index;

        match &node.kind {
            NodeKind::Heading {
                level,
                title,
                children,
            } => {
                let text = self.render_runs(title, true);
                if text.trim().is_empty() {
                    self.degraded("heading without text omitted");
                } else {
                    self.stats.add_heading();
                    let level = (*level).min(self.options.max_heading_level).max(1);
                    blocks.push(Block {
                        page,
                        heading: true,
                        text: format!("{} {}", "#".repeat(level as usize), text),
                    });
                }
                for &child in children {
                    self.render_node(tree, child, blocks);
                }
            }
            NodeKind::Paragraph { runs, caption } => {
                let text = self.render_runs(runs, false);
                if text.trim().is_empty() {
                    return;
                }
                self.stats.add_paragraph(*caption);
                blocks.push(Block {
                    page,
                    heading: false,
                    text: self.escape_block_start(text.trim().to_string()),
                });
            }
            NodeKind::List { .. } => {
                let mut lines = Vec::new();
                self.render_list(tree, id, 0, &mut lines);
                if !lines.is_empty() {
                    blocks.push(Block {
                        page,
                        heading: false,
                        text: lines.join("\n"),
                    });
                }
            }
            NodeKind::ListItem { runs, .. } => {
                // Items outside a list only appear in hand-built trees.
                let text = self.render_runs(runs, false);
                self.stats.add_list_item();
                blocks.push(Block {
                    page,
                    heading: false,
                    text: format!("{} {}", self.options.list_marker, text),
                });
            }
            NodeKind::ImageRef { asset, alt } => {
                self.stats.add_image();
                let path = self.assets.path_for(tree.asset(*asset)).to_string();
                let alt = if self.options.escape_special_chars {
                    escape_markdown(alt)
                } else {
                    alt.clone()
                };
                blocks.push(Block {
                    page,
                    heading: false,
                    text: format!("![{}]({})", alt, path),
                });
            }
            NodeKind::Table { rows } => {
                if let Some(text) = self.render_table(rows) {
                    self.stats.add_table();
                    blocks.push(Block {
                        page,
                        heading: false,
                        text,
                    });
                }
            }
        }
    }

    fn render_list(
        &mut self,
        tree: &DocumentTree,
        list: NodeId,
        depth: usize,
        lines: &mut Vec<String>,
    ) {
        let NodeKind::List { ordered, items } = &tree.node(list).kind else {
            return;
        };
        let indent = " ".repeat(depth * self.options.list_indent);

        for (n, &item) in items.iter().enumerate() {
            let NodeKind::ListItem { runs, children } = &tree.node(item).kind else {
                continue;
            };
            let marker = if *ordered {
                format!("{}.", n + 1)
            } else {
                self.options.list_marker.to_string()
            };
            let text = self.render_runs(runs, false);
            let text = self.escape_block_start(text);

            self.stats.add_list_item();
            lines.push(format!("{}{} {}", indent, marker, text));

            for &child in children {
                self.render_list(tree, child, depth + 1, lines);
            }
        }
    }

    fn render_table(&mut self, rows: &[Vec<Vec<InlineRun>>]) -> Option<String> {
        let col_count = rows.iter().map(Vec::len).max().unwrap_or(0);
        if col_count == 0 {
            return None;
        }

        let mut output = String::new();
        for (i, row) in rows.iter().enumerate() {
            output.push('|');
            for col in 0..col_count {
                let content = row
                    .get(col)
                    .map(|cell| self.render_runs(cell, false).replace('\n', " "))
                    .unwrap_or_default();
                output.push_str(&format!(" {} |", content.trim()));
            }
            output.push('\n');

            // Separator after header row
            if i == 0 {
                output.push('|');
                output.push_str(&" --- |".repeat(col_count));
                output.push('\n');
            }
        }

        Some(output.trim_end().to_string())
    }

    fn render_runs(&mut self, runs: &[InlineRun], suppress_bold: bool) -> String {
        runs.iter()
            .map(|run| self.render_run(run, suppress_bold))
            .collect()
    }

    fn render_run(&mut self, run: &InlineRun, suppress_bold: bool) -> String {
        let text = if self.options.escape_special_chars {
            escape_markdown(&run.text)
        } else {
            run.text.clone()
        };

        let core = text.trim();
        if core.is_empty() {
            return match &run.link {
                Some(link) => {
                    self.degraded("link without text rendered as its target");
                    format!("{}{}", text, link_target_text(link))
                }
                None => text,
            };
        }

        // Whitespace goes outside the emphasis markers.
        let lead = &text[..text.len() - text.trim_start().len()];
        let trail = &text[text.trim_end().len()..];

        let marker = match (run.bold && !suppress_bold, run.italic) {
            (true, true) => "***",
            (true, false) => "**",
            (false, true) => "*",
            (false, false) => "",
        };
        let styled = format!("{}{}{}", marker, core, marker);

        let linked = match &run.link {
            None => styled,
            Some(RunLink::Url(url)) => format!("[{}]({})", styled, link_destination(url)),
            Some(RunLink::Page(page)) => {
                self.linked_pages.insert(*page);
                format!("[{}](#page-{})", styled, page + 1)
            }
            Some(RunLink::Unresolved(note)) => format!("{} ({})", styled, note),
        };

        format!("{}{}{}", lead, linked, trail)
    }

    /// Keep a block's first characters from being read as block syntax.
    fn escape_block_start(&self, text: String) -> String {
        if !self.options.escape_special_chars {
            return text;
        }

        let mut chars = text.chars();
        match chars.next() {
            Some('#') | Some('>') => return format!("\\{}", text),
            Some('-') | Some('+') | Some('=')
                if chars.next().map_or(true, char::is_whitespace) =>
            {
                return format!("\\{}", text)
            }
            _ => {}
        }

        // "1. text" or "1) text" would start an ordered list.
        let digits = text.chars().take_while(|c| c.is_ascii_digit()).count();
        if digits > 0 {
            let rest = &text[digits..];
            let mut rest_chars = rest.chars();
            if let Some(punct @ ('.' | ')')) = rest_chars.next() {
                if rest_chars.next().map_or(true, char::is_whitespace) {
                    return format!("{}\\{}{}", &text[..digits], punct, &rest[1..]);
                }
            }
        }

        text
    }

    fn degraded(&mut self, message: &str) {
        self.diag.warn(WarningKind::RenderDegraded, None, message);
    }
}

fn link_target_text(link: &RunLink) -> String {
    match link {
        RunLink::Url(url) => url.clone(),
        RunLink::Page(page) => format!("page {}", page + 1),
        RunLink::Unresolved(note) => note.clone(),
    }
}

fn link_destination(url: &str) -> String {
    if url.contains(|c: char| c.is_whitespace() || c == '(' || c == ')') {
        format!("<{}>", url)
    } else {
        url.to_string()
    }
}

/// Escape special Markdown characters.
/// Only escape characters that could be misinterpreted as Markdown syntax.
/// We minimize escaping to improve readability of extracted text.
pub fn escape_markdown(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            // Core formatting that must be escaped
            '\\' | '`' | '*' | '_' |
            // Brackets for links/images, pipe for tables
            '[' | ']' | '|' => {
                result.push('\\');
                result.push(c);
            }
            // NOT escaped (only special at line start or in specific contexts):
            // '.' '-' '!' '#' '+' '>' '(' ')' '{' '}'
            _ => result.push(c),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BBox, ImageAsset, Node};

    fn render(tree: &DocumentTree) -> String {
        render_with(tree, RenderOptions::default()).markdown
    }

    fn render_with(tree: &DocumentTree, options: RenderOptions) -> RenderOutput {
        let mut diag = Diagnostics::new();
        to_markdown(tree, &options, &mut diag)
    }

    fn para(tree: &mut DocumentTree, parent: Option<NodeId>, page: u32, runs: Vec<InlineRun>) -> NodeId {
        tree.append(
            parent,
            Node::new(
                page,
                NodeKind::Paragraph {
                    runs,
                    caption: false,
                },
            ),
        )
    }

    fn heading(tree: &mut DocumentTree, page: u32, level: u8, text: &str) -> NodeId {
        tree.append(
            None,
            Node::new(
                page,
                NodeKind::Heading {
                    level,
                    title: vec![InlineRun::bold(text)],
                    children: Vec::new(),
                },
            ),
        )
    }

    fn list(tree: &mut DocumentTree, parent: Option<NodeId>, ordered: bool) -> NodeId {
        tree.append(
            parent,
            Node::new(
                0,
                NodeKind::List {
                    ordered,
                    items: Vec::new(),
                },
            ),
        )
    }

    fn item(tree: &mut DocumentTree, list: NodeId, text: &str) -> NodeId {
        tree.append(
            Some(list),
            Node::new(
                0,
                NodeKind::ListItem {
                    runs: vec![InlineRun::new(text)],
                    children: Vec::new(),
                },
            ),
        )
    }

    #[test]
    fn test_escape_markdown() {
        assert_eq!(escape_markdown("Hello *world*"), "Hello \\*world\\*");
        assert_eq!(escape_markdown("[link]"), "\\[link\\]");
        assert_eq!(escape_markdown("a|b_c"), "a\\|b\\_c");
    }

    #[test]
    fn test_render_heading_suppresses_bold() {
        let mut tree = DocumentTree::new(1);
        let h = heading(&mut tree, 0, 2, "Chapter 1");
        para(&mut tree, Some(h), 0, vec![InlineRun::new("Body")]);

        assert_eq!(render(&tree), "## Chapter 1\n\nBody\n");
    }

    #[test]
    fn test_inline_styles_keep_whitespace_outside() {
        let mut tree = DocumentTree::new(1);
        para(
            &mut tree,
            None,
            0,
            vec![
                InlineRun::new("plain "),
                InlineRun::bold("bold "),
                InlineRun::italic("it"),
                InlineRun::styled(" both", true, true),
                InlineRun::bold("   "),
            ],
        );
        assert_eq!(render(&tree), "plain **bold** *it* ***both***\n");
    }

    #[test]
    fn test_paragraph_start_escaping() {
        let mut tree = DocumentTree::new(1);
        para(&mut tree, None, 0, vec![InlineRun::new("# not a heading")]);
        para(&mut tree, None, 0, vec![InlineRun::new("> not a quote")]);
        para(&mut tree, None, 0, vec![InlineRun::new("12. not a list")]);
        para(&mut tree, None, 0, vec![InlineRun::new("- not a bullet")]);
        para(&mut tree, None, 0, vec![InlineRun::new("3.5 percent")]);

        assert_eq!(
            render(&tree),
            "\\# not a heading\n\n\\> not a quote\n\n12\\. not a list\n\n\\- not a bullet\n\n3.5 percent\n"
        );
    }

    #[test]
    fn test_nested_lists() {
        let mut tree = DocumentTree::new(1);
        let outer = list(&mut tree, None, false);
        let first = item(&mut tree, outer, "First");
        let inner = list(&mut tree, Some(first), true);
        item(&mut tree, inner, "one");
        item(&mut tree, inner, "two");
        item(&mut tree, outer, "Second");

        assert_eq!(render(&tree), "- First\n  1. one\n  2. two\n- Second\n");
    }

    #[test]
    fn test_links() {
        let mut tree = DocumentTree::new(3);
        para(
            &mut tree,
            None,
            0,
            vec![
                InlineRun::new("site").with_link(RunLink::Url("https://example.com".into())),
                InlineRun::new(" "),
                InlineRun::new("next").with_link(RunLink::Page(1)),
                InlineRun::new(" "),
                InlineRun::new("gone").with_link(RunLink::Unresolved("page 9".into())),
            ],
        );
        assert_eq!(
            render(&tree),
            "[site](https://example.com) [next](#page-2) gone (page 9)\n\n<a id=\"page-2\"></a>\n"
        );
    }

    #[test]
    fn test_linked_pages_get_anchors() {
        let mut tree = DocumentTree::new(3);
        para(
            &mut tree,
            None,
            0,
            vec![InlineRun::new("see results").with_link(RunLink::Page(2))],
        );
        para(&mut tree, None, 1, vec![InlineRun::new("middle")]);
        para(&mut tree, None, 2, vec![InlineRun::new("results")]);

        let out = render_with(&tree, RenderOptions::default().with_page_breaks(false));
        assert_eq!(
            out.markdown,
            "[see results](#page-3)\n\nmiddle\n\n<a id=\"page-3\"></a>\n\nresults\n"
        );
    }

    #[test]
    fn test_empty_link_text_degrades() {
        let mut tree = DocumentTree::new(1);
        para(
            &mut tree,
            None,
            0,
            vec![
                InlineRun::new("see"),
                InlineRun::new(" ").with_link(RunLink::Url("https://x.org".into())),
            ],
        );
        let mut diag = Diagnostics::new();
        let out = to_markdown(&tree, &RenderOptions::default(), &mut diag);
        assert_eq!(out.markdown, "see https://x.org\n");
        assert_eq!(diag.count(WarningKind::RenderDegraded), 1);
    }

    #[test]
    fn test_images_deduplicated() {
        let png = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 7];
        let mut tree = DocumentTree::new(1);
        for _ in 0..2 {
            let asset = tree.add_asset(ImageAsset::new(0, 0, png.clone(), BBox::default()));
            tree.append(
                None,
                Node::new(
                    0,
                    NodeKind::ImageRef {
                        asset,
                        alt: "Image".into(),
                    },
                ),
            );
        }

        let out = render_with(&tree, RenderOptions::default());
        assert_eq!(out.images.len(), 1);
        let path = &out.images[0].relative_path;
        assert!(path.starts_with("images/") && path.ends_with(".png"));
        assert_eq!(
            out.markdown,
            format!("![Image]({})\n\n![Image]({})\n", path, path)
        );
        assert_eq!(out.stats.image_count, 2);
        assert_eq!(out.stats.image_file_count, 1);
    }

    #[test]
    fn test_table_padded_rows() {
        let mut tree = DocumentTree::new(1);
        tree.append(
            None,
            Node::new(
                0,
                NodeKind::Table {
                    rows: vec![
                        vec![vec![InlineRun::new("A")], vec![InlineRun::new("B")]],
                        vec![vec![InlineRun::new("1")]],
                    ],
                },
            ),
        );
        assert_eq!(render(&tree), "| A | B |\n| --- | --- |\n| 1 |  |\n");
    }

    #[test]
    fn test_page_breaks_and_anchors() {
        let mut tree = DocumentTree::new(3);
        para(&mut tree, None, 0, vec![InlineRun::new("one")]);
        para(&mut tree, None, 1, vec![InlineRun::new("two")]);
        heading(&mut tree, 2, 1, "Three");
        tree.append(None, Node::new(2, NodeKind::Paragraph { runs: vec![InlineRun::new("x")], caption: false }));

        assert_eq!(render(&tree), "one\n\n---\n\ntwo\n\n---\n\n# Three\n\nx\n");

        let out = render_with(
            &tree,
            RenderOptions::default()
                .with_page_breaks(false)
                .with_page_anchors(true),
        );
        assert_eq!(
            out.markdown,
            "<a id=\"page-1\"></a>\n\none\n\n<a id=\"page-2\"></a>\n\ntwo\n\n<a id=\"page-3\"></a>\n\n# Three\n\nx\n"
        );
    }

    #[test]
    fn test_no_rule_after_heading() {
        let mut tree = DocumentTree::new(2);
        heading(&mut tree, 0, 1, "Title");
        para(&mut tree, None, 1, vec![InlineRun::new("next page")]);
        assert_eq!(render(&tree), "# Title\n\nnext page\n");
    }

    #[test]
    fn test_empty_tree() {
        assert_eq!(render(&DocumentTree::new(0)), "");
    }
}
