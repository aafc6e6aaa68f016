//! Document model builder.
//!
//! Folds classified spans left to right into a [`DocumentTree`]. Headings own
//! everything up to the next heading of the same or higher rank, list items
//! nest by level, and images are anchored after the last span above them.

use std::collections::{BTreeMap, HashMap};

use crate::convert::CancelToken;
use crate::diagnostics::{Diagnostics, WarningKind};
use crate::error::Result;
use crate::model::{
    plain_text, ClassifiedSpan, DocumentTree, ImageAsset, LinkSpan, LinkTarget, Node,
    NodeId, NodeKind, Role, RunLink,
};

/// Alt text for images without a caption.
pub const DEFAULT_ALT_TEXT: &str = "Image";

/// Build the document tree.
///
/// `spans` must be in reading order. Links are attached to the runs of their
/// source span before nodes are created.
pub fn build_tree(
    mut spans: Vec<ClassifiedSpan>,
    images: Vec<ImageAsset>,
    links: Vec<LinkSpan>,
    page_count: u32,
    cancel: &CancelToken,
    diag: &mut Diagnostics,
) -> Result<DocumentTree> {
    attach_links(&mut spans, links, page_count, diag);

    let (mut page_start, mut after_span) = anchor_images(&spans, images);
    let mut builder = TreeBuilder::new(page_count);
    let mut current_page: Option<u32> = None;

    for span in spans {
        let page = span.page_index();
        if current_page != Some(page) {
            cancel.check()?;
            current_page = Some(page);
            // Page-start images for this page and any skipped pages before it.
            let due: Vec<u32> = page_start.range(..=page).map(|(p, _)| *p).collect();
            for p in due {
                for image in page_start.remove(&p).unwrap_or_default() {
                    builder.push_image(image);
                }
            }
        }

        let order_index = span.order_index();
        builder.push_span(span);

        for image in after_span.remove(&order_index).unwrap_or_default() {
            builder.push_image(image);
        }
    }

    for (_, images) in std::mem::take(&mut page_start) {
        cancel.check()?;
        for image in images {
            builder.push_image(image);
        }
    }

    let tree = builder.finish();
    log::debug!(
        "built tree: {} nodes, {} roots, {} images",
        tree.len(),
        tree.roots().len(),
        tree.assets().len()
    );
    Ok(tree)
}

type ImageSlots = (BTreeMap<u32, Vec<ImageAsset>>, HashMap<usize, Vec<ImageAsset>>);

/// Anchor each image after the last span on its page whose top edge is at or
/// above the image's top edge, or at the page start when there is none.
fn anchor_images(spans: &[ClassifiedSpan], mut images: Vec<ImageAsset>) -> ImageSlots {
    images.sort_by_key(|img| (img.page_index, img.sequence_on_page));

    let mut page_start: BTreeMap<u32, Vec<ImageAsset>> = BTreeMap::new();
    let mut after_span: HashMap<usize, Vec<ImageAsset>> = HashMap::new();

    for image in images {
        let anchor = spans
            .iter()
            .filter(|s| s.page_index() == image.page_index && s.role != Role::Blank)
            .filter(|s| s.span.bbox.y0 <= image.bbox.y0)
            .map(|s| s.order_index())
            .max();
        match anchor {
            Some(order_index) => after_span.entry(order_index).or_default().push(image),
            None => page_start.entry(image.page_index).or_default().push(image),
        }
    }

    (page_start, after_span)
}

fn attach_links(
    spans: &mut [ClassifiedSpan],
    links: Vec<LinkSpan>,
    page_count: u32,
    diag: &mut Diagnostics,
) {
    let positions: HashMap<usize, usize> = spans
        .iter()
        .enumerate()
        .map(|(i, s)| (s.order_index(), i))
        .collect();

    for link in links {
        let source = link.source_span_order_index;
        let Some(&position) = positions.get(&source) else {
            diag.warn_span(
                WarningKind::UnresolvedLinkTarget,
                source,
                "link source span is not part of the document",
            );
            continue;
        };

        let span = &mut spans[position];
        if span.inline_runs.iter().any(|r| r.link.is_some()) {
            diag.warn_span(
                WarningKind::UnresolvedLinkTarget,
                source,
                "span already carries a link; extra link ignored",
            );
            continue;
        }

        let run_link = match link.target {
            LinkTarget::External { url } if url.trim().is_empty() => {
                diag.warn_span(WarningKind::UnresolvedLinkTarget, source, "link has an empty URL");
                RunLink::Unresolved("broken link".into())
            }
            LinkTarget::External { url } => RunLink::Url(url.trim().to_string()),
            LinkTarget::Page { page_index } if page_index < page_count => {
                RunLink::Page(page_index)
            }
            LinkTarget::Page { page_index } => {
                diag.warn_span(
                    WarningKind::UnresolvedLinkTarget,
                    source,
                    format!(
                        "link targets page {} but the document has {} pages",
                        page_index + 1,
                        page_count
                    ),
                );
                RunLink::Unresolved(format!("page {}", page_index + 1))
            }
        };

        for run in &mut span.inline_runs {
            run.link = Some(run_link.clone());
        }
    }
}

struct OpenTable {
    node: NodeId,
    page_index: u32,
    row_y0: f32,
}

struct TreeBuilder {
    tree: DocumentTree,
    /// Open headings as (level, node)
    headings: Vec<(u8, NodeId)>,
    /// Open lists as (list node, source level of its items), outermost first
    lists: Vec<(NodeId, u8)>,
    table: Option<OpenTable>,
    /// The image just emitted, waiting for a caption
    last_image: Option<NodeId>,
}

impl TreeBuilder {
    fn new(page_count: u32) -> Self {
        Self {
            tree: DocumentTree::new(page_count),
            headings: Vec::new(),
            lists: Vec::new(),
            table: None,
            last_image: None,
        }
    }

    fn parent(&self) -> Option<NodeId> {
        self.headings.last().map(|&(_, id)| id)
    }

    fn close_blocks(&mut self) {
        self.lists.clear();
        self.table = None;
    }

    fn push_span(&mut self, span: ClassifiedSpan) {
        let page = span.page_index();
        let last_image = self.last_image.take();

        match span.role {
            Role::Blank => {}
            Role::Heading => self.push_heading(span),
            Role::ListItem => {
                self.table = None;
                self.push_list_item(span);
            }
            Role::TableCell => {
                self.lists.clear();
                self.push_table_cell(span);
            }
            Role::Paragraph | Role::Caption => {
                self.close_blocks();
                let caption = span.role == Role::Caption;
                if caption {
                    if let Some(image) = last_image {
                        let text = plain_text(&span.inline_runs);
                        if let NodeKind::ImageRef { alt, .. } = &mut self.tree.node_mut(image).kind {
                            if !text.is_empty() {
                                *alt = text;
                            }
                        }
                    }
                }
                let parent = self.parent();
                self.tree.append(
                    parent,
                    Node::new(
                        page,
                        NodeKind::Paragraph {
                            runs: span.inline_runs,
                            caption,
                        },
                    ),
                );
            }
        }
    }

    fn push_heading(&mut self, span: ClassifiedSpan) {
        self.close_blocks();
        let level = span.level.clamp(1, 6);
        while let Some(&(open, _)) = self.headings.last() {
            if open >= level {
                self.headings.pop();
            } else {
                break;
            }
        }

        let parent = self.parent();
        let id = self.tree.append(
            parent,
            Node::new(
                span.page_index(),
                NodeKind::Heading {
                    level,
                    title: span.inline_runs,
                    children: Vec::new(),
                },
            ),
        );
        self.headings.push((level, id));
    }

    fn push_list_item(&mut self, span: ClassifiedSpan) {
        let level = span.level;
        let page = span.page_index();
        let ordered = span.is_ordered_item();

        // Close to the shallowest open list that is at least as deep as the item.
        while self.lists.len() > 1 && self.lists[self.lists.len() - 2].1 >= level {
            self.lists.pop();
        }

        let list = match self.lists.last().copied() {
            Some((list, open)) if open >= level => {
                if let Some(top) = self.lists.last_mut() {
                    top.1 = level;
                }
                list
            }
            Some((list, _)) => match self.tree.children(list).last().copied() {
                Some(item) => self.open_list(Some(item), page, ordered, level),
                None => list,
            },
            None => {
                let parent = self.parent();
                self.open_list(parent, page, ordered, level)
            }
        };

        self.tree.append(
            Some(list),
            Node::new(
                page,
                NodeKind::ListItem {
                    runs: span.inline_runs,
                    children: Vec::new(),
                },
            ),
        );
    }

    fn open_list(&mut self, parent: Option<NodeId>, page: u32, ordered: bool, level: u8) -> NodeId {
        let id = self.tree.append(
            parent,
            Node::new(
                page,
                NodeKind::List {
                    ordered,
                    items: Vec::new(),
                },
            ),
        );
        self.lists.push((id, level));
        id
    }

    fn push_table_cell(&mut self, span: ClassifiedSpan) {
        let page = span.page_index();
        let y0 = span.span.bbox.y0;
        let tolerance = span.span.font_size * 0.3;

        let same_row = self
            .table
            .as_ref()
            .map(|t| t.page_index == page && (t.row_y0 - y0).abs() <= tolerance);

        let node = match self.table.as_ref().map(|t| t.node) {
            Some(node) => node,
            None => {
                let parent = self.parent();
                let node = self.tree.append(
                    parent,
                    Node::new(page, NodeKind::Table { rows: Vec::new() }),
                );
                self.table = Some(OpenTable {
                    node,
                    page_index: page,
                    row_y0: y0,
                });
                node
            }
        };

        if let NodeKind::Table { rows } = &mut self.tree.node_mut(node).kind {
            match rows.last_mut() {
                Some(row) if same_row == Some(true) => row.push(span.inline_runs),
                _ => rows.push(vec![span.inline_runs]),
            }
        }
        if let Some(open) = self.table.as_mut() {
            open.row_y0 = y0;
        }
    }

    fn push_image(&mut self, image: ImageAsset) {
        self.close_blocks();
        let page = image.page_index;
        let asset = self.tree.add_asset(image);
        let parent = self.parent();
        let id = self.tree.append(
            parent,
            Node::new(
                page,
                NodeKind::ImageRef {
                    asset,
                    alt: DEFAULT_ALT_TEXT.to_string(),
                },
            ),
        );
        self.last_image = Some(id);
    }

    fn finish(self) -> DocumentTree {
        self.tree
    }
}
