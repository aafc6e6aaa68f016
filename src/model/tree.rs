//! Arena-backed document tree.
//!
//! Nodes live in a flat `Vec` and refer to their children by [`NodeId`].
//! Parents own children through those id lists only; there are no
//! back-pointers, so the builder keeps its own stacks of open nodes.

use serde::{Deserialize, Serialize};

use super::{plain_text, ImageAsset, InlineRun};

/// Handle to a node in a [`DocumentTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(usize);

impl NodeId {
    /// Position in the arena.
    pub fn index(self) -> usize {
        self.0
    }
}

/// Handle to an image asset owned by a [`DocumentTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssetId(usize);

impl AssetId {
    /// Position in the asset list.
    pub fn index(self) -> usize {
        self.0
    }
}

/// Node payload.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// A heading that owns everything until the next heading of level <= its own
    Heading {
        /// Heading level (1-6)
        level: u8,
        /// Title text
        title: Vec<InlineRun>,
        /// Owned content
        children: Vec<NodeId>,
    },

    /// A paragraph (captions are paragraphs flagged as such)
    Paragraph {
        /// Text runs
        runs: Vec<InlineRun>,
        /// Whether the paragraph is an image/table caption
        caption: bool,
    },

    /// An ordered or unordered list
    List {
        /// Numbered list
        ordered: bool,
        /// `ListItem` nodes
        items: Vec<NodeId>,
    },

    /// A list item, optionally owning nested lists
    ListItem {
        /// Item text
        runs: Vec<InlineRun>,
        /// Nested `List` nodes
        children: Vec<NodeId>,
    },

    /// A reference to an image asset
    ImageRef {
        /// Referenced asset
        asset: AssetId,
        /// Alternative text
        alt: String,
    },

    /// A table; the first row is the header
    Table {
        /// Rows of cells of runs
        rows: Vec<Vec<Vec<InlineRun>>>,
    },
}

/// A node and the page it starts on.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Page the node's first content came from (0-indexed)
    pub page_index: u32,
    /// Payload
    pub kind: NodeKind,
}

impl Node {
    /// Create a node.
    pub fn new(page_index: u32, kind: NodeKind) -> Self {
        Self { page_index, kind }
    }

    /// Check if this node is a heading.
    pub fn is_heading(&self) -> bool {
        matches!(self.kind, NodeKind::Heading { .. })
    }

    /// Plain text carried by this node itself (not its children).
    pub fn plain_text(&self) -> String {
        match &self.kind {
            NodeKind::Heading { title, .. } => plain_text(title),
            NodeKind::Paragraph { runs, .. } | NodeKind::ListItem { runs, .. } => plain_text(runs),
            NodeKind::ImageRef { alt, .. } => alt.clone(),
            NodeKind::Table { rows } => rows
                .iter()
                .map(|row| row.iter().map(|c| plain_text(c)).collect::<Vec<_>>().join("\t"))
                .collect::<Vec<_>>()
                .join("\n"),
            NodeKind::List { .. } => String::new(),
        }
    }
}

/// The synthesized document: a forest of nodes under one implicit root.
#[derive(Debug, Clone, Default)]
pub struct DocumentTree {
    nodes: Vec<Node>,
    roots: Vec<NodeId>,
    assets: Vec<ImageAsset>,
    page_count: u32,
}

impl DocumentTree {
    /// Create an empty tree for a document with `page_count` pages.
    pub fn new(page_count: u32) -> Self {
        Self {
            page_count,
            ..Default::default()
        }
    }

    /// Number of source pages.
    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    /// Take ownership of an image asset.
    pub fn add_asset(&mut self, asset: ImageAsset) -> AssetId {
        self.assets.push(asset);
        AssetId(self.assets.len() - 1)
    }

    /// Get an asset.
    pub fn asset(&self, id: AssetId) -> &ImageAsset {
        &self.assets[id.0]
    }

    /// All assets in insertion order.
    pub fn assets(&self) -> &[ImageAsset] {
        &self.assets
    }

    /// Allocate a node and attach it under `parent` (or the root).
    pub fn append(&mut self, parent: Option<NodeId>, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        match parent {
            None => self.roots.push(id),
            Some(p) => match self.child_list_mut(p) {
                Some(children) => children.push(id),
                None => {
                    debug_assert!(false, "node {:?} cannot own children", p);
                    log::error!("node {:?} cannot own children; attaching to root", p);
                    self.roots.push(id);
                }
            },
        }
        id
    }

    /// Get a node.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    /// Get a node mutably.
    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    /// Top-level nodes in order.
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    /// Children of a node (heading content, list items, or nested lists).
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        match &self.nodes[id.0].kind {
            NodeKind::Heading { children, .. } | NodeKind::ListItem { children, .. } => children,
            NodeKind::List { items, .. } => items,
            _ => &[],
        }
    }

    /// Total node count.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if the tree has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Depth-first pre-order walk as `(node, depth)` pairs.
    pub fn walk(&self) -> Vec<(NodeId, usize)> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<(NodeId, usize)> = self.roots.iter().rev().map(|&id| (id, 0)).collect();
        while let Some((id, depth)) = stack.pop() {
            out.push((id, depth));
            for &child in self.children(id).iter().rev() {
                stack.push((child, depth + 1));
            }
        }
        out
    }

    /// Headings in document order as `(level, title)`.
    pub fn outline(&self) -> Vec<(u8, String)> {
        self.walk()
            .into_iter()
            .filter_map(|(id, _)| match &self.node(id).kind {
                NodeKind::Heading { level, title, .. } => Some((*level, plain_text(title))),
                _ => None,
            })
            .collect()
    }

    fn child_list_mut(&mut self, id: NodeId) -> Option<&mut Vec<NodeId>> {
        match &mut self.nodes[id.0].kind {
            NodeKind::Heading { children, .. } | NodeKind::ListItem { children, .. } => {
                Some(children)
            }
            NodeKind::List { items, .. } => Some(items),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn heading(level: u8, text: &str) -> Node {
        Node::new(
            0,
            NodeKind::Heading {
                level,
                title: vec![InlineRun::new(text)],
                children: Vec::new(),
            },
        )
    }

    fn para(text: &str) -> Node {
        Node::new(
            0,
            NodeKind::Paragraph {
                runs: vec![InlineRun::new(text)],
                caption: false,
            },
        )
    }

    #[test]
    fn test_append_and_walk() {
        let mut tree = DocumentTree::new(1);
        let h1 = tree.append(None, heading(1, "Intro"));
        let p = tree.append(Some(h1), para("Body"));
        let h2 = tree.append(Some(h1), heading(2, "Detail"));
        tree.append(Some(h2), para("More"));
        tree.append(None, para("Tail"));

        assert_eq!(tree.roots().len(), 2);
        assert_eq!(tree.children(h1), &[p, h2]);

        let depths: Vec<usize> = tree.walk().into_iter().map(|(_, d)| d).collect();
        assert_eq!(depths, vec![0, 1, 1, 2, 0]);
        assert_eq!(
            tree.outline(),
            vec![(1, "Intro".to_string()), (2, "Detail".to_string())]
        );
    }

    #[test]
    fn test_assets() {
        let mut tree = DocumentTree::new(1);
        let id = tree.add_asset(ImageAsset::new(0, 0, vec![1, 2, 3], Default::default()));
        assert_eq!(tree.asset(id).bytes, vec![1, 2, 3]);
        assert_eq!(tree.assets().len(), 1);
    }
}
