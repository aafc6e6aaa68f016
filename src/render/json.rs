//! JSON rendering for document trees and analysis results.

use serde::ser::{Serialize, Serializer};

use crate::error::Result;
use crate::model::{DocumentTree, InlineRun, NodeId, NodeKind};

/// JSON output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JsonFormat {
    /// Pretty-printed JSON with indentation
    #[default]
    Pretty,
    /// Compact JSON without extra whitespace
    Compact,
}

/// Serialize a tree, an analysis, or any other serializable value.
pub fn to_json<T: Serialize + ?Sized>(value: &T, format: JsonFormat) -> Result<String> {
    let json = match format {
        JsonFormat::Pretty => serde_json::to_string_pretty(value)?,
        JsonFormat::Compact => serde_json::to_string(value)?,
    };
    Ok(json)
}

/// Nested view of one node.
#[derive(serde::Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum JsonNode<'a> {
    Heading {
        page: u32,
        level: u8,
        title: &'a [InlineRun],
        children: Vec<JsonNode<'a>>,
    },
    Paragraph {
        page: u32,
        #[serde(skip_serializing_if = "std::ops::Not::not")]
        caption: bool,
        runs: &'a [InlineRun],
    },
    List {
        page: u32,
        ordered: bool,
        items: Vec<JsonNode<'a>>,
    },
    ListItem {
        page: u32,
        runs: &'a [InlineRun],
        #[serde(skip_serializing_if = "Vec::is_empty")]
        children: Vec<JsonNode<'a>>,
    },
    Image {
        page: u32,
        alt: &'a str,
        content_hash: &'a str,
        #[serde(skip_serializing_if = "Option::is_none")]
        mime_type: Option<&'static str>,
    },
    Table {
        page: u32,
        rows: &'a [Vec<Vec<InlineRun>>],
    },
}

fn json_node(tree: &DocumentTree, id: NodeId) -> JsonNode<'_> {
    let node = tree.node(id);
    let page = node.page_index;

    match &node.kind {
        NodeKind::Heading {
            level,
            title,
            children: ids,
        } => JsonNode::Heading {
            page,
            level: *level,
            title,
            children: json_children(tree, ids),
        },
        NodeKind::Paragraph { runs, caption } => JsonNode::Paragraph {
            page,
            caption: *caption,
            runs,
        },
        NodeKind::List { ordered, items } => JsonNode::List {
            page,
            ordered: *ordered,
            items: json_children(tree, items),
        },
        NodeKind::ListItem {
            runs,
            children: ids,
        } => JsonNode::ListItem {
            page,
            runs,
            children: json_children(tree, ids),
        },
        NodeKind::ImageRef { asset, alt } => {
            let asset = tree.asset(*asset);
            JsonNode::Image {
                page,
                alt,
                content_hash: &asset.content_hash,
                mime_type: asset.mime_type(),
            }
        }
        NodeKind::Table { rows } => JsonNode::Table { page, rows },
    }
}

fn json_children<'a>(tree: &'a DocumentTree, ids: &[NodeId]) -> Vec<JsonNode<'a>> {
    ids.iter().map(|&id| json_node(tree, id)).collect()
}

#[derive(serde::Serialize)]
struct JsonTree<'a> {
    page_count: u32,
    outline: Vec<(u8, String)>,
    nodes: Vec<JsonNode<'a>>,
}

impl Serialize for DocumentTree {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        JsonTree {
            page_count: self.page_count(),
            outline: self.outline(),
            nodes: self.roots().iter().map(|&id| json_node(self, id)).collect(),
        }
        .serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Node;

    fn sample() -> DocumentTree {
        let mut tree = DocumentTree::new(1);
        let h = tree.append(
            None,
            Node::new(
                0,
                NodeKind::Heading {
                    level: 1,
                    title: vec![InlineRun::new("Intro")],
                    children: Vec::new(),
                },
            ),
        );
        tree.append(
            Some(h),
            Node::new(
                0,
                NodeKind::Paragraph {
                    runs: vec![InlineRun::new("Hello")],
                    caption: false,
                },
            ),
        );
        tree
    }

    #[test]
    fn test_to_json_pretty() {
        let json = to_json(&sample(), JsonFormat::Pretty).unwrap();
        assert!(json.contains("\"type\": \"heading\""));
        assert!(json.contains("Hello"));
        assert!(json.contains('\n')); // Pretty has newlines
    }

    #[test]
    fn test_to_json_compact_nesting() {
        let json = to_json(&sample(), JsonFormat::Compact).unwrap();
        assert!(!json.contains('\n')); // Compact has no newlines

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["page_count"], 1);
        assert_eq!(value["nodes"][0]["children"][0]["type"], "paragraph");
        assert_eq!(value["outline"][0][1], "Intro");
    }
}
