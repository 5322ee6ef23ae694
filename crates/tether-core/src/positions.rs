//! Position tree builder: the authoritative `(line, column)`-indexed shape
//! of scene elements for a document/export.
//!
//! The tree is the runtime's authorization list: any correlation match must
//! reference a position present here for the same file, otherwise it is
//! rejected (prevents selecting elements from stale or foreign documents).

use crate::model::{Document, Element, ElementKind, ExportBlock, PropValue};
use crate::span::LineIndex;
use serde::{Deserialize, Serialize};

/// A scene element's position descriptor. `line`/`column` are zero-based;
/// the parser's one-based coordinates are normalized here, exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionNode {
    pub line: u32,
    pub column: u32,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ElementKind,
    pub children: Vec<PositionNode>,
}

/// Build the position tree for a single export block. Deterministic, pure
/// function of the document text; order is document order.
pub fn build_positions(block: &ExportBlock, index: &LineIndex) -> Vec<PositionNode> {
    block
        .roots
        .iter()
        .filter_map(|root| build_node(root, index))
        .collect()
}

/// Build position trees for every export in the document, concatenated in
/// document order.
pub fn build_document_positions(doc: &Document, index: &LineIndex) -> Vec<PositionNode> {
    doc.exports
        .iter()
        .flat_map(|block| build_positions(block, index))
        .collect()
}

fn build_node(element: &Element, index: &LineIndex) -> Option<PositionNode> {
    if !element.is_scene_element() {
        // Data nodes (materials, geometries) and everything under them are
        // non-positional; nothing inside them is instrumented.
        return None;
    }

    let (line, column) = index.line_col(element.span.start);
    let mut children = Vec::new();

    // Document order: prop-embedded elements appear before structural
    // children in the source text.
    for prop in &element.props {
        if let PropValue::Element(inner) = &prop.value
            && let Some(node) = build_node(inner, index)
        {
            children.push(node);
        }
    }
    for child in &element.children {
        if let Some(node) = build_node(child, index) {
            children.push(node);
        }
    }

    Some(PositionNode {
        line: line - 1,
        column: column - 1,
        name: element.tag_str().to_string(),
        kind: element.kind(),
        children,
    })
}

/// Flatten a position tree into a single list (children first, matching
/// the runtime's traversal of wrapped scene objects).
pub fn flatten_positions(nodes: &[PositionNode]) -> Vec<&PositionNode> {
    let mut result = Vec::new();
    for node in nodes {
        result.extend(flatten_positions(&node.children));
        result.push(node);
    }
    result
}

/// Whether a `(line, column)` appears anywhere in the tree.
pub fn position_exists(nodes: &[PositionNode], line: u32, column: u32) -> bool {
    flatten_positions(nodes)
        .iter()
        .any(|node| node.line == line && node.column == column)
}

/// Find the node at an exact `(line, column)`, if any.
pub fn position_at(nodes: &[PositionNode], line: u32, column: u32) -> Option<&PositionNode> {
    flatten_positions(nodes)
        .into_iter()
        .find(|node| node.line == line && node.column == column)
}
