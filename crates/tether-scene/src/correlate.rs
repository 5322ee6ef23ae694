//! Graph correlator: maps live scene objects back to source positions.
//!
//! Correlation is a two-phase walk. Upward from a hit object to the
//! nearest metadata carrier whose position the document's position tree
//! vouches for, then downward from the carrier to the object a transform
//! gizmo should actually attach to. Every step is fallible and every
//! failure resolves to "no selection", never an error.

use petgraph::stable_graph::NodeIndex;
use serde::{Deserialize, Serialize};

use crate::object::SceneGraph;
use tether_core::{ElementKind, ElementMetadata, PositionNode, TransformMode, position_exists};

/// Coordinate frame a transform gizmo should operate in for a selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Space {
    /// Some ancestor above the match displaces the subtree; gizmo values
    /// are meaningful only in the parent frame.
    Local,
    /// No displacing ancestor; local and world frames coincide.
    World,
}

/// A successful correlation: source coordinates plus the graph node the
/// gizmo attaches to.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSelection {
    pub path: String,
    pub line: u32,
    pub column: u32,
    pub parent_path: String,
    pub name: String,
    pub props: serde_json::Map<String, serde_json::Value>,
    pub target: NodeIndex,
    pub space: Space,
}

/// A carrier is admissible only if its metadata points into the open
/// document and at a position the document's tree actually contains.
/// Stale metadata (edited-away elements, foreign files) fails here.
fn is_in_scene(root_path: &str, meta: &ElementMetadata, positions: &[PositionNode]) -> bool {
    meta.path == root_path && position_exists(positions, meta.line, meta.column)
}

/// Correlate a hit object: walk up to the nearest admissible metadata
/// carrier, then down to the gizmo target.
pub fn resolve(
    graph: &SceneGraph,
    root_path: &str,
    start: NodeIndex,
    mode: TransformMode,
    positions: &[PositionNode],
) -> Option<ResolvedSelection> {
    let mut found: Option<(NodeIndex, ElementMetadata)> = None;
    let mut space = Space::World;

    let mut current = Some(start);
    while let Some(idx) = current {
        if found.is_none()
            && let Some(meta) = graph.metadata(idx)
            && is_in_scene(root_path, meta, positions)
        {
            found = Some((idx, meta.clone()));
        } else if found.is_some()
            && let Some(object) = graph.object(idx)
            && object.transform.displaces()
        {
            // An ancestor above the match moves the subtree, so gizmo
            // coordinates are only meaningful locally.
            space = Space::Local;
        }
        current = graph.parent(idx);
    }

    let (carrier, meta) = found?;
    let anchor = graph.first_child(carrier)?;
    let target = match meta.kind {
        ElementKind::Host => anchor,
        ElementKind::Custom => transformed_target(graph, anchor, mode),
    };

    Some(ResolvedSelection {
        path: meta.path,
        line: meta.line,
        column: meta.column,
        parent_path: root_path.to_string(),
        name: meta.name,
        props: meta.props,
        target,
        space,
    })
}

/// Downward phase for custom components: the component renders its own
/// subtree, so find the first descendant advertising support for the
/// active mode and attach to its wrapped object. Falls back to the first
/// translate-capable descendant, then to the anchor itself.
fn transformed_target(graph: &SceneGraph, anchor: NodeIndex, mode: TransformMode) -> NodeIndex {
    let mut exact = None;
    let mut translated = None;
    for idx in graph.descendants(anchor) {
        let Some(meta) = graph.metadata(idx) else {
            continue;
        };
        let Some(wrapped) = graph.first_child(idx) else {
            continue;
        };
        let transforms = meta.transforms();
        if exact.is_none() && transforms.supports(mode) {
            exact = Some(wrapped);
            break;
        }
        if translated.is_none() && transforms.translate {
            translated = Some(wrapped);
        }
    }
    exact.or(translated).unwrap_or(anchor)
}

/// Find any live metadata carrier for an exact source position. Child-less
/// carriers count here; this is the liveness check, not selection.
pub fn find_carrier(
    graph: &SceneGraph,
    path: &str,
    line: u32,
    column: u32,
) -> Option<NodeIndex> {
    graph.descendants(graph.root()).into_iter().find(|&idx| {
        graph
            .metadata(idx)
            .is_some_and(|meta| meta.path == path && meta.line == line && meta.column == column)
    })
}

/// Correlate from source coordinates instead of a hit object: locate the
/// carrier for `(path, line, column)` and resolve from there. The scan
/// requires a carrier with a structural child, so an instance that lost
/// its wrapped object never shadows a selectable one.
pub fn resolve_at(
    graph: &SceneGraph,
    path: &str,
    line: u32,
    column: u32,
    mode: TransformMode,
    positions: &[PositionNode],
) -> Option<ResolvedSelection> {
    let carrier = graph.descendants(graph.root()).into_iter().find(|&idx| {
        graph.first_child(idx).is_some()
            && graph
                .metadata(idx)
                .is_some_and(|meta| meta.path == path && meta.line == line && meta.column == column)
    })?;
    resolve(graph, path, carrier, mode, positions)
}
