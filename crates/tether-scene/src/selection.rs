//! Selection state machine.
//!
//! Owns the active source selection and the transform mode, consumes host
//! requests and pointer gestures, and answers with the bridge events and
//! editor actions they imply. All state transitions are synchronous; the
//! embedder drives `frame_tick` once per render frame so selections whose
//! objects leave the graph are blurred promptly.

use petgraph::stable_graph::NodeIndex;

use crate::bridge::{HostRequest, RuntimeEvent};
use crate::correlate::{ResolvedSelection, find_carrier, resolve, resolve_at};
use crate::mutation::{confirm_prop, encode_props};
use crate::object::{Aabb, SceneGraph};
use crate::source::SceneSource;
use tether_core::{ElementKind, PositionNode, TransformMode};

/// Pointer travel (in screen units) beyond which a release is a drag, not
/// a click.
pub const CLICK_SLOP: f32 = 1.0;

/// Objects whose name contains this marker never take part in selection
/// (editor helpers, gizmo geometry).
pub const IGNORE_MARKER: &str = "tether_ignore";

const VIEW_CAMERA_ACTION: &str = "viewFocusedCamera";

/// The selected element, in source coordinates. Survives graph churn; the
/// live target is re-resolved on demand.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRef {
    pub line: u32,
    pub column: u32,
    pub path: String,
    pub parent_path: String,
}

/// What the embedder should do in response to an input. `Send` goes out
/// over the bridge; the rest are editor-side actions.
#[derive(Debug, Clone, PartialEq)]
pub enum SceneEvent {
    Send(RuntimeEvent),
    /// Open another scene document.
    Navigate {
        path: String,
        export_name: String,
        encoded_props: String,
    },
    /// Frame the camera on a live object.
    JumpTo { target: NodeIndex, bounds: Aabb },
    /// Look through a selected camera object.
    ViewCamera {
        target: NodeIndex,
        line: u32,
        column: u32,
        path: String,
    },
}

/// Selection state for one open scene.
#[derive(Debug)]
pub struct Selection {
    root_path: String,
    export_name: String,
    mode: TransformMode,
    selected: Option<SourceRef>,
    dragging: bool,
}

impl Selection {
    pub fn new(root_path: impl Into<String>, export_name: impl Into<String>) -> Self {
        Self {
            root_path: root_path.into(),
            export_name: export_name.into(),
            mode: TransformMode::default(),
            selected: None,
            dragging: false,
        }
    }

    pub fn mode(&self) -> TransformMode {
        self.mode
    }

    pub fn selected(&self) -> Option<&SourceRef> {
        self.selected.as_ref()
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    /// Retarget to another scene document, dropping any selection.
    pub fn open(&mut self, path: impl Into<String>, export_name: impl Into<String>) {
        self.root_path = path.into();
        self.export_name = export_name.into();
        self.selected = None;
        self.dragging = false;
    }

    fn positions(&self, source: &dyn SceneSource) -> Vec<PositionNode> {
        source
            .scene(&self.root_path, &self.export_name)
            .unwrap_or_default()
    }

    /// Re-correlate the current selection against the live graph.
    pub fn resolved(
        &self,
        graph: &SceneGraph,
        source: &dyn SceneSource,
    ) -> Option<ResolvedSelection> {
        let selected = self.selected.as_ref()?;
        let positions = self.positions(source);
        resolve_at(
            graph,
            &selected.path,
            selected.line,
            selected.column,
            self.mode,
            &positions,
        )
    }

    fn select(&mut self, selected: SourceRef) -> Vec<SceneEvent> {
        log::debug!(
            "focus {}:{}:{}",
            selected.path,
            selected.line,
            selected.column
        );
        let event = RuntimeEvent::SceneObjectFocus {
            column: selected.column,
            line: selected.line,
            parent_path: selected.parent_path.clone(),
            path: selected.path.clone(),
        };
        self.selected = Some(selected);
        vec![SceneEvent::Send(event)]
    }

    fn blur(&mut self) -> Vec<SceneEvent> {
        if self.selected.take().is_some() {
            log::debug!("blur");
            vec![SceneEvent::Send(RuntimeEvent::SceneObjectBlur)]
        } else {
            Vec::new()
        }
    }

    /// Process one host request.
    pub fn handle(
        &mut self,
        request: HostRequest,
        graph: &SceneGraph,
        source: &dyn SceneSource,
    ) -> Vec<SceneEvent> {
        match request {
            HostRequest::TransformChange { mode } => {
                self.mode = mode;
                vec![SceneEvent::Send(RuntimeEvent::TransformChange { mode })]
            }
            HostRequest::FocusSceneObject { line, column, path } => self.select(SourceRef {
                line,
                column,
                path,
                parent_path: self.root_path.clone(),
            }),
            HostRequest::BlurSceneObject => self.blur(),
            HostRequest::JumpToSceneObject => {
                let Some(resolved) = self.resolved(graph, source) else {
                    return Vec::new();
                };
                vec![SceneEvent::JumpTo {
                    target: resolved.target,
                    bounds: graph.subtree_bounds(resolved.target),
                }]
            }
            HostRequest::NavigateToScene(Some(target)) if !target.path.is_empty() => {
                let mut events = vec![SceneEvent::Navigate {
                    path: target.path,
                    export_name: target.export_name,
                    encoded_props: target.encoded_props,
                }];
                events.extend(self.blur());
                events
            }
            HostRequest::NavigateToScene(_) => self.navigate_into_selection(graph, source),
            HostRequest::Action { action } if action == VIEW_CAMERA_ACTION => {
                let Some(resolved) = self.resolved(graph, source) else {
                    return Vec::new();
                };
                if !graph.object(resolved.target).is_some_and(|o| o.is_camera) {
                    return Vec::new();
                }
                vec![SceneEvent::ViewCamera {
                    target: resolved.target,
                    line: resolved.line,
                    column: resolved.column,
                    path: resolved.path,
                }]
            }
            HostRequest::Action { .. } => Vec::new(),
        }
    }

    /// Navigate into the selected custom component's defining document.
    /// Hosts have no definition to open, so they are ignored.
    fn navigate_into_selection(
        &mut self,
        graph: &SceneGraph,
        source: &dyn SceneSource,
    ) -> Vec<SceneEvent> {
        let Some(resolved) = self.resolved(graph, source) else {
            return Vec::new();
        };
        let Some(info) = source.object_at(&resolved.parent_path, resolved.line, resolved.column)
        else {
            return Vec::new();
        };
        if info.kind != ElementKind::Custom {
            return Vec::new();
        }
        let mut events = vec![SceneEvent::Navigate {
            path: info.path,
            export_name: info.export_name,
            encoded_props: encode_props(graph, &resolved),
        }];
        events.extend(self.blur());
        events
    }

    /// A pointer release over `hit`. Ignored when the pointer travelled
    /// beyond the click slop, when the hit is editor-internal geometry, or
    /// when the hit resolves to the already-selected target.
    pub fn pointer_click(
        &mut self,
        graph: &SceneGraph,
        source: &dyn SceneSource,
        hit: NodeIndex,
        delta: f32,
    ) -> Vec<SceneEvent> {
        if delta > CLICK_SLOP {
            return Vec::new();
        }
        if graph
            .object(hit)
            .is_some_and(|o| o.name.contains(IGNORE_MARKER))
        {
            return Vec::new();
        }
        if let Some(current) = self.resolved(graph, source)
            && current.target == hit
        {
            return Vec::new();
        }
        let positions = self.positions(source);
        let Some(data) = resolve(graph, &self.root_path, hit, self.mode, &positions) else {
            return Vec::new();
        };
        self.select(SourceRef {
            line: data.line,
            column: data.column,
            path: data.path,
            parent_path: data.parent_path,
        })
    }

    pub fn drag_start(&mut self) {
        self.dragging = true;
    }

    /// A gizmo interaction finished. Commits the live transform as a prop
    /// confirmation; a target that left the graph mid-drag cancels the
    /// commit without an event.
    pub fn drag_end(&mut self, graph: &SceneGraph, source: &dyn SceneSource) -> Vec<SceneEvent> {
        if !self.dragging {
            return Vec::new();
        }
        self.dragging = false;
        let Some(resolved) = self.resolved(graph, source) else {
            return Vec::new();
        };
        confirm_prop(graph, &resolved, self.mode)
            .map(SceneEvent::Send)
            .into_iter()
            .collect()
    }

    /// Per-frame liveness check: when the selected element's carrier is no
    /// longer reachable from the root, clear the selection and tell the
    /// host exactly once.
    pub fn frame_tick(&mut self, graph: &SceneGraph) -> Vec<SceneEvent> {
        let Some(selected) = self.selected.as_ref() else {
            return Vec::new();
        };
        if find_carrier(graph, &selected.path, selected.line, selected.column).is_some() {
            return Vec::new();
        }
        self.blur()
    }
}
