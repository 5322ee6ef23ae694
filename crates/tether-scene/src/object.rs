//! Live retained scene graph: the runtime-side mirror the correlator walks.
//!
//! Nodes are owned by a `StableDiGraph` so indices stay valid across
//! removals elsewhere in the tree. Parentage is a single incoming edge;
//! detaching a node severs that edge without destroying the node, which is
//! how renderers unlink objects mid-frame.

use glam::{Mat4, Quat, Vec3};
use petgraph::Direction;
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use tether_core::ElementMetadata;

// ─── Transform ───────────────────────────────────────────────────────────

/// Local TRS transform. Identity by default.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Self::default()
        }
    }

    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }

    /// Whether this transform displaces or resizes its subtree. Rotation is
    /// deliberately ignored: a pure rotation does not change which
    /// coordinate frame a gizmo should operate in.
    pub fn displaces(&self) -> bool {
        self.translation != Vec3::ZERO || self.scale != Vec3::ONE
    }
}

// ─── Scene objects ───────────────────────────────────────────────────────

/// One live object in the retained graph. Wrapper containers produced by
/// instrumentation carry `metadata`; plain renderer objects carry `None`.
#[derive(Debug, Clone)]
pub struct SceneObject {
    pub name: String,
    pub transform: Transform,
    pub metadata: Option<ElementMetadata>,
    pub is_camera: bool,
}

impl SceneObject {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transform: Transform::default(),
            metadata: None,
            is_camera: false,
        }
    }

    pub fn with_metadata(name: impl Into<String>, metadata: ElementMetadata) -> Self {
        Self {
            metadata: Some(metadata),
            ..Self::new(name)
        }
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn camera(mut self) -> Self {
        self.is_camera = true;
        self
    }
}

// ─── Axis-aligned bounds ─────────────────────────────────────────────────

/// World-space bounds of a subtree, for framing jumped-to objects.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    fn point(p: Vec3) -> Self {
        Self { min: p, max: p }
    }

    fn include(&mut self, p: Vec3) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }
}

// ─── Scene graph ─────────────────────────────────────────────────────────

/// The retained scene graph. A dedicated root node anchors everything that
/// is live; nodes unreachable from it are detached and ignored by lookups.
#[derive(Debug)]
pub struct SceneGraph {
    graph: StableDiGraph<SceneObject, ()>,
    root: NodeIndex,
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneGraph {
    pub fn new() -> Self {
        let mut graph = StableDiGraph::new();
        let root = graph.add_node(SceneObject::new("root"));
        Self { graph, root }
    }

    pub fn root(&self) -> NodeIndex {
        self.root
    }

    pub fn add_object(&mut self, parent: NodeIndex, object: SceneObject) -> NodeIndex {
        let idx = self.graph.add_node(object);
        self.graph.add_edge(parent, idx, ());
        idx
    }

    pub fn object(&self, idx: NodeIndex) -> Option<&SceneObject> {
        self.graph.node_weight(idx)
    }

    pub fn object_mut(&mut self, idx: NodeIndex) -> Option<&mut SceneObject> {
        self.graph.node_weight_mut(idx)
    }

    pub fn metadata(&self, idx: NodeIndex) -> Option<&ElementMetadata> {
        self.object(idx).and_then(|o| o.metadata.as_ref())
    }

    /// Remove a node outright. Its subtree becomes unreachable.
    pub fn remove_object(&mut self, idx: NodeIndex) -> Option<SceneObject> {
        self.graph.remove_node(idx)
    }

    /// Sever the node's parent edge. The node and its subtree survive but
    /// are no longer reachable from the root.
    pub fn detach(&mut self, idx: NodeIndex) {
        let incoming: Vec<_> = self
            .graph
            .edges_directed(idx, Direction::Incoming)
            .map(|e| e.id())
            .collect();
        for edge in incoming {
            self.graph.remove_edge(edge);
        }
    }

    pub fn parent(&self, idx: NodeIndex) -> Option<NodeIndex> {
        self.graph
            .neighbors_directed(idx, Direction::Incoming)
            .next()
    }

    /// Children in insertion order. Neighbor iteration is most-recent-first,
    /// so sort by index to keep traversal deterministic.
    pub fn children(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        let mut out: Vec<NodeIndex> = self
            .graph
            .neighbors_directed(idx, Direction::Outgoing)
            .collect();
        out.sort();
        out
    }

    pub fn first_child(&self, idx: NodeIndex) -> Option<NodeIndex> {
        self.children(idx).into_iter().next()
    }

    /// Depth-first pre-order over the subtree, including `start` itself.
    pub fn descendants(&self, start: NodeIndex) -> Vec<NodeIndex> {
        let mut out = Vec::new();
        let mut stack = vec![start];
        while let Some(idx) = stack.pop() {
            out.push(idx);
            let mut children = self.children(idx);
            children.reverse();
            stack.extend(children);
        }
        out
    }

    /// Whether the node still exists and its parent chain reaches the root.
    pub fn is_live(&self, idx: NodeIndex) -> bool {
        if !self.graph.contains_node(idx) {
            return false;
        }
        let mut current = idx;
        while current != self.root {
            match self.parent(current) {
                Some(parent) => current = parent,
                None => return false,
            }
        }
        true
    }

    /// Accumulated root-to-node matrix. Detached nodes fall back to their
    /// local matrix.
    pub fn world_matrix(&self, idx: NodeIndex) -> Mat4 {
        let mut chain = Vec::new();
        let mut current = Some(idx);
        while let Some(node) = current {
            if let Some(object) = self.object(node) {
                chain.push(object.transform.matrix());
            }
            current = self.parent(node);
        }
        chain
            .into_iter()
            .rev()
            .fold(Mat4::IDENTITY, |acc, m| acc * m)
    }

    pub fn world_position(&self, idx: NodeIndex) -> Vec3 {
        self.world_matrix(idx).w_axis.truncate()
    }

    /// World-space bounds over every object position in the subtree.
    pub fn subtree_bounds(&self, idx: NodeIndex) -> Aabb {
        let mut bounds = Aabb::point(self.world_position(idx));
        for node in self.descendants(idx) {
            bounds.include(self.world_position(node));
        }
        bounds
    }
}
