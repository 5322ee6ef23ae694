//! Source-of-truth seam between the runtime and the documents it renders.
//!
//! The selection machinery never reads files itself; it asks a
//! `SceneSource` for position trees and element lookups. Hosts back this
//! with their project index; `DocumentSceneSource` is the in-memory
//! implementation used by embedders and tests.

use std::collections::HashMap;

use tether_core::{
    ElementKind, LineIndex, PositionNode, Transforms, build_positions, parse_document, position_at,
};

/// What the source knows about the element at a `(path, line, column)`.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectInfo {
    pub kind: ElementKind,
    pub transforms: Transforms,
    /// Document that defines this element's component.
    pub path: String,
    pub export_name: String,
}

/// Read-only view of the documents backing the open scene.
pub trait SceneSource {
    /// Position tree for one export of one document. `None` when the
    /// document or export is unknown.
    fn scene(&self, path: &str, export_name: &str) -> Option<Vec<PositionNode>>;

    /// Resolve the element at an exact source position.
    fn object_at(&self, path: &str, line: u32, column: u32) -> Option<ObjectInfo>;
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SceneKey {
    path: String,
    export_name: String,
}

#[derive(Debug, Clone)]
struct Definition {
    path: String,
    export_name: String,
}

/// In-memory `SceneSource` over parsed documents. Every export registers
/// as a component definition under its own name, so custom elements
/// navigate to the document that exports them.
#[derive(Debug, Default)]
pub struct DocumentSceneSource {
    scenes: HashMap<SceneKey, Vec<PositionNode>>,
    definitions: HashMap<String, Definition>,
    capabilities: HashMap<String, Transforms>,
}

impl DocumentSceneSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and index a document under `path`.
    pub fn add_document(&mut self, path: &str, text: &str) -> Result<(), String> {
        let doc = parse_document(text)?;
        let index = LineIndex::new(text);
        for export in &doc.exports {
            self.scenes.insert(
                SceneKey {
                    path: path.to_string(),
                    export_name: export.name.clone(),
                },
                build_positions(export, &index),
            );
            self.definitions.insert(
                export.name.clone(),
                Definition {
                    path: path.to_string(),
                    export_name: export.name.clone(),
                },
            );
        }
        Ok(())
    }

    /// Record which transforms a custom component accepts. Unregistered
    /// customs report the all-false default.
    pub fn set_capabilities(&mut self, tag: &str, transforms: Transforms) {
        self.capabilities.insert(tag.to_string(), transforms);
    }
}

impl SceneSource for DocumentSceneSource {
    fn scene(&self, path: &str, export_name: &str) -> Option<Vec<PositionNode>> {
        self.scenes
            .get(&SceneKey {
                path: path.to_string(),
                export_name: export_name.to_string(),
            })
            .cloned()
    }

    fn object_at(&self, path: &str, line: u32, column: u32) -> Option<ObjectInfo> {
        for (key, nodes) in &self.scenes {
            if key.path != path {
                continue;
            }
            let Some(node) = position_at(nodes, line, column) else {
                continue;
            };
            let info = match node.kind {
                ElementKind::Host => ObjectInfo {
                    kind: ElementKind::Host,
                    transforms: Transforms::ALL,
                    path: key.path.clone(),
                    export_name: key.export_name.clone(),
                },
                ElementKind::Custom => {
                    let definition = self.definitions.get(&node.name);
                    ObjectInfo {
                        kind: ElementKind::Custom,
                        transforms: self
                            .capabilities
                            .get(&node.name)
                            .copied()
                            .unwrap_or_default(),
                        path: definition.map_or_else(|| key.path.clone(), |d| d.path.clone()),
                        export_name: definition
                            .map_or_else(|| key.export_name.clone(), |d| d.export_name.clone()),
                    }
                }
            };
            return Some(info);
        }
        None
    }
}
