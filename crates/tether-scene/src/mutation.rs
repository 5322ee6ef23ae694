//! Mutation emitter: turns a finished gizmo interaction into a structured
//! prop-confirmation event for the host to write back into the document.
//!
//! Values are read off the live graph at commit time, never accumulated
//! from deltas, so a mutation always reflects exactly what the renderer is
//! showing.

use glam::EulerRot;
use serde_json::{Value, json};

use crate::bridge::RuntimeEvent;
use crate::correlate::{ResolvedSelection, Space};
use crate::object::SceneGraph;
use tether_core::TransformMode;

/// Build the confirm event for the active mode. `None` when the target has
/// left the live graph, which cancels the interaction silently.
pub fn confirm_prop(
    graph: &SceneGraph,
    selection: &ResolvedSelection,
    mode: TransformMode,
) -> Option<RuntimeEvent> {
    if !graph.is_live(selection.target) {
        return None;
    }
    let object = graph.object(selection.target)?;

    let prop_value = match mode {
        TransformMode::Translate => {
            // In world space the local and world frames coincide for the
            // written value only when no ancestor displaces; otherwise the
            // local value is the one that round-trips through the document.
            let position = match selection.space {
                Space::World => graph.world_position(selection.target),
                Space::Local => object.transform.translation,
            };
            json!([position.x, position.y, position.z])
        }
        TransformMode::Rotate => {
            // Euler triple, fixed XYZ order. The order slot is implicit in
            // the document format and never serialized.
            let (x, y, z) = object.transform.rotation.to_euler(EulerRot::XYZ);
            json!([x, y, z])
        }
        TransformMode::Scale => {
            let scale = object.transform.scale;
            json!([scale.x, scale.y, scale.z])
        }
    };

    Some(RuntimeEvent::ConfirmSceneObjectProp {
        column: selection.column,
        line: selection.line,
        path: selection.path.clone(),
        prop_name: mode.prop_name().to_string(),
        prop_value,
    })
}

/// Encode a selection's prop snapshot for navigation, substituting the live
/// world position for any declared `position` so the opened scene shows the
/// object where it currently sits.
pub fn encode_props(graph: &SceneGraph, selection: &ResolvedSelection) -> String {
    let mut props = selection.props.clone();
    if props.contains_key("position") {
        let world = graph.world_position(selection.target);
        props.insert(
            "position".to_string(),
            json!([world.x, world.y, world.z]),
        );
    }
    Value::Object(props).to_string()
}
