//! End-to-end selection flows: instrument a document, mount the
//! instrumented output as a live scene graph, then drive the selection
//! machine with pointer input and host requests.

use glam::Vec3;
use petgraph::stable_graph::NodeIndex;
use pretty_assertions::assert_eq;
use serde_json::json;
use tether_core::{
    Element, NullOracle, PropValue, TransformMode, extract_metadata, instrument_source,
    parse_document,
};
use tether_scene::{
    DocumentSceneSource, HostRequest, NavigateTarget, RuntimeEvent, SceneEvent, SceneGraph,
    SceneObject, Selection, Transform,
};

const SCENE_PATH: &str = "/scene.tether";

/// Mount an instrumented element tree the way a renderer would: wrapper
/// containers become metadata-carrying nodes, everything else becomes a
/// plain object with its declared position applied.
fn mount(graph: &mut SceneGraph, parent: NodeIndex, element: &Element) {
    if let Some(meta) = extract_metadata(element) {
        let wrapper = graph.add_object(
            parent,
            SceneObject::with_metadata(format!("wrapper:{}", meta.name), meta),
        );
        for child in &element.children {
            mount(graph, wrapper, child);
        }
        return;
    }

    let mut object = SceneObject::new(element.tag_str());
    if let Some(prop) = element.prop("position")
        && let PropValue::Array(v) = &prop.value
        && v.len() == 3
    {
        object = object.with_transform(Transform::from_translation(Vec3::new(
            v[0] as f32,
            v[1] as f32,
            v[2] as f32,
        )));
    }
    let node = graph.add_object(parent, object);
    for child in &element.children {
        mount(graph, node, child);
    }
}

/// Instrument `text`, mount it, and index the raw text as the source.
fn stage(text: &str) -> (SceneGraph, DocumentSceneSource) {
    let instrumented = instrument_source(text, SCENE_PATH, &NullOracle).unwrap();
    let doc = parse_document(&instrumented.text).unwrap();

    let mut graph = SceneGraph::new();
    let root = graph.root();
    for export in &doc.exports {
        for element in &export.roots {
            mount(&mut graph, root, element);
        }
    }

    let mut source = DocumentSceneSource::new();
    source.add_document(SCENE_PATH, text).unwrap();
    (graph, source)
}

fn find_named(graph: &SceneGraph, name: &str) -> NodeIndex {
    graph
        .descendants(graph.root())
        .into_iter()
        .find(|&idx| graph.object(idx).is_some_and(|o| o.name == name))
        .unwrap_or_else(|| panic!("no object named {name}"))
}

#[test]
fn click_then_drag_commits_a_world_position() {
    let (mut graph, source) = stage("export Scene {\n  <mesh position={[0, 0, 0]} />\n}\n");
    let mesh = find_named(&graph, "mesh");
    let mut selection = Selection::new(SCENE_PATH, "Scene");

    let events = selection.pointer_click(&graph, &source, mesh, 0.0);
    assert_eq!(
        events,
        vec![SceneEvent::Send(RuntimeEvent::SceneObjectFocus {
            column: 2,
            line: 1,
            parent_path: SCENE_PATH.into(),
            path: SCENE_PATH.into(),
        })]
    );

    selection.drag_start();
    graph.object_mut(mesh).unwrap().transform.translation = Vec3::new(1.0, 2.0, 3.0);
    let events = selection.drag_end(&graph, &source);
    assert_eq!(
        events,
        vec![SceneEvent::Send(RuntimeEvent::ConfirmSceneObjectProp {
            column: 2,
            line: 1,
            path: SCENE_PATH.into(),
            prop_name: "position".into(),
            prop_value: json!([1.0, 2.0, 3.0]),
        })]
    );
    assert!(!selection.is_dragging());
}

#[test]
fn scale_mode_commits_the_scale_prop() {
    let (mut graph, source) = stage("export Scene {\n  <mesh />\n}\n");
    let mesh = find_named(&graph, "mesh");
    let mut selection = Selection::new(SCENE_PATH, "Scene");

    let events = selection.handle(
        HostRequest::TransformChange {
            mode: TransformMode::Scale,
        },
        &graph,
        &source,
    );
    assert_eq!(
        events,
        vec![SceneEvent::Send(RuntimeEvent::TransformChange {
            mode: TransformMode::Scale,
        })]
    );
    assert_eq!(selection.mode(), TransformMode::Scale);

    selection.pointer_click(&graph, &source, mesh, 0.0);
    selection.drag_start();
    graph.object_mut(mesh).unwrap().transform.scale = Vec3::new(2.0, 2.0, 2.0);
    let events = selection.drag_end(&graph, &source);
    let [SceneEvent::Send(RuntimeEvent::ConfirmSceneObjectProp {
        prop_name,
        prop_value,
        ..
    })] = events.as_slice()
    else {
        panic!("expected a confirm event, got {events:?}");
    };
    assert_eq!(prop_name, "scale");
    assert_eq!(*prop_value, json!([2.0, 2.0, 2.0]));
}

#[test]
fn click_guards_reject_drags_ignored_objects_and_reclicks() {
    let (mut graph, source) = stage("export Scene {\n  <mesh />\n}\n");
    let mesh = find_named(&graph, "mesh");
    let helper = graph.add_object(graph.root(), SceneObject::new("tether_ignore_helper"));
    let mut selection = Selection::new(SCENE_PATH, "Scene");

    // Pointer travelled too far: a drag release, not a click.
    assert!(selection.pointer_click(&graph, &source, mesh, 4.0).is_empty());
    assert!(selection.selected().is_none());

    // Editor-internal geometry never selects.
    assert!(selection.pointer_click(&graph, &source, helper, 0.0).is_empty());

    // Re-clicking the already-selected target is a no-op.
    assert_eq!(selection.pointer_click(&graph, &source, mesh, 0.0).len(), 1);
    assert!(selection.pointer_click(&graph, &source, mesh, 0.0).is_empty());
    assert!(selection.selected().is_some());
}

#[test]
fn removed_object_blurs_exactly_once() {
    let (mut graph, source) = stage("export Scene {\n  <mesh />\n}\n");
    let mut selection = Selection::new(SCENE_PATH, "Scene");

    selection.handle(
        HostRequest::FocusSceneObject {
            line: 1,
            column: 2,
            path: SCENE_PATH.into(),
        },
        &graph,
        &source,
    );
    assert!(selection.frame_tick(&graph).is_empty());

    let wrapper = find_named(&graph, "wrapper:mesh");
    graph.detach(wrapper);
    assert_eq!(
        selection.frame_tick(&graph),
        vec![SceneEvent::Send(RuntimeEvent::SceneObjectBlur)]
    );
    assert!(selection.selected().is_none());
    assert!(selection.frame_tick(&graph).is_empty());
}

#[test]
fn drag_end_after_the_target_vanishes_is_silent() {
    let (mut graph, source) = stage("export Scene {\n  <mesh />\n}\n");
    let mesh = find_named(&graph, "mesh");
    let mut selection = Selection::new(SCENE_PATH, "Scene");

    selection.pointer_click(&graph, &source, mesh, 0.0);
    selection.drag_start();
    graph.detach(find_named(&graph, "wrapper:mesh"));
    assert!(selection.drag_end(&graph, &source).is_empty());
    assert!(!selection.is_dragging());
}

#[test]
fn blur_request_without_a_selection_emits_nothing() {
    let (graph, source) = stage("export Scene {\n  <mesh />\n}\n");
    let mut selection = Selection::new(SCENE_PATH, "Scene");
    assert!(
        selection
            .handle(HostRequest::BlurSceneObject, &graph, &source)
            .is_empty()
    );

    selection.handle(
        HostRequest::FocusSceneObject {
            line: 1,
            column: 2,
            path: SCENE_PATH.into(),
        },
        &graph,
        &source,
    );
    assert_eq!(
        selection.handle(HostRequest::BlurSceneObject, &graph, &source),
        vec![SceneEvent::Send(RuntimeEvent::SceneObjectBlur)]
    );
}

#[test]
fn navigate_into_a_selected_custom_component() {
    let (graph, mut source) = stage("export Scene {\n  <Player position={[0, 0, 0]} />\n}\n");
    source
        .add_document("/player.tether", "export Player {\n  <mesh />\n}\n")
        .unwrap();
    let player = find_named(&graph, "Player");
    let mut selection = Selection::new(SCENE_PATH, "Scene");

    selection.pointer_click(&graph, &source, player, 0.0);
    let events = selection.handle(HostRequest::NavigateToScene(None), &graph, &source);
    let [
        SceneEvent::Navigate {
            path,
            export_name,
            encoded_props,
        },
        SceneEvent::Send(RuntimeEvent::SceneObjectBlur),
    ] = events.as_slice()
    else {
        panic!("expected navigate + blur, got {events:?}");
    };
    assert_eq!(path, "/player.tether");
    assert_eq!(export_name, "Player");
    let props: serde_json::Value = serde_json::from_str(encoded_props).unwrap();
    assert_eq!(props["position"], json!([0.0, 0.0, 0.0]));
    assert!(selection.selected().is_none());
}

#[test]
fn navigate_with_an_explicit_target_clears_the_selection() {
    let (graph, source) = stage("export Scene {\n  <mesh />\n}\n");
    let mesh = find_named(&graph, "mesh");
    let mut selection = Selection::new(SCENE_PATH, "Scene");
    selection.pointer_click(&graph, &source, mesh, 0.0);

    let events = selection.handle(
        HostRequest::NavigateToScene(Some(NavigateTarget {
            path: "/other.tether".into(),
            export_name: "Other".into(),
            encoded_props: String::new(),
        })),
        &graph,
        &source,
    );
    assert_eq!(
        events,
        vec![
            SceneEvent::Navigate {
                path: "/other.tether".into(),
                export_name: "Other".into(),
                encoded_props: String::new(),
            },
            SceneEvent::Send(RuntimeEvent::SceneObjectBlur),
        ]
    );
}

#[test]
fn jump_to_frames_the_live_target() {
    let (graph, source) = stage("export Scene {\n  <mesh position={[3, 0, 0]} />\n}\n");
    let mesh = find_named(&graph, "mesh");
    let mut selection = Selection::new(SCENE_PATH, "Scene");
    selection.pointer_click(&graph, &source, mesh, 0.0);

    let events = selection.handle(HostRequest::JumpToSceneObject, &graph, &source);
    let [SceneEvent::JumpTo { target, bounds }] = events.as_slice() else {
        panic!("expected a jump event, got {events:?}");
    };
    assert_eq!(*target, mesh);
    assert_eq!(bounds.center(), Vec3::new(3.0, 0.0, 0.0));

    // Without a selection the request is inert.
    let mut empty = Selection::new(SCENE_PATH, "Scene");
    assert!(
        empty
            .handle(HostRequest::JumpToSceneObject, &graph, &source)
            .is_empty()
    );
}

#[test]
fn view_camera_requires_a_camera_target() {
    let (mut graph, source) = stage("export Scene {\n  <mesh />\n}\n");
    let mesh = find_named(&graph, "mesh");
    let mut selection = Selection::new(SCENE_PATH, "Scene");
    selection.pointer_click(&graph, &source, mesh, 0.0);

    let request = HostRequest::Action {
        action: "viewFocusedCamera".into(),
    };
    assert!(
        selection
            .handle(request.clone(), &graph, &source)
            .is_empty()
    );

    graph.object_mut(mesh).unwrap().is_camera = true;
    let events = selection.handle(request, &graph, &source);
    let [SceneEvent::ViewCamera { target, line, column, path }] = events.as_slice() else {
        panic!("expected a view-camera event, got {events:?}");
    };
    assert_eq!(*target, mesh);
    assert_eq!((*line, *column), (1, 2));
    assert_eq!(path, SCENE_PATH);
}
