//! Host bridge message types.
//!
//! Requests flow host → runtime, events runtime → host. Both serialize to
//! `{ "name": "...", "payload": ... }` envelopes with kebab-case names and
//! camelCase payload fields, so either side can evolve independently of the
//! transport carrying them.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tether_core::TransformMode;

/// A scene to open, as attached to a navigation request. An absent or
/// empty `path` means "navigate into whatever is selected".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigateTarget {
    pub path: String,
    pub export_name: String,
    #[serde(default)]
    pub encoded_props: String,
}

/// Commands the host sends the runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", content = "payload")]
pub enum HostRequest {
    #[serde(rename = "request-transform-change")]
    TransformChange { mode: TransformMode },
    #[serde(rename = "request-focus-scene-object")]
    FocusSceneObject { line: u32, column: u32, path: String },
    #[serde(rename = "request-blur-scene-object")]
    BlurSceneObject,
    #[serde(rename = "request-jump-to-scene-object")]
    JumpToSceneObject,
    #[serde(rename = "request-navigate-to-scene")]
    NavigateToScene(Option<NavigateTarget>),
    #[serde(rename = "request-action")]
    Action { action: String },
}

/// Notifications the runtime sends the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", content = "payload")]
pub enum RuntimeEvent {
    #[serde(rename = "on-transform-change")]
    TransformChange { mode: TransformMode },
    #[serde(rename = "on-scene-object-focus", rename_all = "camelCase")]
    SceneObjectFocus {
        column: u32,
        line: u32,
        parent_path: String,
        path: String,
    },
    #[serde(rename = "on-scene-object-blur")]
    SceneObjectBlur,
    #[serde(rename = "on-confirm-scene-object-prop", rename_all = "camelCase")]
    ConfirmSceneObjectProp {
        column: u32,
        line: u32,
        path: String,
        prop_name: String,
        prop_value: Value,
    },
}
