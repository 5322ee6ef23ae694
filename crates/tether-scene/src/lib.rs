//! Runtime half of tether: the live scene graph, the correlator that maps
//! rendered objects back to source positions, the selection state machine,
//! and the bridge messages exchanged with the host editor.

pub mod bridge;
pub mod correlate;
pub mod mutation;
pub mod object;
pub mod selection;
pub mod source;

pub use bridge::{HostRequest, NavigateTarget, RuntimeEvent};
pub use correlate::{ResolvedSelection, Space, find_carrier, resolve, resolve_at};
pub use mutation::{confirm_prop, encode_props};
pub use object::{Aabb, SceneGraph, SceneObject, Transform};
pub use selection::{CLICK_SLOP, IGNORE_MARKER, SceneEvent, Selection, SourceRef};
pub use source::{DocumentSceneSource, ObjectInfo, SceneSource};
