//! Core data model for tether scene documents.
//!
//! A document is a list of named `export` blocks, each holding a tree of
//! JSX-like elements. Elements are classified once, at parse/build time,
//! as `Host` (lowercase-initial primitives built into the rendering
//! runtime) or `Custom` (uppercase-initial user components); the variant is
//! carried in metadata rather than re-derived at each use site.

use crate::id::Atom;
use crate::span::Span;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

// ─── Element classification ──────────────────────────────────────────────

/// Host vs. custom element, decided from the tag's leading character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    /// Primitive built into the rendering runtime (`mesh`, `group`, ...).
    Host,
    /// User-defined component (`Player`, `SpinningBox`, ...).
    Custom,
}

/// Tags containing these markers are non-positional data nodes (materials,
/// geometries), not scene elements. Matched by substring, so both
/// `meshStandardMaterial` and `BoxGeometry` are excluded.
pub const EXCLUDED_MARKERS: [&str; 2] = ["Material", "Geometry"];

/// Tags containing this marker flag the document as providing its own
/// lighting.
pub const LIGHT_MARKER: &str = "Light";

// ─── Transform capability & mode ─────────────────────────────────────────

/// Which geometric transforms an element accepts. `Default` is all-false:
/// when capability data is missing, no transform is offered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Transforms {
    pub translate: bool,
    pub rotate: bool,
    pub scale: bool,
}

impl Transforms {
    /// Host elements implicitly support all three transform kinds.
    pub const ALL: Self = Self {
        translate: true,
        rotate: true,
        scale: true,
    };

    pub fn supports(&self, mode: TransformMode) -> bool {
        match mode {
            TransformMode::Translate => self.translate,
            TransformMode::Rotate => self.rotate,
            TransformMode::Scale => self.scale,
        }
    }
}

/// The active transform interaction mode. Process-wide default: translate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransformMode {
    #[default]
    Translate,
    Rotate,
    Scale,
}

impl TransformMode {
    /// The source prop this mode writes back to.
    pub fn prop_name(&self) -> &'static str {
        match self {
            TransformMode::Translate => "position",
            TransformMode::Rotate => "rotation",
            TransformMode::Scale => "scale",
        }
    }
}

// ─── Element metadata (instrumentation output) ───────────────────────────

/// The record the instrumenter attaches to each scene element's wrapper
/// container, and the correlator reads back off the live graph. Immutable
/// once written into the output document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementMetadata {
    pub name: String,
    /// Host vs. custom, decided once at classification time and carried
    /// here rather than re-derived from the name at each use site.
    #[serde(rename = "type")]
    pub kind: ElementKind,
    pub path: String,
    /// Zero-based line of the element's `<` in the source document.
    pub line: u32,
    /// Zero-based column of the element's `<` in the source document.
    pub column: u32,
    /// Serializable prop snapshot. Nested elements and opaque expressions
    /// are dropped, never an error.
    pub props: serde_json::Map<String, serde_json::Value>,
    pub translate: bool,
    pub rotate: bool,
    pub scale: bool,
}

impl ElementMetadata {
    pub fn transforms(&self) -> Transforms {
        Transforms {
            translate: self.translate,
            rotate: self.rotate,
            scale: self.scale,
        }
    }
}

// ─── Document tree ───────────────────────────────────────────────────────

/// A prop value as written in the source.
#[derive(Debug, Clone, PartialEq)]
pub enum PropValue {
    /// `"quoted string"`
    Str(String),
    /// `{42}` or `{-1.5}`
    Number(f64),
    /// `{true}` / `{false}`, or a bare prop with no `=`.
    Bool(bool),
    /// `{[1, 2, 3]}`
    Array(Vec<f64>),
    /// `{<Element ... />}` — a nested declarative element.
    Element(Box<Element>),
    /// Any other balanced `{ ... }` expression, kept as raw text.
    Expr(String),
}

impl PropValue {
    /// JSON representation for the metadata snapshot. `None` means the
    /// value is non-serializable and must be dropped from the snapshot.
    pub fn to_json(&self) -> Option<serde_json::Value> {
        match self {
            PropValue::Str(s) => Some(serde_json::Value::String(s.clone())),
            PropValue::Number(n) => serde_json::Number::from_f64(*n).map(serde_json::Value::Number),
            PropValue::Bool(b) => Some(serde_json::Value::Bool(*b)),
            PropValue::Array(items) => Some(serde_json::Value::Array(
                items
                    .iter()
                    .filter_map(|n| serde_json::Number::from_f64(*n))
                    .map(serde_json::Value::Number)
                    .collect(),
            )),
            PropValue::Element(_) | PropValue::Expr(_) => None,
        }
    }
}

/// A single prop on an element.
#[derive(Debug, Clone, PartialEq)]
pub struct Prop {
    pub name: Atom,
    pub value: PropValue,
    /// Span of the value text (including quotes/braces), for verbatim
    /// mirroring. `None` for bare boolean props.
    pub value_span: Option<Span>,
}

/// A parsed element: `<tag prop=... /> ` or `<tag ...> children </tag>`.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub tag: Atom,
    pub props: SmallVec<[Prop; 4]>,
    pub children: Vec<Element>,
    /// Whole-element span, from `<` through `/>` or the closing tag's `>`.
    pub span: Span,
    pub self_closing: bool,
}

impl Element {
    pub fn tag_str(&self) -> &str {
        self.tag.as_str()
    }

    pub fn kind(&self) -> ElementKind {
        if self.tag.starts_lowercase() {
            ElementKind::Host
        } else {
            ElementKind::Custom
        }
    }

    /// Whether this element is a scene element (renderable object or
    /// light), as opposed to non-positional data like materials.
    pub fn is_scene_element(&self) -> bool {
        let tag = self.tag_str();
        !EXCLUDED_MARKERS.iter().any(|marker| tag.contains(marker))
    }

    /// Whether this element's tag marks it as a light.
    pub fn is_light(&self) -> bool {
        self.tag_str().contains(LIGHT_MARKER)
    }

    pub fn prop(&self, name: &str) -> Option<&Prop> {
        self.props.iter().find(|p| p.name.as_str() == name)
    }
}

/// A named `export Name { ... }` block holding root elements.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportBlock {
    pub name: String,
    pub roots: Vec<Element>,
    pub span: Span,
}

/// An appended `export name = { ...json... }` constant. The instrumenter
/// writes one of these carrying `{ customLighting }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaConstant {
    pub name: String,
    pub value: serde_json::Value,
}

/// A parsed tether document.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Document {
    pub exports: Vec<ExportBlock>,
    pub constants: Vec<MetaConstant>,
}

impl Document {
    pub fn export(&self, name: &str) -> Option<&ExportBlock> {
        self.exports.iter().find(|e| e.name == name)
    }

    /// Visit every element in document order, depth-first.
    pub fn visit<'a>(&'a self, f: &mut impl FnMut(&'a Element)) {
        fn walk<'a>(element: &'a Element, f: &mut impl FnMut(&'a Element)) {
            f(element);
            for child in &element.children {
                walk(child, f);
            }
            for prop in &element.props {
                if let PropValue::Element(inner) = &prop.value {
                    walk(inner, f);
                }
            }
        }
        for export in &self.exports {
            for root in &export.roots {
                walk(root, f);
            }
        }
    }
}
