//! Source instrumenter: rewrites scene elements to carry positional and
//! capability metadata into the emitted document.
//!
//! Each scene element is wrapped in a neutral `<group>` container with a
//! single namespaced `data-tether` attribute holding the serialized
//! `ElementMetadata`. The rewrite is an explicit list of byte-position text
//! edits applied back-to-front, so positions of yet-unvisited elements
//! never shift and `(line, column)` stays equal to the original document's.

use crate::model::{Element, ElementKind, ElementMetadata, PropValue, Transforms};
use crate::parser::parse_document;
use crate::span::LineIndex;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// The namespaced attribute carrying `ElementMetadata` on wrapper containers.
pub const METADATA_ATTR: &str = "data-tether";

/// Name of the exported constant appended to instrumented documents.
pub const META_EXPORT: &str = "tetherMeta";

/// Capability oracle: resolves a custom component's declared prop types to
/// transform capability flags. External collaborator; treated as a black
/// box. `None` means the type could not be resolved, in which case all
/// capabilities default to false (no transform offered) rather than
/// failing the document.
pub trait PropTypeOracle {
    fn capabilities(&self, tag: &str) -> Option<Transforms>;
}

/// An oracle with no type information. Every custom element gets all-false
/// capability flags.
pub struct NullOracle;

impl PropTypeOracle for NullOracle {
    fn capabilities(&self, _tag: &str) -> Option<Transforms> {
        None
    }
}

#[derive(Debug, Error)]
pub enum InstrumentError {
    #[error("i/o failure on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse failure in {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Which side of the wrapper container an edit inserts. Ordering matters
/// when two edits share a byte offset: zero-whitespace siblings put one
/// element's close and the next element's open at the same position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Wrap {
    Open,
    Close,
}

/// Result of the pure text transform.
#[derive(Debug, Clone)]
pub struct InstrumentedSource {
    pub text: String,
    pub custom_lighting: bool,
}

/// Result of instrumenting a file on disk.
#[derive(Debug, Clone)]
pub struct Instrumented {
    pub output_path: PathBuf,
    pub custom_lighting: bool,
}

/// Pure transform: instrument every scene element in `text`, returning the
/// rewritten document and whether any light-emitting element was visited.
///
/// `path` is recorded in each metadata record; the runtime correlator
/// validates it against the opened document's path.
pub fn instrument_source(
    text: &str,
    path: &str,
    oracle: &dyn PropTypeOracle,
) -> Result<InstrumentedSource, String> {
    let doc = parse_document(text)?;
    let index = LineIndex::new(text);

    let mut edits: Vec<(usize, Wrap, String)> = Vec::new();
    let mut custom_lighting = false;
    for export in &doc.exports {
        for root in &export.roots {
            collect_edits(root, text, path, oracle, &index, &mut edits, &mut custom_lighting);
        }
    }
    log::debug!(
        "instrumented {} scene elements in {path} (custom_lighting: {custom_lighting})",
        edits.len() / 2
    );

    // Back-to-front application keeps earlier byte positions valid. At a
    // shared offset (zero-whitespace siblings) the open must be applied
    // before the close so the close lands first in the final text, keeping
    // each element inside its own wrapper.
    edits.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
    let mut out = text.to_string();
    for (pos, _, insertion) in edits {
        out.insert_str(pos, &insertion);
    }

    Ok(InstrumentedSource {
        text: out,
        custom_lighting,
    })
}

fn collect_edits(
    element: &Element,
    text: &str,
    path: &str,
    oracle: &dyn PropTypeOracle,
    index: &LineIndex,
    edits: &mut Vec<(usize, Wrap, String)>,
    custom_lighting: &mut bool,
) {
    if !element.is_scene_element() {
        // Excluded data nodes and their subtrees stay untouched; the
        // position tree skips them the same way.
        return;
    }

    if element.is_light() {
        *custom_lighting = true;
    }

    let metadata = element_metadata(element, path, oracle, index);
    let json = serde_json::to_string(&metadata).expect("metadata is always serializable");

    // Mirror a `key` identity prop onto the container verbatim.
    let key = element.prop("key").map(|prop| match prop.value_span {
        Some(span) => format!("key={} ", span.slice(text)),
        None => "key ".to_string(),
    });

    let open = format!(
        "<group {}{METADATA_ATTR}={{{json}}}>",
        key.unwrap_or_default()
    );
    edits.push((element.span.start, Wrap::Open, open));
    edits.push((element.span.end, Wrap::Close, "</group>".to_string()));

    for prop in &element.props {
        if let PropValue::Element(inner) = &prop.value {
            collect_edits(inner, text, path, oracle, index, edits, custom_lighting);
        }
    }
    for child in &element.children {
        collect_edits(child, text, path, oracle, index, edits, custom_lighting);
    }
}

fn element_metadata(
    element: &Element,
    path: &str,
    oracle: &dyn PropTypeOracle,
    index: &LineIndex,
) -> ElementMetadata {
    let (line, column) = index.line_col(element.span.start);

    // Hosts implicitly support all three transform kinds; customs ask the
    // oracle, defaulting to all-false when it cannot resolve the type.
    let transforms = match element.kind() {
        ElementKind::Host => Transforms::ALL,
        ElementKind::Custom => oracle.capabilities(element.tag_str()).unwrap_or_default(),
    };

    let mut props = serde_json::Map::new();
    for prop in &element.props {
        if let Some(value) = prop.value.to_json() {
            props.insert(prop.name.as_str().to_string(), value);
        }
        // Nested elements and opaque expressions are dropped, not errors.
    }

    ElementMetadata {
        name: element.tag_str().to_string(),
        kind: element.kind(),
        path: path.to_string(),
        line: line - 1,
        column: column - 1,
        props,
        translate: transforms.translate,
        rotate: transforms.rotate,
        scale: transforms.scale,
    }
}

/// Read the metadata record off a wrapper container element, if present.
/// Used by tests and by embedders that replay instrumented documents.
pub fn extract_metadata(element: &Element) -> Option<ElementMetadata> {
    let prop = element.prop(METADATA_ATTR)?;
    let raw = match &prop.value {
        PropValue::Expr(raw) => raw,
        _ => return None,
    };
    serde_json::from_str(raw).ok()
}

/// Instrument a document file: duplicate it byte-for-byte to a scratch
/// location, transform, move the result to its final output path under
/// `out_dir`, and append the exported `tetherMeta` constant.
pub fn instrument(
    source_path: &Path,
    out_dir: &Path,
    oracle: &dyn PropTypeOracle,
) -> Result<Instrumented, InstrumentError> {
    let io_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source| InstrumentError::Io { path, source }
    };

    let text = fs::read_to_string(source_path).map_err(io_err(source_path))?;

    fs::create_dir_all(out_dir).map_err(io_err(out_dir))?;
    let scratch = out_dir.join("temp.tether");
    fs::write(&scratch, &text).map_err(io_err(&scratch))?;

    // Transform the scratch copy; its positions are byte-identical to the
    // original, so metadata records correlate with the original document.
    let scratch_text = fs::read_to_string(&scratch).map_err(io_err(&scratch))?;
    let path_str = source_path.to_string_lossy();
    let result =
        instrument_source(&scratch_text, &path_str, oracle).map_err(|message| {
            InstrumentError::Parse {
                path: source_path.to_path_buf(),
                message,
            }
        })?;

    let destination = out_dir.join(
        source_path
            .strip_prefix("/")
            .unwrap_or(source_path),
    );
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent).map_err(io_err(parent))?;
    }

    let mut out = result.text;
    if !out.ends_with('\n') {
        out.push('\n');
    }
    let meta = serde_json::json!({ "customLighting": result.custom_lighting });
    out.push_str(&format!("export {META_EXPORT} = {meta}\n"));

    fs::write(&destination, out).map_err(io_err(&destination))?;
    fs::remove_file(&scratch).map_err(io_err(&scratch))?;

    Ok(Instrumented {
        output_path: destination,
        custom_lighting: result.custom_lighting,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TransformMode;
    use crate::positions::{build_document_positions, flatten_positions};
    use pretty_assertions::assert_eq;

    struct FixedOracle(Transforms);

    impl PropTypeOracle for FixedOracle {
        fn capabilities(&self, _tag: &str) -> Option<Transforms> {
            Some(self.0)
        }
    }

    /// Collect every metadata record in an instrumented document.
    fn metadata_records(text: &str) -> Vec<ElementMetadata> {
        let doc = parse_document(text).unwrap();
        let mut records = Vec::new();
        doc.visit(&mut |element| {
            if let Some(meta) = extract_metadata(element) {
                records.push(meta);
            }
        });
        records
    }

    #[test]
    fn positions_survive_instrumentation() {
        let text = r#"export Scene {
  <Box position={[0, 0, 0]} />
  <group>
    <mesh />
    <pointLight intensity={0.5} />
  </group>
}
"#;
        let original = parse_document(text).unwrap();
        let index = LineIndex::new(text);
        let positions = build_document_positions(&original, &index);
        let flat = flatten_positions(&positions);

        let result = instrument_source(text, "/scenes/a.tether", &NullOracle).unwrap();
        let records = metadata_records(&result.text);

        assert_eq!(records.len(), flat.len());
        for node in flat {
            let matching: Vec<_> = records
                .iter()
                .filter(|m| m.line == node.line && m.column == node.column)
                .collect();
            assert_eq!(
                matching.len(),
                1,
                "expected exactly one record for {} at ({}, {})",
                node.name,
                node.line,
                node.column
            );
            assert_eq!(matching[0].name, node.name);
            assert_eq!(matching[0].path, "/scenes/a.tether");
        }
    }

    #[test]
    fn output_reparses_with_original_semantics_wrapped() {
        let text = "export Scene {\n  <Box />\n}\n";
        let result = instrument_source(text, "/scenes/a.tether", &NullOracle).unwrap();
        let doc = parse_document(&result.text).unwrap();
        let wrapper = &doc.exports[0].roots[0];
        assert_eq!(wrapper.tag_str(), "group");
        assert_eq!(wrapper.children.len(), 1);
        assert_eq!(wrapper.children[0].tag_str(), "Box");
    }

    #[test]
    fn missing_oracle_data_defaults_capabilities_to_false() {
        let text = "export Scene {\n  <Spinner />\n}\n";
        let result = instrument_source(text, "/a.tether", &NullOracle).unwrap();
        let records = metadata_records(&result.text);
        assert_eq!(records.len(), 1);
        assert!(!records[0].translate && !records[0].rotate && !records[0].scale);
        assert!(!records[0].transforms().supports(TransformMode::Translate));
    }

    #[test]
    fn hosts_support_all_transforms() {
        let text = "export Scene {\n  <mesh />\n}\n";
        let result = instrument_source(text, "/a.tether", &NullOracle).unwrap();
        let records = metadata_records(&result.text);
        assert_eq!(records[0].transforms(), Transforms::ALL);
    }

    #[test]
    fn oracle_capabilities_are_recorded() {
        let text = "export Scene {\n  <Spinner />\n}\n";
        let oracle = FixedOracle(Transforms {
            translate: true,
            rotate: true,
            scale: false,
        });
        let result = instrument_source(text, "/a.tether", &oracle).unwrap();
        let records = metadata_records(&result.text);
        assert!(records[0].translate && records[0].rotate && !records[0].scale);
    }

    #[test]
    fn light_tags_set_custom_lighting() {
        let no_light = instrument_source("export S {\n  <Box />\n}\n", "/a", &NullOracle).unwrap();
        assert!(!no_light.custom_lighting);

        let host_light =
            instrument_source("export S {\n  <pointLight />\n}\n", "/a", &NullOracle).unwrap();
        assert!(host_light.custom_lighting);

        let custom_light =
            instrument_source("export S {\n  <RimLight />\n}\n", "/a", &NullOracle).unwrap();
        assert!(custom_light.custom_lighting);
    }

    #[test]
    fn excluded_elements_are_untouched() {
        let text = r#"export Scene {
  <mesh>
    <boxGeometry />
    <meshStandardMaterial color="red" />
  </mesh>
}
"#;
        let result = instrument_source(text, "/a.tether", &NullOracle).unwrap();
        let records = metadata_records(&result.text);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "mesh");
        assert!(result.text.contains("<boxGeometry />"));
        assert!(result.text.contains("<meshStandardMaterial color=\"red\" />"));
    }

    #[test]
    fn key_prop_is_mirrored_onto_the_container() {
        let text = "export Scene {\n  <Box key=\"b1\" />\n}\n";
        let result = instrument_source(text, "/a.tether", &NullOracle).unwrap();
        let doc = parse_document(&result.text).unwrap();
        let wrapper = &doc.exports[0].roots[0];
        assert_eq!(wrapper.tag_str(), "group");
        assert_eq!(
            wrapper.prop("key").unwrap().value,
            PropValue::Str("b1".into())
        );
        // The inner element keeps its key as well.
        assert!(wrapper.children[0].prop("key").is_some());
    }

    #[test]
    fn non_serializable_props_are_dropped_from_snapshot() {
        let text =
            "export Scene {\n  <Box position={[1, 2, 3]} onClick={handle} child={<mesh />} />\n}\n";
        let result = instrument_source(text, "/a.tether", &NullOracle).unwrap();
        let records = metadata_records(&result.text);
        let box_record = records.iter().find(|m| m.name == "Box").unwrap();
        assert!(box_record.props.contains_key("position"));
        assert!(!box_record.props.contains_key("onClick"));
        assert!(!box_record.props.contains_key("child"));
    }

    #[test]
    fn zero_whitespace_siblings_wrap_independently() {
        let text = "export Scene {\n  <mesh /><Box />\n}\n";
        let result = instrument_source(text, "/a.tether", &NullOracle).unwrap();
        let doc = parse_document(&result.text).unwrap();
        let roots = &doc.exports[0].roots;
        assert_eq!(roots.len(), 2);
        for (root, tag) in roots.iter().zip(["mesh", "Box"]) {
            assert_eq!(root.tag_str(), "group");
            assert_eq!(root.children.len(), 1);
            assert_eq!(root.children[0].tag_str(), tag);
        }
    }

    #[test]
    fn nested_scene_elements_each_get_wrapped() {
        let text = "export Scene {\n  <Player>\n    <mesh />\n  </Player>\n}\n";
        let result = instrument_source(text, "/a.tether", &NullOracle).unwrap();
        let records = metadata_records(&result.text);
        let names: Vec<&str> = records.iter().map(|m| m.name.as_str()).collect();
        assert!(names.contains(&"Player"));
        assert!(names.contains(&"mesh"));
    }
}
