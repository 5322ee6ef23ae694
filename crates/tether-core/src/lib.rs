pub mod id;
pub mod instrument;
pub mod model;
pub mod parser;
pub mod positions;
pub mod span;

pub use id::Atom;
pub use instrument::{
    Instrumented, InstrumentedSource, METADATA_ATTR, META_EXPORT, NullOracle, PropTypeOracle,
    extract_metadata, instrument, instrument_source,
};
pub use model::*;
pub use parser::parse_document;
pub use positions::{
    PositionNode, build_document_positions, build_positions, flatten_positions, position_at,
    position_exists,
};
pub use span::{LineIndex, Span};
