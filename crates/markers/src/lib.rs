//! Markers: named, positioned, visibility-toggleable map records.
//!
//! # Invariants
//! - Marker ids are unique within a registry; registering an existing id
//!   replaces the previous marker.
//! - Iteration order is by marker id.
//! - `decode(encode(p, key), key) == quantize(p)` for every position;
//!   encoded coordinates are integers and never pass through `f32`.

mod encoding;
mod marker;
mod registry;

pub use encoding::{combine_cell_id, decode, encode, quantize};
pub use marker::{Bounds, Marker, MarkerId};
pub use registry::MarkerRegistry;

pub fn crate_info() -> &'static str {
    "worldcell-markers v0.1.0"
}
