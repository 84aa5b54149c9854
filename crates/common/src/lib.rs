//! Shared types for the worldcell presence and perception layer.
//!
//! # Invariants
//! - Types here are plain values: no behaviour that depends on a grid,
//!   a world, or a bus lives in this crate.

mod cell;
mod perception;
mod types;

pub use cell::{CellId, CellIndex};
pub use perception::{PerceptionMask, VisionCache, WeightingContext};
pub use types::{EntityId, Transform};

pub fn crate_info() -> &'static str {
    "worldcell-common v0.1.0"
}
