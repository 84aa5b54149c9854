//! Streaming: uniform cell grid, cell-transition tracking, presence sweeps.
//!
//! # Invariants
//! - A cell index is always in `[0, width·height)`; positions outside the
//!   grid saturate to the border cell.
//! - Exactly one cell-changed event per boundary crossing.
//! - A presence sweep recomputes every entity from scratch; it never depends
//!   on the previous sweep.
//!
//! The full sweep is O(entities in scene) and runs once per cell transition,
//! not once per frame.

mod flags;
mod grid;
mod registry;
mod tracker;
mod visibility;

pub use flags::{CellFlag, CellFlags};
pub use grid::{CellCoord, Grid, GridError};
pub use registry::{EntityRegistry, ExemptionPolicy, SceneRegistry};
pub use tracker::CellTracker;
pub use visibility::{SweepReport, WorldVisibilityManager};

pub fn crate_info() -> &'static str {
    "worldcell-stream v0.1.0"
}
