//! World Kernel: authoritative entity state keyed by identity and scene.
//!
//! # Invariants
//! - Every entity belongs to exactly one scene.
//! - Iteration order is deterministic (BTreeMap by `EntityId`).

pub mod world;

pub use world::{EntityData, World};

pub fn crate_info() -> &'static str {
    "worldcell-kernel v0.1.0"
}
