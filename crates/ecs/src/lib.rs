//! Per-entity capability components.
//!
//! Every capability the presence layer can switch (rendering, collision,
//! physics, light, reflection probe, terrain detail, LOD) is an explicit
//! component that an entity either has or lacks. Components are stored in
//! BTreeMap keyed by EntityId.
//!
//! # Invariants
//! - A missing capability is never an error; toggles skip it.
//! - Iteration order is deterministic (BTreeMap).

mod components;
mod store;

pub use components::{
    Capability, Collider, ColliderShape, Light, LodGroup, MaterialHandle, MeshHandle, Name,
    Perceivable, PresenceToggle, QuestCritical, ReflectionProbe, Renderable, RigidBody,
    TerrainSurface,
};
pub use store::{Component, ComponentStore};

pub fn crate_info() -> &'static str {
    "worldcell-ecs v0.1.0"
}
