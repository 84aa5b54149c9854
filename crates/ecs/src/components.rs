use serde::{Deserialize, Serialize};
use worldcell_common::PerceptionMask;

/// A handle referencing a mesh asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MeshHandle(pub u64);

/// A handle referencing a material asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MaterialHandle(pub u64);

/// Human-readable name component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Name(pub String);

/// Subsystems the presence layer knows how to switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Capability {
    Rendering,
    Collision,
    Physics,
    Light,
    ReflectionProbe,
    TerrainDetail,
    Lod,
}

/// A component whose subsystem can be switched on or off by presence.
pub trait PresenceToggle {
    const CAPABILITY: Capability;

    fn set_present(&mut self, present: bool);

    fn is_present(&self) -> bool;
}

/// Renderable component: references mesh and material assets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Renderable {
    pub mesh: MeshHandle,
    pub material: MaterialHandle,
    pub visible: bool,
}

impl Renderable {
    pub fn new(mesh: MeshHandle, material: MaterialHandle) -> Self {
        Self {
            mesh,
            material,
            visible: true,
        }
    }
}

impl PresenceToggle for Renderable {
    const CAPABILITY: Capability = Capability::Rendering;

    fn set_present(&mut self, present: bool) {
        self.visible = present;
    }

    fn is_present(&self) -> bool {
        self.visible
    }
}

/// Collision shape.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ColliderShape {
    Box { half_extents: [f32; 3] },
    Sphere { radius: f32 },
}

impl Default for ColliderShape {
    fn default() -> Self {
        Self::Box {
            half_extents: [0.5, 0.5, 0.5],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Collider {
    pub shape: ColliderShape,
    pub enabled: bool,
}

impl Default for Collider {
    fn default() -> Self {
        Self {
            shape: ColliderShape::default(),
            enabled: true,
        }
    }
}

impl PresenceToggle for Collider {
    const CAPABILITY: Capability = Capability::Collision;

    fn set_present(&mut self, present: bool) {
        self.enabled = present;
    }

    fn is_present(&self) -> bool {
        self.enabled
    }
}

/// Rigid body handed to the external physics step.
///
/// An absent entity's body is made kinematic so the solver stops
/// integrating it; a present one is dynamic again.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RigidBody {
    pub mass: f32,
    pub is_kinematic: bool,
}

impl Default for RigidBody {
    fn default() -> Self {
        Self {
            mass: 1.0,
            is_kinematic: false,
        }
    }
}

impl PresenceToggle for RigidBody {
    const CAPABILITY: Capability = Capability::Physics;

    fn set_present(&mut self, present: bool) {
        self.is_kinematic = !present;
    }

    fn is_present(&self) -> bool {
        !self.is_kinematic
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Light {
    pub intensity: f32,
    pub range: f32,
    pub enabled: bool,
}

impl Default for Light {
    fn default() -> Self {
        Self {
            intensity: 1.0,
            range: 10.0,
            enabled: true,
        }
    }
}

impl PresenceToggle for Light {
    const CAPABILITY: Capability = Capability::Light;

    fn set_present(&mut self, present: bool) {
        self.enabled = present;
    }

    fn is_present(&self) -> bool {
        self.enabled
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReflectionProbe {
    pub enabled: bool,
}

impl Default for ReflectionProbe {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl PresenceToggle for ReflectionProbe {
    const CAPABILITY: Capability = Capability::ReflectionProbe;

    fn set_present(&mut self, present: bool) {
        self.enabled = present;
    }

    fn is_present(&self) -> bool {
        self.enabled
    }
}

/// Terrain detail rendering. Absent terrain draws no detail objects.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TerrainSurface {
    pub authored_detail_distance: f32,
    pub detail_distance: f32,
}

impl TerrainSurface {
    pub fn new(detail_distance: f32) -> Self {
        Self {
            authored_detail_distance: detail_distance,
            detail_distance,
        }
    }
}

impl PresenceToggle for TerrainSurface {
    const CAPABILITY: Capability = Capability::TerrainDetail;

    fn set_present(&mut self, present: bool) {
        self.detail_distance = if present {
            self.authored_detail_distance
        } else {
            0.0
        };
    }

    fn is_present(&self) -> bool {
        self.detail_distance > 0.0
    }
}

/// Level-of-detail group. `forced_level == None` lets the renderer choose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LodGroup {
    pub level_count: u8,
    pub forced_level: Option<u8>,
}

impl LodGroup {
    pub fn new(level_count: u8) -> Self {
        Self {
            level_count: level_count.max(1),
            forced_level: None,
        }
    }

    pub fn lowest_level(&self) -> u8 {
        self.level_count.saturating_sub(1)
    }
}

impl PresenceToggle for LodGroup {
    const CAPABILITY: Capability = Capability::Lod;

    fn set_present(&mut self, present: bool) {
        self.forced_level = if present {
            None
        } else {
            Some(self.lowest_level())
        };
    }

    fn is_present(&self) -> bool {
        self.forced_level.is_none()
    }
}

/// Tag: the entity is quest-critical and must stay present everywhere.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestCritical;

/// Marks an entity as detectable by batch perception under `mask`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Perceivable {
    pub mask: PerceptionMask,
}

impl Perceivable {
    pub fn new(mask: PerceptionMask) -> Self {
        Self { mask }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rigid_body_goes_kinematic_when_absent() {
        let mut body = RigidBody::default();
        body.set_present(false);
        assert!(body.is_kinematic);
        body.set_present(true);
        assert!(!body.is_kinematic);
    }

    #[test]
    fn terrain_restores_authored_distance() {
        let mut terrain = TerrainSurface::new(80.0);
        terrain.set_present(false);
        assert_eq!(terrain.detail_distance, 0.0);
        assert!(!terrain.is_present());
        terrain.set_present(true);
        assert_eq!(terrain.detail_distance, 80.0);
    }

    #[test]
    fn lod_forces_lowest_level_when_absent() {
        let mut lod = LodGroup::new(4);
        lod.set_present(false);
        assert_eq!(lod.forced_level, Some(3));
        lod.set_present(true);
        assert_eq!(lod.forced_level, None);
    }

    #[test]
    fn lod_with_zero_levels_is_clamped() {
        let lod = LodGroup::new(0);
        assert_eq!(lod.level_count, 1);
        assert_eq!(lod.lowest_level(), 0);
    }

    #[test]
    fn simple_toggles_flip_enabled() {
        let mut light = Light::default();
        let mut probe = ReflectionProbe::default();
        let mut collider = Collider::default();
        let mut renderable = Renderable::new(MeshHandle(1), MaterialHandle(2));

        light.set_present(false);
        probe.set_present(false);
        collider.set_present(false);
        renderable.set_present(false);

        assert!(!light.enabled);
        assert!(!probe.enabled);
        assert!(!collider.enabled);
        assert!(!renderable.visible);
    }
}
