use glam::Vec3;
use worldcell_common::{EntityId, Transform};
use worldcell_ecs::ComponentStore;
use worldcell_kernel::World;

/// The entity registry the presence layer reads from and toggles.
pub trait EntityRegistry {
    /// Every entity registered in `scene`, in a stable order.
    fn entities_in_scene(&self, scene: &str) -> Vec<EntityId>;

    fn position(&self, entity: EntityId) -> Option<Vec3>;

    /// Switch every subsystem the entity exposes. Missing subsystems are
    /// skipped. Returns how many were switched.
    fn apply_presence(&mut self, entity: EntityId, present: bool) -> usize;

    /// Registry-level exemption (e.g. a quest-critical tag).
    fn is_exempt(&self, _entity: EntityId) -> bool {
        false
    }
}

/// Decides whether an entity stays present regardless of cell adjacency.
pub trait ExemptionPolicy {
    fn is_exempt(&self, entity: EntityId) -> bool;
}

impl<F> ExemptionPolicy for F
where
    F: Fn(EntityId) -> bool,
{
    fn is_exempt(&self, entity: EntityId) -> bool {
        self(entity)
    }
}

/// Entity registry backed by the kernel world and the component store.
#[derive(Debug, Clone, Default)]
pub struct SceneRegistry {
    pub world: World,
    pub components: ComponentStore,
}

impl SceneRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn an entity with no components at `position`.
    pub fn spawn(&mut self, scene: impl Into<String>, position: Vec3) -> EntityId {
        self.world.spawn(scene, Transform::at(position))
    }

    /// Remove an entity and all of its components.
    pub fn despawn(&mut self, entity: EntityId) -> bool {
        self.components.remove_entity(entity);
        self.world.despawn(entity).is_some()
    }
}

impl EntityRegistry for SceneRegistry {
    fn entities_in_scene(&self, scene: &str) -> Vec<EntityId> {
        self.world.entities_in_scene(scene).map(|(id, _)| id).collect()
    }

    fn position(&self, entity: EntityId) -> Option<Vec3> {
        self.world.position(entity)
    }

    fn apply_presence(&mut self, entity: EntityId, present: bool) -> usize {
        self.components.apply_presence(entity, present)
    }

    fn is_exempt(&self, entity: EntityId) -> bool {
        self.components.is_quest_critical(entity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use worldcell_ecs::{Light, QuestCritical};

    #[test]
    fn scene_registry_reads_world_and_components() {
        let mut registry = SceneRegistry::new();
        let a = registry.spawn("overworld", Vec3::new(1.0, 0.0, 2.0));
        let b = registry.spawn("dungeon", Vec3::ZERO);
        registry.components.insert(a, Light::default());
        registry.components.insert(b, QuestCritical);

        assert_eq!(registry.entities_in_scene("overworld"), vec![a]);
        assert_eq!(registry.position(a), Some(Vec3::new(1.0, 0.0, 2.0)));
        assert_eq!(registry.apply_presence(a, false), 1);
        assert!(!registry.components.get::<Light>(a).unwrap().enabled);
        assert!(EntityRegistry::is_exempt(&registry, b));
        assert!(!EntityRegistry::is_exempt(&registry, a));
    }

    #[test]
    fn despawn_removes_components() {
        let mut registry = SceneRegistry::new();
        let id = registry.spawn("overworld", Vec3::ZERO);
        registry.components.insert(id, QuestCritical);
        assert!(registry.despawn(id));
        assert!(!registry.components.is_quest_critical(id));
        assert!(!registry.despawn(id));
    }

    #[test]
    fn closures_are_exemption_policies() {
        let vip = EntityId::new();
        let policy = move |id: EntityId| id == vip;
        assert!(policy.is_exempt(vip));
        assert!(!policy.is_exempt(EntityId::new()));
    }
}
