use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use worldcell_common::{EntityId, Transform};

/// Per-entity data stored in the world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityData {
    pub transform: Transform,
    pub scene: String,
}

/// The authoritative world state.
///
/// Owns entity identity, transform and scene membership. Presence and
/// perception layers read from it and never hold entities themselves.
///
/// Uses BTreeMap for deterministic iteration order across all platforms.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct World {
    entities: BTreeMap<EntityId, EntityData>,
}

impl World {
    /// Create an empty world.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entities in the world, across all scenes.
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Entities belonging to `scene`, in id order.
    pub fn entities_in_scene<'a>(
        &'a self,
        scene: &'a str,
    ) -> impl Iterator<Item = (EntityId, &'a EntityData)> + 'a {
        self.entities
            .iter()
            .filter(move |(_, data)| data.scene == scene)
            .map(|(id, data)| (*id, data))
    }

    /// Spawn a new entity into `scene`. Returns its id.
    pub fn spawn(&mut self, scene: impl Into<String>, transform: Transform) -> EntityId {
        let id = EntityId::new();
        let scene = scene.into();
        tracing::trace!(entity = %id.short(), %scene, "spawn");
        self.entities.insert(id, EntityData { transform, scene });
        id
    }

    /// Remove an entity. Returns the data if it existed.
    pub fn despawn(&mut self, id: EntityId) -> Option<EntityData> {
        self.entities.remove(&id)
    }

    /// Get a reference to entity data.
    pub fn get(&self, id: EntityId) -> Option<&EntityData> {
        self.entities.get(&id)
    }

    /// World-space position of an entity.
    pub fn position(&self, id: EntityId) -> Option<glam::Vec3> {
        self.entities.get(&id).map(|d| d.transform.position)
    }

    /// Move an entity, keeping rotation and scale.
    pub fn set_position(&mut self, id: EntityId, position: glam::Vec3) -> bool {
        match self.entities.get_mut(&id) {
            Some(data) => {
                data.transform.position = position;
                true
            }
            None => false,
        }
    }

    /// Reassign an entity to another scene.
    pub fn move_to_scene(&mut self, id: EntityId, scene: impl Into<String>) -> bool {
        match self.entities.get_mut(&id) {
            Some(data) => {
                data.scene = scene.into();
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn world_starts_empty() {
        let w = World::new();
        assert_eq!(w.entity_count(), 0);
        assert_eq!(w.entities_in_scene("overworld").count(), 0);
    }

    #[test]
    fn spawn_and_despawn() {
        let mut w = World::new();
        let id = w.spawn("overworld", Transform::default());
        assert_eq!(w.entity_count(), 1);
        assert_eq!(w.get(id).unwrap().scene, "overworld");

        let data = w.despawn(id);
        assert!(data.is_some());
        assert_eq!(w.entity_count(), 0);
        assert!(w.despawn(id).is_none());
    }

    #[test]
    fn entities_in_scene_filters_membership() {
        let mut w = World::new();
        let a = w.spawn("overworld", Transform::default());
        let b = w.spawn("dungeon", Transform::default());
        let c = w.spawn("overworld", Transform::default());

        let overworld: Vec<EntityId> = w.entities_in_scene("overworld").map(|(id, _)| id).collect();
        assert_eq!(overworld.len(), 2);
        assert!(overworld.contains(&a));
        assert!(overworld.contains(&c));
        assert!(!overworld.contains(&b));

        assert_eq!(w.entities_in_scene("dungeon").count(), 1);
        assert_eq!(w.entities_in_scene("void").count(), 0);
    }

    #[test]
    fn set_position_keeps_rotation_and_scale() {
        let mut w = World::new();
        let t = Transform {
            scale: Vec3::splat(2.0),
            ..Transform::default()
        };
        let id = w.spawn("overworld", t);
        assert!(w.set_position(id, Vec3::new(5.0, 0.0, 5.0)));
        let data = w.get(id).unwrap();
        assert_eq!(data.transform.position, Vec3::new(5.0, 0.0, 5.0));
        assert_eq!(data.transform.scale, Vec3::splat(2.0));
    }

    #[test]
    fn mutations_on_unknown_entity_return_false() {
        let mut w = World::new();
        let ghost = EntityId::new();
        assert!(!w.set_position(ghost, Vec3::ONE));
        assert!(!w.move_to_scene(ghost, "dungeon"));
        assert!(w.position(ghost).is_none());
    }

    #[test]
    fn move_to_scene_changes_membership() {
        let mut w = World::new();
        let id = w.spawn("overworld", Transform::default());
        assert!(w.move_to_scene(id, "dungeon"));
        assert_eq!(w.entities_in_scene("overworld").count(), 0);
        assert_eq!(w.entities_in_scene("dungeon").count(), 1);
    }

    #[test]
    fn btreemap_gives_deterministic_iteration() {
        let mut w = World::new();
        for _ in 0..100 {
            w.spawn("overworld", Transform::default());
        }
        let keys: Vec<EntityId> = w.entities_in_scene("overworld").map(|(id, _)| id).collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
    }
}
