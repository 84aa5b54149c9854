use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use worldcell_common::{EntityId, PerceptionMask};

use crate::components::{
    Capability, Collider, Light, LodGroup, Name, Perceivable, PresenceToggle, QuestCritical,
    ReflectionProbe, Renderable, RigidBody, TerrainSurface,
};

/// A component type with a dedicated storage in [`ComponentStore`].
pub trait Component: Sized + 'static {
    fn storage(store: &ComponentStore) -> &BTreeMap<EntityId, Self>;

    fn storage_mut(store: &mut ComponentStore) -> &mut BTreeMap<EntityId, Self>;
}

macro_rules! impl_component {
    ($($ty:ty => $field:ident),* $(,)?) => {
        $(
            impl Component for $ty {
                fn storage(store: &ComponentStore) -> &BTreeMap<EntityId, Self> {
                    &store.$field
                }

                fn storage_mut(store: &mut ComponentStore) -> &mut BTreeMap<EntityId, Self> {
                    &mut store.$field
                }
            }
        )*
    };
}

/// Deterministic component storage for all component types.
///
/// Uses BTreeMap for canonical iteration order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComponentStore {
    names: BTreeMap<EntityId, Name>,
    renderables: BTreeMap<EntityId, Renderable>,
    colliders: BTreeMap<EntityId, Collider>,
    rigid_bodies: BTreeMap<EntityId, RigidBody>,
    lights: BTreeMap<EntityId, Light>,
    reflection_probes: BTreeMap<EntityId, ReflectionProbe>,
    terrains: BTreeMap<EntityId, TerrainSurface>,
    lod_groups: BTreeMap<EntityId, LodGroup>,
    quest_critical: BTreeMap<EntityId, QuestCritical>,
    perceivables: BTreeMap<EntityId, Perceivable>,
}

impl_component! {
    Name => names,
    Renderable => renderables,
    Collider => colliders,
    RigidBody => rigid_bodies,
    Light => lights,
    ReflectionProbe => reflection_probes,
    TerrainSurface => terrains,
    LodGroup => lod_groups,
    QuestCritical => quest_critical,
    Perceivable => perceivables,
}

impl ComponentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a component, returning the one it replaced.
    pub fn insert<C: Component>(&mut self, entity: EntityId, component: C) -> Option<C> {
        C::storage_mut(self).insert(entity, component)
    }

    pub fn remove<C: Component>(&mut self, entity: EntityId) -> Option<C> {
        C::storage_mut(self).remove(&entity)
    }

    pub fn get<C: Component>(&self, entity: EntityId) -> Option<&C> {
        C::storage(self).get(&entity)
    }

    pub fn get_mut<C: Component>(&mut self, entity: EntityId) -> Option<&mut C> {
        C::storage_mut(self).get_mut(&entity)
    }

    pub fn has<C: Component>(&self, entity: EntityId) -> bool {
        C::storage(self).contains_key(&entity)
    }

    /// All components of one type, in id order.
    pub fn iter<C: Component>(&self) -> impl Iterator<Item = (EntityId, &C)> {
        C::storage(self).iter().map(|(id, c)| (*id, c))
    }

    pub fn is_quest_critical(&self, entity: EntityId) -> bool {
        self.has::<QuestCritical>(entity)
    }

    /// Perception category of an entity; `NONE` when it is not perceivable.
    pub fn perception_mask(&self, entity: EntityId) -> PerceptionMask {
        self.get::<Perceivable>(entity)
            .map(|p| p.mask)
            .unwrap_or(PerceptionMask::NONE)
    }

    /// Switch every capability the entity has on or off.
    ///
    /// Capabilities the entity lacks are skipped. Returns the number of
    /// subsystems touched.
    pub fn apply_presence(&mut self, entity: EntityId, present: bool) -> usize {
        let touched = [
            self.toggle::<Renderable>(entity, present),
            self.toggle::<Collider>(entity, present),
            self.toggle::<RigidBody>(entity, present),
            self.toggle::<Light>(entity, present),
            self.toggle::<ReflectionProbe>(entity, present),
            self.toggle::<TerrainSurface>(entity, present),
            self.toggle::<LodGroup>(entity, present),
        ]
        .into_iter()
        .filter(|t| *t)
        .count();
        tracing::trace!(entity = %entity.short(), present, touched, "presence applied");
        touched
    }

    /// Capabilities an entity exposes, in `Capability` order.
    pub fn capabilities(&self, entity: EntityId) -> Vec<Capability> {
        let mut caps = Vec::new();
        self.collect_capability::<Renderable>(entity, &mut caps);
        self.collect_capability::<Collider>(entity, &mut caps);
        self.collect_capability::<RigidBody>(entity, &mut caps);
        self.collect_capability::<Light>(entity, &mut caps);
        self.collect_capability::<ReflectionProbe>(entity, &mut caps);
        self.collect_capability::<TerrainSurface>(entity, &mut caps);
        self.collect_capability::<LodGroup>(entity, &mut caps);
        caps
    }

    /// Remove all components for an entity.
    pub fn remove_entity(&mut self, entity: EntityId) {
        self.remove::<Name>(entity);
        self.remove::<Renderable>(entity);
        self.remove::<Collider>(entity);
        self.remove::<RigidBody>(entity);
        self.remove::<Light>(entity);
        self.remove::<ReflectionProbe>(entity);
        self.remove::<TerrainSurface>(entity);
        self.remove::<LodGroup>(entity);
        self.remove::<QuestCritical>(entity);
        self.remove::<Perceivable>(entity);
    }

    fn toggle<C: Component + PresenceToggle>(&mut self, entity: EntityId, present: bool) -> bool {
        match C::storage_mut(self).get_mut(&entity) {
            Some(component) => {
                component.set_present(present);
                true
            }
            None => false,
        }
    }

    fn collect_capability<C: Component + PresenceToggle>(
        &self,
        entity: EntityId,
        out: &mut Vec<Capability>,
    ) {
        if self.has::<C>(entity) {
            out.push(C::CAPABILITY);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{MaterialHandle, MeshHandle};

    fn renderable() -> Renderable {
        Renderable::new(MeshHandle(1), MaterialHandle(2))
    }

    #[test]
    fn insert_get_remove() {
        let mut store = ComponentStore::new();
        let id = EntityId::new();
        assert!(store.insert(id, Name("Tower".into())).is_none());
        assert_eq!(store.get::<Name>(id).unwrap().0, "Tower");

        let replaced = store.insert(id, Name("Keep".into()));
        assert_eq!(replaced, Some(Name("Tower".into())));

        store.remove::<Name>(id);
        assert!(store.get::<Name>(id).is_none());
    }

    #[test]
    fn apply_presence_touches_only_present_capabilities() {
        let mut store = ComponentStore::new();
        let id = EntityId::new();
        store.insert(id, renderable());
        store.insert(id, Light::default());

        let touched = store.apply_presence(id, false);
        assert_eq!(touched, 2);
        assert!(!store.get::<Renderable>(id).unwrap().visible);
        assert!(!store.get::<Light>(id).unwrap().enabled);
        assert!(store.get::<Collider>(id).is_none());
    }

    #[test]
    fn apply_presence_on_bare_entity_is_noop() {
        let mut store = ComponentStore::new();
        assert_eq!(store.apply_presence(EntityId::new(), false), 0);
    }

    #[test]
    fn apply_presence_covers_every_capability() {
        let mut store = ComponentStore::new();
        let id = EntityId::new();
        store.insert(id, renderable());
        store.insert(id, Collider::default());
        store.insert(id, RigidBody::default());
        store.insert(id, Light::default());
        store.insert(id, ReflectionProbe::default());
        store.insert(id, TerrainSurface::new(50.0));
        store.insert(id, LodGroup::new(3));

        assert_eq!(store.capabilities(id).len(), 7);
        assert_eq!(store.apply_presence(id, false), 7);
        assert!(store.get::<RigidBody>(id).unwrap().is_kinematic);
        assert_eq!(store.get::<LodGroup>(id).unwrap().forced_level, Some(2));

        assert_eq!(store.apply_presence(id, true), 7);
        assert!(store.get::<Collider>(id).unwrap().enabled);
        assert_eq!(store.get::<TerrainSurface>(id).unwrap().detail_distance, 50.0);
    }

    #[test]
    fn quest_critical_and_perception_tags() {
        let mut store = ComponentStore::new();
        let id = EntityId::new();
        assert!(!store.is_quest_critical(id));
        assert_eq!(store.perception_mask(id), PerceptionMask::NONE);

        store.insert(id, QuestCritical);
        store.insert(id, Perceivable::new(PerceptionMask::ENEMY));
        assert!(store.is_quest_critical(id));
        assert_eq!(store.perception_mask(id), PerceptionMask::ENEMY);
        // Tags are not switchable capabilities.
        assert!(store.capabilities(id).is_empty());
    }

    #[test]
    fn remove_entity_clears_all() {
        let mut store = ComponentStore::new();
        let id = EntityId::new();
        store.insert(id, Name("Test".into()));
        store.insert(id, renderable());
        store.insert(id, RigidBody::default());
        store.insert(id, Collider::default());
        store.insert(id, QuestCritical);

        store.remove_entity(id);
        assert!(store.get::<Name>(id).is_none());
        assert!(store.get::<Renderable>(id).is_none());
        assert!(store.get::<RigidBody>(id).is_none());
        assert!(store.get::<Collider>(id).is_none());
        assert!(!store.is_quest_critical(id));
    }

    #[test]
    fn deterministic_iteration_order() {
        let mut store = ComponentStore::new();
        let mut ids: Vec<EntityId> = (0..50).map(|_| EntityId::new()).collect();
        for id in &ids {
            store.insert(*id, Name(format!("entity_{}", id.0)));
        }
        ids.sort();
        let stored: Vec<EntityId> = store.iter::<Name>().map(|(id, _)| id).collect();
        assert_eq!(stored, ids);
    }
}
