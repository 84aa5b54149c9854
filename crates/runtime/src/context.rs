use glam::Vec3;
use std::cell::{Ref, RefCell, RefMut};
use std::rc::Rc;
use std::time::Duration;
use worldcell_common::{CellIndex, EntityId};
use worldcell_events::{Event, EventBus, EventKind, Subscription};
use worldcell_markers::{Marker, MarkerRegistry};
use worldcell_perception::{
    PerceptionSubscriber, ReputationSource, ScanContext, ScanStats, SpatialIndex, SubscriberId,
    VisionBatchScanner,
};
use worldcell_stream::{
    CellTracker, ExemptionPolicy, Grid, SceneRegistry, SweepReport, WorldVisibilityManager,
};

use crate::config::{ConfigError, PresenceConfig};

/// What happened during one [`PresenceRuntime::update`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameReport {
    pub frame: u64,
    pub now: Duration,
    /// Cell the tracked entity crossed into this frame.
    pub crossed: Option<CellIndex>,
    /// Presence sweeps triggered by cell changes delivered this frame.
    pub sweeps: Vec<SweepReport>,
    pub scan: Option<ScanStats>,
}

/// Owns one instance of every presence component and drives them each frame.
///
/// The tracker publishes cell changes on the bus; a handler installed here
/// forwards them to the visibility manager together with the entity
/// registry. The scanner is polled against the caller's clock and reads a
/// spatial index rebuilt from the registry just before each scan.
pub struct PresenceRuntime {
    grid: Grid,
    bus: EventBus,
    registry: Rc<RefCell<SceneRegistry>>,
    visibility: Rc<RefCell<WorldVisibilityManager>>,
    pending_sweeps: Rc<RefCell<Vec<SweepReport>>>,
    tracker: CellTracker,
    tracked: Option<EntityId>,
    scanner: VisionBatchScanner,
    spatial: SpatialIndex,
    reputation: Option<Box<dyn ReputationSource>>,
    markers: MarkerRegistry,
    marker_key: Vec3,
    frames: u64,
    _visibility_link: Subscription,
}

impl PresenceRuntime {
    pub fn new(config: &PresenceConfig, scene: impl Into<String>) -> Result<Self, ConfigError> {
        let grid = config.grid()?;
        let scan = config.scan_config()?;
        let bus = EventBus::new();
        let registry = Rc::new(RefCell::new(SceneRegistry::new()));
        let visibility = Rc::new(RefCell::new(WorldVisibilityManager::new(grid, scene)));
        let pending_sweeps = Rc::new(RefCell::new(Vec::new()));

        let visibility_link = {
            let registry = Rc::clone(&registry);
            let visibility = Rc::clone(&visibility);
            let pending = Rc::clone(&pending_sweeps);
            bus.subscribe(EventKind::CellChanged, move |event| {
                let Event::CellChanged(changed) = event else {
                    return;
                };
                let (Ok(mut manager), Ok(mut registry)) =
                    (visibility.try_borrow_mut(), registry.try_borrow_mut())
                else {
                    tracing::warn!(index = changed.index, "presence state busy, cell change dropped");
                    return;
                };
                if let Some(report) = manager.handle_cell_changed(changed.index, &mut *registry) {
                    pending.borrow_mut().push(report);
                }
            })
        };

        tracing::info!(
            width = grid.width(),
            height = grid.height(),
            cell_size = grid.cell_size(),
            interval = ?scan.interval,
            "presence runtime ready"
        );

        Ok(Self {
            grid,
            tracker: CellTracker::new(grid, bus.clone()),
            scanner: VisionBatchScanner::new(grid, scan).with_bus(bus.clone()),
            spatial: SpatialIndex::new(&grid),
            bus,
            registry,
            visibility,
            pending_sweeps,
            tracked: None,
            reputation: None,
            markers: MarkerRegistry::new(),
            marker_key: config.marker_key(),
            frames: 0,
            _visibility_link: visibility_link,
        })
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn scene(&self) -> String {
        self.visibility.borrow().scene().to_owned()
    }

    pub fn registry(&self) -> Ref<'_, SceneRegistry> {
        self.registry.borrow()
    }

    /// Mutable registry access. Release it before the next `update`.
    pub fn registry_mut(&self) -> RefMut<'_, SceneRegistry> {
        self.registry.borrow_mut()
    }

    pub fn visibility(&self) -> Ref<'_, WorldVisibilityManager> {
        self.visibility.borrow()
    }

    pub fn tracker(&self) -> &CellTracker {
        &self.tracker
    }

    pub fn scanner(&self) -> &VisionBatchScanner {
        &self.scanner
    }

    pub fn spawn(&mut self, scene: impl Into<String>, position: Vec3) -> EntityId {
        self.registry.borrow_mut().spawn(scene, position)
    }

    /// Remove an entity, its components and every marker it owns.
    pub fn despawn(&mut self, entity: EntityId) -> bool {
        let existed = self.registry.borrow_mut().despawn(entity);
        let markers = self.markers.unregister_owner(entity);
        if self.tracked == Some(entity) {
            self.tracked = None;
        }
        tracing::debug!(entity = %entity.short(), markers = markers.len(), "entity deactivated");
        existed
    }

    /// Follow `entity` with the cell tracker from the next update on.
    pub fn track(&mut self, entity: EntityId) {
        self.tracked = Some(entity);
    }

    pub fn tracked(&self) -> Option<EntityId> {
        self.tracked
    }

    /// Switch the active scene. The tracked entity's cell is re-published
    /// on the next update, which sweeps the new scene.
    pub fn enter_scene(&mut self, scene: impl Into<String>) {
        self.visibility.borrow_mut().enter_scene(scene);
        self.tracker.reset();
    }

    pub fn set_exemption(&mut self, policy: impl ExemptionPolicy + 'static) {
        self.visibility.borrow_mut().set_exemption(policy);
    }

    pub fn set_reputation(&mut self, source: impl ReputationSource + 'static) {
        self.reputation = Some(Box::new(source));
    }

    pub fn subscribe_vision(&mut self, subscriber: impl PerceptionSubscriber + 'static) -> SubscriberId {
        self.scanner.subscribe(subscriber)
    }

    pub fn unsubscribe_vision(&mut self, id: SubscriberId) -> bool {
        self.scanner.unsubscribe(id)
    }

    pub fn markers(&self) -> &MarkerRegistry {
        &self.markers
    }

    pub fn markers_mut(&mut self) -> &mut MarkerRegistry {
        &mut self.markers
    }

    /// Register a marker, deriving its cell label from its position.
    pub fn place_marker(&mut self, mut marker: Marker) -> Option<Marker> {
        marker.cell_id = self.grid.cell_id(marker.last_known_position).to_string();
        self.markers.register(marker)
    }

    /// Markers near `center` under the configured encoding key.
    pub fn markers_near(&self, center: Vec3, radius: f32) -> Vec<&Marker> {
        self.markers.markers_in_radius(center, radius, self.marker_key)
    }

    /// Run one frame: sample the tracked entity, let cell changes sweep
    /// presence, and scan vision if the interval has elapsed at `now`.
    pub fn update(&mut self, now: Duration) -> FrameReport {
        self.frames += 1;

        let position = CellTracker::sample(&*self.registry.borrow(), self.tracked);
        let crossed = self.tracker.tick(position);
        let sweeps = std::mem::take(&mut *self.pending_sweeps.borrow_mut());

        let scan = if self.scanner.is_due(now) {
            let scene = self.scene();
            {
                let registry = self.registry.borrow();
                self.spatial
                    .rebuild(&registry.world, &registry.components, &scene);
            }
            let ctx = ScanContext {
                spatial: Some(&self.spatial),
                reputation: self.reputation.as_deref(),
            };
            self.scanner
                .tick(now, self.tracker.current_cell_id(), ctx)
        } else {
            None
        };

        FrameReport {
            frame: self.frames,
            now,
            crossed,
            sweeps,
            scan,
        }
    }
}

impl std::fmt::Debug for PresenceRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PresenceRuntime")
            .field("grid", &self.grid)
            .field("tracked", &self.tracked)
            .field("tracker", &self.tracker)
            .field("scanner", &self.scanner)
            .field("markers", &self.markers.len())
            .field("frames", &self.frames)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use worldcell_common::{PerceptionMask, VisionCache};
    use worldcell_ecs::{MaterialHandle, MeshHandle, Perceivable, QuestCritical, Renderable};
    use worldcell_events::{CellChanged, VisionBatchUpdated};
    use worldcell_perception::StandingTable;
    use worldcell_stream::GridError;

    fn runtime() -> PresenceRuntime {
        PresenceRuntime::new(&PresenceConfig::default(), "town").unwrap()
    }

    fn spawn_prop(rt: &mut PresenceRuntime, position: Vec3, mask: PerceptionMask) -> EntityId {
        let id = rt.spawn("town", position);
        let mut registry = rt.registry_mut();
        registry
            .components
            .insert(id, Renderable::new(MeshHandle(1), MaterialHandle(1)));
        registry.components.insert(id, Perceivable::new(mask));
        id
    }

    fn is_visible(rt: &PresenceRuntime, id: EntityId) -> bool {
        rt.registry()
            .components
            .get::<Renderable>(id)
            .is_some_and(|r| r.visible)
    }

    #[test]
    fn end_to_end_walk() {
        let mut rt = runtime();
        let player = spawn_prop(&mut rt, Vec3::new(25.0, 0.0, 35.0), PerceptionMask::PLAYER);
        let near = spawn_prop(&mut rt, Vec3::new(35.0, 0.0, 35.0), PerceptionMask::ENEMY);
        let far = spawn_prop(&mut rt, Vec3::new(5.0, 0.0, 5.0), PerceptionMask::ENEMY);
        let quest = spawn_prop(&mut rt, Vec3::new(75.0, 0.0, 75.0), PerceptionMask::INTERACTABLE);
        rt.registry_mut().components.insert(quest, QuestCritical);
        rt.track(player);

        let frame = rt.update(Duration::ZERO);
        assert_eq!(frame.crossed, Some(26));
        assert_eq!(frame.sweeps.len(), 1);
        assert_eq!(frame.sweeps[0].hidden, 1);
        assert_eq!(frame.sweeps[0].exempt, 1);
        assert!(is_visible(&rt, near));
        assert!(!is_visible(&rt, far));
        assert!(is_visible(&rt, quest));

        let scan = frame.scan.unwrap();
        assert_eq!(scan.queries, 3);
        assert!(scan.cell_based);
        assert_eq!(rt.scanner().results(PerceptionMask::PLAYER), &[player]);
        assert_eq!(rt.scanner().results(PerceptionMask::ENEMY), &[near]);
        assert!(rt.scanner().results(PerceptionMask::INTERACTABLE).is_empty());

        let idle = rt.update(Duration::from_millis(100));
        assert_eq!(idle.crossed, None);
        assert!(idle.sweeps.is_empty());
        assert!(idle.scan.is_none());

        rt.registry_mut()
            .world
            .set_position(player, Vec3::new(5.0, 0.0, 15.0));
        let moved = rt.update(Duration::from_millis(250));
        assert_eq!(moved.crossed, Some(8));
        assert_eq!(moved.sweeps.len(), 1);
        assert!(is_visible(&rt, far));
        assert!(!is_visible(&rt, near));
        assert!(moved.scan.is_some());
        assert_eq!(rt.scanner().results(PerceptionMask::ENEMY), &[far]);
        assert_eq!(rt.visibility().active_cell().map(|c| c.index()), Some(8));
    }

    #[test]
    fn scene_change_sweeps_new_scene() {
        let mut rt = runtime();
        let player = rt.spawn("town", Vec3::new(25.0, 0.0, 35.0));
        rt.track(player);
        rt.update(Duration::ZERO);

        let cave_prop = rt.spawn("cave", Vec3::new(75.0, 0.0, 75.0));
        rt.registry_mut()
            .components
            .insert(cave_prop, Renderable::new(MeshHandle(2), MaterialHandle(2)));
        rt.registry_mut().world.move_to_scene(player, "cave");
        rt.enter_scene("cave");

        let frame = rt.update(Duration::from_millis(10));
        assert_eq!(frame.crossed, Some(26));
        assert_eq!(frame.sweeps.len(), 1);
        assert_eq!(frame.sweeps[0].scene, "cave");
        assert!(!is_visible(&rt, cave_prop));
    }

    #[test]
    fn untracked_runtime_still_scans_globally() {
        let mut rt = runtime();
        let enemy = spawn_prop(&mut rt, Vec3::new(75.0, 0.0, 75.0), PerceptionMask::ENEMY);

        let frame = rt.update(Duration::ZERO);
        assert_eq!(frame.crossed, None);
        let scan = frame.scan.unwrap();
        assert!(!scan.cell_based);
        assert_eq!(rt.scanner().results(PerceptionMask::ENEMY), &[enemy]);
    }

    #[test]
    fn vision_subscribers_and_broadcast_share_one_scan() {
        let mut rt = runtime();
        spawn_prop(&mut rt, Vec3::new(5.0, 0.0, 5.0), PerceptionMask::ENEMY);

        let notified = Rc::new(RefCell::new(0));
        for _ in 0..10 {
            let n = Rc::clone(&notified);
            rt.subscribe_vision(move |cache: &VisionCache| {
                assert_eq!(cache.get(PerceptionMask::ENEMY).len(), 1);
                *n.borrow_mut() += 1;
            });
        }
        let broadcasts: Rc<RefCell<Vec<VisionBatchUpdated>>> = Rc::new(RefCell::new(Vec::new()));
        let b = Rc::clone(&broadcasts);
        let _sub = rt.bus().subscribe(EventKind::VisionBatchUpdated, move |event| {
            if let Event::VisionBatchUpdated(batch) = event {
                b.borrow_mut().push(batch.clone());
            }
        });
        rt.set_reputation(StandingTable::from_iter([("guild".to_string(), 0.5)]));

        let scan = rt.update(Duration::ZERO).scan.unwrap();
        assert_eq!(scan.queries, 3);
        assert_eq!(scan.subscribers_notified, 10);
        assert_eq!(*notified.borrow(), 10);
        let broadcasts = broadcasts.borrow();
        assert_eq!(broadcasts.len(), 1);
        assert_eq!(broadcasts[0].weights.get("guild"), Some(&0.5));
    }

    #[test]
    fn custom_exemption_keeps_entity_present() {
        let mut rt = runtime();
        let player = rt.spawn("town", Vec3::new(25.0, 0.0, 35.0));
        let vip = spawn_prop(&mut rt, Vec3::new(75.0, 0.0, 5.0), PerceptionMask::NONE);
        rt.set_exemption(move |id: EntityId| id == vip);
        rt.track(player);

        let frame = rt.update(Duration::ZERO);
        assert_eq!(frame.sweeps[0].exempt, 1);
        assert!(is_visible(&rt, vip));
    }

    #[test]
    fn despawn_removes_owned_markers_and_tracking() {
        let mut rt = runtime();
        let npc = rt.spawn("town", Vec3::new(12.0, 0.0, 3.0));
        rt.track(npc);
        rt.place_marker(Marker::new("bounty", "", "Bounty", Vec3::new(12.0, 0.0, 3.0)).owned_by(npc));
        rt.place_marker(Marker::new("shrine", "", "Shrine", Vec3::new(55.0, 0.0, 55.0)));
        assert_eq!(
            rt.markers().marker(&"bounty".into()).map(|m| m.cell_id.as_str()),
            Some("Cell_1")
        );

        assert!(rt.despawn(npc));
        assert_eq!(rt.tracked(), None);
        assert_eq!(rt.markers().len(), 1);
        assert!(!rt.despawn(npc));
    }

    #[test]
    fn markers_near_uses_configured_key() {
        let mut config = PresenceConfig::default();
        config.markers.key = Vec3::new(16.0, 0.0, 0.0);
        let mut rt = PresenceRuntime::new(&config, "town").unwrap();
        rt.place_marker(Marker::new("forge", "", "Forge", Vec3::new(25.0, 0.0, 35.0)));
        rt.place_marker(Marker::new("gate", "", "Gate", Vec3::new(35.0, 0.0, 35.0)));

        let near: Vec<&str> = rt
            .markers_near(Vec3::new(30.0, 0.0, 35.0), 5.0)
            .into_iter()
            .map(|m| m.id.0.as_str())
            .collect();
        assert_eq!(near, vec!["forge"]);
    }

    #[test]
    fn busy_registry_drops_cell_change_with_warning() {
        let rt = runtime();
        {
            let _held = rt.registry();
            assert_eq!(rt.bus().publish(CellChanged { index: 5 }), 2);
        }
        assert!(rt.visibility().active_cell().is_none());
        assert!(rt.pending_sweeps.borrow().is_empty());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut config = PresenceConfig::default();
        config.grid.cell_size = 0.0;
        assert!(matches!(
            PresenceRuntime::new(&config, "town"),
            Err(ConfigError::Grid(_))
        ));
    }

    #[test]
    fn oversized_grid_in_config_file_is_an_error() {
        let config = PresenceConfig::from_yaml_str(&format!(
            "grid:\n  width: {}\n  height: 2\n",
            usize::MAX
        ))
        .unwrap();
        assert!(matches!(
            PresenceRuntime::new(&config, "town"),
            Err(ConfigError::Grid(GridError::TooLarge { .. }))
        ));
    }
}
