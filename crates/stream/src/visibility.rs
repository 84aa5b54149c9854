use std::collections::HashMap;
use std::time::{Duration, Instant};
use worldcell_common::{CellId, CellIndex};

use crate::flags::{CellFlag, CellFlags};
use crate::grid::Grid;
use crate::registry::{EntityRegistry, ExemptionPolicy};

/// Outcome of one presence sweep, for instrumentation.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepReport {
    pub scene: String,
    pub active_cell: CellId,
    /// Entities left present (exempt ones included).
    pub visible: usize,
    pub hidden: usize,
    pub exempt: usize,
    /// Entities with no position in the registry.
    pub skipped: usize,
    pub subsystems_toggled: usize,
    pub elapsed: Duration,
}

/// Owns the active cell and decides which entities are present.
///
/// On every change of active cell it walks all entities of the current scene
/// and switches their subsystems on inside the 3×3 neighbourhood of the
/// active cell and off everywhere else.
pub struct WorldVisibilityManager {
    grid: Grid,
    scene: String,
    scene_flags: HashMap<String, CellFlags>,
    active_cell: Option<CellId>,
    exemption: Option<Box<dyn ExemptionPolicy>>,
    last_sweep: Option<SweepReport>,
    sweeps: u64,
}

impl WorldVisibilityManager {
    pub fn new(grid: Grid, scene: impl Into<String>) -> Self {
        let mut manager = Self {
            grid,
            scene: String::new(),
            scene_flags: HashMap::new(),
            active_cell: None,
            exemption: None,
            last_sweep: None,
            sweeps: 0,
        };
        manager.enter_scene(scene);
        manager
    }

    /// Add an exemption predicate on top of the registry's own.
    pub fn with_exemption(mut self, policy: impl ExemptionPolicy + 'static) -> Self {
        self.set_exemption(policy);
        self
    }

    /// Replace the exemption predicate. Takes effect on the next sweep.
    pub fn set_exemption(&mut self, policy: impl ExemptionPolicy + 'static) {
        self.exemption = Some(Box::new(policy));
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn scene(&self) -> &str {
        &self.scene
    }

    /// Switch to `scene`, creating its flag array on first entry.
    ///
    /// Entering a different scene forgets the active cell so the next
    /// notification sweeps the new scene.
    pub fn enter_scene(&mut self, scene: impl Into<String>) {
        let scene = scene.into();
        let cell_count = self.grid.cell_count();
        self.scene_flags
            .entry(scene.clone())
            .or_insert_with(|| CellFlags::new(cell_count));
        if scene != self.scene {
            tracing::debug!(from = %self.scene, to = %scene, "entering scene");
            self.scene = scene;
            self.active_cell = None;
        }
    }

    pub fn active_cell(&self) -> Option<CellId> {
        self.active_cell
    }

    pub fn scene_flags(&self, scene: &str) -> Option<&CellFlags> {
        self.scene_flags.get(scene)
    }

    pub fn last_sweep(&self) -> Option<&SweepReport> {
        self.last_sweep.as_ref()
    }

    pub fn sweep_count(&self) -> u64 {
        self.sweeps
    }

    /// Whether an entity in `object_cell` is present while `active` is the
    /// active cell.
    pub fn should_render(&self, object_cell: CellIndex, active: CellIndex) -> bool {
        object_cell == active || self.grid.is_cell_visible(active, object_cell)
    }

    /// React to a cell-changed notification.
    ///
    /// Repeating the current active cell is a no-op and returns `None`;
    /// otherwise every entity of the current scene is re-evaluated.
    pub fn handle_cell_changed<R>(&mut self, index: CellIndex, registry: &mut R) -> Option<SweepReport>
    where
        R: EntityRegistry + ?Sized,
    {
        if !self.grid.contains(index) {
            tracing::warn!(index, cells = self.grid.cell_count(), "cell change outside grid ignored");
            return None;
        }
        let cell = CellId(index);
        if self.active_cell == Some(cell) {
            return None;
        }
        self.active_cell = Some(cell);
        let report = self.sweep(cell, registry);
        self.last_sweep = Some(report.clone());
        Some(report)
    }

    fn sweep<R>(&mut self, cell: CellId, registry: &mut R) -> SweepReport
    where
        R: EntityRegistry + ?Sized,
    {
        let _span = tracing::info_span!("visibility_sweep", scene = %self.scene, %cell).entered();
        let start = Instant::now();

        let mut report = SweepReport {
            scene: self.scene.clone(),
            active_cell: cell,
            visible: 0,
            hidden: 0,
            exempt: 0,
            skipped: 0,
            subsystems_toggled: 0,
            elapsed: Duration::ZERO,
        };

        for entity in registry.entities_in_scene(&self.scene) {
            let Some(position) = registry.position(entity) else {
                report.skipped += 1;
                continue;
            };
            let exempt = registry.is_exempt(entity)
                || self
                    .exemption
                    .as_ref()
                    .is_some_and(|policy| policy.is_exempt(entity));
            let present = if exempt {
                report.exempt += 1;
                true
            } else {
                self.should_render(self.grid.index(position), cell.index())
            };
            if present {
                report.visible += 1;
            } else {
                report.hidden += 1;
            }
            report.subsystems_toggled += registry.apply_presence(entity, present);
        }

        self.refresh_scene_flags(cell.index());
        self.sweeps += 1;
        report.elapsed = start.elapsed();

        tracing::debug!(
            visible = report.visible,
            hidden = report.hidden,
            exempt = report.exempt,
            toggled = report.subsystems_toggled,
            elapsed = ?report.elapsed,
            "visibility sweep complete"
        );
        report
    }

    fn refresh_scene_flags(&mut self, active: CellIndex) {
        let cell_count = self.grid.cell_count();
        let flags = self
            .scene_flags
            .entry(self.scene.clone())
            .or_insert_with(|| CellFlags::new(cell_count));
        flags.clear_all();
        for neighbour in self.grid.neighborhood(active) {
            flags.insert(neighbour, CellFlag::VISIBLE);
        }
        flags.insert(active, CellFlag::ACTIVE);
    }
}

impl std::fmt::Debug for WorldVisibilityManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorldVisibilityManager")
            .field("scene", &self.scene)
            .field("active_cell", &self.active_cell)
            .field("scenes", &self.scene_flags.len())
            .field("has_exemption", &self.exemption.is_some())
            .field("sweeps", &self.sweeps)
            .finish()
    }
}
