use glam::Vec3;
use std::cell::RefCell;
use std::rc::Rc;
use worldcell_common::{CellId, CellIndex, EntityId};
use worldcell_events::{CellChanged, Event, EventBus, EventKind, Subscription};

use crate::flags::{CellFlag, CellFlags};
use crate::grid::Grid;
use crate::registry::EntityRegistry;

/// Edge-triggered cell tracker for one entity (usually the player).
///
/// Each tick samples a position; when the cell index changes it moves the
/// `OCCUPIED` bit and publishes [`CellChanged`]. A handler the tracker
/// registers on its own bus marks the new cell `VISIBLE | ACTIVE`.
pub struct CellTracker {
    grid: Grid,
    current: Option<CellIndex>,
    flags: Rc<RefCell<CellFlags>>,
    bus: EventBus,
    transitions: u64,
    _activation: Subscription,
}

impl CellTracker {
    pub fn new(grid: Grid, bus: EventBus) -> Self {
        let flags = Rc::new(RefCell::new(CellFlags::new(grid.cell_count())));
        let activation = {
            let flags = Rc::clone(&flags);
            bus.subscribe(EventKind::CellChanged, move |event| {
                if let Event::CellChanged(changed) = event {
                    flags
                        .borrow_mut()
                        .insert(changed.index, CellFlag::VISIBLE | CellFlag::ACTIVE);
                }
            })
        };
        Self {
            grid,
            current: None,
            flags,
            bus,
            transitions: 0,
            _activation: activation,
        }
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Resolve `entity`'s position for [`tick`](Self::tick). The registry
    /// borrow ends before the tick publishes.
    pub fn sample<R: EntityRegistry + ?Sized>(registry: &R, entity: Option<EntityId>) -> Option<Vec3> {
        registry.position(entity?)
    }

    /// Sample the tracked position for this frame.
    ///
    /// `None` means there is nothing to track yet and the tick is skipped.
    /// Returns the new cell when a boundary was crossed.
    pub fn tick(&mut self, position: Option<Vec3>) -> Option<CellIndex> {
        let position = position?;
        let next = self.grid.index(position);
        if self.current == Some(next) {
            return None;
        }

        {
            let mut flags = self.flags.borrow_mut();
            if let Some(previous) = self.current {
                flags.remove(previous, CellFlag::OCCUPIED);
            }
            flags.insert(next, CellFlag::OCCUPIED);
        }

        tracing::debug!(from = ?self.current, to = next, "cell transition");
        self.current = Some(next);
        self.transitions += 1;
        // Flags borrow is released above: handlers on this bus may read them.
        self.bus.publish(CellChanged { index: next });
        Some(next)
    }

    /// Forget the current cell, e.g. on scene change. Does not publish.
    pub fn reset(&mut self) {
        if let Some(previous) = self.current.take() {
            self.flags.borrow_mut().remove(previous, CellFlag::OCCUPIED);
        }
    }

    pub fn current_cell(&self) -> Option<CellIndex> {
        self.current
    }

    pub fn current_cell_id(&self) -> Option<CellId> {
        self.current.map(CellId)
    }

    pub fn flags_at(&self, index: CellIndex) -> CellFlag {
        self.flags.borrow().get(index)
    }

    /// Copy of the whole flag array.
    pub fn flags_snapshot(&self) -> CellFlags {
        self.flags.borrow().clone()
    }

    /// Number of boundary crossings seen so far.
    pub fn transitions(&self) -> u64 {
        self.transitions
    }
}

impl std::fmt::Debug for CellTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CellTracker")
            .field("grid", &self.grid)
            .field("current", &self.current)
            .field("transitions", &self.transitions)
            .finish()
    }
}
