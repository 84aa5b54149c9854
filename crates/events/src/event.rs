use std::time::Duration;
use worldcell_common::{CellIndex, VisionCache, WeightingContext};

/// Discriminant used to subscribe to one kind of event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    CellChanged,
    VisionBatchUpdated,
}

/// The tracked entity crossed into a new grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellChanged {
    pub index: CellIndex,
}

/// One batch scan completed.
#[derive(Debug, Clone, PartialEq)]
pub struct VisionBatchUpdated {
    pub cache: VisionCache,
    pub weights: WeightingContext,
    /// Simulation time the scan ran at.
    pub scanned_at: Duration,
}

/// Every notification the presence layer publishes.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    CellChanged(CellChanged),
    VisionBatchUpdated(VisionBatchUpdated),
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::CellChanged(_) => EventKind::CellChanged,
            Event::VisionBatchUpdated(_) => EventKind::VisionBatchUpdated,
        }
    }
}

impl From<CellChanged> for Event {
    fn from(e: CellChanged) -> Self {
        Event::CellChanged(e)
    }
}

impl From<VisionBatchUpdated> for Event {
    fn from(e: VisionBatchUpdated) -> Self {
        Event::VisionBatchUpdated(e)
    }
}
