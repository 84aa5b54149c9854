//! Typed publish/subscribe bus.
//!
//! # Invariants
//! - Delivery is synchronous: `publish` returns after every live handler of
//!   the event's kind has run.
//! - A disposed subscription is never invoked again, even mid-dispatch.
//! - A handler that is already running is not re-entered by a nested publish.
//! - Single-threaded: the bus is `!Send` by construction.

mod bus;
mod event;

pub use bus::{EventBus, Subscription};
pub use event::{CellChanged, Event, EventKind, VisionBatchUpdated};

pub fn crate_info() -> &'static str {
    "worldcell-events v0.1.0"
}
