//! Perception: batched vision scans on a fixed interval.
//!
//! # Invariants
//! - One spatial query per perception category per scan, however many
//!   subscribers are registered.
//! - The vision cache is rebuilt from scratch each scan.
//! - Every subscriber is notified once per scan with the whole cache.

mod query;
mod reputation;
mod scanner;

pub use query::{SpatialIndex, SpatialQuery};
pub use reputation::{ReputationSource, StandingTable, weighting_context};
pub use scanner::{
    PerceptionSubscriber, ScanConfig, ScanContext, ScanStats, SubscriberId, VisionBatchScanner,
};

pub fn crate_info() -> &'static str {
    "worldcell-perception v0.1.0"
}
