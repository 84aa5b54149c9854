//! Runtime: loads configuration and wires tracker, visibility manager,
//! vision scanner and marker registry into one per-frame update.
//!
//! # Invariants
//! - Each component is constructed once per runtime and reached only
//!   through it.
//! - Cell transitions reach the visibility manager through the event bus,
//!   never by direct call.
//! - The entity registry is never borrowed while an event is published by
//!   the runtime itself.

mod config;
mod context;

pub use config::{ConfigError, GridConfig, MarkerConfig, PresenceConfig, VisionConfig};
pub use context::{FrameReport, PresenceRuntime};

pub fn crate_info() -> &'static str {
    "worldcell-runtime v0.1.0"
}
