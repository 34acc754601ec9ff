// ============================================================================
// crates/client-lib/src/location/mod.rs
// ============================================================================

pub mod provider;
pub mod tracker;

pub use provider::{PositionProvider, PositionStream, SimulatedProvider, WatchConfig};
pub use tracker::LocationTracker;
