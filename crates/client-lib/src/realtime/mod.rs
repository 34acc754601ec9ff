// ============================================================================
// crates/client-lib/src/realtime/mod.rs
// ============================================================================

pub mod buffer;
pub mod manager;
pub mod transport;

pub use buffer::{UpdateBuffers, UpdateKind, UpdateRecord};
pub use manager::RealtimeManager;
pub use transport::{FrameSink, FrameStream, RealtimeTransport, WsTransport};
