// ============================
// quickbite-client-lib/src/auth/mod.rs
// ============================
//! Authentication module.

pub mod session;
pub mod tokens;

pub use session::SessionManager;
pub use tokens::{AuthSnapshot, TokenPair};
