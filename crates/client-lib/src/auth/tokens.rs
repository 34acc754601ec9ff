// ============================
// crates/client-lib/src/auth/tokens.rs
// ============================
//! Token material and the published authentication snapshot.

use std::fmt;

use quickbite_common::UserProfile;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Access/refresh token pair.
///
/// The two tokens travel together: session state and durable storage hold
/// both or neither, never one without the other.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct TokenPair {
    /// Short-lived bearer token attached to API requests
    pub access: String,
    /// Long-lived token exchanged for a fresh pair
    pub refresh: String,
}

impl TokenPair {
    #[must_use]
    pub fn new(access: impl Into<String>, refresh: impl Into<String>) -> Self {
        Self {
            access: access.into(),
            refresh: refresh.into(),
        }
    }
}

// Token values stay out of logs
impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("access", &"<redacted>")
            .field("refresh", &"<redacted>")
            .finish()
    }
}

/// Authentication state published on the session watch channel after every
/// mutation. Downstream supervisors (realtime, location) derive their
/// lifecycle from it.
#[derive(Debug, Clone, Default)]
pub struct AuthSnapshot {
    /// Profile of the signed-in user, if any
    pub user: Option<UserProfile>,
    /// Current bearer token, if any
    pub access_token: Option<String>,
    /// Monotonic counter bumped on every token rotation; lets consumers
    /// tell "same session, new token" from "no change"
    pub generation: u64,
}

impl AuthSnapshot {
    /// Whether this state supports an authenticated realtime connection
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some() && self.access_token.is_some()
    }
}
