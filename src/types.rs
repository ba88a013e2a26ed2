//! Basic type definitions for the chat session
//!
//! Provides:
//! - `ConnectionId`: UUID-based identifier for one transport attempt
//! - `Phase`: the connection lifecycle state

use uuid::Uuid;

/// Identifier for a single transport attempt (newtype pattern)
///
/// Every `connect` mints a fresh one so that events from a connection
/// that has since been replaced can be recognized and dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    /// Create a new random connection ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Connection lifecycle phase
///
/// `Disconnected -> Connecting -> Connected -> Disconnected`. There is no
/// automatic retry; leaving `Disconnected` always takes an explicit connect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl Phase {
    /// Outbound sends are only legal while connected
    pub fn is_connected(self) -> bool {
        self == Phase::Connected
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Phase::Disconnected => "disconnected",
            Phase::Connecting => "connecting",
            Phase::Connected => "connected",
        };
        f.write_str(s)
    }
}
