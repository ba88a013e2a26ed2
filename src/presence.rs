//! Presence tracking
//!
//! Keeps the set of usernames this client currently believes are in the room.
//! Only join and leave events mutate it.

use std::collections::HashSet;

use tracing::debug;

/// Room roster as seen from this client
#[derive(Debug, Default)]
pub struct PresenceTracker {
    members: HashSet<String>,
}

impl PresenceTracker {
    /// Create an empty tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a join
    ///
    /// Returns true if the user was not already present.
    pub fn on_join(&mut self, username: &str) -> bool {
        let added = self.members.insert(username.to_string());
        if added {
            debug!("{} is now present ({} members)", username, self.members.len());
        }
        added
    }

    /// Record a leave
    ///
    /// Returns true if the user was present. Unknown users are ignored.
    pub fn on_leave(&mut self, username: &str) -> bool {
        let removed = self.members.remove(username);
        if removed {
            debug!("{} is no longer present ({} members)", username, self.members.len());
        }
        removed
    }

    /// Current members (unordered)
    pub fn members(&self) -> &HashSet<String> {
        &self.members
    }

    /// Members sorted by name, for stable display
    pub fn snapshot(&self) -> Vec<String> {
        let mut members: Vec<String> = self.members.iter().cloned().collect();
        members.sort();
        members
    }

    pub fn contains(&self, username: &str) -> bool {
        self.members.contains(username)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Forget everyone (new session)
    pub fn clear(&mut self) {
        self.members.clear();
    }
}
