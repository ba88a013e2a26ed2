//! Activity signal
//!
//! Maps page-visibility transitions to outbound `active`/`inactive` events.

use chrono::{DateTime, Utc};

use crate::message::ChatEvent;

/// Visibility of the page (or terminal) hosting the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Visible,
    Hidden,
}

impl Visibility {
    /// Build from a `hidden` flag
    pub fn from_hidden(hidden: bool) -> Self {
        if hidden {
            Visibility::Hidden
        } else {
            Visibility::Visible
        }
    }

    /// Event announcing this visibility
    pub fn to_event(self, timestamp: DateTime<Utc>) -> ChatEvent {
        match self {
            Visibility::Visible => ChatEvent::Active {
                timestamp: Some(timestamp),
            },
            Visibility::Hidden => ChatEvent::Inactive {
                timestamp: Some(timestamp),
            },
        }
    }
}
