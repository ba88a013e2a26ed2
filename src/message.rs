//! Message protocol definitions
//!
//! JSON-based bidirectional event protocol using Serde's tagged enum
//! for type-safe serialization/deserialization. The same enum covers both
//! directions; fields that only one direction carries are optional on the wire.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

/// Chat event, inbound or outbound
///
/// Tagged on the `type` field with snake_case naming. Fields the server adds
/// that the client does not use (`id`, `room`, ...) are ignored on decode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    /// Chat message. Outbound frames leave `username` out; the server
    /// attributes it from the connection.
    Chat {
        #[serde(default, skip_serializing_if = "String::is_empty")]
        username: String,
        content: String,
        timestamp: DateTime<Utc>,
    },
    /// A user joined the room
    Join { username: String },
    /// A user left the room
    Leave { username: String },
    /// Someone is typing. Inbound carries `username`, outbound carries `timestamp`.
    Typing {
        #[serde(default, skip_serializing_if = "String::is_empty")]
        username: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<DateTime<Utc>>,
    },
    /// Page became visible
    Active {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<DateTime<Utc>>,
    },
    /// Page became hidden
    Inactive {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<DateTime<Utc>>,
    },
    /// Server-side error report
    Error { content: String },
    /// Any `type` this client does not know about
    #[serde(other)]
    Unknown,
}

impl ChatEvent {
    /// Outbound chat message stamped with the given time
    pub fn chat(content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        ChatEvent::Chat {
            username: String::new(),
            content: content.into(),
            timestamp,
        }
    }

    /// Outbound typing notification
    pub fn typing(timestamp: DateTime<Utc>) -> Self {
        ChatEvent::Typing {
            username: String::new(),
            timestamp: Some(timestamp),
        }
    }

    /// Wire name of this event's `type` tag
    pub fn kind(&self) -> &'static str {
        match self {
            ChatEvent::Chat { .. } => "chat",
            ChatEvent::Join { .. } => "join",
            ChatEvent::Leave { .. } => "leave",
            ChatEvent::Typing { .. } => "typing",
            ChatEvent::Active { .. } => "active",
            ChatEvent::Inactive { .. } => "inactive",
            ChatEvent::Error { .. } => "error",
            ChatEvent::Unknown => "unknown",
        }
    }
}

/// Current time, truncated to milliseconds like an ISO-8601 `...sssZ` stamp
pub fn now_timestamp() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}
