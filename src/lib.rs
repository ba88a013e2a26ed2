//! Real-time Chat Session Client Library
//!
//! Keeps one WebSocket connection to a chat server, decodes the inbound
//! newline-delimited JSON event stream, tracks presence and typing state,
//! and sends events on user actions.
//!
//! # Features
//! - Connection lifecycle (`Disconnected -> Connecting -> Connected`)
//! - Newline-delimited JSON codec with per-line error isolation
//! - Room presence tracking from join/leave events
//! - Debounced typing indicators with independent local/remote timers
//! - Active/inactive signalling from page visibility
//!
//! # Architecture
//! - `Session` is a synchronous state machine owning the room state
//! - `Transport` is the seam to the network; `WsTransport` runs on tokio-tungstenite
//! - `SessionDriver` is an actor task feeding the session commands,
//!   transport events and timer expiries one at a time
//!
//! # Example
//! ```ignore
//! use chat_session::{SessionConfig, SessionDriver};
//!
//! #[tokio::main]
//! async fn main() {
//!     let (driver, handle, mut updates) = SessionDriver::websocket(SessionConfig::default());
//!     tokio::spawn(driver.run());
//!
//!     handle.connect("alice", "general").await.unwrap();
//!     handle.send_chat("hello").await.unwrap();
//!
//!     while let Some(update) = updates.recv().await {
//!         println!("{:?}", update);
//!     }
//! }
//! ```

pub mod activity;
pub mod codec;
pub mod config;
pub mod driver;
pub mod error;
pub mod message;
pub mod presence;
pub mod session;
pub mod transport;
pub mod typing;
pub mod types;

// Re-export main types for convenience
pub use activity::Visibility;
pub use config::SessionConfig;
pub use driver::{SessionCommand, SessionDriver, SessionHandle};
pub use error::{DecodeError, SessionError};
pub use message::ChatEvent;
pub use presence::PresenceTracker;
pub use session::{Session, SessionUpdate};
pub use transport::{Transport, TransportEvent, TransportEventKind, WsTransport};
pub use typing::{ExpiryTimer, TypingSignal};
pub use types::{ConnectionId, Phase};
