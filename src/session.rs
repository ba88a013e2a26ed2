//! Session protocol state machine
//!
//! A [`Session`] owns the transport handle and the ephemeral room state
//! (presence, typing). It is driven by plain method calls: user actions,
//! transport events and timer polls. Everything the UI needs to show comes
//! out as [`SessionUpdate`]s on a channel.
//!
//! The session never blocks and never spawns; the [`driver`](crate::driver)
//! module wraps it in a tokio task.

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::activity::Visibility;
use crate::codec;
use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::message::{now_timestamp, ChatEvent};
use crate::presence::PresenceTracker;
use crate::transport::{Transport, TransportEvent, TransportEventKind};
use crate::typing::TypingSignal;
use crate::types::{ConnectionId, Phase};

/// Renderer-facing state change
#[derive(Debug, Clone, PartialEq)]
pub enum SessionUpdate {
    /// Connection phase changed
    PhaseChanged(Phase),
    /// System line (connection status, joins, server errors)
    Notice { text: String, is_error: bool },
    /// Chat message from the room
    Chat {
        username: String,
        content: String,
        timestamp: DateTime<Utc>,
        /// Sent by this session's user
        own: bool,
    },
    /// Roster changed; sorted snapshot
    Presence(Vec<String>),
    /// Who is shown as typing, if anyone
    TypingIndicator(Option<String>),
}

/// One chat session
pub struct Session<T: Transport> {
    config: SessionConfig,
    transport: T,
    updates: mpsc::UnboundedSender<SessionUpdate>,
    phase: Phase,
    username: String,
    room: String,
    /// Active transport attempt, if any
    connection: Option<ConnectionId>,
    presence: PresenceTracker,
    typing: TypingSignal,
}

impl<T: Transport> Session<T> {
    /// Create a disconnected session
    pub fn new(
        config: SessionConfig,
        transport: T,
        updates: mpsc::UnboundedSender<SessionUpdate>,
    ) -> Self {
        let typing = TypingSignal::new(config.typing_timeout);
        Self {
            config,
            transport,
            updates,
            phase: Phase::Disconnected,
            username: String::new(),
            room: String::new(),
            connection: None,
            presence: PresenceTracker::new(),
            typing,
        }
    }

    /// Start connecting as `username` to `room`
    ///
    /// Empty usernames are rejected before anything is opened. An empty room
    /// falls back to the configured default.
    pub fn connect(&mut self, username: &str, room: &str) -> Result<(), SessionError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(SessionError::UsernameRequired);
        }
        if self.phase != Phase::Disconnected {
            return Err(SessionError::AlreadyActive(self.phase));
        }
        let room = match room.trim() {
            "" => self.config.default_room.clone(),
            room => room.to_string(),
        };

        let url = self.config.session_url(username, &room)?;
        let connection = ConnectionId::new();

        self.username = username.to_string();
        self.room = room;
        self.presence.clear();
        self.typing.reset();
        self.connection = Some(connection);

        info!(
            "Connecting as '{}' to room '{}' ({})",
            self.username, self.room, connection
        );
        self.transport.open(connection, &url);
        self.set_phase(Phase::Connecting);
        Ok(())
    }

    /// Close the session; safe to call in any phase
    pub fn disconnect(&mut self) {
        if self.phase == Phase::Disconnected {
            return;
        }
        if let Some(connection) = self.connection {
            self.transport.close(connection);
        }
        self.handle_closed();
    }

    /// Apply one transport event
    ///
    /// Events from a connection other than the active one are ignored.
    pub fn handle_transport_event(&mut self, event: TransportEvent) {
        if self.connection != Some(event.connection) {
            debug!(
                "Ignoring {:?} from stale connection {}",
                event.kind, event.connection
            );
            return;
        }

        match event.kind {
            TransportEventKind::Opened => self.handle_opened(),
            TransportEventKind::Frame(buffer) => self.handle_frame(&buffer),
            TransportEventKind::Closed => self.handle_closed(),
            TransportEventKind::Error(message) => {
                let err = SessionError::Transport(message);
                error!("{}", err);
                self.notice("Connection error occurred", true);
            }
        }
    }

    /// Send a chat message
    ///
    /// Returns false (and sends nothing) when the trimmed content is empty or
    /// the session is not connected.
    pub fn send_chat(&mut self, content: &str) -> bool {
        let content = content.trim();
        if content.is_empty() || !self.phase.is_connected() {
            return false;
        }

        if !self.send_event(&ChatEvent::chat(content, now_timestamp())) {
            return false;
        }

        if self.typing.on_local_send() {
            self.emit(SessionUpdate::TypingIndicator(None));
        }
        true
    }

    /// Local keystroke (anything but the send key)
    ///
    /// Every call puts one `typing` frame on the wire.
    pub fn notify_typing(&mut self) -> bool {
        if !self.phase.is_connected() {
            return false;
        }
        if !self.send_event(&ChatEvent::typing(now_timestamp())) {
            return false;
        }
        self.typing.on_local_keystroke(Instant::now());
        true
    }

    /// Page visibility changed
    pub fn set_visibility(&mut self, visibility: Visibility) -> bool {
        if !self.phase.is_connected() {
            return false;
        }
        self.send_event(&visibility.to_event(now_timestamp()))
    }

    /// Fire expired typing timers
    pub fn poll_timers(&mut self, now: Instant) {
        if self.typing.poll_expired(now) {
            self.emit(SessionUpdate::TypingIndicator(None));
        }
    }

    /// Earliest pending timer deadline
    pub fn next_deadline(&self) -> Option<Instant> {
        self.typing.next_deadline()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn room(&self) -> &str {
        &self.room
    }

    pub fn connection(&self) -> Option<ConnectionId> {
        self.connection
    }

    pub fn presence(&self) -> &PresenceTracker {
        &self.presence
    }

    pub fn typing_indicator(&self) -> Option<&str> {
        self.typing.indicator()
    }

    pub fn typing(&self) -> &TypingSignal {
        &self.typing
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn handle_opened(&mut self) {
        if self.phase != Phase::Connecting {
            debug!("Ignoring open while {}", self.phase);
            return;
        }
        info!("Connected to room '{}' as '{}'", self.room, self.username);
        self.set_phase(Phase::Connected);
        self.notice("Connected to chat room", false);
    }

    fn handle_closed(&mut self) {
        if self.phase == Phase::Disconnected {
            return;
        }
        info!("Disconnected from room '{}'", self.room);
        self.connection = None;
        if self.typing.indicator().is_some() {
            self.emit(SessionUpdate::TypingIndicator(None));
        }
        self.typing.reset();
        self.set_phase(Phase::Disconnected);
        self.notice("Disconnected from chat", false);
    }

    /// Decode a delivery and dispatch every well-formed frame in order
    fn handle_frame(&mut self, buffer: &str) {
        if self.phase == Phase::Disconnected {
            return;
        }
        for result in codec::decode(buffer) {
            match result {
                Ok(event) => self.dispatch(event),
                Err(e) => warn!("Dropping frame: {}", SessionError::from(e)),
            }
        }
    }

    fn dispatch(&mut self, event: ChatEvent) {
        match event {
            ChatEvent::Chat { ref username, .. } | ChatEvent::Typing { ref username, .. }
                if username.is_empty() =>
            {
                warn!("Dropping inbound '{}' frame without username", event.kind());
            }
            ChatEvent::Chat {
                username,
                content,
                timestamp,
            } => {
                let own = username == self.username;
                self.emit(SessionUpdate::Chat {
                    username,
                    content,
                    timestamp,
                    own,
                });
            }
            ChatEvent::Join { username } => {
                self.notice(&format!("{} joined the room", username), false);
                if self.presence.on_join(&username) {
                    self.emit(SessionUpdate::Presence(self.presence.snapshot()));
                }
            }
            ChatEvent::Leave { username } => {
                self.notice(&format!("{} left the room", username), false);
                if self.presence.on_leave(&username) {
                    self.emit(SessionUpdate::Presence(self.presence.snapshot()));
                }
            }
            ChatEvent::Typing { username, .. } => {
                if self.typing.on_remote_typing(&username, Instant::now()) {
                    self.emit(SessionUpdate::TypingIndicator(Some(username)));
                }
            }
            ChatEvent::Error { content } => {
                warn!("{}", SessionError::Protocol(content.clone()));
                self.notice(&format!("Error: {}", content), true);
            }
            event @ (ChatEvent::Active { .. } | ChatEvent::Inactive { .. } | ChatEvent::Unknown) => {
                debug!("No handler for '{}' event", event.kind());
            }
        }
    }

    fn send_event(&mut self, event: &ChatEvent) -> bool {
        let Some(connection) = self.connection else {
            return false;
        };
        match codec::encode(event) {
            Ok(frame) => {
                debug!("Sending '{}' on {}", event.kind(), connection);
                self.transport.send(connection, frame);
                true
            }
            Err(e) => {
                error!("Failed to encode '{}' event: {}", event.kind(), e);
                false
            }
        }
    }

    fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
        self.emit(SessionUpdate::PhaseChanged(phase));
    }

    fn notice(&self, text: &str, is_error: bool) {
        self.emit(SessionUpdate::Notice {
            text: text.to_string(),
            is_error,
        });
    }

    fn emit(&self, update: SessionUpdate) {
        if self.updates.send(update).is_err() {
            debug!("Update receiver dropped");
        }
    }
}
