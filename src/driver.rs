//! Session driver actor
//!
//! Owns one [`Session`] and feeds it from three sources, one at a time:
//! UI commands, transport events and the typing timer deadline.
//! Uses the Actor pattern with mpsc channels, so the session itself needs no locks.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::activity::Visibility;
use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::session::{Session, SessionUpdate};
use crate::transport::{Transport, TransportEvent, TransportEventKind, WsTransport};
use crate::types::ConnectionId;

/// Commands sent from the UI to the driver
#[derive(Debug)]
pub enum SessionCommand {
    /// Open the session
    Connect {
        username: String,
        room: String,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    /// Send a chat message
    SendChat { content: String },
    /// Local keystroke
    Typing,
    /// Page visibility changed
    Visibility { visibility: Visibility },
    /// Close the session
    Disconnect,
    /// Current roster, sorted
    Roster { reply: oneshot::Sender<Vec<String>> },
}

/// Cloneable command sender for a running driver
#[derive(Debug, Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<SessionCommand>,
}

impl SessionHandle {
    pub fn new(commands: mpsc::Sender<SessionCommand>) -> Self {
        Self { commands }
    }

    /// Connect as `username` to `room` (empty room means the default)
    pub async fn connect(&self, username: &str, room: &str) -> Result<(), SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionCommand::Connect {
            username: username.to_string(),
            room: room.to_string(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| SessionError::ChannelSend)?
    }

    pub async fn send_chat(&self, content: &str) -> Result<(), SessionError> {
        self.send(SessionCommand::SendChat {
            content: content.to_string(),
        })
        .await
    }

    pub async fn typing(&self) -> Result<(), SessionError> {
        self.send(SessionCommand::Typing).await
    }

    pub async fn set_visibility(&self, visibility: Visibility) -> Result<(), SessionError> {
        self.send(SessionCommand::Visibility { visibility }).await
    }

    pub async fn disconnect(&self) -> Result<(), SessionError> {
        self.send(SessionCommand::Disconnect).await
    }

    pub async fn roster(&self) -> Result<Vec<String>, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionCommand::Roster { reply }).await?;
        rx.await.map_err(|_| SessionError::ChannelSend)
    }

    async fn send(&self, cmd: SessionCommand) -> Result<(), SessionError> {
        self.commands
            .send(cmd)
            .await
            .map_err(|_| SessionError::ChannelSend)
    }
}

/// The session driver actor
pub struct SessionDriver<T: Transport> {
    session: Session<T>,
    commands: mpsc::Receiver<SessionCommand>,
    transport_events: mpsc::UnboundedReceiver<TransportEvent>,
    /// Connection closed locally whose transport has not reported `Closed` yet
    closing: Option<ConnectionId>,
}

impl SessionDriver<WsTransport> {
    /// Build a WebSocket-backed driver
    ///
    /// Returns the driver (spawn `run`), a handle for the UI and the update
    /// stream for the renderer.
    pub fn websocket(
        config: SessionConfig,
    ) -> (Self, SessionHandle, mpsc::UnboundedReceiver<SessionUpdate>) {
        let (transport, transport_events) = WsTransport::channel();
        let (cmd_tx, cmd_rx) = mpsc::channel(config.command_buffer.max(1));
        let (update_tx, update_rx) = mpsc::unbounded_channel();

        let session = Session::new(config, transport, update_tx);
        let driver = SessionDriver::new(session, cmd_rx, transport_events);
        (driver, SessionHandle::new(cmd_tx), update_rx)
    }
}

impl<T: Transport> SessionDriver<T> {
    pub fn new(
        session: Session<T>,
        commands: mpsc::Receiver<SessionCommand>,
        transport_events: mpsc::UnboundedReceiver<TransportEvent>,
    ) -> Self {
        Self {
            session,
            commands,
            transport_events,
            closing: None,
        }
    }

    /// Run the driver event loop
    ///
    /// Processes inputs until every `SessionHandle` is dropped, then tears
    /// the session down.
    pub async fn run(mut self) {
        info!("Session driver started");

        let timer = tokio::time::sleep(Duration::ZERO);
        tokio::pin!(timer);

        loop {
            let deadline = self.session.next_deadline();
            if let Some(deadline) = deadline {
                timer.as_mut().reset(deadline);
            }

            tokio::select! {
                cmd = self.commands.recv() => {
                    let Some(cmd) = cmd else { break };
                    self.handle_command(cmd);
                }
                Some(event) = self.transport_events.recv() => {
                    if self.closing == Some(event.connection)
                        && event.kind == TransportEventKind::Closed
                    {
                        self.closing = None;
                    }
                    self.session.handle_transport_event(event);
                }
                () = &mut timer, if deadline.is_some() => {
                    self.session.poll_timers(Instant::now());
                }
            }
        }

        self.close_session();
        self.wait_for_transport_close().await;
        info!("Session driver shutting down");
    }

    /// Disconnect the session, remembering which connection is closing
    fn close_session(&mut self) {
        if let Some(connection) = self.session.connection() {
            self.closing = Some(connection);
        }
        self.session.disconnect();
    }

    /// Give the transport time to finish its close handshake
    async fn wait_for_transport_close(&mut self) {
        let Some(connection) = self.closing.take() else {
            return;
        };
        let events = &mut self.transport_events;
        let closed = async {
            while let Some(event) = events.recv().await {
                if event.connection == connection && event.kind == TransportEventKind::Closed {
                    return;
                }
            }
        };

        let timeout = self.session.config().shutdown_timeout;
        match tokio::time::timeout(timeout, closed).await {
            Ok(()) => debug!("Connection {} closed cleanly", connection),
            Err(_) => warn!("Connection {} did not close within {:?}", connection, timeout),
        }
    }

    /// Process a single command
    fn handle_command(&mut self, cmd: SessionCommand) {
        match cmd {
            SessionCommand::Connect {
                username,
                room,
                reply,
            } => {
                let result = self.session.connect(&username, &room);
                if let Err(e) = &result {
                    warn!("Connect rejected: {}", e);
                }
                let _ = reply.send(result);
            }
            SessionCommand::SendChat { content } => {
                if !self.session.send_chat(&content) {
                    debug!("Chat not sent (empty or {})", self.session.phase());
                }
            }
            SessionCommand::Typing => {
                self.session.notify_typing();
            }
            SessionCommand::Visibility { visibility } => {
                self.session.set_visibility(visibility);
            }
            SessionCommand::Disconnect => {
                self.close_session();
            }
            SessionCommand::Roster { reply } => {
                let _ = reply.send(self.session.presence().snapshot());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use futures_util::{SinkExt, StreamExt};
    use tokio::net::TcpListener;
    use tokio_tungstenite::tungstenite::Message;
    use url::Url;

    use super::*;
    use crate::types::Phase;

    async fn next_update(rx: &mut mpsc::UnboundedReceiver<SessionUpdate>) -> SessionUpdate {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for update")
            .expect("update channel closed")
    }

    async fn wait_for<F>(rx: &mut mpsc::UnboundedReceiver<SessionUpdate>, mut pred: F) -> SessionUpdate
    where
        F: FnMut(&SessionUpdate) -> bool,
    {
        loop {
            let update = next_update(rx).await;
            if pred(&update) {
                return update;
            }
        }
    }

    #[tokio::test]
    async fn test_connect_rejects_empty_username() {
        let (driver, handle, mut updates) = SessionDriver::websocket(SessionConfig::default());
        tokio::spawn(driver.run());

        let err = handle.connect("  ", "").await.unwrap_err();
        assert!(matches!(err, SessionError::UsernameRequired));
        assert!(updates.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_handle_fails_after_driver_stops() {
        let (driver, handle, _updates) = SessionDriver::websocket(SessionConfig::default());
        drop(driver);

        let err = handle.send_chat("hi").await.unwrap_err();
        assert!(matches!(err, SessionError::ChannelSend));
    }

    #[tokio::test]
    async fn test_session_against_websocket_server() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        // Minimal server: two joins in one delivery, read one chat, echo it, close
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            ws.send(Message::Text(
                "{\"type\":\"join\",\"username\":\"alice\"}\n{\"type\":\"join\",\"username\":\"bob\"}\n"
                    .into(),
            ))
            .await
            .unwrap();

            let received = loop {
                match ws.next().await {
                    Some(Ok(Message::Text(text))) => break text.to_string(),
                    Some(Ok(_)) => continue,
                    other => panic!("unexpected: {:?}", other),
                }
            };
            let frame: serde_json::Value = serde_json::from_str(&received).unwrap();
            let echo = serde_json::json!({
                "type": "chat",
                "username": "alice",
                "content": frame["content"],
                "timestamp": frame["timestamp"],
            });
            ws.send(Message::Text(echo.to_string().into())).await.unwrap();
            ws.close(None).await.unwrap();
            received
        });

        let config = SessionConfig::new(Url::parse(&format!("http://127.0.0.1:{}", port)).unwrap());
        let (driver, handle, mut updates) = SessionDriver::websocket(config);
        tokio::spawn(driver.run());

        handle.connect("alice", "").await.unwrap();
        assert_eq!(
            next_update(&mut updates).await,
            SessionUpdate::PhaseChanged(Phase::Connecting)
        );
        assert_eq!(
            next_update(&mut updates).await,
            SessionUpdate::PhaseChanged(Phase::Connected)
        );

        wait_for(&mut updates, |u| {
            matches!(u, SessionUpdate::Presence(members) if members.len() == 2)
        })
        .await;
        assert_eq!(handle.roster().await.unwrap(), vec!["alice", "bob"]);

        handle.send_chat("hello").await.unwrap();

        let chat = wait_for(&mut updates, |u| matches!(u, SessionUpdate::Chat { .. })).await;
        match chat {
            SessionUpdate::Chat { content, own, .. } => {
                assert_eq!(content, "hello");
                assert!(own);
            }
            _ => unreachable!(),
        }

        wait_for(&mut updates, |u| {
            *u == SessionUpdate::PhaseChanged(Phase::Disconnected)
        })
        .await;

        let received = server.await.unwrap();
        assert!(received.contains("\"type\":\"chat\""));
        assert!(received.contains("\"content\":\"hello\""));
        assert!(!received.contains("username"));
    }

    #[tokio::test]
    async fn test_dropping_handle_closes_connection_before_exit() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        // Reports whether a close frame arrived before the stream ended
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            loop {
                match ws.next().await {
                    Some(Ok(Message::Close(_))) => return true,
                    Some(Ok(_)) => continue,
                    _ => return false,
                }
            }
        });

        let config = SessionConfig::new(Url::parse(&format!("http://127.0.0.1:{}", port)).unwrap());
        let (driver, handle, mut updates) = SessionDriver::websocket(config);
        let driver_task = tokio::spawn(driver.run());

        handle.connect("alice", "").await.unwrap();
        wait_for(&mut updates, |u| {
            matches!(u, SessionUpdate::Notice { text, .. } if text == "Connected to chat room")
        })
        .await;

        handle.disconnect().await.unwrap();
        drop(handle);

        tokio::time::timeout(Duration::from_secs(5), driver_task)
            .await
            .expect("driver did not stop")
            .unwrap();
        assert!(server.await.unwrap());

        // Session is gone, so the update stream ends after the closing notice
        let mut rest = Vec::new();
        while let Some(update) = updates.recv().await {
            rest.push(update);
        }
        assert_eq!(
            rest,
            vec![
                SessionUpdate::PhaseChanged(Phase::Disconnected),
                SessionUpdate::Notice {
                    text: "Disconnected from chat".to_string(),
                    is_error: false
                },
            ]
        );
    }
}
