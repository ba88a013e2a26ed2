//! Transport interface and WebSocket implementation
//!
//! The session only ever talks to the [`Transport`] trait: open, send, close.
//! Everything the connection reports back (open, frames, close, errors)
//! arrives asynchronously as a [`TransportEvent`] tagged with the
//! [`ConnectionId`] it belongs to.

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::types::ConnectionId;

/// What a connection reported
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEventKind {
    /// Handshake completed
    Opened,
    /// One text delivery (may hold several newline-delimited frames)
    Frame(String),
    /// Connection is gone (peer close, local close, or failed open)
    Closed,
    /// Something went wrong; a `Closed` may or may not follow
    Error(String),
}

/// Event from a specific connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportEvent {
    pub connection: ConnectionId,
    pub kind: TransportEventKind,
}

impl TransportEvent {
    pub fn new(connection: ConnectionId, kind: TransportEventKind) -> Self {
        Self { connection, kind }
    }
}

/// Full-duplex message transport driven by the session
///
/// All operations are fire-and-forget; outcomes come back as events.
pub trait Transport {
    /// Start opening a connection to `url`
    fn open(&mut self, connection: ConnectionId, url: &Url);

    /// Queue one text frame on the connection
    fn send(&mut self, connection: ConnectionId, frame: String);

    /// Close the connection if it is still the active one
    fn close(&mut self, connection: ConnectionId);
}

/// Outbound work for a connection task
#[derive(Debug)]
enum Outbound {
    Frame(String),
    Close,
}

/// WebSocket transport on tokio-tungstenite
///
/// `open` spawns a task per connection, so it must be called from within a
/// tokio runtime.
#[derive(Debug)]
pub struct WsTransport {
    events: mpsc::UnboundedSender<TransportEvent>,
    active: Option<(ConnectionId, mpsc::UnboundedSender<Outbound>)>,
}

impl WsTransport {
    /// Create a transport reporting into `events`
    pub fn new(events: mpsc::UnboundedSender<TransportEvent>) -> Self {
        Self {
            events,
            active: None,
        }
    }

    /// Create a transport together with its event receiver
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<TransportEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    fn outbound_for(&self, connection: ConnectionId) -> Option<&mpsc::UnboundedSender<Outbound>> {
        match &self.active {
            Some((id, tx)) if *id == connection => Some(tx),
            _ => None,
        }
    }
}

impl Transport for WsTransport {
    fn open(&mut self, connection: ConnectionId, url: &Url) {
        if let Some((previous, tx)) = self.active.take() {
            debug!("Replacing connection {}", previous);
            let _ = tx.send(Outbound::Close);
        }

        let (out_tx, out_rx) = mpsc::unbounded_channel();
        self.active = Some((connection, out_tx));
        tokio::spawn(run_connection(
            connection,
            url.to_string(),
            out_rx,
            self.events.clone(),
        ));
    }

    fn send(&mut self, connection: ConnectionId, frame: String) {
        let Some(tx) = self.outbound_for(connection) else {
            warn!("Dropping frame for inactive connection {}", connection);
            return;
        };
        if tx.send(Outbound::Frame(frame)).is_err() {
            debug!("Connection {} task already ended", connection);
        }
    }

    fn close(&mut self, connection: ConnectionId) {
        if self.outbound_for(connection).is_none() {
            return;
        }
        if let Some((_, tx)) = self.active.take() {
            let _ = tx.send(Outbound::Close);
        }
    }
}

fn emit(
    events: &mpsc::UnboundedSender<TransportEvent>,
    connection: ConnectionId,
    kind: TransportEventKind,
) {
    if events.send(TransportEvent::new(connection, kind)).is_err() {
        debug!("Event receiver gone for connection {}", connection);
    }
}

/// Drive one WebSocket connection until either side ends it
///
/// Always finishes by emitting `Closed`.
async fn run_connection(
    connection: ConnectionId,
    url: String,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
    events: mpsc::UnboundedSender<TransportEvent>,
) {
    debug!("Connection {} opening {}", connection, url);

    // WebSocket handshake
    let ws_stream = match tokio_tungstenite::connect_async(url.as_str()).await {
        Ok((stream, _response)) => stream,
        Err(e) => {
            error!("Connection {} failed to open: {}", connection, e);
            emit(&events, connection, TransportEventKind::Error(e.to_string()));
            emit(&events, connection, TransportEventKind::Closed);
            return;
        }
    };

    info!("Connection {} open", connection);
    emit(&events, connection, TransportEventKind::Opened);

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    // Read task (WebSocket -> events)
    let read_events = events.clone();
    let mut read_task = tokio::spawn(async move {
        while let Some(msg_result) = ws_receiver.next().await {
            match msg_result {
                Ok(Message::Text(text)) => {
                    debug!("Connection {} received {} bytes", connection, text.len());
                    emit(
                        &read_events,
                        connection,
                        TransportEventKind::Frame(text.to_string()),
                    );
                }
                Ok(Message::Close(_)) => {
                    debug!("Connection {} got close frame", connection);
                    break;
                }
                Ok(Message::Ping(_)) => {
                    // Pong is handled automatically by tungstenite
                    debug!("Ping on connection {}", connection);
                }
                Ok(_) => {
                    // Binary, pong and raw frames carry no chat events
                }
                Err(e) => {
                    error!("WebSocket error on connection {}: {}", connection, e);
                    emit(
                        &read_events,
                        connection,
                        TransportEventKind::Error(e.to_string()),
                    );
                    break;
                }
            }
        }
        debug!("Read task ended for connection {}", connection);
    });

    // Write task (outbound queue -> WebSocket)
    let write_events = events.clone();
    let mut write_task = tokio::spawn(async move {
        while let Some(out) = outbound.recv().await {
            match out {
                Outbound::Frame(frame) => {
                    if let Err(e) = ws_sender.send(Message::Text(frame.into())).await {
                        error!("WebSocket send failed on connection {}: {}", connection, e);
                        emit(
                            &write_events,
                            connection,
                            TransportEventKind::Error(e.to_string()),
                        );
                        break;
                    }
                }
                Outbound::Close => break,
            }
        }
        debug!("Write task ended for connection {}", connection);

        // Send close frame when done
        let _ = ws_sender.close().await;
    });

    // Wait for either task to complete, then stop the other
    tokio::select! {
        _ = &mut read_task => {
            write_task.abort();
        }
        _ = &mut write_task => {
            read_task.abort();
        }
    }

    info!("Connection {} closed", connection);
    emit(&events, connection, TransportEventKind::Closed);
}
