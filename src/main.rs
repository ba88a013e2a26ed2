//! Chat session client - Entry Point
//!
//! Connects to a chat server and bridges it to the terminal:
//! every stdin line is sent as a chat message, a few slash commands stand in
//! for keystrokes and visibility changes, and session updates go to stdout.

use std::env;

use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use chat_session::{
    Phase, SessionConfig, SessionDriver, SessionError, SessionHandle, SessionUpdate, Visibility,
};

const USAGE: &str = "usage: chat_session <username> [room]";

/// Lines buffered between the stdin thread and the session
const INPUT_BUFFER_SIZE: usize = 16;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging with environment filter
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=chat_session=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("chat_session=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    // Username and room from the command line
    let mut args = env::args().skip(1);
    let Some(username) = args.next() else {
        eprintln!("{}", USAGE);
        std::process::exit(2);
    };
    let room = args.next().unwrap_or_default();

    let config = SessionConfig::from_env()?;
    info!("Using page URL {}", config.page_url);

    let (driver, handle, updates) = SessionDriver::websocket(config);
    let driver_task = tokio::spawn(driver.run());

    handle.connect(&username, &room).await?;

    let mut renderer = tokio::spawn(render_updates(updates));
    let mut input = tokio::spawn(read_input(handle, spawn_stdin_reader()));

    // Quit on disconnect (peer close or /quit) or end of input
    let renderer_done = tokio::select! {
        _ = &mut renderer => {
            input.abort();
            true
        }
        result = &mut input => {
            if let Ok(Err(e)) = result {
                error!("Input error: {}", e);
            }
            false
        }
    };

    // With every handle gone the driver disconnects, waits for the close
    // handshake and drops the session, which ends the update stream
    if let Err(e) = driver_task.await {
        error!("Session driver failed: {}", e);
    }
    if !renderer_done {
        let _ = renderer.await;
    }
    Ok(())
}

/// Read stdin on a plain thread so a pending read never holds up shutdown
fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(INPUT_BUFFER_SIZE);
    std::thread::spawn(move || {
        for line in std::io::stdin().lines() {
            let Ok(line) = line else { break };
            if tx.blocking_send(line).is_err() {
                break;
            }
        }
    });
    rx
}

/// Forward input lines to the session
async fn read_input(
    handle: SessionHandle,
    mut lines: mpsc::Receiver<String>,
) -> Result<(), SessionError> {
    while let Some(line) = lines.recv().await {
        match line.trim() {
            "/quit" => break,
            "/typing" => handle.typing().await?,
            "/away" => handle.set_visibility(Visibility::Hidden).await?,
            "/back" => handle.set_visibility(Visibility::Visible).await?,
            "/who" => {
                let members = handle.roster().await?;
                println!("* in room: {}", members.join(", "));
            }
            _ => handle.send_chat(&line).await?,
        }
    }

    handle.disconnect().await
}

/// Print updates until the session has closed and said so
async fn render_updates(mut updates: mpsc::UnboundedReceiver<SessionUpdate>) {
    let mut closing = false;
    while let Some(update) = updates.recv().await {
        render(&update);
        if is_last_update(&update, &mut closing) {
            break;
        }
    }
}

/// The closing notice follows `PhaseChanged(Disconnected)`; stop after it
fn is_last_update(update: &SessionUpdate, closing: &mut bool) -> bool {
    match update {
        SessionUpdate::PhaseChanged(Phase::Disconnected) => {
            *closing = true;
            false
        }
        SessionUpdate::Notice { .. } => *closing,
        _ => false,
    }
}

fn render(update: &SessionUpdate) {
    match update {
        SessionUpdate::PhaseChanged(phase) => println!("[{}]", phase),
        SessionUpdate::Notice { text, is_error } => {
            if *is_error {
                println!("! {}", text);
            } else {
                println!("* {}", text);
            }
        }
        SessionUpdate::Chat {
            username,
            content,
            timestamp,
            own,
        } => {
            let who = if *own { "You" } else { username.as_str() };
            println!("{} {}: {}", timestamp.format("%H:%M:%S"), who, content);
        }
        SessionUpdate::Presence(members) => println!("* {} in room", members.len()),
        SessionUpdate::TypingIndicator(Some(username)) => println!("* {} is typing...", username),
        SessionUpdate::TypingIndicator(None) => {}
    }
}
