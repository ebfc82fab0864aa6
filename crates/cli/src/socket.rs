// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Realtime transport — one process-wide WebSocket connection fanned out to
//! every consumer via a broadcast channel.
//!
//! The connection is owned by exactly one top-level coordinator (the binary's
//! connector, or the login/logout flow); all other components only
//! subscribe/unsubscribe. Delivery is at-least-once, unordered, and possibly
//! duplicated — consumers dedupe.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

/// Chat message event names the backend uses interchangeably.
pub const EVENT_MESSAGE: &str = "message";
pub const EVENT_RECEIVE_MESSAGE: &str = "receive-message";
/// System notification events.
pub const EVENT_RECEIVE_NOTIFICATION: &str = "receive-notification";
pub const EVENT_ONLINE_USERS: &str = "online-users";
/// Emitted to request a fresh presence count.
pub const EVENT_GET_ONLINE_USERS: &str = "get-online-users";

/// One event as received from the wire: name plus raw, unnormalized payload.
#[derive(Debug, Clone)]
pub struct SocketEvent {
    pub name: String,
    pub payload: Value,
}

impl SocketEvent {
    /// True for the two event names that carry chat messages.
    pub fn is_chat_message(&self) -> bool {
        self.name == EVENT_MESSAGE || self.name == EVENT_RECEIVE_MESSAGE
    }
}

struct Connection {
    cancel: CancellationToken,
    outbound: mpsc::UnboundedSender<String>,
}

/// Shared realtime transport handle.
pub struct Socket {
    event_tx: broadcast::Sender<SocketEvent>,
    connected: Arc<AtomicBool>,
    conn: Mutex<Option<Connection>>,
}

impl Socket {
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(256);
        Self {
            event_tx,
            connected: Arc::new(AtomicBool::new(false)),
            conn: Mutex::new(None),
        }
    }

    /// Subscribe to the event stream. Dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> broadcast::Receiver<SocketEvent> {
        self.event_tx.subscribe()
    }

    pub fn connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    /// Connect with a single attempt and spawn the bridge task. Idempotent
    /// while a live connection exists. Reconnection policy belongs to the
    /// caller, not this transport.
    pub async fn connect(&self, url: &str, token: Option<&str>) -> anyhow::Result<()> {
        if self.connected() {
            return Ok(());
        }

        let full_url = build_ws_url(url, token);
        let (ws_stream, _) = tokio_tungstenite::connect_async(&full_url).await?;
        tracing::debug!(url = %url, "realtime transport connected");

        let cancel = CancellationToken::new();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();

        // Replace any dead prior connection.
        if let Ok(mut slot) = self.conn.lock() {
            if let Some(old) = slot.take() {
                old.cancel.cancel();
            }
            *slot = Some(Connection { cancel: cancel.clone(), outbound: out_tx });
        }
        self.connected.store(true, Ordering::Relaxed);

        let event_tx = self.event_tx.clone();
        let connected = Arc::clone(&self.connected);

        tokio::spawn(async move {
            let (mut write, mut read) = ws_stream.split();

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    frame = out_rx.recv() => {
                        match frame {
                            Some(text) => {
                                if let Err(e) = write.send(Message::Text(text.into())).await {
                                    tracing::debug!(err = %e, "realtime send failed");
                                    break;
                                }
                            }
                            None => break,
                        }
                    }
                    msg = read.next() => {
                        match msg {
                            Some(Ok(Message::Text(text))) => {
                                dispatch_frame(&event_tx, text.as_str());
                            }
                            Some(Ok(Message::Close(_))) | None => {
                                tracing::debug!("realtime transport closed");
                                break;
                            }
                            Some(Err(e)) => {
                                tracing::debug!(err = %e, "realtime transport error");
                                break;
                            }
                            _ => {} // ping/pong/binary ignored
                        }
                    }
                }
            }

            connected.store(false, Ordering::Relaxed);
        });

        Ok(())
    }

    /// Queue a payload-less event frame. Silently dropped when disconnected —
    /// fire-and-forget, no delivery guarantee.
    pub fn emit(&self, event: &str) {
        let frame = serde_json::json!({ "event": event }).to_string();
        let Ok(slot) = self.conn.lock() else {
            return;
        };
        match slot.as_ref() {
            Some(conn) if self.connected() => {
                let _ = conn.outbound.send(frame);
            }
            _ => {
                tracing::debug!(event, "emit while disconnected, dropped");
            }
        }
    }

    /// Tear down the connection. Only the top-level owner calls this.
    pub fn disconnect(&self) {
        if let Ok(mut slot) = self.conn.lock() {
            if let Some(conn) = slot.take() {
                conn.cancel.cancel();
            }
        }
        self.connected.store(false, Ordering::Relaxed);
    }
}

impl Default for Socket {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Socket {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Parse one text frame and broadcast it. Frames that are not a JSON object
/// with a string `event` are skipped; a malformed frame must never kill the
/// bridge.
fn dispatch_frame(event_tx: &broadcast::Sender<SocketEvent>, text: &str) {
    let value: Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(e) => {
            tracing::debug!(err = %e, "unparseable realtime frame skipped");
            return;
        }
    };
    let Some(name) = value.get("event").and_then(Value::as_str) else {
        tracing::debug!("realtime frame without event name skipped");
        return;
    };
    let payload = value.get("data").cloned().unwrap_or(Value::Null);
    let _ = event_tx.send(SocketEvent { name: name.to_owned(), payload });
}

/// Build the WebSocket URL: http(s) bases are converted to ws(s), and the
/// auth token rides as a query parameter.
pub fn build_ws_url(base_url: &str, token: Option<&str>) -> String {
    let ws_base = if base_url.starts_with("https://") {
        base_url.replacen("https://", "wss://", 1)
    } else if base_url.starts_with("http://") {
        base_url.replacen("http://", "ws://", 1)
    } else {
        base_url.to_owned()
    };

    match token {
        Some(token) if !token.is_empty() => format!("{ws_base}?token={token}"),
        _ => ws_base,
    }
}

#[cfg(test)]
#[path = "socket_tests.rs"]
mod tests;
