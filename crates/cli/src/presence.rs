// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Live "users online" counter.
//!
//! Connects the shared transport when nothing else has yet, requests a fresh
//! count, and mirrors `online-users` events into a watch channel verbatim —
//! no smoothing, no averaging. Stopping unsubscribes only; the shared
//! connection stays up for the other consumers.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::session::Session;
use crate::socket::{EVENT_GET_ONLINE_USERS, EVENT_ONLINE_USERS};

/// Run the presence counter until cancelled, publishing counts on `count_tx`.
pub async fn run_presence(
    session: Arc<Session>,
    count_tx: watch::Sender<Option<u64>>,
    shutdown: CancellationToken,
) {
    if !session.socket.connected() {
        if let Err(e) = session.ensure_connected().await {
            tracing::debug!(err = %e, "presence connect failed, count stays absent");
        }
    }

    // Subscribe before requesting so the reply cannot slip past.
    let mut rx = session.socket.subscribe();
    session.socket.emit(EVENT_GET_ONLINE_USERS);

    loop {
        let event = tokio::select! {
            _ = shutdown.cancelled() => break,
            event = rx.recv() => match event {
                Ok(event) => event,
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            },
        };

        if event.name != EVENT_ONLINE_USERS {
            continue;
        }
        if let Some(count) = event.payload.get("count").and_then(Value::as_u64) {
            let _ = count_tx.send(Some(count));
        }
    }
}

#[cfg(test)]
#[path = "presence_tests.rs"]
mod tests;
