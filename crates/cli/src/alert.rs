// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Application-wide alert bus.
//!
//! Producers (conversation store, inbox) announce outcomes without holding a
//! reference to whoever renders them; consumers subscribe to the broadcast
//! channel. Fixed kind set, single publish function.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::error::ErrorCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
    Success,
    Danger,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub kind: AlertKind,
    pub message: String,
}

/// Broadcast hub for alerts. Cheap to clone via `Arc` on the session.
#[derive(Debug)]
pub struct AlertBus {
    tx: broadcast::Sender<Alert>,
}

impl AlertBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(64);
        Self { tx }
    }

    /// Publish an alert. Blank messages are dropped at the source; send
    /// errors (no subscribers) are ignored.
    pub fn show(&self, kind: AlertKind, message: &str) {
        if message.trim().is_empty() {
            return;
        }
        let alert = Alert {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            message: message.to_owned(),
        };
        let _ = self.tx.send(alert);
    }

    /// Publish the standard danger alert for a failure category.
    pub fn show_error(&self, code: ErrorCode) {
        self.show(AlertKind::Danger, code.user_message());
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Alert> {
        self.tx.subscribe()
    }
}

impl Default for AlertBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "alert_tests.rs"]
mod tests;
