// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Counterpart resolution for two-party conversations.
//!
//! "Who is the other side" comes from several signals of decreasing
//! authority: declared chat participants, then message history, then a
//! session-scoped hint left behind by an earlier successful resolution.

use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::message::ChatMessage;

/// Resolve the counterpart of `self_id` from chat metadata and history.
///
/// Precedence:
/// 1. explicit participants list, minus self;
/// 2. first message whose sender is not self;
/// 3. first message whose receiver is not self;
/// 4. first self-sent message that carries a receiver.
///
/// Returns `None` when no signal exists (a history-less, metadata-less new
/// chat). Callers must treat that as "cannot send yet" rather than guessing.
pub fn resolve_counterpart(
    self_id: &str,
    participants: &[String],
    messages: &[ChatMessage],
) -> Option<String> {
    if let Some(other) = participants.iter().find(|p| p.as_str() != self_id) {
        return Some(other.clone());
    }
    if let Some(m) = messages.iter().find(|m| !m.sender_id.is_empty() && m.sender_id != self_id) {
        return Some(m.sender_id.clone());
    }
    if let Some(r) = messages
        .iter()
        .filter_map(|m| m.receiver_id.as_deref())
        .find(|r| !r.is_empty() && *r != self_id)
    {
        return Some(r.to_owned());
    }
    messages
        .iter()
        .filter(|m| m.sender_id == self_id)
        .find_map(|m| m.receiver_id.clone())
        .filter(|r| !r.is_empty())
}

/// Session-scoped `chat id → counterpart id` cache.
///
/// Written whenever a counterpart is confidently resolved, read only as a
/// last-resort fallback. Best-effort, never authoritative; last write wins.
#[derive(Debug, Default)]
pub struct ReceiverHints {
    entries: RwLock<HashMap<String, String>>,
}

impl ReceiverHints {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn store(&self, chat_id: &str, receiver_id: &str) {
        if chat_id.is_empty() || receiver_id.is_empty() {
            return;
        }
        self.entries.write().await.insert(chat_id.to_owned(), receiver_id.to_owned());
    }

    pub async fn lookup(&self, chat_id: &str) -> Option<String> {
        self.entries.read().await.get(chat_id).cloned()
    }

    /// Drop all hints (logout).
    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }
}

#[cfg(test)]
#[path = "resolver_tests.rs"]
mod tests;
