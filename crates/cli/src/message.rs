// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Message normalization — the adapter between loosely-typed wire payloads
//! and the one canonical message shape the rest of the pipeline consumes.
//!
//! REST history and realtime events name the same logical fields differently
//! (`content`/`message`/`text`, `senderId`/`from`, camel vs. snake case).
//! All of that guesswork lives here; downstream code only ever sees
//! [`ChatMessage`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Canonical chat message, independent of the wire shape it arrived in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub chat_id: Option<String>,
    /// Empty when the sender could not be recovered from any signal.
    pub sender_id: String,
    pub receiver_id: Option<String>,
    pub content: String,
    /// RFC 3339 string as received (or stamped at normalization time).
    pub timestamp: String,
}

impl ChatMessage {
    /// Ordering key: parsed epoch milliseconds. Unparseable timestamps sort
    /// as 0, sinking to the front of the history instead of being dropped.
    pub fn sort_key(&self) -> i64 {
        timestamp_millis(&self.timestamp)
    }
}

/// Context for filling fields the wire payload omits.
#[derive(Debug, Clone, Default)]
pub struct Fallback {
    /// The current user, when known.
    pub self_id: Option<String>,
    /// The conversation counterpart, when already resolved.
    pub receiver_id: Option<String>,
}

pub(crate) const CONTENT_KEYS: &[&str] = &["content", "message", "text"];
pub(crate) const SENDER_KEYS: &[&str] = &["senderId", "sender_id", "from", "sender"];
pub(crate) const RECEIVER_KEYS: &[&str] = &["receiverId", "receiver_id", "to"];
pub(crate) const CHAT_KEYS: &[&str] = &["chatId", "chat_id", "chat"];
pub(crate) const ID_KEYS: &[&str] = &["id", "_id"];
pub(crate) const TIMESTAMP_KEYS: &[&str] = &["timestamp", "createdAt", "created_at"];

/// Normalize one raw message record.
///
/// Returns `None` when no content alias is populated — such an event is
/// unusable and must be silently discarded, never defaulted to an empty
/// string. Never panics, whatever the input shape.
pub fn normalize(raw: &Value, fallback: &Fallback) -> Option<ChatMessage> {
    if !raw.is_object() {
        return None;
    }

    let content = string_field(raw, CONTENT_KEYS)?;

    let mut sender_id = string_field(raw, SENDER_KEYS).unwrap_or_default();
    let mut receiver_id = string_field(raw, RECEIVER_KEYS);

    // An event that omits the sender but arrived in a conversation with a
    // known counterpart implicitly came from that counterpart.
    if sender_id.is_empty() {
        if let Some(ref rid) = fallback.receiver_id {
            sender_id = rid.clone();
        }
    }

    // Infer the receiver: a message from the other side is addressed to us;
    // a self-sent echo needs the original recipient restored.
    if receiver_id.is_none() {
        if let Some(ref me) = fallback.self_id {
            if !sender_id.is_empty() && sender_id != *me {
                receiver_id = Some(me.clone());
            } else if sender_id == *me && fallback.receiver_id.is_some() {
                receiver_id = fallback.receiver_id.clone();
            }
        }
    }

    let id = string_field(raw, ID_KEYS).unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let timestamp =
        string_field(raw, TIMESTAMP_KEYS).unwrap_or_else(|| Utc::now().to_rfc3339());

    Some(ChatMessage {
        id,
        chat_id: string_field(raw, CHAT_KEYS),
        sender_id,
        receiver_id,
        content,
        timestamp,
    })
}

/// Unify list-shaped payloads: a bare array, or an array nested under the
/// conventional wrapper keys (`messages`, `data`, `data.messages`).
/// Unrecognized shapes yield an empty list.
pub fn extract_messages(payload: &Value) -> Vec<Value> {
    if let Some(arr) = payload.as_array() {
        return arr.clone();
    }
    let Some(obj) = payload.as_object() else {
        return Vec::new();
    };
    if let Some(arr) = obj.get("messages").and_then(Value::as_array) {
        return arr.clone();
    }
    match obj.get("data") {
        Some(Value::Array(arr)) => arr.clone(),
        Some(nested) => nested
            .get("messages")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default(),
        None => Vec::new(),
    }
}

/// Like [`extract_messages`], but treats a bare object as a one-element
/// batch — realtime events deliver single messages without a wrapper.
pub fn extract_event_batch(payload: &Value) -> Vec<Value> {
    let extracted = extract_messages(payload);
    if !extracted.is_empty() {
        return extracted;
    }
    if payload.is_object() {
        vec![payload.clone()]
    } else {
        Vec::new()
    }
}

/// Re-sort in place by parsed timestamp, ascending. The sort is stable, so
/// entries with equal (or equally unparseable) timestamps keep arrival order.
pub fn sort_by_timestamp(messages: &mut [ChatMessage]) {
    messages.sort_by_key(ChatMessage::sort_key);
}

/// Parse an RFC 3339 timestamp to epoch milliseconds; 0 on failure.
pub fn timestamp_millis(value: &str) -> i64 {
    DateTime::parse_from_rfc3339(value).map(|t| t.timestamp_millis()).unwrap_or(0)
}

/// First populated alias among `keys`: a non-blank string, or a number
/// rendered as its decimal string (ids cross the wire both ways).
pub(crate) fn string_field(raw: &Value, keys: &[&str]) -> Option<String> {
    for key in keys {
        match raw.get(key) {
            Some(Value::String(s)) if !s.trim().is_empty() => return Some(s.clone()),
            Some(Value::Number(n)) => return Some(n.to_string()),
            _ => {}
        }
    }
    None
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
