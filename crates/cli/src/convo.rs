// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One open conversation: message history merged from the REST fetch and the
//! live stream, deduplicated by id and kept in timestamp order.
//!
//! The two feeds carry no ordering guarantee relative to each other — a
//! late-resolving history fetch may land under already-delivered live events.
//! Merge is idempotent and commutative, so arrival order never matters.

use anyhow::Context;
use chrono::Utc;
use serde_json::Value;

use crate::api::{id_of, OutgoingMessage};
use crate::error::ErrorCode;
use crate::message::{
    extract_event_batch, extract_messages, normalize, sort_by_timestamp, ChatMessage, Fallback,
};
use crate::resolver::{resolve_counterpart, ReceiverHints};
use crate::session::Session;

/// A chat participant with its resolved display name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub id: String,
    pub name: String,
}

/// View state for a single open thread. Rebuilt on navigation; never
/// persisted beyond the session-scoped receiver hint.
#[derive(Debug)]
pub struct Conversation {
    pub chat_id: String,
    pub self_id: String,
    pub participants: Vec<Participant>,
    pub receiver_id: Option<String>,
    messages: Vec<ChatMessage>,
}

impl Conversation {
    /// Load chat metadata, display names, and history, then resolve the
    /// counterpart. A failed per-participant name lookup degrades to the raw
    /// id; a failed history or chat-list fetch fails the whole load (the
    /// caller surfaces it as a view-level `LOAD_FAILED`).
    pub async fn load(session: &Session, chat_id: &str) -> anyhow::Result<Self> {
        let self_id = session.current_user().await?;

        let chats = session
            .api
            .list_chats()
            .await
            .context(ErrorCode::LoadFailed.user_message())?;
        let participant_ids: Vec<String> = chats
            .iter()
            .find(|c| id_of(c).as_deref() == Some(chat_id))
            .and_then(|c| c.get("participants").and_then(Value::as_array))
            .map(|arr| arr.iter().filter_map(id_of).collect())
            .unwrap_or_default();

        let mut participants = Vec::with_capacity(participant_ids.len());
        for pid in &participant_ids {
            match session.api.user_by_id(pid).await {
                Ok(user) => participants.push(Participant { id: user.id, name: user.name }),
                Err(e) => {
                    tracing::debug!(user = %pid, err = %e, "name lookup failed, showing raw id");
                    participants.push(Participant { id: pid.clone(), name: pid.clone() });
                }
            }
        }

        let history = session
            .api
            .chat_messages(chat_id)
            .await
            .context(ErrorCode::LoadFailed.user_message())?;
        let fallback = Fallback { self_id: Some(self_id.clone()), receiver_id: None };
        let mut messages: Vec<ChatMessage> = extract_messages(&history)
            .iter()
            .filter_map(|raw| normalize(raw, &fallback))
            .collect();
        sort_by_timestamp(&mut messages);

        let mut convo = Self {
            chat_id: chat_id.to_owned(),
            self_id,
            participants,
            receiver_id: None,
            messages,
        };

        convo.receiver_id =
            resolve_counterpart(&convo.self_id, &participant_ids, &convo.messages);
        match convo.receiver_id {
            Some(ref receiver) => session.hints.store(chat_id, receiver).await,
            None => convo.receiver_id = session.hints.lookup(chat_id).await,
        }

        Ok(convo)
    }

    /// Messages in display order (timestamp ascending).
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// The counterpart's display name, when known.
    pub fn counterpart_name(&self) -> Option<&str> {
        self.participants
            .iter()
            .find(|p| p.id != self.self_id)
            .map(|p| p.name.as_str())
    }

    /// Merge one canonical message: no-op on a duplicate id, otherwise append
    /// and re-sort. Returns whether the message was appended.
    pub fn merge(&mut self, incoming: ChatMessage) -> bool {
        if self.messages.iter().any(|m| m.id == incoming.id) {
            return false;
        }
        self.messages.push(incoming);
        sort_by_timestamp(&mut self.messages);
        true
    }

    /// Ingest a realtime payload (single message or batch).
    ///
    /// Payloads naming a different chat are skipped; payloads without any
    /// chat id are accepted opportunistically. A message from the other side
    /// also refreshes the resolved receiver and its session hint.
    pub async fn apply_event(&mut self, hints: &ReceiverHints, payload: &Value) {
        for raw in extract_event_batch(payload) {
            let fallback = Fallback {
                self_id: Some(self.self_id.clone()),
                receiver_id: self.receiver_id.clone(),
            };
            let Some(message) = normalize(&raw, &fallback) else {
                continue;
            };
            if let Some(ref chat_id) = message.chat_id {
                if *chat_id != self.chat_id {
                    continue;
                }
            }

            let sender = message.sender_id.clone();
            self.merge(message);

            if !sender.is_empty() && sender != self.self_id {
                self.receiver_id = Some(sender.clone());
                hints.store(&self.chat_id, &sender).await;
            }
        }
    }

    /// Send a message: receiver must be resolved (else the send is blocked
    /// with a danger alert), then POST and optimistically append a local copy
    /// without waiting for any echo.
    ///
    /// The local copy carries a client-generated id; if the backend echoes
    /// the same logical message under a server id, merge-by-id will not
    /// suppress it (see DESIGN.md).
    pub async fn send(&mut self, session: &Session, content: &str) -> anyhow::Result<()> {
        let content = content.trim();
        if content.is_empty() {
            return Ok(());
        }
        let Some(receiver_id) = self.receiver_id.clone() else {
            session.alerts.show_error(ErrorCode::NoReceiver);
            anyhow::bail!("{}", ErrorCode::NoReceiver);
        };

        let now = Utc::now().to_rfc3339();
        let outgoing = OutgoingMessage {
            chat_id: self.chat_id.clone(),
            sender_id: self.self_id.clone(),
            receiver_id: receiver_id.clone(),
            content: content.to_owned(),
            timestamp: now.clone(),
        };

        match session.api.send_message(&outgoing).await {
            Ok(()) => {
                self.merge(ChatMessage {
                    id: uuid::Uuid::new_v4().to_string(),
                    chat_id: Some(self.chat_id.clone()),
                    sender_id: self.self_id.clone(),
                    receiver_id: Some(receiver_id),
                    content: content.to_owned(),
                    timestamp: now,
                });
                Ok(())
            }
            Err(e) => {
                tracing::warn!(chat = %self.chat_id, err = %e, "message send failed");
                session.alerts.show_error(ErrorCode::SendFailed);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
#[path = "convo_tests.rs"]
mod tests;
