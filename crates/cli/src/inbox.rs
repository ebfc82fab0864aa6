// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Conversation list: one row per chat, annotated with the resolved
//! counterpart and the most recent message, plus the new-chat picker.

use anyhow::Context;
use serde_json::Value;

use crate::api::{id_of, UserSummary};
use crate::convo::Participant;
use crate::error::ErrorCode;
use crate::message::timestamp_millis;
use crate::session::Session;

/// Preview of a conversation's most recent message. Either field may be
/// missing on sparse chat summaries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastMessage {
    pub content: Option<String>,
    pub timestamp: Option<String>,
}

/// One inbox row.
#[derive(Debug, Clone)]
pub struct InboxRow {
    pub chat_id: String,
    pub participants: Vec<Participant>,
    pub counterpart_id: Option<String>,
    pub counterpart_name: String,
    pub last_message: Option<LastMessage>,
}

/// The loaded conversation list and user directory.
#[derive(Debug)]
pub struct Inbox {
    pub self_id: String,
    pub rows: Vec<InboxRow>,
    pub users: Vec<UserSummary>,
}

impl Inbox {
    /// Build one row per chat. Name lookups fail independently per
    /// participant; a directory fetch failure only leaves the picker empty.
    /// A chat-list fetch failure fails the load (`LOAD_FAILED` at the view).
    pub async fn load(session: &Session) -> anyhow::Result<Self> {
        let self_id = session.current_user().await?;

        let users = match session.api.list_users().await {
            Ok(users) => users,
            Err(e) => {
                tracing::debug!(err = %e, "user directory unavailable, picker disabled");
                Vec::new()
            }
        };

        let chats = session
            .api
            .list_chats()
            .await
            .context(ErrorCode::LoadFailed.user_message())?;
        let mut rows = Vec::with_capacity(chats.len());
        for chat in &chats {
            rows.push(build_row(session, &self_id, chat).await);
        }

        Ok(Self { self_id, rows, users })
    }

    /// Case-insensitive substring filter against the counterpart name or the
    /// last-message content. A blank term shows all rows.
    pub fn filter(&self, term: &str) -> Vec<&InboxRow> {
        let term = term.trim().to_lowercase();
        if term.is_empty() {
            return self.rows.iter().collect();
        }
        self.rows
            .iter()
            .filter(|row| {
                if row.counterpart_name.to_lowercase().contains(&term) {
                    return true;
                }
                row.last_message
                    .as_ref()
                    .and_then(|last| last.content.as_deref())
                    .is_some_and(|content| content.to_lowercase().contains(&term))
            })
            .collect()
    }

    /// Rank the user directory for the new-chat picker: name-prefix matches
    /// first, then name-infix, id-prefix, id-infix; ties alphabetical; top 3.
    pub fn suggest_users(&self, term: &str) -> Vec<&UserSummary> {
        let term = term.trim().to_lowercase();
        if term.is_empty() {
            return Vec::new();
        }
        let mut scored: Vec<(u8, &UserSummary)> = self
            .users
            .iter()
            .filter(|user| user.id != self.self_id)
            .filter_map(|user| {
                let name = user.name.to_lowercase();
                let id = user.id.to_lowercase();
                let score = if name.starts_with(&term) {
                    0
                } else if name.contains(&term) {
                    1
                } else if id.starts_with(&term) {
                    2
                } else if id.contains(&term) {
                    3
                } else {
                    return None;
                };
                Some((score, user))
            })
            .collect();
        scored.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.name.cmp(&b.1.name)));
        scored.into_iter().take(3).map(|(_, user)| user).collect()
    }

    /// Navigate-or-create for "start a chat with `target`": reuse the
    /// existing chat for this pair when one is loaded, otherwise create one
    /// and prepend an optimistic placeholder row. Returns the chat id to
    /// navigate to. Racing creates may still produce duplicates server-side;
    /// that is tolerated here.
    pub async fn find_or_create(
        &mut self,
        session: &Session,
        target: &str,
    ) -> anyhow::Result<String> {
        let target = target.trim();
        if target.is_empty() {
            anyhow::bail!("no chat target");
        }

        let existing = self.rows.iter().find(|row| {
            let ids: Vec<&str> = row.participants.iter().map(|p| p.id.as_str()).collect();
            ids.contains(&self.self_id.as_str()) && ids.contains(&target)
        });
        if let Some(row) = existing {
            let chat_id = row.chat_id.clone();
            session.hints.store(&chat_id, target).await;
            return Ok(chat_id);
        }

        match session.api.create_chat(&self.self_id, target).await {
            Ok(chat_id) => {
                session.hints.store(&chat_id, target).await;
                let target_name = self
                    .users
                    .iter()
                    .find(|user| user.id == target)
                    .map(|user| user.name.clone())
                    .unwrap_or_else(|| target.to_owned());
                self.rows.insert(
                    0,
                    InboxRow {
                        chat_id: chat_id.clone(),
                        participants: vec![
                            Participant { id: self.self_id.clone(), name: "You".into() },
                            Participant { id: target.to_owned(), name: target_name.clone() },
                        ],
                        counterpart_id: Some(target.to_owned()),
                        counterpart_name: target_name,
                        last_message: None,
                    },
                );
                Ok(chat_id)
            }
            Err(e) => {
                tracing::warn!(target, err = %e, "chat creation failed");
                session.alerts.show_error(ErrorCode::CreateChatFailed);
                Err(e)
            }
        }
    }
}

async fn build_row(session: &Session, self_id: &str, chat: &Value) -> InboxRow {
    let participant_ids: Vec<String> = chat
        .get("participants")
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(id_of).collect())
        .unwrap_or_default();

    let chat_id = id_of(chat).unwrap_or_else(|| participant_ids.join("-"));

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

    let counterpart = participants.iter().find(|p| p.id != self_id);
    let counterpart_name = counterpart
        .or_else(|| participants.first())
        .map(|p| p.name.clone())
        .unwrap_or_else(|| "Chat".to_owned());

    InboxRow {
        chat_id,
        counterpart_id: counterpart.map(|p| p.id.clone()),
        counterpart_name,
        participants,
        last_message: last_message_of(chat),
    }
}

/// The most recent message attached to a chat summary: an embedded
/// `lastMessage` object when present, otherwise the maximum-timestamp entry
/// of an embedded `messages` array. Timestamp ties are not specially broken.
pub fn last_message_of(chat: &Value) -> Option<LastMessage> {
    if let Some(last) = chat.get("lastMessage") {
        if last.is_object() {
            return Some(LastMessage {
                content: text_of(last, "content"),
                timestamp: text_of(last, "timestamp").or_else(|| text_of(last, "createdAt")),
            });
        }
    }

    let messages = chat.get("messages").and_then(Value::as_array)?;
    let latest = messages.iter().max_by_key(|m| {
        text_of(m, "timestamp")
            .or_else(|| text_of(m, "createdAt"))
            .map(|t| timestamp_millis(&t))
            .unwrap_or(0)
    })?;
    Some(LastMessage {
        content: text_of(latest, "content"),
        timestamp: text_of(latest, "timestamp").or_else(|| text_of(latest, "createdAt")),
    })
}

fn text_of(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_owned)
}

#[cfg(test)]
#[path = "inbox_tests.rs"]
mod tests;
