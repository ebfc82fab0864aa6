// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP client for the ride-share REST API.
//!
//! Every response crosses the boundary as `serde_json::Value` and is
//! normalized here or by the caller; the backend is inconsistent about id
//! field names (`id` vs `_id` vs `userId`) and wrapper shapes, and those
//! differences must not leak past this module.

use std::time::Duration;

use reqwest::Client;
use serde_json::Value;

/// Minimal user record for display and the new-chat picker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserSummary {
    pub id: String,
    pub name: String,
}

/// Body of `POST /messages`.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingMessage {
    pub chat_id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub content: String,
    pub timestamp: String,
}

/// HTTP client wrapper for the ride-share backend.
pub struct ApiClient {
    base_url: String,
    client: Client,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        let client = Client::builder().timeout(timeout).build().unwrap_or_default();
        Self { base_url: base_url.trim_end_matches('/').to_owned(), client }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json(&self, path: &str) -> anyhow::Result<Value> {
        let resp = self.client.get(self.url(path)).send().await?;
        let value = resp.error_for_status()?.json().await?;
        Ok(value)
    }

    async fn post_json(&self, path: &str, body: &Value) -> anyhow::Result<Value> {
        let resp = self.client.post(self.url(path)).json(body).send().await?.error_for_status()?;
        let bytes = resp.bytes().await?;
        if bytes.is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// `GET /auth/userid` — the authenticated user's id. The backend returns
    /// either a bare id or an object carrying one.
    pub async fn current_user(&self) -> anyhow::Result<String> {
        let value = self.get_json("/auth/userid").await?;
        id_of(&value).ok_or_else(|| anyhow::anyhow!("no user id in response: {value}"))
    }

    /// `GET /auth/token` — credential for the realtime handshake.
    pub async fn token(&self) -> anyhow::Result<String> {
        let value = self.get_json("/auth/token").await?;
        match value.get("token").and_then(Value::as_str) {
            Some(token) if !token.is_empty() => Ok(token.to_owned()),
            _ => anyhow::bail!("no token in response"),
        }
    }

    /// `GET /users/id/{id}` — display name lookup. The name degrades to the
    /// email, then to the raw id, before the caller ever sees a failure.
    pub async fn user_by_id(&self, id: &str) -> anyhow::Result<UserSummary> {
        let value = self.get_json(&format!("/users/id/{id}")).await?;
        Ok(UserSummary { id: id.to_owned(), name: display_name(&value, id) })
    }

    /// `GET /users` — the user directory for the new-chat picker.
    /// Entries without any id are skipped.
    pub async fn list_users(&self) -> anyhow::Result<Vec<UserSummary>> {
        let value = self.get_json("/users").await?;
        let users = unwrap_array(&value)
            .iter()
            .filter_map(|u| {
                let id = id_of(u)?;
                let name = display_name(u, &id);
                Some(UserSummary { id, name })
            })
            .collect();
        Ok(users)
    }

    /// `GET /chats` — raw chat summaries for the current user.
    pub async fn list_chats(&self) -> anyhow::Result<Vec<Value>> {
        let value = self.get_json("/chats").await?;
        Ok(unwrap_array(&value))
    }

    /// `GET /messages/chat/{chat_id}` — raw history, array or wrapped array.
    pub async fn chat_messages(&self, chat_id: &str) -> anyhow::Result<Value> {
        self.get_json(&format!("/messages/chat/{chat_id}")).await
    }

    /// `POST /chats` — create a chat between two participants. Returns the
    /// created chat's id, falling back to the joined participant pair when
    /// the backend omits one.
    pub async fn create_chat(&self, a: &str, b: &str) -> anyhow::Result<String> {
        let body = serde_json::json!({ "participants": [a, b] });
        let value = self.post_json("/chats", &body).await?;
        Ok(id_of(&value).unwrap_or_else(|| format!("{a}-{b}")))
    }

    /// `POST /messages` — fire-and-forget send; only success/failure is
    /// consumed.
    pub async fn send_message(&self, message: &OutgoingMessage) -> anyhow::Result<()> {
        let body = serde_json::to_value(message)?;
        self.post_json("/messages", &body).await?;
        Ok(())
    }

    /// `POST /auth/login` — returns the realtime token when the backend
    /// includes one in the login response.
    pub async fn login(&self, email: &str, password: &str) -> anyhow::Result<Option<String>> {
        let body = serde_json::json!({ "email": email, "password": password });
        let value = self.post_json("/auth/login", &body).await?;
        Ok(value.get("token").and_then(Value::as_str).map(str::to_owned))
    }

    /// `POST /auth/logout`.
    pub async fn logout(&self) -> anyhow::Result<()> {
        self.post_json("/auth/logout", &Value::Null).await?;
        Ok(())
    }
}

/// Extract an id from a bare string/number or from `id`/`_id`/`userId`.
pub fn id_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Object(_) => ["id", "_id", "userId"]
            .iter()
            .find_map(|key| id_of(value.get(*key).unwrap_or(&Value::Null))),
        _ => None,
    }
}

/// Accept a bare array body or one wrapped under `data`.
fn unwrap_array(value: &Value) -> Vec<Value> {
    if let Some(arr) = value.as_array() {
        return arr.clone();
    }
    value.get("data").and_then(Value::as_array).cloned().unwrap_or_default()
}

fn display_name(value: &Value, id: &str) -> String {
    for key in ["name", "email"] {
        if let Some(name) = value.get(key).and_then(Value::as_str) {
            if !name.is_empty() {
                return name.to_owned();
            }
        }
    }
    id.to_owned()
}

#[cfg(test)]
#[path = "api_tests.rs"]
mod tests;
