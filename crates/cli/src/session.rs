// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-wide shared session state.
//!
//! Constructed once near application start and handed by `Arc` to every
//! component. The realtime connection lifecycle (connect/disconnect) is owned
//! here; everything else only subscribes.

use tokio::sync::RwLock;

use crate::alert::AlertBus;
use crate::api::ApiClient;
use crate::resolver::ReceiverHints;
use crate::socket::Socket;

pub struct Session {
    pub api: ApiClient,
    pub socket: Socket,
    pub hints: ReceiverHints,
    pub alerts: AlertBus,
    socket_url: String,
    me: RwLock<Option<String>>,
    active_chat: RwLock<Option<String>>,
}

impl Session {
    pub fn new(api: ApiClient, socket_url: &str) -> Self {
        Self {
            api,
            socket: Socket::new(),
            hints: ReceiverHints::new(),
            alerts: AlertBus::new(),
            socket_url: socket_url.to_owned(),
            me: RwLock::new(None),
            active_chat: RwLock::new(None),
        }
    }

    /// The authenticated user's id, fetched once and cached for the session.
    pub async fn current_user(&self) -> anyhow::Result<String> {
        if let Some(id) = self.me.read().await.clone() {
            return Ok(id);
        }
        let id = self.api.current_user().await?;
        *self.me.write().await = Some(id.clone());
        Ok(id)
    }

    /// Cached identity, if already fetched. Never triggers a request.
    pub async fn cached_user(&self) -> Option<String> {
        self.me.read().await.clone()
    }

    /// The conversation currently on screen, used for toast suppression.
    pub async fn set_active_chat(&self, chat_id: Option<String>) {
        *self.active_chat.write().await = chat_id;
    }

    pub async fn active_chat(&self) -> Option<String> {
        self.active_chat.read().await.clone()
    }

    /// Connector: fetch a realtime token and connect the shared transport.
    ///
    /// A token fetch failure is logged and the connect is still attempted —
    /// the handshake may succeed on an existing backend session. A connect
    /// failure leaves live updates absent until a future call; it is never
    /// surfaced as a blocking error by callers.
    pub async fn ensure_connected(&self) -> anyhow::Result<()> {
        if self.socket.connected() {
            return Ok(());
        }
        let token = match self.api.token().await {
            Ok(token) => Some(token),
            Err(e) => {
                tracing::debug!(err = %e, "realtime token fetch failed, connecting without");
                None
            }
        };
        self.socket.connect(&self.socket_url, token.as_deref()).await
    }

    /// Authenticate and bring the realtime transport up with the fresh token.
    pub async fn login(&self, email: &str, password: &str) -> anyhow::Result<()> {
        let token = self.api.login(email, password).await?;
        *self.me.write().await = None;
        if !self.socket.connected() {
            self.socket.connect(&self.socket_url, token.as_deref()).await?;
        }
        Ok(())
    }

    /// Log out: the transport is always torn down and session-scoped state
    /// cleared, even when the logout request itself fails.
    pub async fn logout(&self) -> anyhow::Result<()> {
        let result = self.api.logout().await;
        self.socket.disconnect();
        self.hints.clear().await;
        *self.me.write().await = None;
        result
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
