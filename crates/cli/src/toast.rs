// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Notification routing: the application-wide consumer of the realtime
//! stream that decides which incoming events become visible toasts.
//!
//! Per event: self-authored messages are dropped, messages for the thread
//! currently on screen are suppressed (an event with no chat id is never
//! suppressed by that rule), recently-seen repeats are deduplicated, and
//! whatever survives lands on a small bounded stack with per-toast expiry.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::message::{string_field, CHAT_KEYS, CONTENT_KEYS, ID_KEYS, SENDER_KEYS, TIMESTAMP_KEYS};
use crate::session::Session;
use crate::socket::{SocketEvent, EVENT_RECEIVE_NOTIFICATION};

/// Concurrent toasts on screen; the oldest excess is evicted, not hidden.
pub const MAX_TOASTS: usize = 3;
/// Wall-clock lifetime of a toast unless dismissed earlier.
pub const TOAST_TTL: Duration = Duration::from_secs(6);
/// Repeats of an equivalent event inside this window produce one toast.
pub const DEDUPE_WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastKind {
    Message,
    Notification,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub id: String,
    pub kind: ToastKind,
    pub title: String,
    pub description: String,
    /// Click-to-navigate target; `None` for plain notifications.
    pub action_href: Option<String>,
}

// -- Decision core ------------------------------------------------------------

/// The per-event decision pipeline, separated from timers so it can be
/// driven with an explicit clock.
pub struct RouterCore {
    self_id: Option<String>,
    window: Duration,
    seen: HashMap<String, Instant>,
}

impl RouterCore {
    pub fn new(self_id: Option<String>, window: Duration) -> Self {
        Self { self_id, window, seen: HashMap::new() }
    }

    /// Run one event through the pipeline. Returns the toast to push, or
    /// `None` when the event is dropped.
    pub fn decide(
        &mut self,
        event: &SocketEvent,
        active_chat: Option<&str>,
        now: Instant,
    ) -> Option<Toast> {
        if event.is_chat_message() {
            return self.decide_message(&event.payload, active_chat, now);
        }
        if event.name == EVENT_RECEIVE_NOTIFICATION {
            return self.decide_notification(&event.payload, now);
        }
        None
    }

    fn decide_message(
        &mut self,
        payload: &Value,
        active_chat: Option<&str>,
        now: Instant,
    ) -> Option<Toast> {
        let sender = string_field(payload, SENDER_KEYS);
        if let (Some(me), Some(sender)) = (self.self_id.as_deref(), sender.as_deref()) {
            if sender == me {
                return None;
            }
        }

        let chat_id = string_field(payload, CHAT_KEYS);
        if let (Some(active), Some(chat)) = (active_chat, chat_id.as_deref()) {
            // The thread is already on screen; no toast. Events carrying no
            // chat id at all fall through.
            if chat == active {
                return None;
            }
        }

        if self.is_duplicate(dedupe_key(payload), now) {
            return None;
        }

        let description = string_field(payload, CONTENT_KEYS)
            .unwrap_or_else(|| "You received a new message.".to_owned());
        let action_href = match chat_id {
            Some(chat) => format!("/messages/{chat}"),
            None => "/messages".to_owned(),
        };
        Some(Toast {
            id: uuid::Uuid::new_v4().to_string(),
            kind: ToastKind::Message,
            title: "New message".to_owned(),
            description,
            action_href: Some(action_href),
        })
    }

    fn decide_notification(&mut self, payload: &Value, now: Instant) -> Option<Toast> {
        if self.is_duplicate(dedupe_key(payload), now) {
            return None;
        }
        let description = string_field(payload, CONTENT_KEYS)
            .unwrap_or_else(|| "You have a new notification.".to_owned());
        Some(Toast {
            id: uuid::Uuid::new_v4().to_string(),
            kind: ToastKind::Notification,
            title: "New notification".to_owned(),
            description,
            action_href: None,
        })
    }

    /// True when an equivalent event was seen within the window. Entries age
    /// out from their first sighting; repeats do not extend the window.
    fn is_duplicate(&mut self, key: String, now: Instant) -> bool {
        self.seen.retain(|_, at| now.duration_since(*at) < self.window);
        if self.seen.contains_key(&key) {
            return true;
        }
        self.seen.insert(key, now);
        false
    }
}

/// Equivalence key: the event's own id when present, otherwise the
/// chat+sender+timestamp+content composite.
fn dedupe_key(payload: &Value) -> String {
    if let Some(id) = string_field(payload, ID_KEYS) {
        return format!("id:{id}");
    }
    let part = |keys| string_field(payload, keys).unwrap_or_default();
    format!(
        "{}|{}|{}|{}",
        part(CHAT_KEYS),
        part(SENDER_KEYS),
        part(TIMESTAMP_KEYS),
        part(CONTENT_KEYS),
    )
}

// -- Bounded stack with expiry ------------------------------------------------

struct ToastEntry {
    toast: Toast,
    /// Cancelling this token aborts the pending expiry timer, so dismissal
    /// and expiry share one removal path without a double fire.
    expiry: CancellationToken,
}

struct ToasterInner {
    ttl: Duration,
    cap: usize,
    entries: Mutex<Vec<ToastEntry>>,
    snapshot_tx: watch::Sender<Vec<Toast>>,
}

/// Newest-first bounded toast stack. Cheap to clone; all clones share state.
#[derive(Clone)]
pub struct Toaster {
    inner: Arc<ToasterInner>,
}

impl Toaster {
    pub fn new(ttl: Duration, cap: usize) -> Self {
        let (snapshot_tx, _) = watch::channel(Vec::new());
        Self {
            inner: Arc::new(ToasterInner {
                ttl,
                cap,
                entries: Mutex::new(Vec::new()),
                snapshot_tx,
            }),
        }
    }

    /// Push a toast: newest first, oldest evicted past the cap, expiry timer
    /// armed.
    pub fn push(&self, toast: Toast) {
        let id = toast.id.clone();
        let expiry = CancellationToken::new();
        {
            let Ok(mut entries) = self.inner.entries.lock() else {
                return;
            };
            entries.insert(0, ToastEntry { toast, expiry: expiry.clone() });
            while entries.len() > self.inner.cap {
                if let Some(evicted) = entries.pop() {
                    evicted.expiry.cancel();
                }
            }
        }
        self.publish();

        let toaster = self.clone();
        let ttl = self.inner.ttl;
        tokio::spawn(async move {
            tokio::select! {
                _ = expiry.cancelled() => {}
                _ = tokio::time::sleep(ttl) => {
                    toaster.remove(&id);
                }
            }
        });
    }

    /// Dismiss a toast early. Shares the removal path with expiry.
    pub fn dismiss(&self, id: &str) {
        self.remove(id);
    }

    /// The click action: returns the navigation target and removes the toast
    /// immediately.
    pub fn open(&self, id: &str) -> Option<String> {
        let href = {
            let entries = self.inner.entries.lock().ok()?;
            entries
                .iter()
                .find(|e| e.toast.id == id)
                .and_then(|e| e.toast.action_href.clone())
        };
        self.remove(id);
        href
    }

    /// Current stack, newest first.
    pub fn snapshot(&self) -> Vec<Toast> {
        self.inner
            .entries
            .lock()
            .map(|entries| entries.iter().map(|e| e.toast.clone()).collect())
            .unwrap_or_default()
    }

    /// Observe stack changes.
    pub fn subscribe(&self) -> watch::Receiver<Vec<Toast>> {
        self.inner.snapshot_tx.subscribe()
    }

    fn remove(&self, id: &str) {
        let removed = {
            let Ok(mut entries) = self.inner.entries.lock() else {
                return;
            };
            match entries.iter().position(|e| e.toast.id == id) {
                Some(index) => {
                    let entry = entries.remove(index);
                    entry.expiry.cancel();
                    true
                }
                None => false, // already expired or dismissed
            }
        };
        if removed {
            self.publish();
        }
    }

    fn publish(&self) {
        let _ = self.inner.snapshot_tx.send(self.snapshot());
    }
}

impl Default for Toaster {
    fn default() -> Self {
        Self::new(TOAST_TTL, MAX_TOASTS)
    }
}

// -- Stream consumer ----------------------------------------------------------

/// Run the router for the application's lifetime: subscribe to the shared
/// transport, feed every event through the decision core, and push the
/// survivors. Cancellation unsubscribes and stops the task.
pub async fn run_router(
    session: Arc<Session>,
    toaster: Toaster,
    dedupe_window: Duration,
    shutdown: CancellationToken,
) {
    // Needed for the self-authored drop; a failure here just disables it.
    let self_id = session.current_user().await.ok();
    let mut core = RouterCore::new(self_id, dedupe_window);
    let mut rx = session.socket.subscribe();

    loop {
        let event = tokio::select! {
            _ = shutdown.cancelled() => break,
            event = rx.recv() => match event {
                Ok(event) => event,
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!("notification router lagged {n} events");
                    continue;
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            },
        };

        let active_chat = session.active_chat().await;
        if let Some(toast) = core.decide(&event, active_chat.as_deref(), Instant::now()) {
            tracing::info!(title = %toast.title, description = %toast.description, "toast");
            toaster.push(toast);
        }
    }
}

#[cfg(test)]
#[path = "toast_tests.rs"]
mod tests;
