// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test harness for end-to-end pipeline specs.
//!
//! Stands up a mock ride-share backend in-process — the REST surface and the
//! realtime WebSocket gateway — and lets tests drive the real client library
//! against it over actual sockets.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::sync::broadcast;

/// Shared state behind the mock backend.
pub struct BackendState {
    /// The id `GET /auth/userid` reports.
    pub current_user: Mutex<String>,
    pub users: Mutex<Vec<Value>>,
    pub chats: Mutex<Vec<Value>>,
    /// chat id → raw message records served by `GET /messages/chat/{id}`.
    pub messages: Mutex<HashMap<String, Vec<Value>>>,
    /// Captured bodies of `POST /messages`.
    pub sent: Mutex<Vec<Value>>,
    pub online: AtomicU64,
    next_chat: AtomicU64,
    frames: broadcast::Sender<String>,
}

/// A running mock backend bound to an ephemeral port.
pub struct MockBackend {
    pub base_url: String,
    pub ws_url: String,
    pub state: Arc<BackendState>,
}

impl MockBackend {
    pub async fn start() -> anyhow::Result<Self> {
        let (frames, _) = broadcast::channel(64);
        let state = Arc::new(BackendState {
            current_user: Mutex::new("U1".to_owned()),
            users: Mutex::new(vec![
                json!({"id": "U1", "name": "Me"}),
                json!({"id": "U2", "name": "Joana Silva"}),
                json!({"id": "U3", "name": "Carlos"}),
            ]),
            chats: Mutex::new(Vec::new()),
            messages: Mutex::new(HashMap::new()),
            sent: Mutex::new(Vec::new()),
            online: AtomicU64::new(0),
            next_chat: AtomicU64::new(100),
            frames,
        });

        let router = build_router(Arc::clone(&state));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });

        Ok(Self {
            base_url: format!("http://{addr}"),
            ws_url: format!("ws://{addr}/ws"),
            state,
        })
    }

    pub fn add_chat(&self, chat: Value) {
        if let Ok(mut chats) = self.state.chats.lock() {
            chats.push(chat);
        }
    }

    pub fn add_message(&self, chat_id: &str, message: Value) {
        if let Ok(mut messages) = self.state.messages.lock() {
            messages.entry(chat_id.to_owned()).or_default().push(message);
        }
    }

    pub fn set_online(&self, count: u64) {
        self.state.online.store(count, Ordering::Relaxed);
    }

    /// Broadcast a realtime event to every connected WS client.
    pub fn push_event(&self, event: &str, data: Value) {
        let frame = json!({"event": event, "data": data}).to_string();
        let _ = self.state.frames.send(frame);
    }

    /// Bodies captured by `POST /messages`.
    pub fn sent_messages(&self) -> Vec<Value> {
        self.state.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }
}

fn build_router(state: Arc<BackendState>) -> Router {
    Router::new()
        .route("/auth/userid", get(current_user))
        .route("/auth/token", get(|| async { Json(json!({"token": "spec-token"})) }))
        .route("/users", get(list_users))
        .route("/users/id/{id}", get(user_by_id))
        .route("/chats", get(list_chats).post(create_chat))
        .route("/messages/chat/{id}", get(chat_messages))
        .route("/messages", post(send_message))
        .route("/ws", get(ws_upgrade))
        .with_state(state)
}

async fn current_user(State(state): State<Arc<BackendState>>) -> Json<Value> {
    let id = state.current_user.lock().map(|id| id.clone()).unwrap_or_default();
    Json(json!({"id": id}))
}

async fn list_users(State(state): State<Arc<BackendState>>) -> Json<Value> {
    let users = state.users.lock().map(|u| u.clone()).unwrap_or_default();
    Json(Value::Array(users))
}

async fn user_by_id(
    State(state): State<Arc<BackendState>>,
    Path(id): Path<String>,
) -> Response {
    let users = state.users.lock().map(|u| u.clone()).unwrap_or_default();
    let found = users
        .iter()
        .find(|u| u.get("id").and_then(Value::as_str) == Some(id.as_str()))
        .cloned();
    match found {
        Some(user) => Json(user).into_response(),
        None => (axum::http::StatusCode::NOT_FOUND, "no such user").into_response(),
    }
}

async fn list_chats(State(state): State<Arc<BackendState>>) -> Json<Value> {
    let chats = state.chats.lock().map(|c| c.clone()).unwrap_or_default();
    Json(Value::Array(chats))
}

async fn create_chat(
    State(state): State<Arc<BackendState>>,
    Json(body): Json<Value>,
) -> Json<Value> {
    let id = format!("c{}", state.next_chat.fetch_add(1, Ordering::Relaxed));
    let chat = json!({
        "id": id,
        "participants": body.get("participants").cloned().unwrap_or(Value::Null),
    });
    if let Ok(mut chats) = state.chats.lock() {
        chats.push(chat.clone());
    }
    Json(chat)
}

async fn chat_messages(
    State(state): State<Arc<BackendState>>,
    Path(id): Path<String>,
) -> Json<Value> {
    let messages = state
        .messages
        .lock()
        .ok()
        .and_then(|m| m.get(&id).cloned())
        .unwrap_or_default();
    Json(json!({"messages": messages}))
}

async fn send_message(
    State(state): State<Arc<BackendState>>,
    Json(body): Json<Value>,
) -> Json<Value> {
    if let Ok(mut sent) = state.sent.lock() {
        sent.push(body.clone());
    }
    // The backend also persists it into the chat's history.
    if let Some(chat_id) = body.get("chatId").and_then(Value::as_str) {
        if let Ok(mut messages) = state.messages.lock() {
            messages.entry(chat_id.to_owned()).or_default().push(body);
        }
    }
    Json(json!({}))
}

async fn ws_upgrade(
    ws: WebSocketUpgrade,
    State(state): State<Arc<BackendState>>,
) -> Response {
    ws.on_upgrade(move |socket| ws_client(socket, state))
}

/// Per-client loop: forward broadcast frames, answer count requests.
async fn ws_client(mut socket: WebSocket, state: Arc<BackendState>) {
    let mut frames = state.frames.subscribe();
    loop {
        tokio::select! {
            frame = frames.recv() => {
                match frame {
                    Ok(text) => {
                        if socket.send(WsMessage::Text(text.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(WsMessage::Text(text))) => {
                        let request: Value =
                            serde_json::from_str(text.as_str()).unwrap_or(Value::Null);
                        if request.get("event").and_then(Value::as_str)
                            == Some("get-online-users")
                        {
                            let count = state.online.load(Ordering::Relaxed);
                            let reply =
                                json!({"event": "online-users", "data": {"count": count}})
                                    .to_string();
                            if socket.send(WsMessage::Text(reply.into())).await.is_err() {
                                break;
                            }
                        }
                    }
                    Some(Ok(WsMessage::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(_)) => break,
                }
            }
        }
    }
}
