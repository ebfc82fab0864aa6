// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end pipeline scenarios against the mock backend: the real library,
//! real HTTP, and a real WebSocket.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use hitch::api::ApiClient;
use hitch::convo::Conversation;
use hitch::inbox::Inbox;
use hitch::message::timestamp_millis;
use hitch::presence::run_presence;
use hitch::session::Session;
use hitch::toast::{run_router, Toast, Toaster};
use hitch_specs::MockBackend;

const TIMEOUT: Duration = Duration::from_secs(5);

fn session_for(backend: &MockBackend) -> Arc<Session> {
    let _ = rustls::crypto::ring::default_provider().install_default();
    Arc::new(Session::new(
        ApiClient::new(&backend.base_url, TIMEOUT),
        &backend.ws_url,
    ))
}

/// Scenario A: a brand-new chat with participant metadata but no history.
/// The resolver finds the counterpart from the metadata and a send succeeds
/// with no further input.
#[tokio::test]
async fn new_chat_resolves_receiver_and_sends() -> anyhow::Result<()> {
    let backend = MockBackend::start().await?;
    backend.add_chat(json!({"id": "5", "participants": ["U1", "U2"]}));
    let session = session_for(&backend);

    let mut convo = Conversation::load(&session, "5").await?;
    assert_eq!(convo.receiver_id, Some("U2".to_owned()));
    assert!(convo.messages().is_empty());

    let before = chrono::Utc::now().timestamp_millis();
    convo.send(&session, "hi").await?;

    let messages = convo.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].sender_id, "U1");
    assert_eq!(messages[0].content, "hi");
    assert!(timestamp_millis(&messages[0].timestamp) >= before);

    // The wire carried the resolved receiver.
    let sent = backend.sent_messages();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0]["receiverId"], "U2");
    assert_eq!(sent[0]["senderId"], "U1");
    Ok(())
}

/// Scenario B: REST history and the live stream deliver the same message id;
/// the thread shows exactly one entry.
#[tokio::test]
async fn duplicate_delivery_across_feeds_merges_to_one() -> anyhow::Result<()> {
    let backend = MockBackend::start().await?;
    backend.add_chat(json!({"id": "5", "participants": ["U1", "U2"]}));
    backend.add_message(
        "5",
        json!({"id": "m1", "senderId": "U2", "content": "hi",
               "timestamp": "2024-01-01T10:00:00Z"}),
    );
    let session = session_for(&backend);

    let mut convo = Conversation::load(&session, "5").await?;
    assert_eq!(convo.messages().len(), 1);

    session.ensure_connected().await?;
    let mut events = session.socket.subscribe();
    backend.push_event(
        "receive-message",
        json!({"id": "m1", "chatId": "5", "senderId": "U2", "content": "hi",
               "timestamp": "2024-01-01T10:00:00Z"}),
    );

    let event = tokio::time::timeout(TIMEOUT, events.recv()).await??;
    convo.apply_event(&session.hints, &event.payload).await;

    assert_eq!(convo.messages().len(), 1);
    Ok(())
}

/// Scenario C: inbox search matches the resolved counterpart name and does
/// not match unrelated rows.
#[tokio::test]
async fn inbox_search_matches_counterpart_names() -> anyhow::Result<()> {
    let backend = MockBackend::start().await?;
    backend.add_chat(json!({
        "id": "5", "participants": ["U1", "U2"],
        "lastMessage": {"content": "see you tomorrow", "createdAt": "2024-01-02T00:00:00Z"},
    }));
    backend.add_chat(json!({
        "id": "6", "participants": ["U1", "U3"],
        "lastMessage": {"content": "ride at nine", "createdAt": "2024-01-03T00:00:00Z"},
    }));
    let session = session_for(&backend);

    let inbox = Inbox::load(&session).await?;
    assert_eq!(inbox.rows.len(), 2);

    let hits = inbox.filter("joana");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].chat_id, "5");
    assert_eq!(hits[0].counterpart_name, "Joana Silva");

    // Carlos's row matches neither by name nor by last message.
    assert!(inbox.filter("joana").iter().all(|row| row.chat_id != "6"));
    Ok(())
}

/// Live events for the open thread are suppressed; events for other threads
/// toast with a navigation action.
#[tokio::test]
async fn router_suppresses_the_active_thread() -> anyhow::Result<()> {
    let backend = MockBackend::start().await?;
    let session = session_for(&backend);
    session.ensure_connected().await?;
    session.set_active_chat(Some("7".to_owned())).await;

    let toaster = Toaster::default();
    let mut toast_rx = toaster.subscribe();
    let shutdown = CancellationToken::new();
    tokio::spawn(run_router(
        Arc::clone(&session),
        toaster.clone(),
        Duration::from_secs(60),
        shutdown.clone(),
    ));
    // Let the router finish its identity fetch and subscribe.
    tokio::time::sleep(Duration::from_millis(300)).await;

    backend.push_event(
        "receive-message",
        json!({"chatId": "7", "senderId": "U2", "message": "suppressed"}),
    );
    backend.push_event(
        "receive-message",
        json!({"chatId": "9", "senderId": "U2", "message": "toasted"}),
    );

    let toasts: Vec<Toast> = tokio::time::timeout(TIMEOUT, async {
        loop {
            if toast_rx.changed().await.is_err() {
                return Vec::new();
            }
            let current = toast_rx.borrow_and_update().clone();
            if !current.is_empty() {
                return current;
            }
        }
    })
    .await?;

    // Only the chat-9 event survived the pipeline.
    assert_eq!(toasts.len(), 1);
    assert_eq!(toasts[0].description, "toasted");
    assert_eq!(toasts[0].action_href.as_deref(), Some("/messages/9"));

    shutdown.cancel();
    Ok(())
}

/// Self-authored echoes never toast.
#[tokio::test]
async fn router_drops_own_echoes() -> anyhow::Result<()> {
    let backend = MockBackend::start().await?;
    let session = session_for(&backend);
    session.ensure_connected().await?;

    let toaster = Toaster::default();
    let mut toast_rx = toaster.subscribe();
    let shutdown = CancellationToken::new();
    tokio::spawn(run_router(
        Arc::clone(&session),
        toaster.clone(),
        Duration::from_secs(60),
        shutdown.clone(),
    ));
    tokio::time::sleep(Duration::from_millis(300)).await;

    backend.push_event(
        "receive-message",
        json!({"chatId": "9", "senderId": "U1", "message": "own echo"}),
    );
    backend.push_event(
        "receive-notification",
        json!({"message": "Ride confirmed"}),
    );

    let toasts: Vec<Toast> = tokio::time::timeout(TIMEOUT, async {
        loop {
            if toast_rx.changed().await.is_err() {
                return Vec::new();
            }
            let current = toast_rx.borrow_and_update().clone();
            if !current.is_empty() {
                return current;
            }
        }
    })
    .await?;

    // The echo was dropped; the notification toasted.
    assert_eq!(toasts.len(), 1);
    assert_eq!(toasts[0].description, "Ride confirmed");

    shutdown.cancel();
    Ok(())
}

/// Presence: fresh count on connect, then live updates, and stopping leaves
/// the shared connection up.
#[tokio::test]
async fn presence_tracks_the_live_count() -> anyhow::Result<()> {
    let backend = MockBackend::start().await?;
    backend.set_online(3);
    let session = session_for(&backend);

    let (count_tx, mut count_rx) = watch::channel(None);
    let shutdown = CancellationToken::new();
    let task = tokio::spawn(run_presence(
        Arc::clone(&session),
        count_tx,
        shutdown.clone(),
    ));

    tokio::time::timeout(TIMEOUT, count_rx.changed()).await??;
    assert_eq!(*count_rx.borrow_and_update(), Some(3));

    backend.push_event("online-users", json!({"count": 9}));
    tokio::time::timeout(TIMEOUT, count_rx.changed()).await??;
    assert_eq!(*count_rx.borrow_and_update(), Some(9));

    shutdown.cancel();
    task.await?;
    assert!(session.socket.connected());
    Ok(())
}

/// Find-or-create: an existing pair navigates to the existing chat; a new
/// pair creates one on the backend.
#[tokio::test]
async fn find_or_create_reuses_or_creates() -> anyhow::Result<()> {
    let backend = MockBackend::start().await?;
    backend.add_chat(json!({"id": "5", "participants": ["U1", "U2"]}));
    let session = session_for(&backend);

    let mut inbox = Inbox::load(&session).await?;
    assert_eq!(inbox.find_or_create(&session, "U2").await?, "5");

    let created = inbox.find_or_create(&session, "U3").await?;
    assert!(created.starts_with('c'));
    assert_eq!(inbox.rows[0].chat_id, created);
    assert_eq!(inbox.rows[0].counterpart_name, "Carlos");

    // A reload now sees the backend-created chat too.
    let reloaded = Inbox::load(&session).await?;
    assert!(reloaded.rows.iter().any(|row| row.chat_id == created));
    Ok(())
}
