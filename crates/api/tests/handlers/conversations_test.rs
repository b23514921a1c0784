use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use axum::http::StatusCode;
use chrono::Utc;
use fake::{Fake, faker::lorem::en::Sentence};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use slotsync_core::{
    errors::SyncError,
    models::message::{Message, MessageStatus},
};

use crate::test_utils::TestContext;

fn open_body() -> Value {
    json!({ "conversationId": "c1", "userId": "alice", "peerId": "bob" })
}

/// Backend with an empty history whose sends fail while `down` is set.
fn chat_backend(down: Arc<AtomicBool>) -> TestContext {
    let mut ctx = TestContext::new();
    ctx.backend
        .expect_message_history()
        .returning(|_, _, _| Ok(Vec::new()));
    ctx.backend.expect_send_message().returning(move |request| {
        if down.load(Ordering::SeqCst) {
            return Err(SyncError::Transport(eyre::eyre!("backend returned 503")));
        }
        Ok(Message {
            id: format!("srv-{}", request.temp_id),
            temp_id: Some(request.temp_id),
            conversation_id: request.conversation_id,
            from: request.from,
            to: request.to,
            text: request.text,
            file_ref: request.file_ref,
            timestamp: Utc::now(),
            status: MessageStatus::Sent,
        })
    });
    ctx
}

#[tokio::test]
async fn test_open_and_send() {
    let (server, _) = chat_backend(Arc::new(AtomicBool::new(false))).server();

    let opened = server.post("/api/views/conversations").json(&open_body()).await;
    opened.assert_status(StatusCode::CREATED);
    let id = opened.json::<Value>()["id"].as_str().unwrap().to_string();

    let text: String = Sentence(2..6).fake();
    let sent = server
        .post(&format!("/api/views/conversations/{id}/messages"))
        .json(&json!({ "text": text }))
        .await;

    sent.assert_status(StatusCode::CREATED);
    let message = sent.json::<Message>();
    assert!(message.id.starts_with("srv-tmp-"));
    assert_eq!(message.text, text);
    assert_eq!(message.status, MessageStatus::Sent);

    let view = server
        .get(&format!("/api/views/conversations/{id}"))
        .await
        .json::<Value>();
    assert_eq!(view["messages"].as_array().unwrap().len(), 1);
    assert_eq!(view["offline"], json!(false));
}

#[tokio::test]
async fn test_failed_send_stays_visible_and_can_be_retried() {
    let down = Arc::new(AtomicBool::new(true));
    let (server, _) = chat_backend(down.clone()).server();
    let id = server
        .post("/api/views/conversations")
        .json(&open_body())
        .await
        .json::<Value>()["id"]
        .as_str()
        .unwrap()
        .to_string();

    let failed = server
        .post(&format!("/api/views/conversations/{id}/messages"))
        .json(&json!({ "text": "are you there?" }))
        .await;
    failed.assert_status(StatusCode::BAD_GATEWAY);

    let view = server
        .get(&format!("/api/views/conversations/{id}"))
        .await
        .json::<Value>();
    let entry = &view["messages"][0];
    assert_eq!(entry["status"], json!("failed"));
    let failed_id = entry["id"].as_str().unwrap().to_string();

    down.store(false, Ordering::SeqCst);
    let retried = server
        .post(&format!(
            "/api/views/conversations/{id}/messages/{failed_id}/retry"
        ))
        .await;
    retried.assert_status(StatusCode::CREATED);

    let view = server
        .get(&format!("/api/views/conversations/{id}"))
        .await
        .json::<Value>();
    let statuses: Vec<&str> = view["messages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["status"].as_str().unwrap())
        .collect();
    assert_eq!(statuses, vec!["failed", "sent"]);
}

#[tokio::test]
async fn test_empty_message_is_rejected() {
    let (server, _) = chat_backend(Arc::new(AtomicBool::new(false))).server();
    let id = server
        .post("/api/views/conversations")
        .json(&open_body())
        .await
        .json::<Value>()["id"]
        .as_str()
        .unwrap()
        .to_string();

    let response = server
        .post(&format!("/api/views/conversations/{id}/messages"))
        .json(&json!({ "text": "" }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_typing_is_coalesced_and_needs_connection() {
    let (server, state) = chat_backend(Arc::new(AtomicBool::new(false))).server();
    let id = server
        .post("/api/views/conversations")
        .json(&open_body())
        .await
        .json::<Value>()["id"]
        .as_str()
        .unwrap()
        .to_string();
    let typing = format!("/api/views/conversations/{id}/typing");

    assert_eq!(server.post(&typing).await.json::<Value>(), json!({ "emitted": true }));
    assert_eq!(server.post(&typing).await.json::<Value>(), json!({ "emitted": false }));

    state.hub.set_connected(false);
    let view = server
        .get(&format!("/api/views/conversations/{id}"))
        .await
        .json::<Value>();
    assert_eq!(view["offline"], json!(true));
}

#[tokio::test]
async fn test_pushed_message_appears_once() {
    let (server, _) = chat_backend(Arc::new(AtomicBool::new(false))).server();
    let id = server
        .post("/api/views/conversations")
        .json(&open_body())
        .await
        .json::<Value>()["id"]
        .as_str()
        .unwrap()
        .to_string();
    let incoming = json!({
        "room": "conversation:c1",
        "event": "newMessage",
        "data": {
            "id": "m1",
            "conversationId": "c1",
            "from": "bob",
            "to": "alice",
            "text": "running late",
            "createdAt": "2024-05-06T09:00:00Z"
        }
    });

    server.post("/api/push").json(&incoming).await;
    server.post("/api/push").json(&incoming).await;

    let view = server
        .get(&format!("/api/views/conversations/{id}"))
        .await
        .json::<Value>();
    let messages = view["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["status"], json!("sent"));
}

#[tokio::test]
async fn test_load_older_reports_added() {
    let mut ctx = TestContext::new();
    ctx.backend
        .expect_message_history()
        .returning(|_, page, _| {
            if page > 1 {
                return Ok(Vec::new());
            }
            Ok(vec![Message {
                id: "m1".to_string(),
                temp_id: None,
                conversation_id: "c1".to_string(),
                from: "bob".to_string(),
                to: "alice".to_string(),
                text: "hi".to_string(),
                file_ref: None,
                timestamp: Utc::now(),
                status: MessageStatus::Sent,
            }])
        });
    let (server, _) = ctx.server();
    let id = server
        .post("/api/views/conversations")
        .json(&open_body())
        .await
        .json::<Value>()["id"]
        .as_str()
        .unwrap()
        .to_string();

    let body = server
        .post(&format!("/api/views/conversations/{id}/history"))
        .await
        .json::<Value>();

    assert_eq!(body["added"], json!(0));
    assert_eq!(body["messages"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_close_conversation() {
    let (server, state) = chat_backend(Arc::new(AtomicBool::new(false))).server();
    let id = server
        .post("/api/views/conversations")
        .json(&open_body())
        .await
        .json::<Value>()["id"]
        .as_str()
        .unwrap()
        .to_string();

    server
        .delete(&format!("/api/views/conversations/{id}"))
        .await
        .assert_status(StatusCode::NO_CONTENT);

    assert!(state.conversations.read().await.is_empty());
    server
        .get(&format!("/api/views/conversations/{id}"))
        .await
        .assert_status_not_found();
}
