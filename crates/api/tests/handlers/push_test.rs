use axum::http::StatusCode;
use serde_json::{Value, json};

use crate::test_utils::TestContext;

#[tokio::test]
async fn test_push_to_empty_room() {
    let (server, _) = TestContext::new().server();

    let response = server
        .post("/api/push")
        .json(&json!({
            "room": "conversation:nobody",
            "event": "typing",
            "data": { "conversationId": "nobody", "userId": "bob" }
        }))
        .await;

    response.assert_status(StatusCode::ACCEPTED);
    assert_eq!(response.json::<Value>(), json!({ "delivered": 0 }));
}

#[tokio::test]
async fn test_push_rejects_unknown_room_kind() {
    let (server, _) = TestContext::new().server();

    let response = server
        .post("/api/push")
        .json(&json!({
            "room": "lobby:1",
            "event": "typing",
            "data": { "conversationId": "c1", "userId": "bob" }
        }))
        .await;

    assert!(response.status_code().is_client_error());
}

#[tokio::test]
async fn test_push_rejects_unknown_event() {
    let (server, _) = TestContext::new().server();

    let response = server
        .post("/api/push")
        .json(&json!({ "room": "business:b1", "event": "paymentReceived", "data": {} }))
        .await;

    assert!(response.status_code().is_client_error());
}
