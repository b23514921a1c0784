use serde_json::{Value, json};

use crate::test_utils::TestContext;

#[tokio::test]
async fn test_health_reports_push_state() {
    let (server, state) = TestContext::new().server();

    let response = server.get("/health").await;
    response.assert_status_ok();
    assert_eq!(
        response.json::<Value>(),
        json!({ "status": "ok", "push_connected": true })
    );

    state.hub.set_connected(false);
    let body = server.get("/health").await.json::<Value>();
    assert_eq!(body["push_connected"], json!(false));
}

#[tokio::test]
async fn test_version() {
    let (server, _) = TestContext::new().server();

    let body = server.get("/version").await.json::<Value>();

    assert_eq!(body["version"], json!(env!("CARGO_PKG_VERSION")));
}
