use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};
use std::time::Duration;

use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use slotsync_core::{errors::SyncError, models::appointment::Appointment};
use uuid::Uuid;

use crate::test_utils::{TestContext, monday};

fn slots(body: &Value) -> Vec<String> {
    serde_json::from_value(body["view"]["slots"].clone()).unwrap()
}

fn select_monday() -> Value {
    json!({ "businessId": "b1", "date": "2024-05-06", "durationMinutes": 30 })
}

#[tokio::test]
async fn test_compute_slots() {
    let (server, _) = TestContext::new().server();

    let response = server
        .post("/api/slots/compute")
        .json(&json!({
            "day": { "start": "09:00", "end": "12:00", "breaks": [{ "start": "10:00", "end": "10:30" }] },
            "durationMinutes": 30,
            "bookedTimes": ["9:30"]
        }))
        .await;

    response.assert_status_ok();
    assert_eq!(
        response.json::<Value>(),
        json!({ "slots": ["09:00", "10:30", "11:00", "11:30"] })
    );
}

#[tokio::test]
async fn test_compute_slots_closed_day() {
    let (server, _) = TestContext::new().server();

    let response = server
        .post("/api/slots/compute")
        .json(&json!({ "day": null, "durationMinutes": 30 }))
        .await;

    assert_eq!(response.json::<Value>(), json!({ "slots": [] }));
}

#[tokio::test]
async fn test_compute_slots_rejects_bad_duration() {
    let (server, _) = TestContext::new().server();

    let response = server
        .post("/api/slots/compute")
        .json(&json!({ "day": { "start": "09:00", "end": "12:00" }, "durationMinutes": 0 }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert!(response.json::<Value>()["error"].is_string());
}

#[tokio::test]
async fn test_open_and_read_slot_view() {
    let (server, _) = TestContext::with_schedule(&["11:00"]).server();

    let response = server.post("/api/views/slots").json(&select_monday()).await;

    response.assert_status(StatusCode::CREATED);
    let created = response.json::<Value>();
    assert_eq!(created["refresh"], json!("applied"));
    assert_eq!(created["view"]["status"], json!({ "state": "ready" }));
    assert_eq!(slots(&created), vec!["09:00", "09:30", "10:30", "11:30"]);

    let id = created["id"].as_str().unwrap();
    let fetched = server.get(&format!("/api/views/slots/{id}")).await;
    fetched.assert_status_ok();
    assert_eq!(slots(&fetched.json::<Value>()), slots(&created));
}

#[tokio::test]
async fn test_unknown_slot_view() {
    let (server, _) = TestContext::new().server();

    let response = server
        .get(&format!("/api/views/slots/{}", Uuid::new_v4()))
        .await;

    response.assert_status_not_found();
}

#[tokio::test]
async fn test_invalid_selection_is_not_registered() {
    let (server, state) = TestContext::new().server();

    let response = server
        .post("/api/views/slots")
        .json(&json!({ "businessId": "b1", "date": "2024-05-06", "durationMinutes": -15 }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert!(state.slot_views.read().await.is_empty());
}

#[tokio::test]
async fn test_backend_outage_leaves_error_view() {
    let mut ctx = TestContext::new();
    ctx.backend
        .expect_working_hours()
        .returning(|_, _| Err(SyncError::Transport(eyre::eyre!("connection refused"))));
    ctx.backend.expect_booked_times().returning(|_, _| Ok(vec![]));
    let (server, _) = ctx.server();

    let response = server.post("/api/views/slots").json(&select_monday()).await;

    response.assert_status(StatusCode::CREATED);
    let body = response.json::<Value>();
    assert_eq!(body["refresh"], json!("failed"));
    assert_eq!(body["view"]["status"]["state"], json!("error"));
}

#[tokio::test]
async fn test_push_event_refreshes_view() {
    let mut ctx = TestContext::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = calls.clone();
    ctx.backend
        .expect_working_hours()
        .returning(|_, _| Ok(crate::test_utils::week()));
    ctx.backend.expect_booked_times().returning(move |_, _| {
        // Someone else books 11:00 after the first load
        if seen.fetch_add(1, Ordering::SeqCst) == 0 {
            Ok(vec![])
        } else {
            Ok(vec!["11:00".to_string()])
        }
    });
    let (server, _) = ctx.server();
    let created = server
        .post("/api/views/slots")
        .json(&select_monday())
        .await
        .json::<Value>();
    let id = created["id"].as_str().unwrap().to_string();
    assert!(slots(&created).contains(&"11:00".to_string()));

    let pushed = server
        .post("/api/push")
        .json(&json!({
            "room": "business:b1",
            "event": "appointmentCreated",
            "data": { "businessId": "b1", "appointmentId": "a7", "date": "2024-05-06" }
        }))
        .await;
    pushed.assert_status(StatusCode::ACCEPTED);
    assert_eq!(pushed.json::<Value>(), json!({ "delivered": 1 }));

    let mut current = Vec::new();
    for _ in 0..50 {
        let body = server
            .get(&format!("/api/views/slots/{id}"))
            .await
            .json::<Value>();
        current = slots(&body);
        if !current.contains(&"11:00".to_string()) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(current, vec!["09:00", "09:30", "10:30", "11:30"]);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_book_offered_slot() {
    let mut ctx = TestContext::with_schedule(&[]);
    ctx.backend
        .expect_book_appointment()
        .times(1)
        .returning(|business_id, request| {
            Ok(Appointment {
                id: "a1".to_string(),
                business_id: business_id.to_string(),
                date: request.date,
                time: request.time,
                duration_minutes: request.duration_minutes,
                service_id: request.service_id,
                customer_id: request.customer_id,
            })
        });
    let (server, _) = ctx.server();
    let created = server
        .post("/api/views/slots")
        .json(&select_monday())
        .await
        .json::<Value>();
    let id = created["id"].as_str().unwrap();

    let response = server
        .post(&format!("/api/views/slots/{id}/bookings"))
        .json(&json!({ "time": "10:30", "customerId": "c9" }))
        .await;

    response.assert_status(StatusCode::CREATED);
    let appointment = response.json::<Appointment>();
    assert_eq!(appointment.date, monday());
    assert_eq!(appointment.time.to_string(), "10:30");
    assert_eq!(appointment.customer_id.as_deref(), Some("c9"));
}

#[tokio::test]
async fn test_book_rejects_slot_not_offered() {
    let (server, _) = TestContext::with_schedule(&["09:00"]).server();
    let created = server
        .post("/api/views/slots")
        .json(&select_monday())
        .await
        .json::<Value>();
    let id = created["id"].as_str().unwrap();

    let response = server
        .post(&format!("/api/views/slots/{id}/bookings"))
        .json(&json!({ "time": "09:00" }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_cancel_booking() {
    let mut ctx = TestContext::with_schedule(&[]);
    ctx.backend
        .expect_cancel_appointment()
        .times(1)
        .returning(|appointment_id| {
            assert_eq!(appointment_id, "a1");
            Ok(())
        });
    let (server, _) = ctx.server();
    let created = server
        .post("/api/views/slots")
        .json(&select_monday())
        .await
        .json::<Value>();
    let id = created["id"].as_str().unwrap();

    let response = server
        .delete(&format!("/api/views/slots/{id}/bookings/a1"))
        .await;

    response.assert_status(StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_close_slot_view() {
    let (server, state) = TestContext::with_schedule(&[]).server();
    let created = server
        .post("/api/views/slots")
        .json(&select_monday())
        .await
        .json::<Value>();
    let id = created["id"].as_str().unwrap();

    server
        .delete(&format!("/api/views/slots/{id}"))
        .await
        .assert_status(StatusCode::NO_CONTENT);

    assert!(state.slot_views.read().await.is_empty());
    server
        .get(&format!("/api/views/slots/{id}"))
        .await
        .assert_status_not_found();
}
