//! # Slot Handlers
//!
//! The stateless calculator endpoint plus the slot views a booking widget
//! keeps open while the user picks a time. A view follows one
//! (business, date, duration) selection and stays current as other clients
//! book; clients poll it with `GET` after every change they care about.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use slotsync_core::{
    availability::compute_slots,
    errors::SyncError,
    models::{appointment::Appointment, schedule::DayHours, time::TimeOfDay},
    slot_view::SlotView,
};
use slotsync_sync::slots::{Refresh, SlotSynchronizer};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::{ApiState, middleware::error_handling::AppError};

/// Input for a one-off slot calculation.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputeSlotsRequest {
    /// Working hours for the day; absent means closed
    pub day: Option<DayHours>,
    pub duration_minutes: i64,
    #[serde(default)]
    pub booked_times: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ComputeSlotsResponse {
    pub slots: Vec<TimeOfDay>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectSlotsRequest {
    pub business_id: String,
    pub date: NaiveDate,
    pub duration_minutes: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookSlotRequest {
    pub time: TimeOfDay,
    pub service_id: Option<String>,
    pub customer_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RescheduleBookingRequest {
    pub date: NaiveDate,
    pub time: TimeOfDay,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotViewResponse {
    pub id: Uuid,
    /// Outcome of the fetch this request started, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh: Option<Refresh>,
    pub view: SlotView,
}

fn respond(id: Uuid, slots: &SlotSynchronizer, refresh: Option<Refresh>) -> Json<SlotViewResponse> {
    Json(SlotViewResponse {
        id,
        refresh,
        view: slots.view(),
    })
}

/// Run the availability calculator on a supplied day.
///
/// # Endpoint
///
/// ```text
/// POST /api/slots/compute
/// ```
pub async fn compute(
    Json(payload): Json<ComputeSlotsRequest>,
) -> Result<Json<ComputeSlotsResponse>, AppError> {
    let slots = compute_slots(
        payload.day.as_ref(),
        payload.duration_minutes,
        &payload.booked_times,
    )?;
    Ok(Json(ComputeSlotsResponse { slots }))
}

/// Open a slot view and load its first selection.
///
/// The view is only registered when the selection is valid; a backend outage
/// still registers it, in its error state, so the client can refresh later.
pub async fn create_view(
    State(state): State<Arc<ApiState>>,
    Json(payload): Json<SelectSlotsRequest>,
) -> Result<(StatusCode, Json<SlotViewResponse>), AppError> {
    let slots = SlotSynchronizer::new(state.ctx.clone());
    let refresh = slots
        .select(&payload.business_id, payload.date, payload.duration_minutes)
        .await?;

    let id = Uuid::new_v4();
    state.slot_views.write().await.insert(id, slots.clone());
    info!(view_id = %id, business_id = %payload.business_id, "slot view opened");
    Ok((StatusCode::CREATED, respond(id, &slots, Some(refresh))))
}

pub async fn get_view(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SlotViewResponse>, AppError> {
    let slots = state.slot_view(id).await?;
    Ok(respond(id, &slots, None))
}

/// Change the selection of an open view.
pub async fn update_view(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SelectSlotsRequest>,
) -> Result<Json<SlotViewResponse>, AppError> {
    let slots = state.slot_view(id).await?;
    let refresh = slots
        .select(&payload.business_id, payload.date, payload.duration_minutes)
        .await?;
    Ok(respond(id, &slots, Some(refresh)))
}

pub async fn close_view(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let slots = state
        .slot_views
        .write()
        .await
        .remove(&id)
        .ok_or_else(|| SyncError::NotFound(format!("Slot view with ID {id} not found")))?;
    slots.close();
    info!(view_id = %id, "slot view closed");
    Ok(StatusCode::NO_CONTENT)
}

/// Book one of the view's offered slots.
pub async fn book(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<BookSlotRequest>,
) -> Result<(StatusCode, Json<Appointment>), AppError> {
    let slots = state.slot_view(id).await?;
    let appointment = slots
        .book(payload.time, payload.service_id, payload.customer_id)
        .await?;
    Ok((StatusCode::CREATED, Json(appointment)))
}

pub async fn reschedule(
    State(state): State<Arc<ApiState>>,
    Path((id, appointment_id)): Path<(Uuid, String)>,
    Json(payload): Json<RescheduleBookingRequest>,
) -> Result<Json<Appointment>, AppError> {
    let slots = state.slot_view(id).await?;
    let appointment = slots
        .reschedule(&appointment_id, payload.date, payload.time)
        .await?;
    Ok(Json(appointment))
}

pub async fn cancel(
    State(state): State<Arc<ApiState>>,
    Path((id, appointment_id)): Path<(Uuid, String)>,
) -> Result<StatusCode, AppError> {
    let slots = state.slot_view(id).await?;
    slots.cancel(&appointment_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
