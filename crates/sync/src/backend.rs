//! # Backend API
//!
//! The external HTTP API that owns businesses, appointments and messages.
//! [`BackendApi`] is the seam the synchronizers depend on; [`HttpBackend`] is
//! the reqwest implementation used in production.

use async_trait::async_trait;
use chrono::NaiveDate;
use eyre::WrapErr;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use slotsync_core::{
    errors::{SyncError, SyncResult},
    models::{
        appointment::{Appointment, BookAppointmentRequest, RescheduleAppointmentRequest},
        message::{Message, SendMessageRequest},
        schedule::WeeklyHours,
    },
};
use tracing::debug;
use urlencoding::encode;

#[async_trait]
pub trait BackendApi: Send + Sync {
    /// Working hours of a business, keyed by weekday.
    async fn working_hours(&self, business_id: &str, date: NaiveDate) -> SyncResult<WeeklyHours>;

    /// `"HH:MM"` start times already reserved on `date`.
    async fn booked_times(&self, business_id: &str, date: NaiveDate) -> SyncResult<Vec<String>>;

    /// One page of history, oldest first. Pages start at 1.
    async fn message_history(
        &self,
        conversation_id: &str,
        page: u32,
        limit: u32,
    ) -> SyncResult<Vec<Message>>;

    /// Returns the server's copy of the message, with its final id.
    async fn send_message(&self, request: SendMessageRequest) -> SyncResult<Message>;

    async fn book_appointment(
        &self,
        business_id: &str,
        request: BookAppointmentRequest,
    ) -> SyncResult<Appointment>;

    async fn reschedule_appointment(
        &self,
        appointment_id: &str,
        request: RescheduleAppointmentRequest,
    ) -> SyncResult<Appointment>;

    async fn cancel_appointment(&self, appointment_id: &str) -> SyncResult<()>;
}

/// Backend client over HTTP with an optional bearer token.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpBackend {
    pub fn new(base_url: &str, token: Option<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url, token)
    }

    pub fn with_client(client: reqwest::Client, base_url: &str, token: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        debug!(%method, %url, "backend request");
        let builder = self.client.request(method, url);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn read_json<T: DeserializeOwned>(response: Response, what: &str) -> SyncResult<T> {
        let response = Self::check(response, what).await?;
        let body = response
            .json::<T>()
            .await
            .wrap_err_with(|| format!("Invalid response body for {what}"))?;
        Ok(body)
    }

    async fn check(response: Response, what: &str) -> SyncResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let error_text = response.text().await.unwrap_or_default();
        if status == StatusCode::NOT_FOUND {
            return Err(SyncError::NotFound(format!("{what}: {error_text}")));
        }
        Err(eyre::eyre!("Failed to {what} ({status}): {error_text}").into())
    }
}

#[async_trait]
impl BackendApi for HttpBackend {
    async fn working_hours(&self, business_id: &str, date: NaiveDate) -> SyncResult<WeeklyHours> {
        let response = self
            .request(
                Method::GET,
                &format!("/api/businesses/{}/working-hours", encode(business_id)),
            )
            .query(&[("date", date.to_string())])
            .send()
            .await
            .wrap_err("Failed to reach backend for working hours")?;
        Self::read_json(response, "fetch working hours").await
    }

    async fn booked_times(&self, business_id: &str, date: NaiveDate) -> SyncResult<Vec<String>> {
        let response = self
            .request(
                Method::GET,
                &format!("/api/businesses/{}/booked-times", encode(business_id)),
            )
            .query(&[("date", date.to_string())])
            .send()
            .await
            .wrap_err("Failed to reach backend for booked times")?;
        Self::read_json(response, "fetch booked times").await
    }

    async fn message_history(
        &self,
        conversation_id: &str,
        page: u32,
        limit: u32,
    ) -> SyncResult<Vec<Message>> {
        let response = self
            .request(
                Method::GET,
                &format!("/api/conversations/{}/messages", encode(conversation_id)),
            )
            .query(&[("page", page), ("limit", limit)])
            .send()
            .await
            .wrap_err("Failed to reach backend for message history")?;
        Self::read_json(response, "fetch message history").await
    }

    async fn send_message(&self, request: SendMessageRequest) -> SyncResult<Message> {
        let response = self
            .request(Method::POST, "/api/messages")
            .json(&request)
            .send()
            .await
            .wrap_err("Failed to reach backend to send message")?;
        Self::read_json(response, "send message").await
    }

    async fn book_appointment(
        &self,
        business_id: &str,
        request: BookAppointmentRequest,
    ) -> SyncResult<Appointment> {
        let response = self
            .request(
                Method::POST,
                &format!("/api/businesses/{}/appointments", encode(business_id)),
            )
            .json(&request)
            .send()
            .await
            .wrap_err("Failed to reach backend to book appointment")?;
        Self::read_json(response, "book appointment").await
    }

    async fn reschedule_appointment(
        &self,
        appointment_id: &str,
        request: RescheduleAppointmentRequest,
    ) -> SyncResult<Appointment> {
        let response = self
            .request(
                Method::PUT,
                &format!("/api/appointments/{}", encode(appointment_id)),
            )
            .json(&request)
            .send()
            .await
            .wrap_err("Failed to reach backend to reschedule appointment")?;
        Self::read_json(response, "reschedule appointment").await
    }

    async fn cancel_appointment(&self, appointment_id: &str) -> SyncResult<()> {
        let response = self
            .request(
                Method::DELETE,
                &format!("/api/appointments/{}", encode(appointment_id)),
            )
            .send()
            .await
            .wrap_err("Failed to reach backend to cancel appointment")?;
        Self::check(response, "cancel appointment").await?;
        Ok(())
    }
}
