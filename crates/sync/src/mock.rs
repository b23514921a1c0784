use async_trait::async_trait;
use chrono::NaiveDate;
use mockall::mock;
use slotsync_core::{
    errors::SyncResult,
    models::{
        appointment::{Appointment, BookAppointmentRequest, RescheduleAppointmentRequest},
        message::{Message, SendMessageRequest},
        schedule::WeeklyHours,
    },
};

use crate::backend::BackendApi;

// Mock backend for testing
mock! {
    pub Backend {}

    #[async_trait]
    impl BackendApi for Backend {
        async fn working_hours(&self, business_id: &str, date: NaiveDate) -> SyncResult<WeeklyHours>;

        async fn booked_times(&self, business_id: &str, date: NaiveDate) -> SyncResult<Vec<String>>;

        async fn message_history(
            &self,
            conversation_id: &str,
            page: u32,
            limit: u32,
        ) -> SyncResult<Vec<Message>>;

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
}
