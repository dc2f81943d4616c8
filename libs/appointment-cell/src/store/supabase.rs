// libs/appointment-cell/src/store/supabase.rs
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use shared_database::supabase::{PostgrestError, SupabaseClient};

use crate::models::{
    Appointment, AppointmentError, AppointmentSearchQuery,
    BookedInterval, BookingWindow, RecurringSlotTemplate, Service,
};
use crate::store::{AppointmentStore, ServiceCatalog, SlotTemplateStore};

#[derive(Debug, Deserialize)]
struct BookedRow {
    id: Uuid,
    service_id: Uuid,
    date_time: DateTime<Utc>,
    service: Option<ServiceDuration>,
}

#[derive(Debug, Deserialize)]
struct ServiceDuration {
    duration_minutes: i32,
}

/// Store backed by the clinic's Postgres schema through PostgREST. Writes
/// that place or move a booking go through the `book_appointment` and
/// `reschedule_appointment` functions, which serialise per service and raise
/// an exclusion violation on overlap.
pub struct SupabaseClinicStore {
    supabase: Arc<SupabaseClient>,
    auth_token: Option<String>,
}

impl SupabaseClinicStore {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase, auth_token: None }
    }

    pub fn with_auth_token(supabase: Arc<SupabaseClient>, auth_token: impl Into<String>) -> Self {
        Self { supabase, auth_token: Some(auth_token.into()) }
    }

    fn token(&self) -> Option<&str> {
        self.auth_token.as_deref()
    }

    async fn fetch<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<Vec<T>, AppointmentError> {
        let rows: Vec<Value> = self.supabase
            .request(Method::GET, path, self.token(), None)
            .await
            .map_err(map_database_error)?;

        rows.into_iter()
            .map(serde_json::from_value)
            .collect::<std::result::Result<Vec<T>, _>>()
            .map_err(|e| AppointmentError::DatabaseError(format!("Failed to parse rows from {}: {}", path, e)))
    }

    fn booking_args(appointment: &Appointment) -> Value {
        json!({
            "p_id": appointment.id,
            "p_patient_id": appointment.patient_id,
            "p_service_id": appointment.service_id,
            "p_date_time": timestamp(appointment.date_time),
            "p_status": appointment.status,
            "p_notes": appointment.notes,
        })
    }
}

/// RFC 3339 with a `Z` suffix so the value can sit in a query string
/// without escaping a `+` offset.
fn timestamp(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn map_database_error(err: anyhow::Error) -> AppointmentError {
    match err.downcast_ref::<PostgrestError>() {
        Some(postgrest) if postgrest.is_exclusion_violation() => {
            warn!("Database rejected overlapping booking: {}", postgrest.message);
            AppointmentError::SlotUnavailable
        }
        _ => AppointmentError::DatabaseError(err.to_string()),
    }
}

#[async_trait]
impl AppointmentStore for SupabaseClinicStore {
    async fn find_conflicting(
        &self,
        service_id: Uuid,
        exclude_appointment_id: Option<Uuid>,
        window: Option<BookingWindow>,
    ) -> Result<Vec<BookedInterval>, AppointmentError> {
        let mut query_parts = vec![
            format!("service_id=eq.{}", service_id),
            "status=in.(pending,confirmed)".to_string(),
            "select=id,service_id,date_time,service:services(duration_minutes)".to_string(),
        ];

        if let Some(exclude_id) = exclude_appointment_id {
            query_parts.push(format!("id=neq.{}", exclude_id));
        }
        if let Some(window) = window {
            query_parts.push(format!("date_time=gt.{}", timestamp(window.after)));
            query_parts.push(format!("date_time=lt.{}", timestamp(window.before)));
        }

        let path = format!("/rest/v1/appointments?{}&order=date_time.asc", query_parts.join("&"));
        let rows: Vec<BookedRow> = self.fetch(&path).await?;

        rows.into_iter()
            .map(|row| {
                let service = row.service.ok_or_else(|| AppointmentError::DatabaseError(format!(
                    "Appointment {} has no service row", row.id
                )))?;
                Ok(BookedInterval {
                    appointment_id: row.id,
                    service_id: row.service_id,
                    start: row.date_time,
                    duration_minutes: service.duration_minutes,
                })
            })
            .collect()
    }

    async fn get_appointment(&self, appointment_id: Uuid) -> Result<Option<Appointment>, AppointmentError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let rows: Vec<Appointment> = self.fetch(&path).await?;
        Ok(rows.into_iter().next())
    }

    async fn search_appointments(
        &self,
        query: &AppointmentSearchQuery,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let mut query_parts = Vec::new();

        if let Some(patient_id) = query.patient_id {
            query_parts.push(format!("patient_id=eq.{}", patient_id));
        }
        if let Some(service_id) = query.service_id {
            query_parts.push(format!("service_id=eq.{}", service_id));
        }
        if let Some(status) = query.status {
            query_parts.push(format!("status=eq.{}", status));
        }
        if let Some(from_date) = query.from_date {
            query_parts.push(format!("date_time=gte.{}", timestamp(from_date)));
        }
        if let Some(to_date) = query.to_date {
            query_parts.push(format!("date_time=lte.{}", timestamp(to_date)));
        }
        query_parts.push("order=date_time.asc".to_string());

        let path = format!("/rest/v1/appointments?{}", query_parts.join("&"));
        self.fetch(&path).await
    }

    async fn insert_appointment(&self, appointment: Appointment) -> Result<Appointment, AppointmentError> {
        debug!("Booking appointment {} through book_appointment", appointment.id);

        let row: Value = self.supabase
            .rpc("book_appointment", self.token(), Self::booking_args(&appointment))
            .await
            .map_err(map_database_error)?;

        serde_json::from_value(row)
            .map_err(|e| AppointmentError::DatabaseError(format!("Failed to parse booked appointment: {}", e)))
    }

    async fn update_appointment(&self, appointment: Appointment) -> Result<Appointment, AppointmentError> {
        let stored = self.get_appointment(appointment.id).await?
            .ok_or(AppointmentError::NotFound)?;

        if stored.date_time != appointment.date_time {
            debug!("Moving appointment {} through reschedule_appointment", appointment.id);

            let row: Value = self.supabase
                .rpc("reschedule_appointment", self.token(), Self::booking_args(&appointment))
                .await
                .map_err(map_database_error)?;

            return serde_json::from_value(row)
                .map_err(|e| AppointmentError::DatabaseError(format!("Failed to parse rescheduled appointment: {}", e)));
        }

        let path = format!("/rest/v1/appointments?id=eq.{}", appointment.id);
        let patch = json!({
            "status": appointment.status,
            "notes": appointment.notes,
            "updated_at": timestamp(appointment.updated_at),
        });

        let rows: Vec<Appointment> = self.supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                self.token(),
                Some(patch),
                Some(SupabaseClient::return_representation()),
            )
            .await
            .map_err(map_database_error)?;

        rows.into_iter().next().ok_or(AppointmentError::NotFound)
    }
}

#[async_trait]
impl ServiceCatalog for SupabaseClinicStore {
    async fn get_service(&self, service_id: Uuid) -> Result<Option<Service>, AppointmentError> {
        let path = format!(
            "/rest/v1/services?id=eq.{}&select=id,name,duration_minutes,is_active",
            service_id
        );
        let rows: Vec<Service> = self.fetch(&path).await?;
        Ok(rows.into_iter().next())
    }
}

#[async_trait]
impl SlotTemplateStore for SupabaseClinicStore {
    async fn templates_for_weekday(&self, day_of_week: u8) -> Result<Vec<RecurringSlotTemplate>, AppointmentError> {
        let path = format!(
            "/rest/v1/available_slots?day_of_week=eq.{}&is_active=eq.true&order=start_time.asc",
            day_of_week
        );
        self.fetch(&path).await
    }
}
