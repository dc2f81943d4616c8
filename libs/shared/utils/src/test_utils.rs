use std::sync::Arc;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde_json::json;
use uuid::Uuid;

use shared_config::AppConfig;

use crate::clock::FixedClock;

pub struct TestConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub clinic_timezone: String,
    pub slot_granularity_minutes: i64,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
            clinic_timezone: "UTC".to_string(),
            slot_granularity_minutes: 30,
        }
    }
}

impl TestConfig {
    pub fn with_supabase_url(url: &str) -> Self {
        Self {
            supabase_url: url.to_string(),
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            clinic_timezone: self.clinic_timezone.clone(),
            slot_granularity_minutes: self.slot_granularity_minutes,
        }
    }
}

/// Monday 2025-06-16, the reference day used across the scheduling tests.
pub fn test_monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 16).unwrap()
}

/// UTC instant on [`test_monday`].
pub fn monday_at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 16, hour, minute, 0).unwrap()
}

/// Clock set to the Sunday evening before [`test_monday`].
pub fn clock_before_monday() -> Arc<FixedClock> {
    Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2025, 6, 15, 18, 0, 0).unwrap()))
}

pub struct MockSupabaseResponses;

impl MockSupabaseResponses {
    pub fn service_response(service_id: Uuid, duration_minutes: i32, is_active: bool) -> serde_json::Value {
        json!({
            "id": service_id,
            "name": "General Consultation",
            "duration_minutes": duration_minutes,
            "is_active": is_active
        })
    }

    pub fn slot_template_response(day_of_week: u8, start_time: &str, end_time: &str) -> serde_json::Value {
        json!({
            "id": Uuid::new_v4(),
            "day_of_week": day_of_week,
            "start_time": start_time,
            "end_time": end_time,
            "is_active": true
        })
    }

    pub fn appointment_response(
        appointment_id: Uuid,
        patient_id: Uuid,
        service_id: Uuid,
        date_time: DateTime<Utc>,
        status: &str,
    ) -> serde_json::Value {
        json!({
            "id": appointment_id,
            "patient_id": patient_id,
            "service_id": service_id,
            "date_time": date_time.to_rfc3339(),
            "status": status,
            "notes": null,
            "created_at": "2025-06-01T00:00:00Z",
            "updated_at": "2025-06-01T00:00:00Z"
        })
    }

    /// Appointment row with its service embedded, as returned by the
    /// conflict query.
    pub fn booked_appointment_response(
        appointment_id: Uuid,
        service_id: Uuid,
        date_time: DateTime<Utc>,
        duration_minutes: i32,
    ) -> serde_json::Value {
        json!({
            "id": appointment_id,
            "service_id": service_id,
            "date_time": date_time.to_rfc3339(),
            "service": { "duration_minutes": duration_minutes }
        })
    }

    pub fn error_response(code: &str, message: &str) -> serde_json::Value {
        json!({
            "code": code,
            "details": null,
            "hint": null,
            "message": message
        })
    }
}
