// libs/appointment-cell/src/models.rs
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc};
use chrono_tz::Tz;
use std::fmt;

use shared_config::{AppConfig, DEFAULT_SLOT_GRANULARITY_MINUTES, MAX_SLOT_GRANULARITY_MINUTES};
use shared_models::error::AppError;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub service_id: Uuid,
    pub date_time: DateTime<Utc>,
    pub status: AppointmentStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    /// Occupied interval of this appointment given its service's current duration.
    pub fn occupied_interval(&self, duration_minutes: i32) -> Result<OccupiedInterval, AppointmentError> {
        OccupiedInterval::starting_at(self.date_time, duration_minutes)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
    NoShow,
}

impl AppointmentStatus {
    /// Statuses that hold their time slot.
    pub const ACTIVE: [AppointmentStatus; 2] = [AppointmentStatus::Pending, AppointmentStatus::Confirmed];

    pub fn is_active(&self) -> bool {
        Self::ACTIVE.contains(self)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self,
            AppointmentStatus::Completed |
            AppointmentStatus::Cancelled |
            AppointmentStatus::NoShow
        )
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Pending => write!(f, "pending"),
            AppointmentStatus::Confirmed => write!(f, "confirmed"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
            AppointmentStatus::NoShow => write!(f, "no_show"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Service {
    pub id: Uuid,
    pub name: String,
    pub duration_minutes: i32,
    pub is_active: bool,
}

impl Service {
    pub fn duration(&self) -> Duration {
        Duration::minutes(self.duration_minutes as i64)
    }
}

/// Standing weekly window during which bookings are allowed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecurringSlotTemplate {
    pub id: Uuid,
    /// 0 = Sunday .. 6 = Saturday
    pub day_of_week: u8,
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm")]
    pub end_time: NaiveTime,
    pub is_active: bool,
}

impl RecurringSlotTemplate {
    pub fn validate(&self) -> Result<(), AppointmentError> {
        if self.day_of_week > 6 {
            return Err(AppointmentError::ValidationError(
                "Day of week must be between 0 (Sunday) and 6 (Saturday)".to_string()
            ));
        }
        if self.start_time >= self.end_time {
            return Err(AppointmentError::ValidationError(
                "Start time must be before end time".to_string()
            ));
        }
        Ok(())
    }
}

/// Day-of-week index used by slot templates (0 = Sunday).
pub fn day_of_week(date: NaiveDate) -> u8 {
    date.weekday().num_days_from_sunday() as u8
}

// ==============================================================================
// OCCUPANCY MODELS
// ==============================================================================

/// Half-open `[start, end)` range during which a service is busy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct OccupiedInterval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl OccupiedInterval {
    /// Fails when the end is not representable.
    pub fn starting_at(start: DateTime<Utc>, duration_minutes: i32) -> Result<Self, AppointmentError> {
        let end = start
            .checked_add_signed(Duration::minutes(duration_minutes as i64))
            .ok_or_else(|| AppointmentError::ValidationError(format!(
                "Appointment starting at {} ends outside the supported time range", start
            )))?;
        Ok(Self { start, end })
    }

    /// Touching intervals do not overlap.
    pub fn overlaps(&self, other: &OccupiedInterval) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Active booking as seen by the conflict checker. The duration is the
/// service's duration at read time, not a value captured at booking time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BookedInterval {
    pub appointment_id: Uuid,
    pub service_id: Uuid,
    pub start: DateTime<Utc>,
    pub duration_minutes: i32,
}

impl BookedInterval {
    pub fn occupied(&self) -> Result<OccupiedInterval, AppointmentError> {
        OccupiedInterval::starting_at(self.start, self.duration_minutes)
    }
}

/// Open range `(after, before)` of booking start instants a reader cares
/// about. Bookings starting outside it cannot overlap the range it was
/// built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookingWindow {
    pub after: DateTime<Utc>,
    pub before: DateTime<Utc>,
}

impl BookingWindow {
    /// Starts of `duration`-long bookings that can overlap `range`. `None`
    /// when the padded range leaves the representable time span.
    pub fn overlapping(range: &OccupiedInterval, duration: Duration) -> Option<Self> {
        Some(Self {
            after: range.start.checked_sub_signed(duration)?,
            before: range.end,
        })
    }

    pub fn contains_start(&self, start: DateTime<Utc>) -> bool {
        self.after < start && start < self.before
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimeSlot {
    /// Clinic-local wall clock time, `HH:MM`.
    pub time: String,
    pub available: bool,
    pub starts_at: DateTime<Utc>,
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAppointmentRequest {
    pub service_id: Uuid,
    pub date_time: DateTime<Utc>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateAppointmentRequest {
    pub date_time: Option<DateTime<Utc>>,
    pub status: Option<AppointmentStatus>,
    /// Absent leaves notes alone, `null` clears them.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    pub notes: Option<Option<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppointmentSearchQuery {
    pub patient_id: Option<Uuid>,
    pub service_id: Option<Uuid>,
    pub status: Option<AppointmentStatus>,
    pub from_date: Option<DateTime<Utc>>,
    pub to_date: Option<DateTime<Utc>>,
}

impl AppointmentSearchQuery {
    pub fn matches(&self, appointment: &Appointment) -> bool {
        self.patient_id.map_or(true, |id| appointment.patient_id == id)
            && self.service_id.map_or(true, |id| appointment.service_id == id)
            && self.status.map_or(true, |status| appointment.status == status)
            && self.from_date.map_or(true, |from| appointment.date_time >= from)
            && self.to_date.map_or(true, |to| appointment.date_time <= to)
    }
}

// ==============================================================================
// CONFIGURATION
// ==============================================================================

/// Validated slot settings. The granularity is always between one minute
/// and one day.
#[derive(Debug, Clone)]
pub struct SchedulingConfig {
    granularity: Duration,
    timezone: Tz,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            granularity: Duration::minutes(DEFAULT_SLOT_GRANULARITY_MINUTES),
            timezone: Tz::UTC,
        }
    }
}

impl SchedulingConfig {
    pub fn new(granularity_minutes: i64, timezone: Tz) -> Result<Self, AppointmentError> {
        let granularity = Some(granularity_minutes)
            .filter(|minutes| (1..=MAX_SLOT_GRANULARITY_MINUTES).contains(minutes))
            .and_then(Duration::try_minutes)
            .ok_or_else(|| AppointmentError::ValidationError(format!(
                "Slot granularity must be between 1 and {} minutes, got {}",
                MAX_SLOT_GRANULARITY_MINUTES, granularity_minutes
            )))?;

        Ok(Self { granularity, timezone })
    }

    pub fn from_app_config(config: &AppConfig) -> Result<Self, AppointmentError> {
        let timezone: Tz = config.clinic_timezone.parse().map_err(|_| {
            AppointmentError::ValidationError(format!(
                "Unknown clinic timezone: {}", config.clinic_timezone
            ))
        })?;

        Self::new(config.slot_granularity_minutes, timezone)
    }

    pub fn with_timezone(self, timezone: Tz) -> Self {
        Self { timezone, ..self }
    }

    pub fn granularity(&self) -> Duration {
        self.granularity
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
pub enum AppointmentError {
    #[error("Appointment not found")]
    NotFound,

    #[error("Service not found")]
    ServiceNotFound,

    #[error("Service is not active")]
    ServiceInactive,

    #[error("Time slot is not available")]
    SlotUnavailable,

    #[error("Appointment time must be in the future")]
    InThePast,

    #[error("Appointment cannot be modified in current status: {0}")]
    InvalidTransition(AppointmentStatus),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<AppointmentError> for AppError {
    fn from(err: AppointmentError) -> Self {
        let message = err.to_string();
        match err {
            AppointmentError::NotFound | AppointmentError::ServiceNotFound => AppError::NotFound(message),
            AppointmentError::SlotUnavailable => AppError::Conflict(message),
            AppointmentError::ServiceInactive
            | AppointmentError::InThePast
            | AppointmentError::InvalidTransition(_) => AppError::BadRequest(message),
            AppointmentError::ValidationError(_) => AppError::ValidationError(message),
            AppointmentError::DatabaseError(_) => AppError::Database(message),
        }
    }
}

/// `HH:MM` wall-clock times; `HH:MM:SS` is accepted on input since Postgres
/// `time` columns serialise with seconds.
mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(&raw, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(&raw, "%H:%M:%S"))
            .map_err(|_| serde::de::Error::custom(format!("invalid time of day: {}", raw)))
    }
}
