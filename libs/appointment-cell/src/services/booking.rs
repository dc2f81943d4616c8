// libs/appointment-cell/src/services/booking.rs
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_utils::clock::{Clock, SystemClock};

use crate::models::{
    Appointment, AppointmentError, AppointmentSearchQuery, AppointmentStatus,
    CreateAppointmentRequest, SchedulingConfig, TimeSlot, UpdateAppointmentRequest,
};
use crate::services::availability::SlotAvailabilityService;
use crate::services::conflict::ConflictDetectionService;
use crate::services::lifecycle::AppointmentLifecycleService;
use crate::services::{load_bookable_service, ClinicStores};

pub struct AppointmentBookingService {
    stores: ClinicStores,
    conflict_service: ConflictDetectionService,
    availability_service: SlotAvailabilityService,
    lifecycle_service: AppointmentLifecycleService,
    clock: Arc<dyn Clock>,
}

impl AppointmentBookingService {
    pub fn new(stores: ClinicStores, clock: Arc<dyn Clock>, config: SchedulingConfig) -> Self {
        let conflict_service = ConflictDetectionService::new(stores.clone(), Arc::clone(&clock));
        let availability_service = SlotAvailabilityService::new(stores.clone(), Arc::clone(&clock), &config);

        Self {
            stores,
            conflict_service,
            availability_service,
            lifecycle_service: AppointmentLifecycleService::new(),
            clock,
        }
    }

    /// Service backed by Supabase and the system clock.
    pub fn from_config(config: &AppConfig) -> Result<Self, AppointmentError> {
        let scheduling = SchedulingConfig::from_app_config(config)?;
        Ok(Self::new(ClinicStores::supabase(config), Arc::new(SystemClock), scheduling))
    }

    /// Book a new appointment. It starts out pending.
    #[instrument(skip(self, request), fields(service_id = %request.service_id))]
    pub async fn create_appointment(
        &self,
        patient_id: Uuid,
        request: CreateAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        debug!("Booking appointment for patient {} at {}", patient_id, request.date_time);

        let service = load_bookable_service(self.stores.services.as_ref(), request.service_id).await?;
        self.conflict_service
            .check_service_availability(&service, request.date_time, None)
            .await?;

        let now = self.clock.now();
        let appointment = Appointment {
            id: Uuid::new_v4(),
            patient_id,
            service_id: service.id,
            date_time: request.date_time,
            status: AppointmentStatus::Pending,
            notes: request.notes,
            created_at: now,
            updated_at: now,
        };

        // The store re-checks overlap atomically with the insert
        let created = self.stores.appointments.insert_appointment(appointment).await?;

        info!("Appointment {} booked for patient {} with service {} at {}",
              created.id, patient_id, created.service_id, created.date_time);
        Ok(created)
    }

    /// Fetch one of the patient's appointments. Other patients' appointments
    /// are reported as not found.
    pub async fn get_appointment(
        &self,
        appointment_id: Uuid,
        patient_id: Uuid,
    ) -> Result<Appointment, AppointmentError> {
        debug!("Fetching appointment: {}", appointment_id);

        let appointment = self.stores.appointments
            .get_appointment(appointment_id)
            .await?
            .ok_or(AppointmentError::NotFound)?;

        if appointment.patient_id != patient_id {
            warn!("Patient {} requested appointment {} owned by another patient",
                  patient_id, appointment_id);
            return Err(AppointmentError::NotFound);
        }

        Ok(appointment)
    }

    /// The patient's appointments matching `query`, earliest first.
    pub async fn list_appointments(
        &self,
        patient_id: Uuid,
        query: AppointmentSearchQuery,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let query = AppointmentSearchQuery {
            patient_id: Some(patient_id),
            ..query
        };
        debug!("Searching appointments with filters: {:?}", query);

        self.stores.appointments.search_appointments(&query).await
    }

    /// Apply a partial update. A new date goes through the reschedule rules;
    /// a status change only has to follow the lifecycle.
    #[instrument(skip(self, request))]
    pub async fn update_appointment(
        &self,
        appointment_id: Uuid,
        patient_id: Uuid,
        request: UpdateAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        let current = self.get_appointment(appointment_id, patient_id).await?;
        let mut updated = current.clone();

        if let Some(new_time) = request.date_time.filter(|time| *time != current.date_time) {
            self.lifecycle_service.ensure_reschedulable(current.status)?;
            self.conflict_service
                .check_availability(new_time, current.service_id, Some(appointment_id))
                .await?;
            updated.date_time = new_time;
        }

        if let Some(requested) = request.status {
            if let Some(status) = self.lifecycle_service.resolve_status_change(current.status, requested)? {
                updated.status = status;
            }
        }

        if let Some(notes) = request.notes {
            updated.notes = notes;
        }

        if updated == current {
            debug!("Appointment {} unchanged", appointment_id);
            return Ok(current);
        }

        updated.updated_at = self.clock.now();
        let saved = self.stores.appointments.update_appointment(updated).await?;

        if saved.date_time != current.date_time {
            info!("Appointment {} rescheduled from {} to {}",
                  appointment_id, current.date_time, saved.date_time);
        }
        if saved.status != current.status {
            info!("Appointment {} moved from {} to {}", appointment_id, current.status, saved.status);
        }

        Ok(saved)
    }

    /// Move an appointment to a new start time.
    pub async fn reschedule_appointment(
        &self,
        appointment_id: Uuid,
        patient_id: Uuid,
        new_time: DateTime<Utc>,
    ) -> Result<Appointment, AppointmentError> {
        let current = self.get_appointment(appointment_id, patient_id).await?;
        self.lifecycle_service.ensure_reschedulable(current.status)?;

        let request = UpdateAppointmentRequest {
            date_time: Some(new_time),
            ..UpdateAppointmentRequest::default()
        };
        self.update_appointment(appointment_id, patient_id, request).await
    }

    pub async fn cancel_appointment(
        &self,
        appointment_id: Uuid,
        patient_id: Uuid,
    ) -> Result<Appointment, AppointmentError> {
        let current = self.get_appointment(appointment_id, patient_id).await?;
        self.lifecycle_service
            .validate_status_transition(current.status, AppointmentStatus::Cancelled)?;

        let request = UpdateAppointmentRequest {
            status: Some(AppointmentStatus::Cancelled),
            ..UpdateAppointmentRequest::default()
        };
        self.update_appointment(appointment_id, patient_id, request).await
    }

    pub async fn get_available_slots(
        &self,
        date: NaiveDate,
        service_id: Uuid,
    ) -> Result<Vec<TimeSlot>, AppointmentError> {
        self.availability_service.compute_available_slots(date, service_id).await
    }

    pub async fn check_availability(
        &self,
        start: DateTime<Utc>,
        service_id: Uuid,
        exclude_appointment_id: Option<Uuid>,
    ) -> Result<(), AppointmentError> {
        self.conflict_service.check_availability(start, service_id, exclude_appointment_id).await
    }
}
