// libs/appointment-cell/src/store/memory.rs
use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::{
    Appointment, AppointmentError, AppointmentSearchQuery, BookedInterval, BookingWindow,
    RecurringSlotTemplate, Service,
};
use crate::store::{AppointmentStore, ServiceCatalog, SlotTemplateStore};

#[derive(Default)]
struct ClinicState {
    services: HashMap<Uuid, Service>,
    templates: Vec<RecurringSlotTemplate>,
    appointments: HashMap<Uuid, Appointment>,
}

impl ClinicState {
    fn booked_intervals(
        &self,
        service_id: Uuid,
        exclude_appointment_id: Option<Uuid>,
        window: Option<BookingWindow>,
    ) -> Result<Vec<BookedInterval>, AppointmentError> {
        let mut booked = Vec::new();

        for appointment in self.appointments.values() {
            if appointment.service_id != service_id
                || !appointment.status.is_active()
                || Some(appointment.id) == exclude_appointment_id
                || window.is_some_and(|window| !window.contains_start(appointment.date_time))
            {
                continue;
            }

            let service = self.services.get(&appointment.service_id).ok_or_else(|| {
                AppointmentError::DatabaseError(format!(
                    "Service {} referenced by appointment {} does not exist",
                    appointment.service_id, appointment.id
                ))
            })?;

            booked.push(BookedInterval {
                appointment_id: appointment.id,
                service_id: appointment.service_id,
                start: appointment.date_time,
                duration_minutes: service.duration_minutes,
            });
        }

        booked.sort_by_key(|interval| interval.start);
        Ok(booked)
    }

    /// Exclusion check run inside the write guard.
    fn ensure_slot_free(&self, appointment: &Appointment) -> Result<(), AppointmentError> {
        if !appointment.status.is_active() {
            return Ok(());
        }

        let service = self.services.get(&appointment.service_id)
            .ok_or(AppointmentError::ServiceNotFound)?;
        let candidate = appointment.occupied_interval(service.duration_minutes)?;

        for booked in self.booked_intervals(appointment.service_id, Some(appointment.id), None)? {
            if booked.occupied()?.overlaps(&candidate) {
                warn!("Rejected write of appointment {}: overlaps active booking {}",
                      appointment.id, booked.appointment_id);
                return Err(AppointmentError::SlotUnavailable);
            }
        }

        Ok(())
    }
}

/// Process-local store holding services, slot templates and appointments.
/// Every write takes the single write lock, so check and write form one
/// atomic step.
#[derive(Default)]
pub struct InMemoryClinicStore {
    state: RwLock<ClinicState>,
}

impl InMemoryClinicStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_service(&self, service: Service) -> Result<(), AppointmentError> {
        if service.duration_minutes <= 0 {
            return Err(AppointmentError::ValidationError(
                "Service duration must be a positive number of minutes".to_string()
            ));
        }
        self.state.write().await.services.insert(service.id, service);
        Ok(())
    }

    pub async fn add_template(&self, template: RecurringSlotTemplate) -> Result<(), AppointmentError> {
        template.validate()?;
        self.state.write().await.templates.push(template);
        Ok(())
    }
}

#[async_trait]
impl AppointmentStore for InMemoryClinicStore {
    async fn find_conflicting(
        &self,
        service_id: Uuid,
        exclude_appointment_id: Option<Uuid>,
        window: Option<BookingWindow>,
    ) -> Result<Vec<BookedInterval>, AppointmentError> {
        self.state.read().await.booked_intervals(service_id, exclude_appointment_id, window)
    }

    async fn get_appointment(&self, appointment_id: Uuid) -> Result<Option<Appointment>, AppointmentError> {
        Ok(self.state.read().await.appointments.get(&appointment_id).cloned())
    }

    async fn search_appointments(
        &self,
        query: &AppointmentSearchQuery,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let state = self.state.read().await;
        let mut found: Vec<Appointment> = state.appointments.values()
            .filter(|appointment| query.matches(appointment))
            .cloned()
            .collect();
        found.sort_by_key(|appointment| appointment.date_time);
        Ok(found)
    }

    async fn insert_appointment(&self, appointment: Appointment) -> Result<Appointment, AppointmentError> {
        let mut state = self.state.write().await;

        if state.appointments.contains_key(&appointment.id) {
            return Err(AppointmentError::DatabaseError(format!(
                "Appointment {} already exists", appointment.id
            )));
        }

        state.ensure_slot_free(&appointment)?;
        state.appointments.insert(appointment.id, appointment.clone());
        debug!("Stored appointment {}", appointment.id);

        Ok(appointment)
    }

    async fn update_appointment(&self, appointment: Appointment) -> Result<Appointment, AppointmentError> {
        let mut state = self.state.write().await;

        let previous_start = state.appointments.get(&appointment.id)
            .map(|stored| stored.date_time)
            .ok_or(AppointmentError::NotFound)?;

        if previous_start != appointment.date_time {
            state.ensure_slot_free(&appointment)?;
        }

        state.appointments.insert(appointment.id, appointment.clone());
        debug!("Updated appointment {}", appointment.id);

        Ok(appointment)
    }
}

#[async_trait]
impl ServiceCatalog for InMemoryClinicStore {
    async fn get_service(&self, service_id: Uuid) -> Result<Option<Service>, AppointmentError> {
        Ok(self.state.read().await.services.get(&service_id).cloned())
    }
}

#[async_trait]
impl SlotTemplateStore for InMemoryClinicStore {
    async fn templates_for_weekday(&self, day_of_week: u8) -> Result<Vec<RecurringSlotTemplate>, AppointmentError> {
        let state = self.state.read().await;
        let mut templates: Vec<RecurringSlotTemplate> = state.templates.iter()
            .filter(|template| template.day_of_week == day_of_week && template.is_active)
            .cloned()
            .collect();
        templates.sort_by_key(|template| template.start_time);
        Ok(templates)
    }
}
