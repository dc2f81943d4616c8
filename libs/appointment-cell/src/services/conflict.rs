// libs/appointment-cell/src/services/conflict.rs
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use shared_utils::clock::Clock;

use crate::models::{AppointmentError, BookingWindow, OccupiedInterval, Service};
use crate::services::{load_bookable_service, ClinicStores};

pub struct ConflictDetectionService {
    stores: ClinicStores,
    clock: Arc<dyn Clock>,
}

impl ConflictDetectionService {
    pub fn new(stores: ClinicStores, clock: Arc<dyn Clock>) -> Self {
        Self { stores, clock }
    }

    /// Check that an appointment of `service_id` can start at `start`.
    /// `exclude_appointment_id` lets a reschedule ignore its own booking.
    pub async fn check_availability(
        &self,
        start: DateTime<Utc>,
        service_id: Uuid,
        exclude_appointment_id: Option<Uuid>,
    ) -> Result<(), AppointmentError> {
        let service = load_bookable_service(self.stores.services.as_ref(), service_id).await?;
        self.check_service_availability(&service, start, exclude_appointment_id).await
    }

    /// Same as [`check_availability`](Self::check_availability) for an
    /// already loaded, bookable service.
    pub async fn check_service_availability(
        &self,
        service: &Service,
        start: DateTime<Utc>,
        exclude_appointment_id: Option<Uuid>,
    ) -> Result<(), AppointmentError> {
        let now = self.clock.now();
        if start <= now {
            warn!("Rejected start {} for service {}: not after {}", start, service.id, now);
            return Err(AppointmentError::InThePast);
        }

        let candidate = OccupiedInterval::starting_at(start, service.duration_minutes)?;
        debug!("Checking conflicts for service {} from {} to {}",
               service.id, candidate.start, candidate.end);

        // Bookings of one service share its duration, so this window is exact
        let window = BookingWindow::overlapping(&candidate, service.duration());
        let existing = self.stores.appointments
            .find_conflicting(service.id, exclude_appointment_id, window)
            .await?;

        let mut conflicting = Vec::new();
        for booked in &existing {
            if booked.occupied()?.overlaps(&candidate) {
                conflicting.push(booked.appointment_id);
            }
        }

        if !conflicting.is_empty() {
            warn!("Conflict detected for service {} - {} conflicting appointments: {:?}",
                  service.id, conflicting.len(), conflicting);
            return Err(AppointmentError::SlotUnavailable);
        }

        Ok(())
    }
}
