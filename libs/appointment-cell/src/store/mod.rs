// libs/appointment-cell/src/store/mod.rs
//
// Persistence ports used by the scheduling services. Adapters must enforce
// the no-overlap invariant atomically with their writes: the services check
// first to produce a precise error, the store re-checks so two concurrent
// requests cannot both pass the check and both write.

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{
    Appointment, AppointmentError, AppointmentSearchQuery, BookedInterval, BookingWindow,
    RecurringSlotTemplate, Service,
};

pub mod memory;
pub mod supabase;

pub use memory::InMemoryClinicStore;
pub use supabase::SupabaseClinicStore;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AppointmentStore: Send + Sync {
    /// Active (pending or confirmed) bookings of a service, each with the
    /// current duration of its own service. With a window, only bookings
    /// starting inside it are returned.
    async fn find_conflicting(
        &self,
        service_id: Uuid,
        exclude_appointment_id: Option<Uuid>,
        window: Option<BookingWindow>,
    ) -> Result<Vec<BookedInterval>, AppointmentError>;

    async fn get_appointment(&self, appointment_id: Uuid) -> Result<Option<Appointment>, AppointmentError>;

    /// Matching appointments ordered by `date_time` ascending.
    async fn search_appointments(
        &self,
        query: &AppointmentSearchQuery,
    ) -> Result<Vec<Appointment>, AppointmentError>;

    /// Persist a new appointment. Fails with `SlotUnavailable` when an active
    /// appointment would overlap another active booking of the same service.
    async fn insert_appointment(&self, appointment: Appointment) -> Result<Appointment, AppointmentError>;

    /// Replace a stored appointment. A changed `date_time` is re-checked for
    /// overlap against every other active booking; status and notes changes
    /// are written as-is.
    async fn update_appointment(&self, appointment: Appointment) -> Result<Appointment, AppointmentError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ServiceCatalog: Send + Sync {
    async fn get_service(&self, service_id: Uuid) -> Result<Option<Service>, AppointmentError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SlotTemplateStore: Send + Sync {
    async fn templates_for_weekday(&self, day_of_week: u8) -> Result<Vec<RecurringSlotTemplate>, AppointmentError>;
}
