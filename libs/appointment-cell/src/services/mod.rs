pub mod availability;
pub mod booking;
pub mod conflict;
pub mod lifecycle;

use std::sync::Arc;

use tracing::warn;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{AppointmentError, Service};
use crate::store::{AppointmentStore, ServiceCatalog, SlotTemplateStore, SupabaseClinicStore};

pub use availability::{SlotAvailabilityService, SlotGenerator};
pub use booking::AppointmentBookingService;
pub use conflict::ConflictDetectionService;
pub use lifecycle::AppointmentLifecycleService;

/// The ports a scheduling service reads from and writes to.
#[derive(Clone)]
pub struct ClinicStores {
    pub appointments: Arc<dyn AppointmentStore>,
    pub services: Arc<dyn ServiceCatalog>,
    pub templates: Arc<dyn SlotTemplateStore>,
}

impl ClinicStores {
    /// Use one backend for every port.
    pub fn from_store<S>(store: Arc<S>) -> Self
    where
        S: AppointmentStore + ServiceCatalog + SlotTemplateStore + 'static,
    {
        Self {
            appointments: store.clone(),
            services: store.clone(),
            templates: store,
        }
    }

    pub fn supabase(config: &AppConfig) -> Self {
        let supabase = Arc::new(SupabaseClient::new(config));
        Self::from_store(Arc::new(SupabaseClinicStore::new(supabase)))
    }
}

/// Look up a service and make sure it can take bookings.
pub(crate) async fn load_bookable_service(
    catalog: &dyn ServiceCatalog,
    service_id: Uuid,
) -> Result<Service, AppointmentError> {
    let service = catalog.get_service(service_id).await?
        .ok_or(AppointmentError::ServiceNotFound)?;

    if !service.is_active {
        warn!("Service {} is not active", service_id);
        return Err(AppointmentError::ServiceInactive);
    }

    if service.duration_minutes <= 0 {
        return Err(AppointmentError::ValidationError(format!(
            "Service {} has a non-positive duration", service_id
        )));
    }

    Ok(service)
}
