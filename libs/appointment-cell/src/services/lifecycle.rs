// libs/appointment-cell/src/services/lifecycle.rs
use tracing::{debug, info, warn};

use crate::models::{AppointmentError, AppointmentStatus};

#[derive(Debug, Default, Clone, Copy)]
pub struct AppointmentLifecycleService;

impl AppointmentLifecycleService {
    pub fn new() -> Self {
        Self
    }

    /// Validate that a status transition is allowed
    pub fn validate_status_transition(
        &self,
        current_status: AppointmentStatus,
        new_status: AppointmentStatus,
    ) -> Result<(), AppointmentError> {
        debug!("Validating status transition from {} to {}", current_status, new_status);

        if !self.get_valid_transitions(current_status).contains(&new_status) {
            warn!("Invalid status transition attempted: {} -> {}", current_status, new_status);
            return Err(AppointmentError::InvalidTransition(current_status));
        }

        info!("Status transition validated: {} -> {}", current_status, new_status);
        Ok(())
    }

    /// Get all valid next statuses for a given current status
    pub fn get_valid_transitions(&self, current_status: AppointmentStatus) -> Vec<AppointmentStatus> {
        match current_status {
            AppointmentStatus::Pending => vec![
                AppointmentStatus::Confirmed,
                AppointmentStatus::Cancelled,
                AppointmentStatus::NoShow,
            ],
            AppointmentStatus::Confirmed => vec![
                AppointmentStatus::Completed,
                AppointmentStatus::Cancelled,
                AppointmentStatus::NoShow,
            ],
            // Terminal states - no transitions allowed
            AppointmentStatus::Completed
            | AppointmentStatus::Cancelled
            | AppointmentStatus::NoShow => vec![],
        }
    }

    /// Decide what a requested status change means for an appointment.
    /// Returns `None` when the request leaves a non-terminal status as it is.
    pub fn resolve_status_change(
        &self,
        current_status: AppointmentStatus,
        requested: AppointmentStatus,
    ) -> Result<Option<AppointmentStatus>, AppointmentError> {
        if current_status == requested && !current_status.is_terminal() {
            debug!("Status already {}, nothing to change", current_status);
            return Ok(None);
        }

        self.validate_status_transition(current_status, requested)?;
        Ok(Some(requested))
    }

    /// Only appointments still holding their slot may move to another time.
    pub fn ensure_reschedulable(&self, current_status: AppointmentStatus) -> Result<(), AppointmentError> {
        if current_status.is_terminal() {
            warn!("Cannot reschedule appointment in status {}", current_status);
            return Err(AppointmentError::InvalidTransition(current_status));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use crate::models::AppointmentStatus::*;

    const ALL: [AppointmentStatus; 5] = [Pending, Confirmed, Completed, Cancelled, NoShow];

    #[test]
    fn active_statuses_follow_the_transition_table() {
        let lifecycle = AppointmentLifecycleService::new();

        assert!(lifecycle.validate_status_transition(Pending, Confirmed).is_ok());
        assert!(lifecycle.validate_status_transition(Pending, Cancelled).is_ok());
        assert!(lifecycle.validate_status_transition(Pending, NoShow).is_ok());
        assert!(lifecycle.validate_status_transition(Confirmed, Completed).is_ok());
        assert!(lifecycle.validate_status_transition(Confirmed, Cancelled).is_ok());
        assert!(lifecycle.validate_status_transition(Confirmed, NoShow).is_ok());

        assert_matches!(
            lifecycle.validate_status_transition(Pending, Completed),
            Err(AppointmentError::InvalidTransition(Pending))
        );
        assert_matches!(
            lifecycle.validate_status_transition(Confirmed, Pending),
            Err(AppointmentError::InvalidTransition(Confirmed))
        );
    }

    #[test]
    fn terminal_statuses_never_move() {
        let lifecycle = AppointmentLifecycleService::new();

        for terminal in [Completed, Cancelled, NoShow] {
            assert!(lifecycle.get_valid_transitions(terminal).is_empty());
            for target in ALL {
                assert_matches!(
                    lifecycle.validate_status_transition(terminal, target),
                    Err(AppointmentError::InvalidTransition(status)) if status == terminal
                );
            }
        }
    }

    #[test]
    fn same_status_is_a_no_op_only_while_active() {
        let lifecycle = AppointmentLifecycleService::new();

        assert_eq!(lifecycle.resolve_status_change(Pending, Pending), Ok(None));
        assert_eq!(lifecycle.resolve_status_change(Confirmed, Confirmed), Ok(None));
        assert_eq!(lifecycle.resolve_status_change(Pending, Confirmed), Ok(Some(Confirmed)));
        assert_eq!(
            lifecycle.resolve_status_change(Cancelled, Cancelled),
            Err(AppointmentError::InvalidTransition(Cancelled))
        );
    }

    #[test]
    fn only_active_appointments_can_be_rescheduled() {
        let lifecycle = AppointmentLifecycleService::new();

        assert!(lifecycle.ensure_reschedulable(Pending).is_ok());
        assert!(lifecycle.ensure_reschedulable(Confirmed).is_ok());
        assert_eq!(
            lifecycle.ensure_reschedulable(Completed),
            Err(AppointmentError::InvalidTransition(Completed))
        );
        assert_eq!(
            lifecycle.ensure_reschedulable(NoShow),
            Err(AppointmentError::InvalidTransition(NoShow))
        );
    }
}
