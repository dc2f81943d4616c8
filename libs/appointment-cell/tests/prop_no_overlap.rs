use std::sync::Arc;
use chrono::Duration;
use proptest::prelude::*;
use uuid::Uuid;

use appointment_cell::models::{
    AppointmentError, AppointmentStatus, CreateAppointmentRequest, SchedulingConfig, Service,
    UpdateAppointmentRequest,
};
use appointment_cell::services::{AppointmentBookingService, ClinicStores};
use appointment_cell::store::{AppointmentStore, InMemoryClinicStore};
use shared_utils::test_utils::{clock_before_monday, monday_at};

#[derive(Debug, Clone)]
enum Op {
    Create { service: usize, offset: i64 },
    Reschedule { target: usize, offset: i64 },
    SetStatus { target: usize, status: AppointmentStatus },
}

fn status_strategy() -> impl Strategy<Value = AppointmentStatus> {
    prop_oneof![
        Just(AppointmentStatus::Confirmed),
        Just(AppointmentStatus::Completed),
        Just(AppointmentStatus::Cancelled),
        Just(AppointmentStatus::NoShow),
    ]
}

// Offsets are 10 minute steps from 08:00
fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0..2usize, 0..60i64).prop_map(|(service, offset)| Op::Create { service, offset }),
        2 => (0..16usize, 0..60i64).prop_map(|(target, offset)| Op::Reschedule { target, offset }),
        1 => (0..16usize, status_strategy()).prop_map(|(target, status)| Op::SetStatus { target, status }),
    ]
}

async fn run_ops(ops: Vec<Op>) -> Result<(), TestCaseError> {
    let store = Arc::new(InMemoryClinicStore::new());
    let service_ids = [Uuid::new_v4(), Uuid::new_v4()];
    for (service_id, duration_minutes) in service_ids.iter().zip([30, 50]) {
        store.add_service(Service {
            id: *service_id,
            name: format!("{} minute service", duration_minutes),
            duration_minutes,
            is_active: true,
        }).await.map_err(|e| TestCaseError::fail(e.to_string()))?;
    }

    let booking = AppointmentBookingService::new(
        ClinicStores::from_store(store.clone()),
        clock_before_monday(),
        SchedulingConfig::default(),
    );

    let patient_id = Uuid::new_v4();
    let mut booked: Vec<Uuid> = Vec::new();

    for op in ops {
        let result = match op {
            Op::Create { service, offset } => booking
                .create_appointment(patient_id, CreateAppointmentRequest {
                    service_id: service_ids[service],
                    date_time: monday_at(8, 0) + Duration::minutes(offset * 10),
                    notes: None,
                })
                .await
                .map(|appointment| booked.push(appointment.id)),
            Op::Reschedule { target, offset } => match booked.get(target) {
                Some(id) => booking
                    .reschedule_appointment(*id, patient_id, monday_at(8, 0) + Duration::minutes(offset * 10))
                    .await
                    .map(|_| ()),
                None => Ok(()),
            },
            Op::SetStatus { target, status } => match booked.get(target) {
                Some(id) => booking
                    .update_appointment(*id, patient_id, UpdateAppointmentRequest {
                        status: Some(status),
                        ..Default::default()
                    })
                    .await
                    .map(|_| ()),
                None => Ok(()),
            },
        };

        // Rejections are expected; only these kinds are legitimate
        if let Err(err) = result {
            prop_assert!(
                matches!(err, AppointmentError::SlotUnavailable | AppointmentError::InvalidTransition(_)),
                "unexpected error: {:?}", err
            );
        }

        for service_id in service_ids {
            let intervals = store
                .find_conflicting(service_id, None, None)
                .await
                .and_then(|booked| booked.iter().map(|interval| interval.occupied()).collect::<Result<Vec<_>, _>>())
                .map_err(|e| TestCaseError::fail(e.to_string()))?;

            for (i, a) in intervals.iter().enumerate() {
                for b in &intervals[i + 1..] {
                    prop_assert!(!a.overlaps(b), "{:?} overlaps {:?}", a, b);
                }
            }
        }
    }

    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn active_bookings_never_overlap(ops in prop::collection::vec(op_strategy(), 1..40)) {
        tokio_test::block_on(run_ops(ops))?;
    }
}
