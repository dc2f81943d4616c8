// libs/appointment-cell/src/services/availability.rs
use std::iter;
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use tracing::{debug, warn};
use uuid::Uuid;

use shared_utils::clock::Clock;

use crate::models::{
    day_of_week, AppointmentError, BookingWindow, OccupiedInterval, RecurringSlotTemplate,
    SchedulingConfig, TimeSlot,
};
use crate::services::{load_bookable_service, ClinicStores};

/// Expands weekly slot templates into the candidate start times of one date.
#[derive(Debug, Clone)]
pub struct SlotGenerator {
    granularity: Duration,
    timezone: Tz,
}

impl SlotGenerator {
    pub fn new(config: &SchedulingConfig) -> Self {
        Self {
            granularity: config.granularity(),
            timezone: config.timezone(),
        }
    }

    /// Slots of `date` for a service of length `duration`, ordered by template
    /// start. Templates for other weekdays or inactive ones are ignored; a
    /// candidate is offered only while it ends inside its window.
    pub fn generate<'a>(
        &'a self,
        date: NaiveDate,
        duration: Duration,
        templates: &[RecurringSlotTemplate],
        booked: &'a [OccupiedInterval],
        now: DateTime<Utc>,
    ) -> impl Iterator<Item = TimeSlot> + 'a {
        let weekday = day_of_week(date);

        let mut windows: Vec<(DateTime<Utc>, DateTime<Utc>)> = templates.iter()
            .filter(|template| template.is_active && template.day_of_week == weekday)
            .filter_map(|template| self.window_for(date, template))
            .collect();
        windows.sort_by_key(|(window_start, _)| *window_start);

        let step = self.granularity;

        windows.into_iter().flat_map(move |(window_start, window_end)| {
            iter::successors(Some(window_start), move |current| current.checked_add_signed(step))
                .map_while(move |start| {
                    start.checked_add_signed(duration)
                        .filter(|end| *end <= window_end)
                        .map(|end| OccupiedInterval { start, end })
                })
                .map(move |candidate| self.slot_at(candidate, booked, now))
        })
    }

    /// Starts of `duration`-long bookings that can touch any slot of `date`.
    /// `None` when local midnight cannot be resolved in the clinic zone.
    pub fn booking_window(&self, date: NaiveDate, duration: Duration) -> Option<BookingWindow> {
        let day_start = self.resolve_local(date.and_time(NaiveTime::MIN))?;
        let next_day_start = self.resolve_local(date.succ_opt()?.and_time(NaiveTime::MIN))?;

        BookingWindow::overlapping(&OccupiedInterval { start: day_start, end: next_day_start }, duration)
    }

    fn window_for(
        &self,
        date: NaiveDate,
        template: &RecurringSlotTemplate,
    ) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let start = self.resolve_local(date.and_time(template.start_time));
        let end = self.resolve_local(date.and_time(template.end_time));

        match (start, end) {
            (Some(start), Some(end)) => Some((start, end)),
            _ => {
                warn!(
                    "Skipping slot template {} on {}: wall-clock time does not exist in {}",
                    template.id, date, self.timezone
                );
                None
            }
        }
    }

    /// Ambiguous local times (DST fall-back) resolve to the earlier instant.
    fn resolve_local(&self, local: NaiveDateTime) -> Option<DateTime<Utc>> {
        self.timezone
            .from_local_datetime(&local)
            .earliest()
            .map(|instant| instant.with_timezone(&Utc))
    }

    fn slot_at(
        &self,
        candidate: OccupiedInterval,
        booked: &[OccupiedInterval],
        now: DateTime<Utc>,
    ) -> TimeSlot {
        let is_booked = booked.iter().any(|interval| interval.overlaps(&candidate));

        TimeSlot {
            time: candidate.start.with_timezone(&self.timezone).format("%H:%M").to_string(),
            available: !is_booked && candidate.start > now,
            starts_at: candidate.start,
        }
    }
}

/// Read side of the availability engine.
pub struct SlotAvailabilityService {
    stores: ClinicStores,
    clock: Arc<dyn Clock>,
    generator: SlotGenerator,
}

impl SlotAvailabilityService {
    pub fn new(stores: ClinicStores, clock: Arc<dyn Clock>, config: &SchedulingConfig) -> Self {
        Self {
            stores,
            clock,
            generator: SlotGenerator::new(config),
        }
    }

    /// Bookable slots of `date` for a service. Computed fresh on every call.
    pub async fn compute_available_slots(
        &self,
        date: NaiveDate,
        service_id: Uuid,
    ) -> Result<Vec<TimeSlot>, AppointmentError> {
        debug!("Calculating available slots for service {} on {}", service_id, date);

        let service = load_bookable_service(self.stores.services.as_ref(), service_id).await?;

        let templates = self.stores.templates
            .templates_for_weekday(day_of_week(date))
            .await?;

        if templates.is_empty() {
            debug!("No slot templates for {}", date);
            return Ok(vec![]);
        }

        let window = self.generator.booking_window(date, service.duration());
        let booked = self.stores.appointments
            .find_conflicting(service_id, None, window)
            .await?
            .iter()
            .map(|interval| interval.occupied())
            .collect::<Result<Vec<OccupiedInterval>, _>>()?;

        let now = self.clock.now();
        let slots: Vec<TimeSlot> = self.generator
            .generate(date, service.duration(), &templates, &booked, now)
            .collect();

        debug!(
            "Generated {} slots ({} available) for service {} on {}",
            slots.len(),
            slots.iter().filter(|slot| slot.available).count(),
            service_id,
            date
        );

        Ok(slots)
    }
}
