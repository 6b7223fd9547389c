//! # Scheduling engine — slot validation and room-conflict detection
//!
//! [`Scheduler::propose`] turns a [`NewAppointment`] into a committed
//! booking or a typed failure. Preconditions run in a fixed order, each
//! short-circuiting with its own error:
//!
//! 1. authorization — any authenticated role may book,
//! 2. duration must be one of [`SLOT_MINUTES`],
//! 3. the start's time of day must fall in the opening window
//!    ([`within_opening_hours`]),
//! 4. the room must be one of [`ROOMS`],
//! 5. patient and physician must exist,
//! 6. the proposed window must not overlap an existing booking in the same
//!    room on the same day.
//!
//! ## Conflict rule
//!
//! A booking occupies the half-open window `[start, start + duration)`.
//! Two windows conflict iff `a.start < b.end && a.end > b.start`
//! ([`overlaps`]); back-to-back slots share an instant but do not
//! conflict. The check is day-scoped: only bookings whose start falls
//! between local midnight and the next midnight of the proposed start's
//! date are considered ([`day_bounds`]).
//!
//! ## Opening window
//!
//! A start is accepted iff `9 <= hour < 17`, or exactly 17:00. The 17:00
//! case lets a booking extend past closing; that is the clinic's
//! long-standing policy and is preserved here deliberately.
//!
//! ## Atomicity
//!
//! Step 6 and the insert are a single unit: the store's
//! [`insert_appointment`](crate::DirectoryStore::insert_appointment)
//! re-runs [`find_conflict`] under a per-room-per-day lock before
//! committing, so two simultaneous proposals for the same slot cannot
//! both succeed.

use chrono::{Duration, NaiveDate, NaiveDateTime, Timelike};
use tracing::{info, warn};

use crate::directory::DirectoryStore;
use crate::error::{Error, Result, ValidationError};
use crate::guard::{authorize, Capability};
use crate::models::{Appointment, NewAppointment, User};

/// The clinic's consultation rooms.
pub const ROOMS: &[&str] = &["Sala 1", "Sala 2", "Sala 3", "Sala 4"];

/// Permitted slot lengths, in minutes.
pub const SLOT_MINUTES: &[i32] = &[30, 40, 60];

/// First bookable hour of the day.
pub const OPENING_HOUR: u32 = 9;

/// Last bookable hour; a start of exactly 17:00 is still accepted.
pub const CLOSING_HOUR: u32 = 17;

/// Half-open occupied window `[start, start + minutes)`.
pub fn interval(start: NaiveDateTime, minutes: i32) -> (NaiveDateTime, NaiveDateTime) {
    (start, start + Duration::minutes(i64::from(minutes)))
}

/// Half-open overlap: windows that merely touch do not overlap.
pub fn overlaps(a: (NaiveDateTime, NaiveDateTime), b: (NaiveDateTime, NaiveDateTime)) -> bool {
    a.0 < b.1 && a.1 > b.0
}

/// Local midnight-to-midnight bounds of the day containing `at`.
pub fn day_bounds(at: NaiveDateTime) -> (NaiveDateTime, NaiveDateTime) {
    let midnight = at.date().and_time(chrono::NaiveTime::MIN);
    (midnight, midnight + Duration::days(1))
}

/// Whether the start's time of day falls in the opening window,
/// including the exact-17:00 boundary case.
pub fn within_opening_hours(start: NaiveDateTime) -> bool {
    let (hour, minute) = (start.hour(), start.minute());
    (OPENING_HOUR..CLOSING_HOUR).contains(&hour) || (hour == CLOSING_HOUR && minute == 0)
}

/// The window of the first booking in `existing` that overlaps the
/// proposal, if any. Shared by every store backend so the conflict rule
/// has exactly one definition.
pub fn find_conflict(
    proposed: &NewAppointment,
    existing: &[Appointment],
) -> Option<(NaiveDateTime, NaiveDateTime)> {
    let wanted = interval(proposed.start, proposed.duration_minutes);
    existing
        .iter()
        .map(|booked| interval(booked.start, booked.duration_minutes))
        .find(|&taken| overlaps(wanted, taken))
}

/// Guarded scheduling operations over a [`DirectoryStore`].
#[derive(Clone, Debug)]
pub struct Scheduler<S> {
    store: S,
}

impl<S: DirectoryStore> Scheduler<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Validate and commit a booking.
    pub async fn propose(
        &self,
        actor: Option<&User>,
        proposal: NewAppointment,
    ) -> Result<Appointment> {
        authorize(actor, Capability::ScheduleAppointment)?;

        if !SLOT_MINUTES.contains(&proposal.duration_minutes) {
            return Err(ValidationError::InvalidDuration(proposal.duration_minutes).into());
        }
        if !within_opening_hours(proposal.start) {
            return Err(ValidationError::OutsideOpeningHours(proposal.start).into());
        }
        if !ROOMS.contains(&proposal.room.as_str()) {
            return Err(ValidationError::UnknownRoom(proposal.room.clone()).into());
        }

        // Dangling references are NotFound, never a silent accept.
        self.store.get_patient(proposal.patient_id).await?;
        self.store.get_user(proposal.physician_id).await?;

        match self.store.insert_appointment(proposal).await {
            Ok(appointment) => {
                info!(
                    room = %appointment.room,
                    start = %appointment.start,
                    minutes = appointment.duration_minutes,
                    "booked appointment"
                );
                Ok(appointment)
            }
            Err(err @ Error::RoomUnavailable { .. }) => {
                warn!(%err, "rejected conflicting booking");
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    /// Bookings in a room on one day, for the booking screen.
    pub async fn day_schedule(
        &self,
        actor: Option<&User>,
        room: &str,
        day: NaiveDate,
    ) -> Result<Vec<Appointment>> {
        authorize(actor, Capability::ViewSchedule)?;
        if !ROOMS.contains(&room) {
            return Err(ValidationError::UnknownRoom(room.to_string()).into());
        }
        self.store.appointments_for_room_on(room, day).await
    }

    /// The most recent bookings, newest first.
    pub async fn recent(&self, actor: Option<&User>, limit: i64) -> Result<Vec<Appointment>> {
        authorize(actor, Capability::ViewSchedule)?;
        self.store.recent_appointments(limit).await
    }

    /// The acting user's own bookings, ordered by start.
    pub async fn agenda(&self, actor: Option<&User>) -> Result<Vec<Appointment>> {
        let user = authorize(actor, Capability::ViewSchedule)?;
        self.store.appointments_for_physician(user.id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::models::{NewPatient, NewUser, Patient, Role};
    use uuid::Uuid;

    async fn seeded(store: &MemoryStore) -> (User, Patient) {
        let physician = store
            .create_user(NewUser {
                username: "dr.santos".into(),
                password_hash: "$argon2id$test".into(),
                full_name: "Dr. Santos".into(),
                role: Role::Physician,
            })
            .await
            .unwrap();
        let patient = store
            .create_patient(NewPatient {
                full_name: "Jo\u{e3}o Pereira".into(),
                social_name: None,
                birth_date: chrono::NaiveDate::from_ymd_opt(1978, 11, 2).unwrap(),
                dependent: None,
                address: "Av. C, 300".into(),
                email: "joao@example.com".into(),
                phone: "11 97777-0000".into(),
                education: "fundamental".into(),
                religion: None,
                marital_status: "viuvo".into(),
                service_requested: "fisioterapia".into(),
                service_requested_other: None,
            })
            .await
            .unwrap();
        (physician, patient)
    }

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> NaiveDateTime {
        chrono::NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, 0)
            .unwrap()
    }

    fn proposal(
        physician: &User,
        patient: &Patient,
        room: &str,
        start: NaiveDateTime,
        minutes: i32,
    ) -> NewAppointment {
        NewAppointment {
            patient_id: patient.id,
            physician_id: physician.id,
            room: room.into(),
            start,
            duration_minutes: minutes,
            notes: None,
        }
    }

    #[test]
    fn touching_windows_do_not_overlap() {
        let a = interval(at(2024, 3, 1, 10, 0), 30);
        let b = interval(at(2024, 3, 1, 10, 30), 30);
        assert!(!overlaps(a, b));
        assert!(!overlaps(b, a));
        assert!(overlaps(a, interval(at(2024, 3, 1, 10, 29), 30)));
    }

    #[test]
    fn opening_window_boundaries() {
        assert!(!within_opening_hours(at(2024, 3, 1, 8, 45)));
        assert!(within_opening_hours(at(2024, 3, 1, 9, 0)));
        assert!(within_opening_hours(at(2024, 3, 1, 16, 59)));
        // Exactly 17:00 is allowed even though the slot runs past closing.
        assert!(within_opening_hours(at(2024, 3, 1, 17, 0)));
        assert!(!within_opening_hours(at(2024, 3, 1, 17, 1)));
        assert!(!within_opening_hours(at(2024, 3, 1, 18, 0)));
    }

    #[tokio::test]
    async fn rejects_durations_outside_the_menu() {
        let store = MemoryStore::new();
        let scheduler = Scheduler::new(store.clone());
        let (physician, patient) = seeded(&store).await;

        for minutes in [0, 15, 45, 90] {
            let err = scheduler
                .propose(
                    Some(&physician),
                    proposal(&physician, &patient, "Sala 1", at(2024, 3, 1, 10, 0), minutes),
                )
                .await
                .unwrap_err();
            assert!(matches!(
                err,
                Error::Validation(ValidationError::InvalidDuration(m)) if m == minutes
            ));
        }
    }

    #[tokio::test]
    async fn rejects_out_of_hours_start_regardless_of_occupancy() {
        let store = MemoryStore::new();
        let scheduler = Scheduler::new(store.clone());
        let (physician, patient) = seeded(&store).await;

        let err = scheduler
            .propose(
                Some(&physician),
                proposal(&physician, &patient, "Sala 1", at(2024, 3, 1, 8, 45), 30),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::OutsideOpeningHours(_))
        ));
    }

    #[tokio::test]
    async fn accepts_the_seventeen_hundred_boundary() {
        let store = MemoryStore::new();
        let scheduler = Scheduler::new(store.clone());
        let (physician, patient) = seeded(&store).await;

        // 17:00 starts are allowed; 17:01 is not.
        scheduler
            .propose(
                Some(&physician),
                proposal(&physician, &patient, "Sala 2", at(2024, 3, 1, 17, 0), 60),
            )
            .await
            .unwrap();
        let err = scheduler
            .propose(
                Some(&physician),
                proposal(&physician, &patient, "Sala 2", at(2024, 3, 2, 17, 1), 30),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::OutsideOpeningHours(_))
        ));
    }

    #[tokio::test]
    async fn rejects_rooms_outside_the_fixed_set() {
        let store = MemoryStore::new();
        let scheduler = Scheduler::new(store.clone());
        let (physician, patient) = seeded(&store).await;

        let err = scheduler
            .propose(
                Some(&physician),
                proposal(&physician, &patient, "Sala 9", at(2024, 3, 1, 10, 0), 30),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::UnknownRoom(_))
        ));
    }

    #[tokio::test]
    async fn overlapping_booking_in_the_same_room_is_refused() {
        let store = MemoryStore::new();
        let scheduler = Scheduler::new(store.clone());
        let (physician, patient) = seeded(&store).await;

        // Sala 1 occupied 10:00 to 10:30.
        scheduler
            .propose(
                Some(&physician),
                proposal(&physician, &patient, "Sala 1", at(2024, 3, 1, 10, 0), 30),
            )
            .await
            .unwrap();

        // 10:15 + 40min lands inside the occupied window.
        let err = scheduler
            .propose(
                Some(&physician),
                proposal(&physician, &patient, "Sala 1", at(2024, 3, 1, 10, 15), 40),
            )
            .await
            .unwrap_err();
        match err {
            Error::RoomUnavailable { room, start, end } => {
                assert_eq!(room, "Sala 1");
                assert_eq!(start, at(2024, 3, 1, 10, 0));
                assert_eq!(end, at(2024, 3, 1, 10, 30));
            }
            other => panic!("expected RoomUnavailable, got {other:?}"),
        }

        // Back-to-back at 10:30 is fine.
        scheduler
            .propose(
                Some(&physician),
                proposal(&physician, &patient, "Sala 1", at(2024, 3, 1, 10, 30), 30),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn same_slot_in_another_room_is_accepted() {
        let store = MemoryStore::new();
        let scheduler = Scheduler::new(store.clone());
        let (physician, patient) = seeded(&store).await;

        scheduler
            .propose(
                Some(&physician),
                proposal(&physician, &patient, "Sala 1", at(2024, 3, 1, 10, 0), 60),
            )
            .await
            .unwrap();
        scheduler
            .propose(
                Some(&physician),
                proposal(&physician, &patient, "Sala 2", at(2024, 3, 1, 10, 0), 60),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn conflict_check_is_day_scoped() {
        let store = MemoryStore::new();
        let scheduler = Scheduler::new(store.clone());
        let (physician, patient) = seeded(&store).await;

        // Same room, same clock time, different days: both accepted.
        scheduler
            .propose(
                Some(&physician),
                proposal(&physician, &patient, "Sala 3", at(2024, 3, 1, 11, 0), 30),
            )
            .await
            .unwrap();
        scheduler
            .propose(
                Some(&physician),
                proposal(&physician, &patient, "Sala 3", at(2024, 3, 2, 11, 0), 30),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn unknown_patient_or_physician_is_not_found() {
        let store = MemoryStore::new();
        let scheduler = Scheduler::new(store.clone());
        let (physician, patient) = seeded(&store).await;

        let mut ghost_patient =
            proposal(&physician, &patient, "Sala 1", at(2024, 3, 1, 10, 0), 30);
        ghost_patient.patient_id = Uuid::new_v4();
        assert!(matches!(
            scheduler.propose(Some(&physician), ghost_patient).await,
            Err(Error::NotFound { .. })
        ));

        let mut ghost_physician =
            proposal(&physician, &patient, "Sala 1", at(2024, 3, 1, 10, 0), 30);
        ghost_physician.physician_id = Uuid::new_v4();
        assert!(matches!(
            scheduler.propose(Some(&physician), ghost_physician).await,
            Err(Error::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn booking_requires_a_session() {
        let store = MemoryStore::new();
        let scheduler = Scheduler::new(store.clone());
        let (physician, patient) = seeded(&store).await;

        let err = scheduler
            .propose(
                None,
                proposal(&physician, &patient, "Sala 1", at(2024, 3, 1, 10, 0), 30),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Unauthenticated));
    }

    #[tokio::test]
    async fn agenda_lists_only_the_actors_bookings() {
        let store = MemoryStore::new();
        let scheduler = Scheduler::new(store.clone());
        let (physician, patient) = seeded(&store).await;
        let colleague = store
            .create_user(NewUser {
                username: "dr.alves".into(),
                password_hash: "$argon2id$test".into(),
                full_name: "Dr. Alves".into(),
                role: Role::Physician,
            })
            .await
            .unwrap();

        scheduler
            .propose(
                Some(&physician),
                proposal(&physician, &patient, "Sala 1", at(2024, 3, 1, 14, 0), 30),
            )
            .await
            .unwrap();
        scheduler
            .propose(
                Some(&colleague),
                proposal(&colleague, &patient, "Sala 2", at(2024, 3, 1, 9, 0), 30),
            )
            .await
            .unwrap();

        let agenda = scheduler.agenda(Some(&physician)).await.unwrap();
        assert_eq!(agenda.len(), 1);
        assert_eq!(agenda[0].physician_id, physician.id);
    }
}
