//! In-memory DirectoryStore for tests and local experiments. The mutex
//! serializes every operation, so the conflict-checked insert is
//! naturally atomic here.

use std::sync::{Arc, Mutex};

use chrono::{NaiveDate, NaiveDateTime, Utc};
use uuid::Uuid;

use crate::directory::DirectoryStore;
use crate::error::{EntityKind, Error, Result, ValidationError};
use crate::models::{
    Appointment, MedicalRecord, NewAppointment, NewMedicalRecord, NewPatient, NewUser, Patient,
    User,
};
use crate::scheduling;

#[derive(Debug, Default)]
struct Inner {
    users: Vec<User>,
    patients: Vec<Patient>,
    appointments: Vec<Appointment>,
    records: Vec<MedicalRecord>,
}

/// In-memory DirectoryStore.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl DirectoryStore for MemoryStore {
    async fn get_user(&self, id: Uuid) -> Result<User> {
        self.lock()
            .users
            .iter()
            .find(|u| u.id == id)
            .cloned()
            .ok_or(Error::NotFound {
                kind: EntityKind::User,
                id,
            })
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        Ok(self
            .lock()
            .users
            .iter()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn create_user(&self, new: NewUser) -> Result<User> {
        let mut inner = self.lock();
        if inner.users.iter().any(|u| u.username == new.username) {
            return Err(ValidationError::DuplicateUsername(new.username).into());
        }
        let user = User {
            id: Uuid::new_v4(),
            username: new.username,
            password_hash: new.password_hash,
            full_name: new.full_name,
            role: new.role,
            created_at: Utc::now(),
        };
        inner.users.push(user.clone());
        Ok(user)
    }

    async fn get_patient(&self, id: Uuid) -> Result<Patient> {
        self.lock()
            .patients
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .ok_or(Error::NotFound {
                kind: EntityKind::Patient,
                id,
            })
    }

    async fn list_patients(&self) -> Result<Vec<Patient>> {
        let mut patients = self.lock().patients.clone();
        patients.sort_by(|a, b| a.full_name.cmp(&b.full_name));
        Ok(patients)
    }

    async fn count_patients(&self) -> Result<i64> {
        Ok(self.lock().patients.len() as i64)
    }

    async fn create_patient(&self, new: NewPatient) -> Result<Patient> {
        let patient = Patient {
            id: Uuid::new_v4(),
            full_name: new.full_name,
            social_name: new.social_name,
            birth_date: new.birth_date,
            dependent: new.dependent,
            address: new.address,
            email: new.email,
            phone: new.phone,
            education: new.education,
            religion: new.religion,
            marital_status: new.marital_status,
            service_requested: new.service_requested,
            service_requested_other: new.service_requested_other,
            created_at: Utc::now(),
        };
        self.lock().patients.push(patient.clone());
        Ok(patient)
    }

    async fn insert_appointment(&self, new: NewAppointment) -> Result<Appointment> {
        let mut inner = self.lock();
        let (day_start, day_end) = scheduling::day_bounds(new.start);
        let same_day: Vec<Appointment> = inner
            .appointments
            .iter()
            .filter(|a| a.room == new.room && a.start >= day_start && a.start < day_end)
            .cloned()
            .collect();
        if let Some((start, end)) = scheduling::find_conflict(&new, &same_day) {
            return Err(Error::RoomUnavailable {
                room: new.room,
                start,
                end,
            });
        }
        let appointment = Appointment {
            id: Uuid::new_v4(),
            patient_id: new.patient_id,
            physician_id: new.physician_id,
            room: new.room,
            start: new.start,
            duration_minutes: new.duration_minutes,
            notes: new.notes,
            created_at: Utc::now(),
        };
        inner.appointments.push(appointment.clone());
        Ok(appointment)
    }

    async fn appointments_for_room_on(
        &self,
        room: &str,
        day: NaiveDate,
    ) -> Result<Vec<Appointment>> {
        let (day_start, day_end) = scheduling::day_bounds(day.and_time(chrono::NaiveTime::MIN));
        let mut found: Vec<Appointment> = self
            .lock()
            .appointments
            .iter()
            .filter(|a| a.room == room && a.start >= day_start && a.start < day_end)
            .cloned()
            .collect();
        found.sort_by_key(|a| a.start);
        Ok(found)
    }

    async fn upcoming_appointments(
        &self,
        after: NaiveDateTime,
        limit: i64,
    ) -> Result<Vec<Appointment>> {
        let mut found: Vec<Appointment> = self
            .lock()
            .appointments
            .iter()
            .filter(|a| a.start >= after)
            .cloned()
            .collect();
        found.sort_by_key(|a| a.start);
        found.truncate(limit as usize);
        Ok(found)
    }

    async fn recent_appointments(&self, limit: i64) -> Result<Vec<Appointment>> {
        let mut found = self.lock().appointments.clone();
        found.sort_by_key(|a| std::cmp::Reverse(a.start));
        found.truncate(limit as usize);
        Ok(found)
    }

    async fn appointments_for_physician(&self, physician_id: Uuid) -> Result<Vec<Appointment>> {
        let mut found: Vec<Appointment> = self
            .lock()
            .appointments
            .iter()
            .filter(|a| a.physician_id == physician_id)
            .cloned()
            .collect();
        found.sort_by_key(|a| a.start);
        Ok(found)
    }

    async fn insert_medical_record(&self, new: NewMedicalRecord) -> Result<MedicalRecord> {
        let record = MedicalRecord {
            id: Uuid::new_v4(),
            patient_id: new.patient_id,
            author_id: new.author_id,
            session_time: new.session_time,
            text: new.text,
            created_at: Utc::now(),
        };
        self.lock().records.push(record.clone());
        Ok(record)
    }

    async fn medical_records_for_patient(&self, patient_id: Uuid) -> Result<Vec<MedicalRecord>> {
        let mut found: Vec<MedicalRecord> = self
            .lock()
            .records
            .iter()
            .filter(|r| r.patient_id == patient_id)
            .cloned()
            .collect();
        found.sort_by_key(|r| r.session_time);
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    fn at(d: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 4, d)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn booking(room: &str, start: NaiveDateTime, minutes: i32) -> NewAppointment {
        NewAppointment {
            patient_id: Uuid::new_v4(),
            physician_id: Uuid::new_v4(),
            room: room.into(),
            start,
            duration_minutes: minutes,
            notes: None,
        }
    }

    #[tokio::test]
    async fn usernames_are_unique() {
        let store = MemoryStore::new();
        let new = |u: &str| NewUser {
            username: u.into(),
            password_hash: "$argon2id$test".into(),
            full_name: "X".into(),
            role: Role::Reception,
        };
        store.create_user(new("dup")).await.unwrap();
        assert!(matches!(
            store.create_user(new("dup")).await,
            Err(Error::Validation(ValidationError::DuplicateUsername(_)))
        ));
    }

    #[tokio::test]
    async fn insert_appointment_checks_conflicts_atomically() {
        let store = MemoryStore::new();
        store
            .insert_appointment(booking("Sala 1", at(1, 10, 0), 30))
            .await
            .unwrap();

        assert!(matches!(
            store
                .insert_appointment(booking("Sala 1", at(1, 10, 15), 40))
                .await,
            Err(Error::RoomUnavailable { .. })
        ));
        // Another room or another day is free.
        store
            .insert_appointment(booking("Sala 2", at(1, 10, 15), 40))
            .await
            .unwrap();
        store
            .insert_appointment(booking("Sala 1", at(2, 10, 15), 40))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn day_schedule_is_ordered_and_scoped() {
        let store = MemoryStore::new();
        store
            .insert_appointment(booking("Sala 1", at(1, 15, 0), 30))
            .await
            .unwrap();
        store
            .insert_appointment(booking("Sala 1", at(1, 9, 0), 30))
            .await
            .unwrap();
        store
            .insert_appointment(booking("Sala 1", at(2, 9, 0), 30))
            .await
            .unwrap();

        let day = NaiveDate::from_ymd_opt(2024, 4, 1).unwrap();
        let schedule = store.appointments_for_room_on("Sala 1", day).await.unwrap();
        assert_eq!(schedule.len(), 2);
        assert!(schedule[0].start < schedule[1].start);
    }
}
