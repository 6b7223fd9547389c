//! # Directory — the shared persistence interface and guarded CRUD
//!
//! [`DirectoryStore`] is the async interface every backend implements.
//! All reads and writes from the scheduling engine and the ledger go
//! through it, so the same logic works against PostgreSQL
//! ([`crate::PgStore`]) or the in-memory test backend
//! ([`crate::MemoryStore`]). The core never reaches through an object
//! graph: every related row is fetched by an explicit query method.
//!
//! [`Directory`] wraps a store with the guarded directory operations:
//!
//! | Method | Capability |
//! |--------|-----------|
//! | [`Directory::create_user`] | `CreateUser` (administrator, management) |
//! | [`Directory::register_patient`] | `RegisterPatient` |
//! | [`Directory::patients`] / [`Directory::patient`] | `ViewPatients` |
//! | [`Directory::dashboard`] | `ViewDashboard` |
//!
//! The one write with non-trivial semantics is
//! [`DirectoryStore::insert_appointment`]: it is the unit of atomicity for
//! scheduling and must run the day-scoped conflict check and the insert as
//! one step (see [`crate::scheduling::find_conflict`]), so two concurrent
//! proposals for the same room cannot both commit.

use chrono::{NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::error::Result;
use crate::guard::{authorize, Capability};
use crate::models::{
    Appointment, MedicalRecord, NewAppointment, NewMedicalRecord, NewPatient, NewUser, Patient,
    User,
};

/// Async persistence interface for users, patients, appointments, and
/// medical records.
#[allow(async_fn_in_trait)]
pub trait DirectoryStore {
    async fn get_user(&self, id: Uuid) -> Result<User>;
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>>;
    async fn create_user(&self, new: NewUser) -> Result<User>;

    async fn get_patient(&self, id: Uuid) -> Result<Patient>;
    /// All patients, ordered by full name.
    async fn list_patients(&self) -> Result<Vec<Patient>>;
    async fn count_patients(&self) -> Result<i64>;
    async fn create_patient(&self, new: NewPatient) -> Result<Patient>;

    /// Atomic conflict-checked insert. Fails with
    /// [`crate::Error::RoomUnavailable`] when the proposed window overlaps
    /// an existing booking in the same room on the same day.
    async fn insert_appointment(&self, new: NewAppointment) -> Result<Appointment>;
    /// Bookings in `room` whose start falls on `day`, ordered by start.
    async fn appointments_for_room_on(&self, room: &str, day: NaiveDate)
        -> Result<Vec<Appointment>>;
    /// The next bookings starting at or after `after`, ascending.
    async fn upcoming_appointments(
        &self,
        after: NaiveDateTime,
        limit: i64,
    ) -> Result<Vec<Appointment>>;
    /// The most recently starting bookings, descending.
    async fn recent_appointments(&self, limit: i64) -> Result<Vec<Appointment>>;
    /// A physician's bookings, ordered by start.
    async fn appointments_for_physician(&self, physician_id: Uuid) -> Result<Vec<Appointment>>;

    async fn insert_medical_record(&self, new: NewMedicalRecord) -> Result<MedicalRecord>;
    /// A patient's ledger, ascending by session time.
    async fn medical_records_for_patient(&self, patient_id: Uuid) -> Result<Vec<MedicalRecord>>;
}

/// Data backing the landing dashboard.
#[derive(Clone, Debug, Serialize)]
pub struct Dashboard {
    /// The next five bookings.
    pub upcoming: Vec<Appointment>,
    pub patient_count: i64,
    /// Every patient, ordered by name.
    pub patients: Vec<Patient>,
}

/// Guarded user and patient directory over a [`DirectoryStore`].
#[derive(Clone, Debug)]
pub struct Directory<S> {
    store: S,
}

impl<S: DirectoryStore> Directory<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Create a staff account. Restricted to administrator and management;
    /// a taken username fails with `DuplicateUsername`.
    pub async fn create_user(&self, actor: Option<&User>, new: NewUser) -> Result<User> {
        authorize(actor, Capability::CreateUser)?;
        if let Some(existing) = self.store.find_user_by_username(&new.username).await? {
            return Err(crate::ValidationError::DuplicateUsername(existing.username).into());
        }
        let user = self.store.create_user(new).await?;
        info!(username = %user.username, role = %user.role, "created user");
        Ok(user)
    }

    /// Register a patient at intake. Open to any authenticated role.
    pub async fn register_patient(&self, actor: Option<&User>, new: NewPatient) -> Result<Patient> {
        authorize(actor, Capability::RegisterPatient)?;
        let patient = self.store.create_patient(new).await?;
        info!(patient = %patient.id, "registered patient");
        Ok(patient)
    }

    pub async fn patients(&self, actor: Option<&User>) -> Result<Vec<Patient>> {
        authorize(actor, Capability::ViewPatients)?;
        self.store.list_patients().await
    }

    pub async fn patient(&self, actor: Option<&User>, id: Uuid) -> Result<Patient> {
        authorize(actor, Capability::ViewPatients)?;
        self.store.get_patient(id).await
    }

    /// The landing-page summary: next five bookings, patient count, and
    /// the full patient list.
    pub async fn dashboard(&self, actor: Option<&User>) -> Result<Dashboard> {
        authorize(actor, Capability::ViewDashboard)?;
        let now = Utc::now().naive_utc();
        Ok(Dashboard {
            upcoming: self.store.upcoming_appointments(now, 5).await?,
            patient_count: self.store.count_patients().await?,
            patients: self.store.list_patients().await?,
        })
    }
}
