//! # PostgreSQL DirectoryStore backed by an sqlx pool
//!
//! Row structs ([`UserRow`], [`PatientRow`], ...) derive
//! [`sqlx::FromRow`] and convert into the domain models; the `role`
//! column is text and is parsed into [`crate::Role`] at load time, so a
//! corrupt value surfaces as a decode error instead of a misbehaving
//! string comparison.
//!
//! ## Conflict-checked insert
//!
//! [`PgStore::insert_appointment`] runs the day query, the overlap check
//! ([`crate::scheduling::find_conflict`]), and the insert inside one
//! transaction that first takes `pg_advisory_xact_lock` keyed on
//! (room, day). Two proposals for the same room and day therefore
//! serialize at the database, and the second sees the first's booking
//! before it commits. The lock key is a stable hash of the room name and
//! the calendar day, so proposals for different rooms or days do not
//! contend.
//!
//! ## Schema
//!
//! [`PgStore::init_schema`] creates the four tables (and the room/day
//! index) with `CREATE TABLE IF NOT EXISTS` at startup. Scheduling
//! times are `TIMESTAMP` (clinic-local, no zone); audit stamps are
//! `TIMESTAMPTZ`.

use std::hash::{DefaultHasher, Hash, Hasher};

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::directory::DirectoryStore;
use crate::error::{EntityKind, Error, Result, ValidationError};
use crate::models::{
    Appointment, Dependent, MedicalRecord, NewAppointment, NewMedicalRecord, NewPatient, NewUser,
    Patient, Role, User,
};
use crate::scheduling;

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS users (
        id UUID PRIMARY KEY,
        username TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        full_name TEXT NOT NULL,
        role TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )",
    "CREATE TABLE IF NOT EXISTS patients (
        id UUID PRIMARY KEY,
        full_name TEXT NOT NULL,
        social_name TEXT,
        birth_date DATE NOT NULL,
        dependent_name TEXT,
        dependent_birth_date DATE,
        dependent_age INTEGER,
        address TEXT NOT NULL,
        email TEXT NOT NULL,
        phone TEXT NOT NULL,
        education TEXT NOT NULL,
        religion TEXT,
        marital_status TEXT NOT NULL,
        service_requested TEXT NOT NULL,
        service_requested_other TEXT,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )",
    "CREATE TABLE IF NOT EXISTS appointments (
        id UUID PRIMARY KEY,
        patient_id UUID NOT NULL REFERENCES patients(id),
        physician_id UUID NOT NULL REFERENCES users(id),
        room TEXT NOT NULL,
        start_time TIMESTAMP NOT NULL,
        duration_minutes INTEGER NOT NULL,
        notes TEXT,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )",
    "CREATE INDEX IF NOT EXISTS appointments_room_start
        ON appointments (room, start_time)",
    "CREATE TABLE IF NOT EXISTS medical_records (
        id UUID PRIMARY KEY,
        patient_id UUID NOT NULL REFERENCES patients(id),
        author_id UUID NOT NULL REFERENCES users(id),
        session_time TIMESTAMP NOT NULL,
        body TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )",
    "CREATE INDEX IF NOT EXISTS medical_records_patient_session
        ON medical_records (patient_id, session_time)",
];

const USER_COLUMNS: &str = "id, username, password_hash, full_name, role, created_at";
const PATIENT_COLUMNS: &str = "id, full_name, social_name, birth_date, dependent_name, \
     dependent_birth_date, dependent_age, address, email, phone, education, religion, \
     marital_status, service_requested, service_requested_other, created_at";
const APPOINTMENT_COLUMNS: &str =
    "id, patient_id, physician_id, room, start_time, duration_minutes, notes, created_at";
const RECORD_COLUMNS: &str = "id, patient_id, author_id, session_time, body, created_at";

/// PostgreSQL-backed DirectoryStore. Cheap to clone; clones share the
/// pool.
#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the tables and indexes if they do not exist.
    pub async fn init_schema(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    username: String,
    password_hash: String,
    full_name: String,
    role: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = sqlx::Error;

    fn try_from(row: UserRow) -> std::result::Result<Self, sqlx::Error> {
        let role: Role = row.role.parse().map_err(|e| sqlx::Error::ColumnDecode {
            index: "role".into(),
            source: Box::new(e),
        })?;
        Ok(User {
            id: row.id,
            username: row.username,
            password_hash: row.password_hash,
            full_name: row.full_name,
            role,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct PatientRow {
    id: Uuid,
    full_name: String,
    social_name: Option<String>,
    birth_date: NaiveDate,
    dependent_name: Option<String>,
    dependent_birth_date: Option<NaiveDate>,
    dependent_age: Option<i32>,
    address: String,
    email: String,
    phone: String,
    education: String,
    religion: Option<String>,
    marital_status: String,
    service_requested: String,
    service_requested_other: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<PatientRow> for Patient {
    fn from(row: PatientRow) -> Self {
        let dependent = row.dependent_name.map(|name| Dependent {
            name,
            birth_date: row.dependent_birth_date,
            age: row.dependent_age,
        });
        Patient {
            id: row.id,
            full_name: row.full_name,
            social_name: row.social_name,
            birth_date: row.birth_date,
            dependent,
            address: row.address,
            email: row.email,
            phone: row.phone,
            education: row.education,
            religion: row.religion,
            marital_status: row.marital_status,
            service_requested: row.service_requested,
            service_requested_other: row.service_requested_other,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct AppointmentRow {
    id: Uuid,
    patient_id: Uuid,
    physician_id: Uuid,
    room: String,
    start_time: NaiveDateTime,
    duration_minutes: i32,
    notes: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<AppointmentRow> for Appointment {
    fn from(row: AppointmentRow) -> Self {
        Appointment {
            id: row.id,
            patient_id: row.patient_id,
            physician_id: row.physician_id,
            room: row.room,
            start: row.start_time,
            duration_minutes: row.duration_minutes,
            notes: row.notes,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct RecordRow {
    id: Uuid,
    patient_id: Uuid,
    author_id: Uuid,
    session_time: NaiveDateTime,
    body: String,
    created_at: DateTime<Utc>,
}

impl From<RecordRow> for MedicalRecord {
    fn from(row: RecordRow) -> Self {
        MedicalRecord {
            id: row.id,
            patient_id: row.patient_id,
            author_id: row.author_id,
            session_time: row.session_time,
            text: row.body,
            created_at: row.created_at,
        }
    }
}

/// Stable advisory-lock key for one room on one calendar day.
fn room_day_key(room: &str, day: NaiveDate) -> i64 {
    let mut hasher = DefaultHasher::new();
    room.hash(&mut hasher);
    day.hash(&mut hasher);
    hasher.finish() as i64
}

impl DirectoryStore for PgStore {
    async fn get_user(&self, id: Uuid) -> Result<User> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        match row {
            Some(row) => Ok(row.try_into()?),
            None => Err(Error::NotFound {
                kind: EntityKind::User,
                id,
            }),
        }
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        row.map(User::try_from).transpose().map_err(Error::from)
    }

    async fn create_user(&self, new: NewUser) -> Result<User> {
        let username = new.username.clone();
        let inserted: std::result::Result<UserRow, sqlx::Error> = sqlx::query_as(&format!(
            "INSERT INTO users (id, username, password_hash, full_name, role)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {USER_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(new.username)
        .bind(new.password_hash)
        .bind(new.full_name)
        .bind(new.role.as_str())
        .fetch_one(&self.pool)
        .await;
        match inserted {
            Ok(row) => Ok(row.try_into()?),
            // Backstop behind the service-level duplicate check.
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(ValidationError::DuplicateUsername(username).into())
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn get_patient(&self, id: Uuid) -> Result<Patient> {
        let row: Option<PatientRow> = sqlx::query_as(&format!(
            "SELECT {PATIENT_COLUMNS} FROM patients WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Patient::from).ok_or(Error::NotFound {
            kind: EntityKind::Patient,
            id,
        })
    }

    async fn list_patients(&self) -> Result<Vec<Patient>> {
        let rows: Vec<PatientRow> = sqlx::query_as(&format!(
            "SELECT {PATIENT_COLUMNS} FROM patients ORDER BY full_name"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Patient::from).collect())
    }

    async fn count_patients(&self) -> Result<i64> {
        let count: (i64,) = sqlx::query_as("SELECT count(*) FROM patients")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0)
    }

    async fn create_patient(&self, new: NewPatient) -> Result<Patient> {
        let (dependent_name, dependent_birth_date, dependent_age) = match new.dependent {
            Some(d) => (Some(d.name), d.birth_date, d.age),
            None => (None, None, None),
        };
        let row: PatientRow = sqlx::query_as(&format!(
            "INSERT INTO patients (id, full_name, social_name, birth_date, dependent_name,
                 dependent_birth_date, dependent_age, address, email, phone, education,
                 religion, marital_status, service_requested, service_requested_other)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
             RETURNING {PATIENT_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(new.full_name)
        .bind(new.social_name)
        .bind(new.birth_date)
        .bind(dependent_name)
        .bind(dependent_birth_date)
        .bind(dependent_age)
        .bind(new.address)
        .bind(new.email)
        .bind(new.phone)
        .bind(new.education)
        .bind(new.religion)
        .bind(new.marital_status)
        .bind(new.service_requested)
        .bind(new.service_requested_other)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn insert_appointment(&self, new: NewAppointment) -> Result<Appointment> {
        let (day_start, day_end) = scheduling::day_bounds(new.start);
        let mut tx = self.pool.begin().await?;

        // Serialize proposals per room and day; released at commit/rollback.
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(room_day_key(&new.room, day_start.date()))
            .execute(&mut *tx)
            .await?;

        let rows: Vec<AppointmentRow> = sqlx::query_as(&format!(
            "SELECT {APPOINTMENT_COLUMNS} FROM appointments
             WHERE room = $1 AND start_time >= $2 AND start_time < $3"
        ))
        .bind(&new.room)
        .bind(day_start)
        .bind(day_end)
        .fetch_all(&mut *tx)
        .await?;
        let same_day: Vec<Appointment> = rows.into_iter().map(Appointment::from).collect();

        if let Some((start, end)) = scheduling::find_conflict(&new, &same_day) {
            return Err(Error::RoomUnavailable {
                room: new.room,
                start,
                end,
            });
        }

        let row: AppointmentRow = sqlx::query_as(&format!(
            "INSERT INTO appointments (id, patient_id, physician_id, room, start_time,
                 duration_minutes, notes)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {APPOINTMENT_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(new.patient_id)
        .bind(new.physician_id)
        .bind(&new.room)
        .bind(new.start)
        .bind(new.duration_minutes)
        .bind(&new.notes)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(row.into())
    }

    async fn appointments_for_room_on(
        &self,
        room: &str,
        day: NaiveDate,
    ) -> Result<Vec<Appointment>> {
        let (day_start, day_end) = scheduling::day_bounds(day.and_time(chrono::NaiveTime::MIN));
        let rows: Vec<AppointmentRow> = sqlx::query_as(&format!(
            "SELECT {APPOINTMENT_COLUMNS} FROM appointments
             WHERE room = $1 AND start_time >= $2 AND start_time < $3
             ORDER BY start_time"
        ))
        .bind(room)
        .bind(day_start)
        .bind(day_end)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Appointment::from).collect())
    }

    async fn upcoming_appointments(
        &self,
        after: NaiveDateTime,
        limit: i64,
    ) -> Result<Vec<Appointment>> {
        let rows: Vec<AppointmentRow> = sqlx::query_as(&format!(
            "SELECT {APPOINTMENT_COLUMNS} FROM appointments
             WHERE start_time >= $1 ORDER BY start_time LIMIT $2"
        ))
        .bind(after)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Appointment::from).collect())
    }

    async fn recent_appointments(&self, limit: i64) -> Result<Vec<Appointment>> {
        let rows: Vec<AppointmentRow> = sqlx::query_as(&format!(
            "SELECT {APPOINTMENT_COLUMNS} FROM appointments
             ORDER BY start_time DESC LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Appointment::from).collect())
    }

    async fn appointments_for_physician(&self, physician_id: Uuid) -> Result<Vec<Appointment>> {
        let rows: Vec<AppointmentRow> = sqlx::query_as(&format!(
            "SELECT {APPOINTMENT_COLUMNS} FROM appointments
             WHERE physician_id = $1 ORDER BY start_time"
        ))
        .bind(physician_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Appointment::from).collect())
    }

    async fn insert_medical_record(&self, new: NewMedicalRecord) -> Result<MedicalRecord> {
        let row: RecordRow = sqlx::query_as(&format!(
            "INSERT INTO medical_records (id, patient_id, author_id, session_time, body)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {RECORD_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(new.patient_id)
        .bind(new.author_id)
        .bind(new.session_time)
        .bind(new.text)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn medical_records_for_patient(&self, patient_id: Uuid) -> Result<Vec<MedicalRecord>> {
        let rows: Vec<RecordRow> = sqlx::query_as(&format!(
            "SELECT {RECORD_COLUMNS} FROM medical_records
             WHERE patient_id = $1 ORDER BY session_time"
        ))
        .bind(patient_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(MedicalRecord::from).collect())
    }
}
