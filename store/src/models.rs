//! # Domain models for the clinic directory
//!
//! Defines the records persisted by a [`crate::DirectoryStore`] and the `New*`
//! input structs used to create them. All timestamps that carry scheduling
//! meaning ([`Appointment::start`], [`MedicalRecord::session_time`]) are
//! [`NaiveDateTime`] in clinic-local time; audit timestamps (`created_at`)
//! are UTC.
//!
//! ## Types
//!
//! | Struct | Represents |
//! |--------|-----------|
//! | [`User`] | A staff account: unique username, Argon2 password hash, display name, and a [`Role`]. The hash never leaves the server; [`User::to_info`] projects a client-safe [`UserInfo`]. |
//! | [`Patient`] | The intake record: demographics, contact details, categorical fields, and an optional [`Dependent`] sub-record. |
//! | [`Appointment`] | A booked slot: patient, treating physician, room, start, and duration in minutes. |
//! | [`MedicalRecord`] | One append-only clinical note for a patient, ordered by session time. |
//!
//! [`Role`] is a closed enum — authorization never compares strings. It is
//! stored as text and converted at the storage boundary via
//! [`FromStr`]/[`Display`].

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Staff role, gating every operation through [`crate::guard`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Administrator,
    Management,
    Physician,
    Reception,
}

impl Role {
    /// The canonical text form, as stored in the `role` column.
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Administrator => "administrator",
            Role::Management => "management",
            Role::Physician => "physician",
            Role::Reception => "reception",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "administrator" => Ok(Role::Administrator),
            "management" => Ok(Role::Management),
            "physician" => Ok(Role::Physician),
            "reception" => Ok(Role::Reception),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

/// Returned when a stored role string does not name a known [`Role`].
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

/// Full staff record. The password hash stays server-side; send
/// [`UserInfo`] to clients instead.
#[derive(Clone, Debug, PartialEq)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub password_hash: String,
    pub full_name: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Convert to the client-safe projection.
    pub fn to_info(&self) -> UserInfo {
        UserInfo {
            id: self.id,
            username: self.username.clone(),
            full_name: self.full_name.clone(),
            role: self.role,
        }
    }
}

/// User fields safe to send to the client.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: Uuid,
    pub username: String,
    pub full_name: String,
    pub role: Role,
}

/// Input for creating a staff account. The password is hashed before it
/// reaches the store.
#[derive(Clone, Debug)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub full_name: String,
    pub role: Role,
}

/// Dependent sub-record attached to a patient at intake.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Dependent {
    pub name: String,
    pub birth_date: Option<NaiveDate>,
    pub age: Option<i32>,
}

/// Patient intake record. Created once at registration; there is no update
/// or delete path.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,
    pub full_name: String,
    pub social_name: Option<String>,
    pub birth_date: NaiveDate,
    pub dependent: Option<Dependent>,
    pub address: String,
    pub email: String,
    pub phone: String,
    pub education: String,
    pub religion: Option<String>,
    pub marital_status: String,
    pub service_requested: String,
    pub service_requested_other: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Patient {
    /// Age in completed years on the given date.
    pub fn age_on(&self, today: NaiveDate) -> i32 {
        let mut age = today.year() - self.birth_date.year();
        if (today.month(), today.day()) < (self.birth_date.month(), self.birth_date.day()) {
            age -= 1;
        }
        age
    }
}

/// Input for registering a patient.
#[derive(Clone, Debug, Deserialize)]
pub struct NewPatient {
    pub full_name: String,
    pub social_name: Option<String>,
    pub birth_date: NaiveDate,
    pub dependent: Option<Dependent>,
    pub address: String,
    pub email: String,
    pub phone: String,
    pub education: String,
    pub religion: Option<String>,
    pub marital_status: String,
    pub service_requested: String,
    pub service_requested_other: Option<String>,
}

/// A booked slot in a room. The occupied window is the half-open interval
/// `[start, start + duration_minutes)`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub physician_id: Uuid,
    pub room: String,
    pub start: NaiveDateTime,
    pub duration_minutes: i32,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Appointment {
    /// End of the occupied window (exclusive).
    pub fn end(&self) -> NaiveDateTime {
        self.start + chrono::Duration::minutes(i64::from(self.duration_minutes))
    }
}

/// Input for proposing an appointment. The physician is the session
/// identity, filled in by the boundary layer.
#[derive(Clone, Debug)]
pub struct NewAppointment {
    pub patient_id: Uuid,
    pub physician_id: Uuid,
    pub room: String,
    pub start: NaiveDateTime,
    pub duration_minutes: i32,
    pub notes: Option<String>,
}

impl NewAppointment {
    /// End of the proposed window (exclusive).
    pub fn end(&self) -> NaiveDateTime {
        self.start + chrono::Duration::minutes(i64::from(self.duration_minutes))
    }
}

/// One clinical note in a patient's ledger.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MedicalRecord {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub author_id: Uuid,
    pub session_time: NaiveDateTime,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// Input for appending a clinical note.
#[derive(Clone, Debug)]
pub struct NewMedicalRecord {
    pub patient_id: Uuid,
    pub author_id: Uuid,
    pub session_time: NaiveDateTime,
    pub text: String,
}
