//! Error taxonomy shared by every clinic operation.
//!
//! The boundary layer maps each variant to an HTTP-equivalent status:
//! [`Error::Unauthenticated`] → 401, [`Error::Unauthorized`] → 403,
//! [`Error::NotFound`] → 404, [`Error::Validation`] → 400,
//! [`Error::RoomUnavailable`] → 409, [`Error::Database`] → 500. Nothing is
//! retried automatically; failures surface to the actor for resubmission.

use std::fmt;

use chrono::NaiveDateTime;
use uuid::Uuid;

use crate::models::Role;

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No session identity; the boundary redirects to login.
    #[error("authentication required")]
    Unauthenticated,

    /// Authenticated, but the actor's role is not in the allowed set.
    #[error("access denied: requires one of: {}", join_roles(.required))]
    Unauthorized { required: &'static [Role] },

    #[error("{kind} {id} not found")]
    NotFound { kind: EntityKind, id: Uuid },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The proposed slot overlaps an existing booking in the same room.
    #[error("room {room} is already booked from {start} to {end}")]
    RoomUnavailable {
        room: String,
        start: NaiveDateTime,
        end: NaiveDateTime,
    },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Precondition failures, each with a stable reason code so the boundary
/// can render a field-specific message.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("invalid duration: {0} minutes (allowed: 30, 40, 60)")]
    InvalidDuration(i32),

    #[error("start time {0} is outside opening hours (09:00 to 17:00)")]
    OutsideOpeningHours(NaiveDateTime),

    #[error("unknown room: {0}")]
    UnknownRoom(String),

    #[error("medical record text must not be empty")]
    EmptyRecordText,

    #[error("username already taken: {0}")]
    DuplicateUsername(String),
}

impl ValidationError {
    /// Stable identifier for the boundary layer.
    pub fn reason_code(&self) -> &'static str {
        match self {
            ValidationError::InvalidDuration(_) => "invalid_duration",
            ValidationError::OutsideOpeningHours(_) => "outside_opening_hours",
            ValidationError::UnknownRoom(_) => "unknown_room",
            ValidationError::EmptyRecordText => "empty_record_text",
            ValidationError::DuplicateUsername(_) => "duplicate_username",
        }
    }
}

/// What kind of record a [`Error::NotFound`] refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntityKind {
    User,
    Patient,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::User => f.write_str("user"),
            EntityKind::Patient => f.write_str("patient"),
        }
    }
}

fn join_roles(roles: &[Role]) -> String {
    roles
        .iter()
        .map(|r| r.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthorized_message_names_the_roles() {
        let err = Error::Unauthorized {
            required: &[Role::Administrator, Role::Management],
        };
        assert_eq!(
            err.to_string(),
            "access denied: requires one of: administrator, management"
        );
    }

    #[test]
    fn reason_codes_are_stable() {
        assert_eq!(
            ValidationError::InvalidDuration(45).reason_code(),
            "invalid_duration"
        );
        assert_eq!(
            ValidationError::EmptyRecordText.reason_code(),
            "empty_record_text"
        );
    }
}
