//! # Access-control guard
//!
//! A single authorization predicate evaluated at the start of every
//! operation. [`Capability`] is the closed set of guarded operations and
//! [`Capability::allowed_roles`] is the permission matrix:
//!
//! | Capability | Allowed roles |
//! |------------|---------------|
//! | [`Capability::CreateUser`] | administrator, management |
//! | [`Capability::RegisterPatient`], [`Capability::ViewPatients`], [`Capability::ViewDashboard`], [`Capability::ScheduleAppointment`], [`Capability::ViewSchedule`] | any authenticated role |
//! | [`Capability::ViewMedicalRecord`], [`Capability::AppendMedicalRecord`], [`Capability::ExportRecord`] | physician only |
//!
//! [`authorize`] produces a verdict and nothing else: it never touches the
//! session or the directory. A missing actor is always
//! [`Error::Unauthenticated`]; a wrong role is [`Error::Unauthorized`] with
//! the acceptable roles, so the boundary can name them to the user.

use crate::error::{Error, Result};
use crate::models::{Role, User};

/// Every role, in declaration order. Capabilities open to any
/// authenticated actor point here.
pub const ALL_ROLES: &[Role] = &[
    Role::Administrator,
    Role::Management,
    Role::Physician,
    Role::Reception,
];

const ADMINISTRATIVE: &[Role] = &[Role::Administrator, Role::Management];
const PHYSICIAN_ONLY: &[Role] = &[Role::Physician];

/// A guarded operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Capability {
    CreateUser,
    RegisterPatient,
    ViewPatients,
    ViewDashboard,
    ScheduleAppointment,
    ViewSchedule,
    ViewMedicalRecord,
    AppendMedicalRecord,
    ExportRecord,
}

impl Capability {
    /// The roles permitted to exercise this capability.
    pub fn allowed_roles(self) -> &'static [Role] {
        match self {
            Capability::CreateUser => ADMINISTRATIVE,
            Capability::RegisterPatient
            | Capability::ViewPatients
            | Capability::ViewDashboard
            | Capability::ScheduleAppointment
            | Capability::ViewSchedule => ALL_ROLES,
            Capability::ViewMedicalRecord
            | Capability::AppendMedicalRecord
            | Capability::ExportRecord => PHYSICIAN_ONLY,
        }
    }
}

/// Check that `actor` may exercise `capability`, returning the vetted
/// actor so callers can use its identity without re-unwrapping.
pub fn authorize(actor: Option<&User>, capability: Capability) -> Result<&User> {
    let user = actor.ok_or(Error::Unauthenticated)?;
    let required = capability.allowed_roles();
    if required.contains(&user.role) {
        Ok(user)
    } else {
        Err(Error::Unauthorized { required })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn user_with(role: Role) -> User {
        User {
            id: Uuid::new_v4(),
            username: format!("{role}.test"),
            password_hash: "$argon2id$test".into(),
            full_name: "Test User".into(),
            role,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn unauthenticated_is_always_denied() {
        for capability in [
            Capability::CreateUser,
            Capability::RegisterPatient,
            Capability::ViewPatients,
            Capability::ViewDashboard,
            Capability::ScheduleAppointment,
            Capability::ViewSchedule,
            Capability::ViewMedicalRecord,
            Capability::AppendMedicalRecord,
            Capability::ExportRecord,
        ] {
            assert!(matches!(
                authorize(None, capability),
                Err(Error::Unauthenticated)
            ));
        }
    }

    #[test]
    fn create_user_is_administrative() {
        for (role, allowed) in [
            (Role::Administrator, true),
            (Role::Management, true),
            (Role::Physician, false),
            (Role::Reception, false),
        ] {
            let user = user_with(role);
            let verdict = authorize(Some(&user), Capability::CreateUser);
            assert_eq!(verdict.is_ok(), allowed, "role {role}");
        }
    }

    #[test]
    fn medical_record_capabilities_are_physician_only() {
        for capability in [
            Capability::ViewMedicalRecord,
            Capability::AppendMedicalRecord,
            Capability::ExportRecord,
        ] {
            for role in ALL_ROLES {
                let user = user_with(*role);
                let verdict = authorize(Some(&user), capability);
                assert_eq!(verdict.is_ok(), *role == Role::Physician);
                if let Err(Error::Unauthorized { required }) = verdict {
                    assert_eq!(required, &[Role::Physician]);
                }
            }
        }
    }

    #[test]
    fn shared_capabilities_admit_every_role() {
        for capability in [
            Capability::RegisterPatient,
            Capability::ViewPatients,
            Capability::ViewDashboard,
            Capability::ScheduleAppointment,
            Capability::ViewSchedule,
        ] {
            for role in ALL_ROLES {
                let user = user_with(*role);
                assert!(authorize(Some(&user), capability).is_ok());
            }
        }
    }

    #[test]
    fn authorize_returns_the_vetted_actor() {
        let user = user_with(Role::Reception);
        let vetted = authorize(Some(&user), Capability::ViewDashboard).unwrap();
        assert_eq!(vetted.id, user.id);
    }
}
