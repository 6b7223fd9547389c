//! Clinic core: directory, access control, scheduling, and the
//! medical-record ledger. The HTTP boundary lives in the `server` crate;
//! everything here is plain typed operations over a [`DirectoryStore`].

pub mod directory;
pub mod error;
pub mod guard;
pub mod ledger;
pub mod models;
pub mod scheduling;

mod memory;
pub use memory::MemoryStore;

mod pg;
pub use pg::PgStore;

pub use directory::{Dashboard, Directory, DirectoryStore};
pub use error::{EntityKind, Error, Result, ValidationError};
pub use guard::{authorize, Capability};
pub use ledger::{Ledger, PatientRecordExport, RecordSummary};
pub use models::{
    Appointment, Dependent, MedicalRecord, NewAppointment, NewMedicalRecord, NewPatient, NewUser,
    Patient, Role, User, UserInfo,
};
pub use scheduling::Scheduler;
