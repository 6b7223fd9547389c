//! # Medical-record ledger — append-only clinical notes per patient
//!
//! Entries are never updated or deleted; [`Ledger::entries`] always
//! returns them ascending by session time. Every operation here is
//! physician-only per the permission matrix in [`crate::guard`].
//!
//! [`Ledger::summary`] derives the presentation series for the record
//! chart (one `dd/mm/YYYY` label and one text length per entry). It is
//! recomputed on each read; nothing is cached.

use chrono::{NaiveDateTime, Utc};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::directory::DirectoryStore;
use crate::error::{Result, ValidationError};
use crate::guard::{authorize, Capability};
use crate::models::{MedicalRecord, NewMedicalRecord, Patient, User};

/// Derived, presentation-facing view of a patient's ledger.
#[derive(Clone, Debug, Serialize)]
pub struct RecordSummary {
    pub entry_count: usize,
    /// Session dates formatted `dd/mm/YYYY`, one per entry, in order.
    pub labels: Vec<String>,
    /// Text length of each entry, aligned with `labels`.
    pub text_lengths: Vec<usize>,
}

/// A patient's assembled record, ready for the boundary layer to format.
#[derive(Clone, Debug, Serialize)]
pub struct PatientRecordExport {
    pub patient: Patient,
    pub entries: Vec<MedicalRecord>,
}

/// Guarded ledger operations over a [`DirectoryStore`].
#[derive(Clone, Debug)]
pub struct Ledger<S> {
    store: S,
}

impl<S: DirectoryStore> Ledger<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Append a clinical note. The session time defaults to now; the text
    /// must be non-empty and the patient must exist.
    pub async fn append(
        &self,
        actor: Option<&User>,
        patient_id: Uuid,
        session_time: Option<NaiveDateTime>,
        text: String,
    ) -> Result<MedicalRecord> {
        let author = authorize(actor, Capability::AppendMedicalRecord)?;
        if text.trim().is_empty() {
            return Err(ValidationError::EmptyRecordText.into());
        }
        self.store.get_patient(patient_id).await?;

        let entry = self
            .store
            .insert_medical_record(NewMedicalRecord {
                patient_id,
                author_id: author.id,
                session_time: session_time.unwrap_or_else(|| Utc::now().naive_utc()),
                text,
            })
            .await?;
        info!(patient = %patient_id, session = %entry.session_time, "appended record entry");
        Ok(entry)
    }

    /// The patient's ledger, ascending by session time.
    pub async fn entries(&self, actor: Option<&User>, patient_id: Uuid) -> Result<Vec<MedicalRecord>> {
        authorize(actor, Capability::ViewMedicalRecord)?;
        self.store.get_patient(patient_id).await?;
        self.store.medical_records_for_patient(patient_id).await
    }

    /// Chart series for the record view, recomputed on each read.
    pub async fn summary(&self, actor: Option<&User>, patient_id: Uuid) -> Result<RecordSummary> {
        let entries = self.entries(actor, patient_id).await?;
        Ok(RecordSummary {
            entry_count: entries.len(),
            labels: entries
                .iter()
                .map(|e| e.session_time.format("%d/%m/%Y").to_string())
                .collect(),
            text_lengths: entries.iter().map(|e| e.text.chars().count()).collect(),
        })
    }

    /// Assemble the full record for export. Formatting (docx/xlsx) is the
    /// presentation layer's job.
    pub async fn export(
        &self,
        actor: Option<&User>,
        patient_id: Uuid,
    ) -> Result<PatientRecordExport> {
        authorize(actor, Capability::ExportRecord)?;
        let patient = self.store.get_patient(patient_id).await?;
        let entries = self.store.medical_records_for_patient(patient_id).await?;
        Ok(PatientRecordExport { patient, entries })
    }
}
