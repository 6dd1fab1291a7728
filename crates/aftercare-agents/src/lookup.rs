//! Patient record lookup contract.
//!
//! The record store is external and treated as a name-keyed lookup. The
//! SQLite adapter lives in the composition root; `InMemoryPatientDirectory`
//! backs tests and corpus-free deployments.

use async_trait::async_trait;

use aftercare_core::error::Result;
use aftercare_core::types::PatientRecord;

/// Result of resolving a patient name.
#[derive(Clone, Debug)]
pub enum LookupOutcome {
    /// Exactly one record matched.
    Found(Box<PatientRecord>),
    /// No record matched the name.
    NotFound,
    /// Several records matched; the caller must ask for a more specific name.
    Ambiguous(Vec<String>),
}

/// Name-keyed patient record lookup.
#[async_trait]
pub trait PatientLookup: Send + Sync {
    /// Resolve a full or partial patient name, case-insensitively.
    async fn find_by_name(&self, name: &str) -> Result<LookupOutcome>;

    /// All known patient names, for the roster endpoint.
    async fn roster(&self) -> Result<Vec<String>>;
}

/// In-memory directory with the same substring-match semantics as the
/// SQLite adapter.
#[derive(Default)]
pub struct InMemoryPatientDirectory {
    records: Vec<PatientRecord>,
}

impl InMemoryPatientDirectory {
    pub fn new(records: Vec<PatientRecord>) -> Self {
        Self { records }
    }
}

#[async_trait]
impl PatientLookup for InMemoryPatientDirectory {
    async fn find_by_name(&self, name: &str) -> Result<LookupOutcome> {
        let needle = name.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(LookupOutcome::NotFound);
        }

        let matches: Vec<&PatientRecord> = self
            .records
            .iter()
            .filter(|r| r.patient_name.to_lowercase().contains(&needle))
            .collect();

        match matches.len() {
            0 => Ok(LookupOutcome::NotFound),
            1 => Ok(LookupOutcome::Found(Box::new(matches[0].clone()))),
            _ => Ok(LookupOutcome::Ambiguous(
                matches.iter().map(|r| r.patient_name.clone()).collect(),
            )),
        }
    }

    async fn roster(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self
            .records
            .iter()
            .map(|r| r.patient_name.clone())
            .collect();
        names.sort();
        Ok(names)
    }
}
