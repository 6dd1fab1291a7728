//! SQLite patient directory adapter.
//!
//! The patients table is provisioned and seeded externally; this adapter
//! only reads it. List-valued fields (diagnoses, medications) and the lab
//! panel are stored as JSON text columns.

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use rusqlite::Connection;

use aftercare_agents::lookup::{LookupOutcome, PatientLookup};
use aftercare_core::error::{AftercareError, Result};
use aftercare_core::types::{LabResults, PatientRecord};

/// Read-only patient directory over a SQLite database.
pub struct SqlitePatientDirectory {
    conn: Mutex<Connection>,
}

impl SqlitePatientDirectory {
    /// Open the patient database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .map_err(|e| AftercareError::Lookup(format!("failed to open patient db: {}", e)))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Wrap an existing connection (used by tests with in-memory databases).
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    fn query_by_name(&self, name: &str) -> Result<Vec<PatientRecord>> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| AftercareError::Lookup("patient db lock poisoned".to_string()))?;

        let mut stmt = conn
            .prepare(
                "SELECT patient_id, patient_name, date_of_birth, discharge_date,
                        primary_diagnosis, secondary_diagnoses, medications,
                        dietary_restrictions, follow_up, warning_signs,
                        discharge_instructions, lab_results
                 FROM patients
                 WHERE LOWER(patient_name) LIKE LOWER(?1)",
            )
            .map_err(db_err)?;

        let pattern = format!("%{}%", name);
        let rows = stmt
            .query_map([pattern], |row| {
                Ok(RawRow {
                    patient_id: row.get(0)?,
                    patient_name: row.get(1)?,
                    date_of_birth: row.get(2)?,
                    discharge_date: row.get(3)?,
                    primary_diagnosis: row.get(4)?,
                    secondary_diagnoses: row.get(5)?,
                    medications: row.get(6)?,
                    dietary_restrictions: row.get(7)?,
                    follow_up: row.get(8)?,
                    warning_signs: row.get(9)?,
                    discharge_instructions: row.get(10)?,
                    lab_results: row.get(11)?,
                })
            })
            .map_err(db_err)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row.map_err(db_err)?.into_record()?);
        }
        Ok(records)
    }
}

struct RawRow {
    patient_id: i64,
    patient_name: String,
    date_of_birth: String,
    discharge_date: String,
    primary_diagnosis: String,
    secondary_diagnoses: String,
    medications: String,
    dietary_restrictions: String,
    follow_up: String,
    warning_signs: String,
    discharge_instructions: String,
    lab_results: String,
}

impl RawRow {
    fn into_record(self) -> Result<PatientRecord> {
        let secondary_diagnoses: Vec<String> = serde_json::from_str(&self.secondary_diagnoses)
            .map_err(|e| AftercareError::Lookup(format!("bad secondary_diagnoses json: {}", e)))?;
        let medications: Vec<String> = serde_json::from_str(&self.medications)
            .map_err(|e| AftercareError::Lookup(format!("bad medications json: {}", e)))?;
        let lab_results: LabResults = serde_json::from_str(&self.lab_results)
            .map_err(|e| AftercareError::Lookup(format!("bad lab_results json: {}", e)))?;

        Ok(PatientRecord {
            id: format!("pt-{:03}", self.patient_id),
            patient_name: self.patient_name,
            date_of_birth: self.date_of_birth,
            primary_diagnosis: self.primary_diagnosis,
            secondary_diagnoses,
            discharge_date: self.discharge_date,
            medications,
            dietary_restrictions: self.dietary_restrictions,
            follow_up: self.follow_up,
            warning_signs: self.warning_signs,
            discharge_instructions: self.discharge_instructions,
            lab_results,
        })
    }
}

fn db_err(e: rusqlite::Error) -> AftercareError {
    AftercareError::Lookup(format!("patient db query failed: {}", e))
}

#[async_trait]
impl PatientLookup for SqlitePatientDirectory {
    async fn find_by_name(&self, name: &str) -> Result<LookupOutcome> {
        let needle = name.trim();
        if needle.is_empty() {
            return Ok(LookupOutcome::NotFound);
        }

        let mut matches = self.query_by_name(needle)?;
        match matches.len() {
            0 => Ok(LookupOutcome::NotFound),
            1 => Ok(LookupOutcome::Found(Box::new(matches.remove(0)))),
            _ => Ok(LookupOutcome::Ambiguous(
                matches.into_iter().map(|r| r.patient_name).collect(),
            )),
        }
    }

    async fn roster(&self) -> Result<Vec<String>> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| AftercareError::Lookup("patient db lock poisoned".to_string()))?;

        let mut stmt = conn
            .prepare("SELECT patient_name FROM patients ORDER BY patient_name")
            .map_err(db_err)?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(db_err)?;

        let mut names = Vec::new();
        for name in rows {
            names.push(name.map_err(db_err)?);
        }
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded_directory() -> SqlitePatientDirectory {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE patients (
                patient_id INTEGER PRIMARY KEY,
                patient_name TEXT NOT NULL,
                date_of_birth TEXT,
                discharge_date TEXT,
                primary_diagnosis TEXT,
                secondary_diagnoses TEXT,
                medications TEXT,
                dietary_restrictions TEXT,
                follow_up TEXT,
                warning_signs TEXT,
                discharge_instructions TEXT,
                lab_results TEXT
            );",
        )
        .unwrap();

        let labs = r#"{"creatinine_mg_dl":1.8,"egfr_ml_min":45.0,"potassium_meq_l":4.2,"hemoglobin_g_dl":11.5}"#;
        for (id, name) in [(1, "John Smith"), (2, "Jane Smith"), (3, "Maria Garcia")] {
            conn.execute(
                "INSERT INTO patients VALUES (?1, ?2, '1958-03-12', '2025-01-15',
                    'Chronic Kidney Disease Stage 3', '[\"Hypertension\"]',
                    '[\"Lisinopril 10mg daily\"]', 'Low sodium', 'Nephrology in 2 weeks',
                    'Swelling', 'Monitor blood pressure', ?3)",
                rusqlite::params![id, name, labs],
            )
            .unwrap();
        }
        SqlitePatientDirectory::from_connection(conn)
    }

    #[tokio::test]
    async fn test_find_single_match() {
        let dir = seeded_directory();
        let outcome = dir.find_by_name("maria").await.unwrap();
        match outcome {
            LookupOutcome::Found(record) => {
                assert_eq!(record.patient_name, "Maria Garcia");
                assert_eq!(record.id, "pt-003");
                assert_eq!(record.medications, vec!["Lisinopril 10mg daily"]);
                assert!((record.lab_results.egfr_ml_min - 45.0).abs() < f64::EPSILON);
            }
            other => panic!("expected Found, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_partial_match_is_ambiguous() {
        let dir = seeded_directory();
        let outcome = dir.find_by_name("Smith").await.unwrap();
        match outcome {
            LookupOutcome::Ambiguous(names) => {
                assert_eq!(names.len(), 2);
            }
            other => panic!("expected Ambiguous, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unknown_and_empty_names() {
        let dir = seeded_directory();
        assert!(matches!(
            dir.find_by_name("Nobody").await.unwrap(),
            LookupOutcome::NotFound
        ));
        assert!(matches!(
            dir.find_by_name("  ").await.unwrap(),
            LookupOutcome::NotFound
        ));
    }

    #[tokio::test]
    async fn test_roster_sorted() {
        let dir = seeded_directory();
        let roster = dir.roster().await.unwrap();
        assert_eq!(roster, vec!["Jane Smith", "John Smith", "Maria Garcia"]);
    }
}
