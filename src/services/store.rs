use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::models::ProviderRecord;

/// Errors from reading or writing the roster CSV.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("roster CSV missing required column '{0}'")]
    MissingColumn(&'static str),
}

/// One roster row: the provider record plus resolution bookkeeping.
///
/// An empty `npi` cell is the unresolved sentinel; `npi_status` records the
/// outcome class of the last resolution attempt.
#[derive(Debug, Clone)]
pub struct RosterRow {
    pub record: ProviderRecord,
    /// Free-text specialty label from the source directory, if any.
    pub specialty: String,
    pub npi: String,
    pub npi_status: String,
}

impl RosterRow {
    pub fn is_resolved(&self) -> bool {
        !self.npi.trim().is_empty()
    }
}

const OUTPUT_COLUMNS: [&str; 9] = [
    "first_name",
    "last_name",
    "city",
    "postal_code",
    "state",
    "specialty",
    "specialty_code",
    "npi",
    "npi_status",
];

/// CSV-backed roster persistence.
///
/// Saves go through a temp file and an atomic rename so an interrupted batch
/// always leaves a complete file behind.
pub struct RosterStore {
    path: PathBuf,
}

impl RosterStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load roster rows from an input CSV. `first_name` and `last_name`
    /// columns are required; all other columns are optional.
    pub fn load<P: AsRef<Path>>(input: P) -> Result<Vec<RosterRow>, StoreError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_path(input.as_ref())?;
        let headers = reader.headers()?.clone();

        let position = |name: &str| headers.iter().position(|h| h.trim() == name);
        let first_idx = position("first_name").ok_or(StoreError::MissingColumn("first_name"))?;
        let last_idx = position("last_name").ok_or(StoreError::MissingColumn("last_name"))?;
        let city_idx = position("city");
        let postal_idx = position("postal_code");
        let state_idx = position("state");
        let specialty_idx = position("specialty");
        let code_idx = position("specialty_code");
        let npi_idx = position("npi");
        let status_idx = position("npi_status");

        let cell = |row: &csv::StringRecord, idx: Option<usize>| {
            idx.and_then(|i| row.get(i))
                .map(str::trim)
                .unwrap_or("")
                .to_string()
        };

        let mut rows = Vec::new();
        for row in reader.records() {
            let row = row?;
            rows.push(RosterRow {
                record: ProviderRecord {
                    first_name: cell(&row, Some(first_idx)),
                    last_name: cell(&row, Some(last_idx)),
                    city: cell(&row, city_idx),
                    postal_code: cell(&row, postal_idx),
                    state: cell(&row, state_idx),
                    specialty_code: cell(&row, code_idx),
                },
                specialty: cell(&row, specialty_idx),
                npi: cell(&row, npi_idx),
                npi_status: cell(&row, status_idx),
            });
        }

        tracing::debug!(rows = rows.len(), "loaded roster");
        Ok(rows)
    }

    /// Persist the full roster. Called after every settled row so partial
    /// progress survives interruption.
    pub fn save(&self, rows: &[RosterRow]) -> Result<(), StoreError> {
        let file_name = self
            .path
            .file_name()
            .and_then(|x| x.to_str())
            .unwrap_or("roster.csv");
        let tmp_path = self.path.with_file_name(format!("{file_name}.tmp"));

        let mut writer = csv::Writer::from_path(&tmp_path)?;
        writer.write_record(OUTPUT_COLUMNS)?;
        for row in rows {
            writer.write_record([
                row.record.first_name.as_str(),
                row.record.last_name.as_str(),
                row.record.city.as_str(),
                row.record.postal_code.as_str(),
                row.record.state.as_str(),
                row.specialty.as_str(),
                row.record.specialty_code.as_str(),
                row.npi.as_str(),
                row.npi_status.as_str(),
            ])?;
        }
        writer.flush()?;
        drop(writer);

        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}
