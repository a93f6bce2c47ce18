use std::path::Path;

use thiserror::Error;

/// Default similarity floor for accepting a crosswalk row.
pub const DEFAULT_THRESHOLD: f64 = 0.95;

/// Errors from loading the specialty crosswalk.
#[derive(Debug, Error)]
pub enum CrosswalkError {
    #[error("failed to read crosswalk CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("crosswalk CSV missing required column '{0}'")]
    MissingColumn(&'static str),
}

/// Maps free-text specialty labels to registry taxonomy codes.
///
/// Directory sites describe specialties in prose ("Pediatric Endocrinology",
/// "Endocrinology, Diabetes & Metabolism") while the registry filters on
/// taxonomy codes. The crosswalk accepts a label when its specialization
/// text is within the similarity threshold of the label.
#[derive(Debug, Clone)]
pub struct SpecialtyCrosswalk {
    entries: Vec<CrosswalkEntry>,
    threshold: f64,
}

#[derive(Debug, Clone)]
struct CrosswalkEntry {
    code: String,
    specialization: String,
}

impl SpecialtyCrosswalk {
    /// Load from a crosswalk CSV with `Code` and `Specialization` columns.
    /// Lines starting with `#` are comments; rows without a specialization
    /// are skipped.
    pub fn from_csv_path<P: AsRef<Path>>(
        path: P,
        threshold: f64,
    ) -> Result<Self, CrosswalkError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .comment(Some(b'#'))
            .from_path(path.as_ref())?;

        let headers = reader.headers()?.clone();
        let code_idx = headers
            .iter()
            .position(|h| h.trim() == "Code")
            .ok_or(CrosswalkError::MissingColumn("Code"))?;
        let spec_idx = headers
            .iter()
            .position(|h| h.trim() == "Specialization")
            .ok_or(CrosswalkError::MissingColumn("Specialization"))?;

        let mut entries = Vec::new();
        for record in reader.records() {
            let record = record?;
            let code = record.get(code_idx).unwrap_or("").trim();
            let specialization = record.get(spec_idx).unwrap_or("").trim();
            if code.is_empty() || specialization.is_empty() {
                continue;
            }
            entries.push(CrosswalkEntry {
                code: code.to_string(),
                specialization: specialization.to_string(),
            });
        }

        tracing::debug!(entries = entries.len(), "loaded specialty crosswalk");
        Ok(Self { entries, threshold })
    }

    /// Build from in-memory `(code, specialization)` pairs.
    pub fn from_entries<I, S>(pairs: I, threshold: f64) -> Self
    where
        I: IntoIterator<Item = (S, S)>,
        S: Into<String>,
    {
        let entries = pairs
            .into_iter()
            .map(|(code, specialization)| CrosswalkEntry {
                code: code.into(),
                specialization: specialization.into(),
            })
            .collect();
        Self { entries, threshold }
    }

    /// First crosswalk code whose specialization is similar enough to the
    /// label. Blank labels and labels below threshold yield `None`.
    pub fn code_for(&self, label: &str) -> Option<&str> {
        let label = label.trim();
        if label.is_empty() {
            return None;
        }
        for entry in &self.entries {
            let similarity = strsim::normalized_levenshtein(&entry.specialization, label);
            if similarity >= self.threshold {
                return Some(&entry.code);
            }
        }
        None
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
