use serde::{Deserialize, Serialize};

use crate::core::drop_order::FilterField;

/// A candidate provider identity assembled from one roster row.
///
/// First and last name are always present; every other field may be an
/// empty string, which means "not a filter" for registry queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRecord {
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub postal_code: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub specialty_code: String,
}

impl ProviderRecord {
    /// Value of a single filter field on this record.
    pub fn field(&self, field: FilterField) -> &str {
        match field {
            FilterField::City => &self.city,
            FilterField::PostalCode => &self.postal_code,
            FilterField::State => &self.state,
            FilterField::SpecialtyCode => &self.specialty_code,
            FilterField::FirstName => &self.first_name,
            FilterField::LastName => &self.last_name,
        }
    }

    /// A record is queryable only when both name fields are populated.
    pub fn has_name(&self) -> bool {
        !self.first_name.trim().is_empty() && !self.last_name.trim().is_empty()
    }
}

/// The ordered filter set for one registry query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryFilters {
    pairs: Vec<(FilterField, String)>,
}

impl QueryFilters {
    pub fn new(pairs: Vec<(FilterField, String)>) -> Self {
        Self { pairs }
    }

    pub fn pairs(&self) -> &[(FilterField, String)] {
        &self.pairs
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// One page of a registry response. Ephemeral per query; never persisted.
#[derive(Debug, Clone, Deserialize)]
pub struct RegistryPage {
    #[serde(default)]
    pub result_count: u32,
    #[serde(default)]
    pub results: Vec<RegistryResult>,
}

/// A single result object; only the external identifier is of interest.
#[derive(Debug, Clone, Deserialize)]
pub struct RegistryResult {
    pub number: serde_json::Value,
}

impl RegistryResult {
    /// The registry returns the NPI as either a JSON number or a string.
    pub fn npi(&self) -> String {
        match &self.number {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}
