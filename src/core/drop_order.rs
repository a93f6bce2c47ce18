use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{ProviderRecord, QueryFilters};

/// A single filterable field on a provider record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterField {
    City,
    PostalCode,
    State,
    SpecialtyCode,
    FirstName,
    LastName,
}

impl FilterField {
    /// Query parameter name sent to the registry API.
    pub fn param_name(&self) -> &'static str {
        match self {
            FilterField::City => "city",
            FilterField::PostalCode => "postal_code",
            FilterField::State => "state",
            FilterField::SpecialtyCode => "specialty_code",
            FilterField::FirstName => "first_name",
            FilterField::LastName => "last_name",
        }
    }
}

/// Errors from building a custom relaxation ladder.
#[derive(Debug, Error)]
pub enum DropOrderError {
    #[error("drop order must contain at least one group")]
    Empty,

    #[error("drop order group {0} is empty")]
    EmptyGroup(usize),

    #[error("field {0:?} appears in more than one group")]
    DuplicateField(FilterField),

    #[error("final drop order group must contain both first_name and last_name")]
    MissingNameAnchor,
}

/// The relaxation ladder: filter groups ordered least to most restrictive.
///
/// A filter-set index `i` means "apply groups `i..len`". Incrementing the
/// index drops the next most distinguishing group; decrementing adds one
/// back. The final group holds the name fields and anchors every query:
/// it is never dropped, so `i == len` means the search space is exhausted.
#[derive(Debug, Clone)]
pub struct DropOrder {
    groups: Vec<Vec<FilterField>>,
}

impl Default for DropOrder {
    fn default() -> Self {
        Self {
            groups: vec![
                vec![FilterField::City],
                vec![FilterField::PostalCode],
                vec![FilterField::State],
                vec![FilterField::SpecialtyCode],
                vec![FilterField::FirstName, FilterField::LastName],
            ],
        }
    }
}

impl DropOrder {
    /// Build a custom ladder, e.g. from a configuration override.
    pub fn from_groups(groups: Vec<Vec<FilterField>>) -> Result<Self, DropOrderError> {
        if groups.is_empty() {
            return Err(DropOrderError::Empty);
        }
        let mut seen: Vec<FilterField> = Vec::new();
        for (i, group) in groups.iter().enumerate() {
            if group.is_empty() {
                return Err(DropOrderError::EmptyGroup(i));
            }
            for field in group {
                if seen.contains(field) {
                    return Err(DropOrderError::DuplicateField(*field));
                }
                seen.push(*field);
            }
        }
        let anchor = groups.last().expect("checked non-empty");
        if !anchor.contains(&FilterField::FirstName) || !anchor.contains(&FilterField::LastName) {
            return Err(DropOrderError::MissingNameAnchor);
        }
        Ok(Self { groups })
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Field names active at a given filter-set index (groups `index..len`).
    pub fn fields_from(&self, index: usize) -> impl Iterator<Item = FilterField> + '_ {
        self.groups[index..].iter().flatten().copied()
    }

    /// Build the filter set for one query: the union of fields in groups
    /// `index..len`, intersected with the record's non-empty fields.
    pub fn filters_for(&self, record: &ProviderRecord, index: usize) -> QueryFilters {
        let pairs = self
            .fields_from(index)
            .filter_map(|field| {
                let value = record.field(field).trim();
                if value.is_empty() {
                    None
                } else {
                    Some((field, value.to_string()))
                }
            })
            .collect();
        QueryFilters::new(pairs)
    }
}
