//! NPI Resolver - adaptive identity resolution against the NPI registry
//!
//! This library resolves partial provider directory records (name, address
//! fragments, specialty) to unique National Provider Identifiers. The core
//! is an adaptive query-relaxation search: an ordered ladder of filter
//! groups is widened or narrowed, one group at a time, until the registry
//! reports exactly one match.

pub mod batch;
pub mod config;
pub mod core;
pub mod models;
pub mod services;

// Re-export commonly used types
pub use crate::batch::{fill_specialty_codes, run_batch, BatchError, BatchOptions, BatchSummary};
pub use crate::core::{
    DropOrder, FilterField, ResolveError, Resolver, ResolverOptions, SpecialtyCrosswalk,
};
pub use crate::models::{ProviderRecord, QueryFilters, RegistryPage};
pub use crate::services::{NpiRegistryClient, Registry, RegistryError, RosterRow, RosterStore};
