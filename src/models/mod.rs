// Model exports
pub mod domain;

pub use domain::{ProviderRecord, QueryFilters, RegistryPage, RegistryResult};
