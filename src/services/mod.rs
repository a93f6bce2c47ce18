// Service exports
pub mod registry;
pub mod store;

pub use registry::{NpiRegistryClient, Registry, RegistryError};
pub use store::{RosterRow, RosterStore, StoreError};
