// Core algorithm exports
pub mod drop_order;
pub mod resolver;
pub mod taxonomy;

pub use drop_order::{DropOrder, DropOrderError, FilterField};
pub use resolver::{InvalidOptions, ResolveError, Resolver, ResolverOptions};
pub use taxonomy::{CrosswalkError, SpecialtyCrosswalk};
