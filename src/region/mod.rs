//! Region Module
//!
//! Named cache regions and the registry that creates and destroys them.

mod data;
mod facade;
mod registry;

pub use data::DataRegion;
pub use facade::Region;
pub use registry::{RegionRegistry, RegistryStats, DEFAULT_PREFIX};
