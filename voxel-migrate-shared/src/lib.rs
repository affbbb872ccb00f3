//! # Voxel Migrate Shared
//! This crate defines the data structures shared by the migration crates:
//! typed identifiers for both key domains, the rows read from the legacy
//! store, the rows written to the destination store and the enumerated
//! status labels of the destination schema.
pub mod types;
