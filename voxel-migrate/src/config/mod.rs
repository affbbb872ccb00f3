//! Configuration module for voxel-migrate.
//! Reads connection parameters and tunables from the environment and wires
//! the repositories the steps run against.
mod dependencies;
mod settings;

pub use dependencies::Dependencies;
pub use settings::{Settings, StoreSettings, Tunables};
