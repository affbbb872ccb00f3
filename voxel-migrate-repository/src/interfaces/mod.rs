//! This module defines and re-exports the interfaces for the migration
//! repositories. It serves as a central point for accessing the traits and
//! table catalogues used for data interaction.
mod source;
mod tables;
mod target;

pub use source::SourceRepository;
pub use tables::{LegacyTable, OrphanCheck, SampleQuery, TargetTable};
pub use target::{TargetBatch, TargetRepository, WriteReceipt};
