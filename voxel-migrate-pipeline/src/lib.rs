//! # Voxel Migrate Pipeline
//! This crate holds the migration logic that sits between the legacy reader
//! and the destination writer: identifier mapping, status normalization, row
//! transformation, batched writes, run statistics, the per-table steps and
//! the orchestrator that runs them in dependency order.
pub mod audit;
pub mod errors;
pub mod maintenance;
pub mod mapper;
pub mod normalizer;
pub mod orchestrator;
pub mod stats;
pub mod steps;
pub mod transform;
pub mod writer;
