//! # Voxel Migrate
//!
//! Migrates the legacy MySQL case-management database into the redesigned
//! PostgreSQL schema, one table at a time.
//!
//! ## Modules
//!
//! - [`cli`]: Command-line interface
//! - [`commands`]: Executes a parsed command
//! - [`config`]: Configuration and dependency initialization
//! - [`logging`]: Console and per-step file logging
//! - [`errors`]: Error types for the binary
pub mod cli;
pub mod commands;
pub mod config;
pub mod errors;
pub mod logging;

pub use config::Dependencies;
pub use errors::MigrationError;
