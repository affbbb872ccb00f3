//! Command-line interface.
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "voxel-migrate", version, about = "Legacy MySQL to PostgreSQL migration")]
pub struct Cli {
    /// Directory receiving the per-domain log directories [env: LOG_ROOT]
    #[arg(long, global = true)]
    pub log_root: Option<PathBuf>,

    /// Rows per committed batch [env: MIGRATE_COMMIT_EVERY]
    #[arg(long, global = true)]
    pub commit_every: Option<usize>,

    /// Rows between progress lines [env: MIGRATE_PROGRESS_EVERY]
    #[arg(long, global = true)]
    pub progress_every: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Migrate one table
    Run {
        /// Step name, see `list`
        step: String,

        /// Transform and log every row without writing
        #[arg(long)]
        dry_run: bool,

        /// Skip rows whose clinic location cannot be resolved
        #[arg(long, conflicts_with = "default_clinic_location_id")]
        skip_invalid: bool,

        /// Use this clinic location for rows whose location cannot be resolved
        /// [env: DEFAULT_CLINIC_LOCATION_ID]
        #[arg(long)]
        default_clinic_location_id: Option<i32>,
    },

    /// Compare source and destination for one table without writing
    Verify {
        step: String,
    },

    /// Run every step in dependency order, stopping at the first failure
    All {
        #[arg(long)]
        dry_run: bool,
    },

    /// Clear the migrated tables and install the schema additions
    Reset {
        #[arg(long)]
        dry_run: bool,
    },

    /// Report legacy users without a destination account
    AuditUsers,

    /// Print the migration plan
    List,
}
