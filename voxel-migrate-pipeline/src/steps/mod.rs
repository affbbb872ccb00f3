//! The per-table migration steps and the plumbing they share.
//!
//! A step reads its legacy rows and mapping snapshots up front, transforms
//! each row into a `RowOutcome`, and hands migrated rows to a `BatchWriter`.
//! Only setup failures abort a step; everything row-level is counted.
mod case_files;
mod case_patients;
mod case_services;
mod case_study_purposes;
mod cases;
mod clinics;
mod invoice_case_services;
mod invoices;
mod radiologist_invoice_case_services;
mod radiologist_invoices;
mod radiologists;
mod service_charges;
mod users;

pub use case_files::CaseFilesStep;
pub use case_patients::CasePatientsStep;
pub use case_services::CaseServicesStep;
pub use case_study_purposes::CaseStudyPurposesStep;
pub use cases::CasesStep;
pub use clinics::ClinicsStep;
pub use invoice_case_services::InvoiceCaseServicesStep;
pub use invoices::InvoicesStep;
pub use radiologist_invoice_case_services::RadiologistInvoiceCaseServicesStep;
pub use radiologist_invoices::RadiologistInvoicesStep;
pub use radiologists::RadiologistsStep;
pub use service_charges::ServiceChargesStep;
pub use users::UsersStep;

use crate::errors::StepError;
use crate::stats::RunStats;
use crate::transform::{RowOutcome, SkipReason};
use crate::writer::{BatchWriter, WriteOutcome};
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use voxel_migrate_repository::{OrphanCheck, SourceRepository, TargetRepository, TargetTable};
use voxel_migrate_shared::types::{ClinicLocationId, TargetRow};

/// Log directory grouping of a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Domain {
    Users,
    Clinics,
    Invoices,
    Cases,
    Maintenance,
}

impl Domain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Users => "users",
            Domain::Clinics => "clinics",
            Domain::Invoices => "invoices",
            Domain::Cases => "cases",
            Domain::Maintenance => "maintenance",
        }
    }
}

/// What must hold for a step's destination table before it loads, which
/// also decides whether the step can be re-run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TablePrecondition {
    /// `TRUNCATE ... RESTART IDENTITY CASCADE` before loading.
    Truncate,
    /// `DELETE FROM` before loading.
    DeleteAll,
    /// Refuses to load into a non-empty table.
    AssumeEmpty,
    /// Only updates existing rows; re-running is idempotent.
    UpdateInPlace,
    /// Detects and skips rows that were already migrated.
    Incremental,
}

impl fmt::Display for TablePrecondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TablePrecondition::Truncate => "truncate",
            TablePrecondition::DeleteAll => "delete-all",
            TablePrecondition::AssumeEmpty => "assume-empty",
            TablePrecondition::UpdateInPlace => "update-in-place",
            TablePrecondition::Incremental => "incremental",
        };
        f.write_str(label)
    }
}

/// How a row whose clinic location cannot be resolved is handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UnmappedLocation {
    /// Migrate the row with a null location.
    #[default]
    Null,
    /// Skip the row.
    SkipInvalid,
    /// Use a configured location.
    UseDefault(ClinicLocationId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    pub dry_run: bool,
    pub commit_every: usize,
    pub progress_every: u64,
    pub unmapped_location: UnmappedLocation,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            commit_every: 100,
            progress_every: 100,
            unmapped_location: UnmappedLocation::Null,
        }
    }
}

/// Everything a step needs to run.
#[derive(Clone)]
pub struct StepContext {
    pub source: Arc<dyn SourceRepository>,
    pub target: Arc<dyn TargetRepository>,
    pub options: RunOptions,
}

impl StepContext {
    pub fn new(
        source: Arc<dyn SourceRepository>,
        target: Arc<dyn TargetRepository>,
        options: RunOptions,
    ) -> Self {
        Self {
            source,
            target,
            options,
        }
    }
}

/// Outcome of a validate-only pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Verification {
    pub step: String,
    pub source_count: Option<i64>,
    pub target_count: i64,
    pub orphans: Vec<(String, i64)>,
    pub samples: Vec<String>,
}

impl Verification {
    pub fn new(step: &str, source_count: Option<i64>, target_count: i64) -> Self {
        Self {
            step: step.to_string(),
            source_count,
            target_count,
            ..Self::default()
        }
    }

    pub fn orphan_total(&self) -> i64 {
        self.orphans.iter().map(|(_, count)| count).sum()
    }

    pub fn log(&self) {
        info!("\n=== {} verification ===", self.step);
        match self.source_count {
            Some(source) => info!(source, target = self.target_count, "Row counts"),
            None => info!(target = self.target_count, "Row count"),
        }
        for (check, count) in &self.orphans {
            if *count > 0 {
                warn!(check = %check, count, "Orphaned rows");
            } else {
                info!(check = %check, "✓ No orphaned rows");
            }
        }
        for sample in &self.samples {
            info!("  {sample}");
        }
    }
}

/// A single migration script: one legacy source into one destination table.
#[async_trait]
pub trait MigrationStep: Send + Sync {
    /// CLI name, e.g. `invoice-case-services`.
    fn name(&self) -> &'static str;

    fn domain(&self) -> Domain;

    /// The destination table the step loads into.
    fn table(&self) -> TargetTable;

    fn precondition(&self) -> TablePrecondition;

    /// Overrides the configured progress interval for this step.
    fn progress_every(&self) -> Option<u64> {
        None
    }

    /// Migrates the step's rows.
    ///
    /// # Returns
    ///
    /// * `Ok(RunStats)` - Counters of the run; row failures are counted, not returned
    /// * `Err(StepError)` - A setup failure aborted the step
    async fn run(&self, ctx: &StepContext) -> Result<RunStats, StepError>;

    /// Compares source and destination without writing anything.
    async fn verify(&self, ctx: &StepContext) -> Result<Verification, StepError>;
}

/// Every step, in orchestration order.
pub fn catalogue() -> Vec<Box<dyn MigrationStep>> {
    vec![
        Box::new(UsersStep),
        Box::new(RadiologistsStep),
        Box::new(ClinicsStep),
        Box::new(RadiologistInvoicesStep),
        Box::new(RadiologistInvoiceCaseServicesStep),
        Box::new(InvoicesStep),
        Box::new(InvoiceCaseServicesStep),
        Box::new(ServiceChargesStep),
        Box::new(CasesStep),
        Box::new(CaseFilesStep),
        Box::new(CaseStudyPurposesStep),
        Box::new(CasePatientsStep),
        Box::new(CaseServicesStep),
    ]
}

/// Looks a step up by its CLI name.
pub fn find(name: &str) -> Result<Box<dyn MigrationStep>, StepError> {
    catalogue()
        .into_iter()
        .find(|step| step.name() == name)
        .ok_or_else(|| StepError::UnknownStep(name.to_string()))
}

/// Applies a step's table precondition. Nothing is executed in dry-run.
pub(crate) async fn apply_precondition(
    step: &dyn MigrationStep,
    ctx: &StepContext,
) -> Result<(), StepError> {
    let table = step.table();
    let precondition = step.precondition();
    if ctx.options.dry_run {
        info!(table = table.as_str(), %precondition, "[DRY RUN] Precondition not applied");
        return Ok(());
    }

    match precondition {
        TablePrecondition::Truncate => ctx.target.truncate(table).await?,
        TablePrecondition::DeleteAll => {
            ctx.target.delete_all(table).await?;
        }
        TablePrecondition::AssumeEmpty => {
            let rows = ctx.target.count(table).await?;
            if rows > 0 {
                return Err(StepError::TableNotEmpty {
                    table: table.as_str(),
                    rows,
                });
            }
        }
        TablePrecondition::UpdateInPlace | TablePrecondition::Incremental => {
            debug!(table = table.as_str(), %precondition, "No table preparation needed");
        }
    }
    Ok(())
}

/// Drops the key default so rows can keep their legacy numbering.
pub(crate) async fn release_key(ctx: &StepContext, table: TargetTable) -> Result<(), StepError> {
    if !ctx.options.dry_run {
        ctx.target.drop_key_default(table).await?;
    }
    Ok(())
}

/// Restores the key default and advances its sequence past the loaded keys.
pub(crate) async fn restore_key(ctx: &StepContext, table: TargetTable) -> Result<(), StepError> {
    if !ctx.options.dry_run {
        ctx.target.restore_key_default(table).await?;
    }
    Ok(())
}

/// Combines a load with the table cleanup that ran after it, whatever the
/// load returned. A load error wins over a cleanup error, which is logged.
pub(crate) fn after_cleanup(
    loaded: Result<RunStats, StepError>,
    cleanup: Result<(), StepError>,
) -> Result<RunStats, StepError> {
    match (loaded, cleanup) {
        (Ok(stats), Ok(())) => Ok(stats),
        (Ok(_), Err(err)) => Err(err),
        (Err(err), Ok(())) => Err(err),
        (Err(err), Err(cleanup_err)) => {
            error!(error = %cleanup_err, "Table cleanup failed after an aborted load");
            Err(err)
        }
    }
}

pub(crate) async fn orphan_counts(
    ctx: &StepContext,
    checks: &[OrphanCheck],
) -> Result<Vec<(String, i64)>, StepError> {
    let mut counts = Vec::with_capacity(checks.len());
    for check in checks {
        counts.push((check.label().to_string(), ctx.target.count_orphans(*check).await?));
    }
    Ok(counts)
}

/// Drives the row loop of a step: counts every row, writes migrated rows
/// and logs progress.
pub(crate) struct RowSink {
    writer: BatchWriter,
    stats: RunStats,
    progress_every: u64,
}

impl RowSink {
    pub(crate) fn new(step: &dyn MigrationStep, ctx: &StepContext) -> Self {
        Self {
            writer: BatchWriter::new(
                Arc::clone(&ctx.target),
                ctx.options.commit_every,
                ctx.options.dry_run,
            ),
            stats: RunStats::new(step.name(), ctx.options.dry_run),
            progress_every: step.progress_every().unwrap_or(ctx.options.progress_every),
        }
    }

    pub(crate) fn stats(&mut self) -> &mut RunStats {
        &mut self.stats
    }

    /// Settles one processed row. Returns whether it was migrated.
    pub(crate) async fn settle(&mut self, outcome: RowOutcome<TargetRow>) -> Result<bool, StepError> {
        self.stats.record_processed();
        let migrated = match outcome {
            RowOutcome::Migrate(row) => self.write(&row).await?,
            RowOutcome::Skip(reason) => {
                debug!(reason = %reason, "Skipped row");
                if let SkipReason::ForeignKeyMissing(parent) = &reason {
                    self.stats
                        .record_foreign_key_violation(format!("missing parent {parent}"));
                }
                self.stats.record_skip(&reason);
                false
            }
            RowOutcome::Fail(detail) => {
                warn!(detail = %detail, "Row failed");
                self.stats.record_failure(detail);
                false
            }
        };
        self.stats.log_progress(self.progress_every);
        Ok(migrated)
    }

    async fn write(&mut self, row: &TargetRow) -> Result<bool, StepError> {
        match self.writer.write(row).await? {
            WriteOutcome::Written(_) | WriteOutcome::Simulated => {
                self.stats.record_migrated();
                Ok(true)
            }
            WriteOutcome::ForeignKeyViolation(detail) => {
                warn!(detail = %detail, "Foreign key violation");
                self.stats.record_foreign_key_violation(detail);
                Ok(false)
            }
            WriteOutcome::Rejected(detail) => {
                warn!(detail = %detail, "Insert failed");
                self.stats.record_failure(detail);
                Ok(false)
            }
        }
    }

    /// Commits the tail and logs the summary.
    pub(crate) async fn finish(self) -> Result<RunStats, StepError> {
        self.writer.finish().await?;
        self.stats.log_summary();
        Ok(self.stats)
    }
}
