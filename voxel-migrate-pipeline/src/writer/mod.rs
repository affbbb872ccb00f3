//! Batched, row-isolated writes to the destination.
//!
//! Rows are written one at a time inside an open destination transaction.
//! The transaction is committed every `commit_every` successful rows and a
//! fresh one is opened on the next write, so an interruption only loses the
//! uncommitted tail.
use crate::errors::WriterError;
use std::sync::Arc;
use tracing::{debug, info};
use voxel_migrate_repository::{TargetBatch, TargetRepository, WriteReceipt};
use voxel_migrate_shared::types::TargetRow;

/// What happened to one row handed to the writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    Written(WriteReceipt),
    /// Dry run: logged, not written.
    Simulated,
    /// The destination rejected a reference to a missing parent row.
    ForeignKeyViolation(String),
    /// The destination rejected the row for any other reason.
    Rejected(String),
}

pub struct BatchWriter {
    target: Arc<dyn TargetRepository>,
    batch: Option<Box<dyn TargetBatch>>,
    commit_every: usize,
    pending: usize,
    committed: u64,
    dry_run: bool,
}

impl BatchWriter {
    /// Creates a writer.
    ///
    /// # Arguments
    ///
    /// * `target` - Destination repository the batches are opened on
    /// * `commit_every` - Successful rows per committed batch (at least 1)
    /// * `dry_run` - When set, the destination is never touched
    pub fn new(target: Arc<dyn TargetRepository>, commit_every: usize, dry_run: bool) -> Self {
        Self {
            target,
            batch: None,
            commit_every: commit_every.max(1),
            pending: 0,
            committed: 0,
            dry_run,
        }
    }

    /// Writes one row in its own savepoint.
    ///
    /// # Returns
    ///
    /// * `Ok(WriteOutcome)` - The row was written, simulated or rejected
    /// * `Err(WriterError)` - A batch could not be opened, used or committed
    pub async fn write(&mut self, row: &TargetRow) -> Result<WriteOutcome, WriterError> {
        if self.dry_run {
            debug!(table = row.table(), row = %row.describe(), "[DRY RUN] Would write row");
            return Ok(WriteOutcome::Simulated);
        }

        let mut batch = match self.batch.take() {
            Some(batch) => batch,
            None => self.target.begin_batch().await.map_err(WriterError::Begin)?,
        };
        let result = match batch.write(row).await {
            Err(err) if err.is_transaction_failure() => return Err(WriterError::Transaction(err)),
            result => result,
        };
        self.batch = Some(batch);

        match result {
            Ok(receipt) => {
                self.pending += 1;
                if self.pending >= self.commit_every {
                    self.commit().await?;
                }
                Ok(WriteOutcome::Written(receipt))
            }
            Err(err) if err.is_foreign_key_violation() => {
                debug!(row = %row.describe(), error = %err, "Row rejected by foreign key");
                Ok(WriteOutcome::ForeignKeyViolation(format!("{}: {}", row.describe(), err)))
            }
            Err(err) => {
                debug!(row = %row.describe(), error = %err, "Row rejected");
                Ok(WriteOutcome::Rejected(format!("{}: {}", row.describe(), err)))
            }
        }
    }

    async fn commit(&mut self) -> Result<(), WriterError> {
        if let Some(batch) = self.batch.take() {
            batch.commit().await.map_err(WriterError::Commit)?;
            self.committed += self.pending as u64;
            debug!(rows = self.pending, total = self.committed, "Committed batch");
            self.pending = 0;
        }
        Ok(())
    }

    /// Commits the uncommitted tail and returns the number of committed rows.
    pub async fn finish(mut self) -> Result<u64, WriterError> {
        self.commit().await?;
        if !self.dry_run {
            info!(rows = self.committed, "All batches committed");
        }
        Ok(self.committed)
    }
}
