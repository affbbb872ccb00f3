//! This module defines the `TargetRepository` and `TargetBatch` traits, the
//! interface to the destination schema. Snapshot reads feed the identifier
//! mapper, maintenance statements prepare and restore tables around a load,
//! and batches carry the row writes.
use crate::errors::TargetRepositoryError;
use crate::interfaces::{OrphanCheck, SampleQuery, TargetTable};
use std::collections::HashSet;
use voxel_migrate_shared::types::{
    CaseId, CaseKey, ClinicLocationRef, ClinicOwner, MasterService, OwnerLocationLink, TargetRow,
    TargetUser,
};

/// Result of writing one `TargetRow`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteReceipt {
    /// Rows touched by the statement(s).
    pub rows_affected: u64,
    /// Key generated by the destination, when the insert returns one.
    pub returned_id: Option<i32>,
}

/// A trait that defines the interface for interacting with the destination data store.
#[async_trait::async_trait]
pub trait TargetRepository: Send + Sync {
    // ---- snapshots -------------------------------------------------------

    /// Reads every destination user with its natural keys and legacy id.
    async fn users(&self) -> Result<Vec<TargetUser>, TargetRepositoryError>;

    /// Reads every clinic with its owner, ordered by clinic id.
    async fn clinic_owners(&self) -> Result<Vec<ClinicOwner>, TargetRepositoryError>;

    /// Reads every clinic location with its clinic, ordered by location id.
    async fn clinic_locations(&self) -> Result<Vec<ClinicLocationRef>, TargetRepositoryError>;

    /// Reads `Users ⋈ Clinics ⋈ ClinicLocations` for users carrying a legacy id.
    async fn owner_location_links(&self) -> Result<Vec<OwnerLocationLink>, TargetRepositoryError>;

    async fn master_services(&self) -> Result<Vec<MasterService>, TargetRepositoryError>;

    async fn case_keys(&self) -> Result<Vec<CaseKey>, TargetRepositoryError>;

    /// Returns every key of a table, for in-memory foreign key checks.
    ///
    /// # Arguments
    ///
    /// * `table` - A table with a single integer key.
    ///
    /// # Returns
    ///
    /// The key set, or `TargetRepositoryError::NoIntegerKey` for tables
    /// without one.
    async fn key_set(&self, table: TargetTable) -> Result<HashSet<i32>, TargetRepositoryError>;

    /// Returns the cases that already have a `CasePatients` row.
    async fn case_ids_with_patient(&self) -> Result<HashSet<CaseId>, TargetRepositoryError>;

    /// Reads the labels of `enum_Invoices_invoiceType` in declaration order.
    async fn invoice_type_labels(&self) -> Result<Vec<String>, TargetRepositoryError>;

    // ---- verification ----------------------------------------------------

    async fn count(&self, table: TargetTable) -> Result<i64, TargetRepositoryError>;

    /// Counts radiologist users that carry a legacy id.
    async fn count_linked_radiologists(&self) -> Result<i64, TargetRepositoryError>;

    /// Counts child rows whose parent row is missing.
    async fn count_orphans(&self, check: OrphanCheck) -> Result<i64, TargetRepositoryError>;

    /// Renders up to `limit` rows of a sampled join, one line each.
    async fn sample(
        &self,
        query: SampleQuery,
        limit: i64,
    ) -> Result<Vec<String>, TargetRepositoryError>;

    // ---- maintenance -----------------------------------------------------

    /// `TRUNCATE ... RESTART IDENTITY CASCADE`
    async fn truncate(&self, table: TargetTable) -> Result<(), TargetRepositoryError>;

    /// `DELETE FROM ...`, returning the number of rows removed.
    async fn delete_all(&self, table: TargetTable) -> Result<u64, TargetRepositoryError>;

    /// Drops the default of the table's key so explicit legacy keys can be inserted.
    async fn drop_key_default(&self, table: TargetTable) -> Result<(), TargetRepositoryError>;

    /// Restores the key default to its serial sequence and advances the
    /// sequence past the largest key present.
    async fn restore_key_default(&self, table: TargetTable) -> Result<(), TargetRepositoryError>;

    /// Enables or disables every trigger on a table.
    async fn set_triggers_enabled(
        &self,
        table: TargetTable,
        enabled: bool,
    ) -> Result<(), TargetRepositoryError>;

    /// Drops the user triggers on a table, returning how many were dropped.
    async fn drop_triggers(&self, table: TargetTable) -> Result<u64, TargetRepositoryError>;

    /// (Re)creates the trigger that fills an empty `RadiologistInvoices."invoiceNo"`.
    async fn install_radiologist_invoice_no_trigger(&self) -> Result<(), TargetRepositoryError>;

    /// Marks every `MasterServices` row as not deleted.
    async fn reactivate_master_services(&self) -> Result<u64, TargetRepositoryError>;

    /// Adds `Users.olduserid` if it is missing. Returns whether it was added.
    async fn ensure_legacy_id_column(&self) -> Result<bool, TargetRepositoryError>;

    /// Adds a label to an enum type if it is missing. Returns whether it was added.
    async fn ensure_enum_value(
        &self,
        enum_type: &str,
        value: &str,
    ) -> Result<bool, TargetRepositoryError>;

    // ---- writes ----------------------------------------------------------

    /// Opens a write batch backed by one destination transaction.
    async fn begin_batch(&self) -> Result<Box<dyn TargetBatch>, TargetRepositoryError>;
}

/// An open write transaction.
///
/// Each `write` is isolated: a rejected row is rolled back on its own and
/// leaves the rows already written in the batch intact.
#[async_trait::async_trait]
pub trait TargetBatch: Send {
    /// Writes one row.
    ///
    /// # Arguments
    ///
    /// * `row` - The row (or atomic pair of rows) to write.
    ///
    /// # Returns
    ///
    /// A `WriteReceipt`, or the classified `TargetRepositoryError` that
    /// rejected the row.
    async fn write(&mut self, row: &TargetRow) -> Result<WriteReceipt, TargetRepositoryError>;

    /// Commits every row written so far.
    async fn commit(self: Box<Self>) -> Result<(), TargetRepositoryError>;
}
