//! This module defines the `SourceRepository` trait, the read-only interface
//! to the legacy schema. Every method is one bulk snapshot query; no method
//! is meant to be called per row.
use crate::errors::SourceRepositoryError;
use crate::interfaces::LegacyTable;
use std::collections::HashSet;
use voxel_migrate_shared::types::{
    LegacyCase, LegacyCaseFile, LegacyCaseId, LegacyCaseInvoiceLink, LegacyCaseKey,
    LegacyCasePatient, LegacyCaseReport, LegacyClientInvoice, LegacyClientInvoiceLine,
    LegacyPractice, LegacyRadiologist, LegacyRadiologistInvoice, LegacyRadiologistInvoiceLine,
    LegacyService, LegacyServiceCharge, LegacyStudyPurpose, LegacyUser, LegacyUserId,
};

/// A trait that defines the interface for reading the legacy data store.
///
/// Implementors return rows in a stable source order (by primary key unless
/// noted), which is the order the migration processes them in.
#[async_trait::async_trait]
pub trait SourceRepository: Send + Sync {
    /// Reads every clinic user from `tbl_users`.
    async fn users(&self) -> Result<Vec<LegacyUser>, SourceRepositoryError>;

    /// Reads every radiologist from `tbl_radiologist`.
    async fn radiologists(&self) -> Result<Vec<LegacyRadiologist>, SourceRepositoryError>;

    /// Reads the practices that have a non-empty name.
    async fn practices(&self) -> Result<Vec<LegacyPractice>, SourceRepositoryError>;

    async fn radiologist_invoices(
        &self,
    ) -> Result<Vec<LegacyRadiologistInvoice>, SourceRepositoryError>;

    /// Reads radiologist invoices joined with their detail lines, ordered by
    /// invoice then detail id.
    async fn radiologist_invoice_lines(
        &self,
    ) -> Result<Vec<LegacyRadiologistInvoiceLine>, SourceRepositoryError>;

    async fn client_invoices(&self) -> Result<Vec<LegacyClientInvoice>, SourceRepositoryError>;

    /// Reads client invoice details joined with their reports, ordered by
    /// detail then report id.
    async fn client_invoice_lines(
        &self,
    ) -> Result<Vec<LegacyClientInvoiceLine>, SourceRepositoryError>;

    async fn service_charges(&self) -> Result<Vec<LegacyServiceCharge>, SourceRepositoryError>;

    async fn cases(&self) -> Result<Vec<LegacyCase>, SourceRepositoryError>;

    async fn case_files(&self) -> Result<Vec<LegacyCaseFile>, SourceRepositoryError>;

    async fn study_purposes(&self) -> Result<Vec<LegacyStudyPurpose>, SourceRepositoryError>;

    /// Reads the patient fields of cases where both patient names are present.
    async fn case_patients(&self) -> Result<Vec<LegacyCasePatient>, SourceRepositoryError>;

    async fn case_reports(&self) -> Result<Vec<LegacyCaseReport>, SourceRepositoryError>;

    /// Reads the legacy service catalogue (`tbl_add_services`).
    async fn services(&self) -> Result<Vec<LegacyService>, SourceRepositoryError>;

    /// Reads `cases_id` with its public case number for every legacy case.
    async fn case_keys(&self) -> Result<Vec<LegacyCaseKey>, SourceRepositoryError>;

    /// Reads which client invoice each case was billed on.
    async fn case_invoice_links(&self) -> Result<Vec<LegacyCaseInvoiceLink>, SourceRepositoryError>;

    /// Returns the set of every `tbl_users.user_id`.
    async fn user_ids(&self) -> Result<HashSet<LegacyUserId>, SourceRepositoryError>;

    /// Returns the set of every `tbl_radiologist.radiologist_id`.
    async fn radiologist_ids(&self) -> Result<HashSet<LegacyUserId>, SourceRepositoryError>;

    /// Returns the case ids that carry more than one study purpose, with their counts.
    async fn duplicate_study_purpose_cases(
        &self,
    ) -> Result<Vec<(LegacyCaseId, i64)>, SourceRepositoryError>;

    /// Counts the distinct non-null case ids in `tbl_study_purposes`.
    async fn count_study_purpose_cases(&self) -> Result<i64, SourceRepositoryError>;

    /// Counts the rows of a legacy table.
    ///
    /// # Arguments
    ///
    /// * `table` - The legacy table to count.
    ///
    /// # Returns
    ///
    /// The row count or a `SourceRepositoryError` if the query fails.
    async fn count(&self, table: LegacyTable) -> Result<i64, SourceRepositoryError>;
}
