//! In-memory repositories shared by the pipeline integration tests.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use voxel_migrate_repository::{
    LegacyTable, OrphanCheck, SampleQuery, SourceRepository, SourceRepositoryError, TargetBatch,
    TargetRepository, TargetRepositoryError, TargetTable, WriteReceipt,
};
use voxel_migrate_shared::types::*;

// ============================================================================
// Mock source
// ============================================================================

#[derive(Default)]
pub struct MockSource {
    pub users: Vec<LegacyUser>,
    pub radiologists: Vec<LegacyRadiologist>,
    pub practices: Vec<LegacyPractice>,
    pub radiologist_invoices: Vec<LegacyRadiologistInvoice>,
    pub radiologist_invoice_lines: Vec<LegacyRadiologistInvoiceLine>,
    pub client_invoices: Vec<LegacyClientInvoice>,
    pub client_invoice_lines: Vec<LegacyClientInvoiceLine>,
    pub service_charges: Vec<LegacyServiceCharge>,
    pub cases: Vec<LegacyCase>,
    pub case_files: Vec<LegacyCaseFile>,
    pub study_purposes: Vec<LegacyStudyPurpose>,
    pub case_patients: Vec<LegacyCasePatient>,
    pub case_reports: Vec<LegacyCaseReport>,
    pub services: Vec<LegacyService>,
    pub case_keys: Vec<LegacyCaseKey>,
    pub case_invoice_links: Vec<LegacyCaseInvoiceLink>,
}

#[async_trait::async_trait]
impl SourceRepository for MockSource {
    async fn users(&self) -> Result<Vec<LegacyUser>, SourceRepositoryError> {
        Ok(self.users.clone())
    }

    async fn radiologists(&self) -> Result<Vec<LegacyRadiologist>, SourceRepositoryError> {
        Ok(self.radiologists.clone())
    }

    async fn practices(&self) -> Result<Vec<LegacyPractice>, SourceRepositoryError> {
        Ok(self.practices.clone())
    }

    async fn radiologist_invoices(
        &self,
    ) -> Result<Vec<LegacyRadiologistInvoice>, SourceRepositoryError> {
        Ok(self.radiologist_invoices.clone())
    }

    async fn radiologist_invoice_lines(
        &self,
    ) -> Result<Vec<LegacyRadiologistInvoiceLine>, SourceRepositoryError> {
        Ok(self.radiologist_invoice_lines.clone())
    }

    async fn client_invoices(&self) -> Result<Vec<LegacyClientInvoice>, SourceRepositoryError> {
        Ok(self.client_invoices.clone())
    }

    async fn client_invoice_lines(
        &self,
    ) -> Result<Vec<LegacyClientInvoiceLine>, SourceRepositoryError> {
        Ok(self.client_invoice_lines.clone())
    }

    async fn service_charges(&self) -> Result<Vec<LegacyServiceCharge>, SourceRepositoryError> {
        Ok(self.service_charges.clone())
    }

    async fn cases(&self) -> Result<Vec<LegacyCase>, SourceRepositoryError> {
        Ok(self.cases.clone())
    }

    async fn case_files(&self) -> Result<Vec<LegacyCaseFile>, SourceRepositoryError> {
        Ok(self.case_files.clone())
    }

    async fn study_purposes(&self) -> Result<Vec<LegacyStudyPurpose>, SourceRepositoryError> {
        Ok(self.study_purposes.clone())
    }

    async fn case_patients(&self) -> Result<Vec<LegacyCasePatient>, SourceRepositoryError> {
        Ok(self.case_patients.clone())
    }

    async fn case_reports(&self) -> Result<Vec<LegacyCaseReport>, SourceRepositoryError> {
        Ok(self.case_reports.clone())
    }

    async fn services(&self) -> Result<Vec<LegacyService>, SourceRepositoryError> {
        Ok(self.services.clone())
    }

    async fn case_keys(&self) -> Result<Vec<LegacyCaseKey>, SourceRepositoryError> {
        Ok(self.case_keys.clone())
    }

    async fn case_invoice_links(&self) -> Result<Vec<LegacyCaseInvoiceLink>, SourceRepositoryError> {
        Ok(self.case_invoice_links.clone())
    }

    async fn user_ids(&self) -> Result<HashSet<LegacyUserId>, SourceRepositoryError> {
        Ok(self.users.iter().map(|user| user.user_id).collect())
    }

    async fn radiologist_ids(&self) -> Result<HashSet<LegacyUserId>, SourceRepositoryError> {
        Ok(self
            .radiologists
            .iter()
            .map(|radiologist| radiologist.radiologist_id)
            .collect())
    }

    async fn duplicate_study_purpose_cases(
        &self,
    ) -> Result<Vec<(LegacyCaseId, i64)>, SourceRepositoryError> {
        let mut counts: HashMap<LegacyCaseId, i64> = HashMap::new();
        for purpose in &self.study_purposes {
            if let Some(case) = purpose.cases_id {
                *counts.entry(case).or_default() += 1;
            }
        }
        Ok(counts.into_iter().filter(|(_, count)| *count > 1).collect())
    }

    async fn count_study_purpose_cases(&self) -> Result<i64, SourceRepositoryError> {
        let cases: HashSet<_> = self.study_purposes.iter().filter_map(|p| p.cases_id).collect();
        Ok(cases.len() as i64)
    }

    async fn count(&self, table: LegacyTable) -> Result<i64, SourceRepositoryError> {
        let rows = match table {
            LegacyTable::Users => self.users.len(),
            LegacyTable::Radiologists => self.radiologists.len(),
            LegacyTable::Practices => self.practices.len(),
            LegacyTable::RadiologistInvoices => self.radiologist_invoices.len(),
            LegacyTable::RadiologistInvoiceDetails => self.radiologist_invoice_lines.len(),
            LegacyTable::ClientInvoices => self.client_invoices.len(),
            LegacyTable::ClientInvoiceDetails => self.client_invoice_lines.len(),
            LegacyTable::UserServiceCharges => self.service_charges.len(),
            LegacyTable::Cases => self.cases.len(),
            LegacyTable::CaseFiles => self.case_files.len(),
            LegacyTable::StudyPurposes => self.study_purposes.len(),
            LegacyTable::CaseReports => self.case_reports.len(),
            LegacyTable::AddServices => self.services.len(),
        };
        Ok(rows as i64)
    }
}

// ============================================================================
// Mock target
// ============================================================================

/// Destination double. Committed rows and maintenance calls are recorded.
#[derive(Default)]
pub struct MockTarget {
    pub users: Vec<TargetUser>,
    pub clinic_owners: Vec<ClinicOwner>,
    pub clinic_locations: Vec<ClinicLocationRef>,
    pub owner_location_links: Vec<OwnerLocationLink>,
    pub master_services: Vec<MasterService>,
    pub case_keys: Vec<CaseKey>,
    pub key_sets: HashMap<TargetTable, HashSet<i32>>,
    pub existing_rows: HashMap<TargetTable, i64>,
    pub invoice_type_labels: Vec<String>,
    /// Rows referencing one of these cases are rejected with a foreign key error.
    pub rejected_case_ids: HashSet<i32>,
    /// Every batch commit fails.
    pub fail_commit: bool,
    /// Every row write fails its savepoint as if the connection dropped.
    pub lose_connection: bool,
    pub committed: Arc<Mutex<Vec<TargetRow>>>,
    pub calls: Arc<Mutex<Vec<String>>>,
    pub batches_opened: Arc<Mutex<u64>>,
}

impl MockTarget {
    pub fn committed_rows(&self) -> Vec<TargetRow> {
        self.committed.lock().unwrap().clone()
    }

    pub fn get_committed_count(&self) -> usize {
        self.committed.lock().unwrap().len()
    }

    pub fn get_calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn get_batches_opened(&self) -> u64 {
        *self.batches_opened.lock().unwrap()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait::async_trait]
impl TargetRepository for MockTarget {
    async fn users(&self) -> Result<Vec<TargetUser>, TargetRepositoryError> {
        Ok(self.users.clone())
    }

    async fn clinic_owners(&self) -> Result<Vec<ClinicOwner>, TargetRepositoryError> {
        Ok(self.clinic_owners.clone())
    }

    async fn clinic_locations(&self) -> Result<Vec<ClinicLocationRef>, TargetRepositoryError> {
        Ok(self.clinic_locations.clone())
    }

    async fn owner_location_links(&self) -> Result<Vec<OwnerLocationLink>, TargetRepositoryError> {
        Ok(self.owner_location_links.clone())
    }

    async fn master_services(&self) -> Result<Vec<MasterService>, TargetRepositoryError> {
        Ok(self.master_services.clone())
    }

    async fn case_keys(&self) -> Result<Vec<CaseKey>, TargetRepositoryError> {
        Ok(self.case_keys.clone())
    }

    async fn key_set(&self, table: TargetTable) -> Result<HashSet<i32>, TargetRepositoryError> {
        Ok(self.key_sets.get(&table).cloned().unwrap_or_default())
    }

    async fn case_ids_with_patient(&self) -> Result<HashSet<CaseId>, TargetRepositoryError> {
        Ok(HashSet::new())
    }

    async fn invoice_type_labels(&self) -> Result<Vec<String>, TargetRepositoryError> {
        Ok(self.invoice_type_labels.clone())
    }

    async fn count(&self, table: TargetTable) -> Result<i64, TargetRepositoryError> {
        let committed = self
            .committed
            .lock()
            .unwrap()
            .iter()
            .filter(|row| row.table() == table.as_str())
            .count() as i64;
        Ok(committed + self.existing_rows.get(&table).copied().unwrap_or(0))
    }

    async fn count_linked_radiologists(&self) -> Result<i64, TargetRepositoryError> {
        Ok(0)
    }

    async fn count_orphans(&self, _check: OrphanCheck) -> Result<i64, TargetRepositoryError> {
        Ok(0)
    }

    async fn sample(
        &self,
        _query: SampleQuery,
        _limit: i64,
    ) -> Result<Vec<String>, TargetRepositoryError> {
        Ok(Vec::new())
    }

    async fn truncate(&self, table: TargetTable) -> Result<(), TargetRepositoryError> {
        self.record(format!("truncate {}", table.as_str()));
        Ok(())
    }

    async fn delete_all(&self, table: TargetTable) -> Result<u64, TargetRepositoryError> {
        self.record(format!("delete {}", table.as_str()));
        Ok(self.existing_rows.get(&table).copied().unwrap_or(0) as u64)
    }

    async fn drop_key_default(&self, table: TargetTable) -> Result<(), TargetRepositoryError> {
        self.record(format!("drop_key_default {}", table.as_str()));
        Ok(())
    }

    async fn restore_key_default(&self, table: TargetTable) -> Result<(), TargetRepositoryError> {
        self.record(format!("restore_key_default {}", table.as_str()));
        Ok(())
    }

    async fn set_triggers_enabled(
        &self,
        table: TargetTable,
        enabled: bool,
    ) -> Result<(), TargetRepositoryError> {
        self.record(format!("triggers {} {}", table.as_str(), enabled));
        Ok(())
    }

    async fn drop_triggers(&self, table: TargetTable) -> Result<u64, TargetRepositoryError> {
        self.record(format!("drop_triggers {}", table.as_str()));
        Ok(1)
    }

    async fn install_radiologist_invoice_no_trigger(&self) -> Result<(), TargetRepositoryError> {
        self.record("install_radiologist_invoice_no_trigger".to_string());
        Ok(())
    }

    async fn reactivate_master_services(&self) -> Result<u64, TargetRepositoryError> {
        self.record("reactivate_master_services".to_string());
        Ok(0)
    }

    async fn ensure_legacy_id_column(&self) -> Result<bool, TargetRepositoryError> {
        self.record("ensure_legacy_id_column".to_string());
        Ok(true)
    }

    async fn ensure_enum_value(
        &self,
        enum_type: &str,
        value: &str,
    ) -> Result<bool, TargetRepositoryError> {
        self.record(format!("ensure_enum_value {enum_type} {value}"));
        Ok(value == "ADHOC")
    }

    async fn begin_batch(&self) -> Result<Box<dyn TargetBatch>, TargetRepositoryError> {
        *self.batches_opened.lock().unwrap() += 1;
        Ok(Box::new(MockBatch {
            pending: Vec::new(),
            committed: Arc::clone(&self.committed),
            rejected_case_ids: self.rejected_case_ids.clone(),
            fail_commit: self.fail_commit,
            lose_connection: self.lose_connection,
        }))
    }
}

pub struct MockBatch {
    pending: Vec<TargetRow>,
    committed: Arc<Mutex<Vec<TargetRow>>>,
    rejected_case_ids: HashSet<i32>,
    fail_commit: bool,
    lose_connection: bool,
}

fn case_of(row: &TargetRow) -> Option<i32> {
    match row {
        TargetRow::RadiologistInvoiceCaseService(line) => Some(line.case_id.0),
        TargetRow::InvoiceCaseService(line) => Some(line.case_id.0),
        TargetRow::Case(case) => Some(case.id.0),
        TargetRow::CaseFile(file) => Some(file.case_id.0),
        TargetRow::CaseStudyPurpose(purpose) => Some(purpose.case_id.0),
        TargetRow::Patient(_, link) => Some(link.case_id.0),
        TargetRow::CaseService(service) => Some(service.case_id.0),
        _ => None,
    }
}

#[async_trait::async_trait]
impl TargetBatch for MockBatch {
    async fn write(&mut self, row: &TargetRow) -> Result<WriteReceipt, TargetRepositoryError> {
        if self.lose_connection {
            return Err(TargetRepositoryError::Transaction(sqlx::Error::PoolClosed));
        }
        if let Some(case) = case_of(row).filter(|case| self.rejected_case_ids.contains(case)) {
            return Err(TargetRepositoryError::ForeignKeyViolation(format!(
                "case {case} is not present in table \"Cases\""
            )));
        }
        self.pending.push(row.clone());
        Ok(WriteReceipt {
            rows_affected: 1,
            returned_id: None,
        })
    }

    async fn commit(self: Box<Self>) -> Result<(), TargetRepositoryError> {
        if self.fail_commit {
            return Err(TargetRepositoryError::DatabaseError(sqlx::Error::PoolClosed));
        }
        self.committed.lock().unwrap().extend(self.pending);
        Ok(())
    }
}

// ============================================================================
// Fixtures
// ============================================================================

pub fn target_user(id: i32, legacy: Option<i64>, user_type: &str) -> TargetUser {
    TargetUser {
        id: UserId(id),
        email: Some(format!("user{id}@example.com")),
        first_name: Some(format!("First{id}")),
        last_name: Some(format!("Last{id}")),
        name_title: None,
        user_type: Some(user_type.to_string()),
        legacy_id: legacy.map(LegacyUserId),
    }
}

pub fn legacy_user(id: i64) -> LegacyUser {
    LegacyUser {
        user_id: LegacyUserId(id),
        title: None,
        fname: Some(format!("First{id}")),
        lname: Some(format!("Last{id}")),
        email: Some(format!("user{id}@example.com")),
    }
}

// ============================================================================
// Mock launcher
// ============================================================================

/// Records launched steps and fails the one named in `fail_at`.
#[derive(Default)]
pub struct MockLauncher {
    pub fail_at: Option<&'static str>,
    pub launched: Arc<Mutex<Vec<&'static str>>>,
}

impl MockLauncher {
    pub fn get_launched(&self) -> Vec<&'static str> {
        self.launched.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl voxel_migrate_pipeline::orchestrator::StepLauncher for MockLauncher {
    async fn launch(
        &self,
        step: &'static str,
    ) -> Result<voxel_migrate_pipeline::orchestrator::StepExit, std::io::Error> {
        self.launched.lock().unwrap().push(step);
        let success = self.fail_at != Some(step);
        Ok(voxel_migrate_pipeline::orchestrator::StepExit {
            success,
            code: Some(if success { 0 } else { 1 }),
            stats: Some(voxel_migrate_pipeline::stats::RunStats::new(step, false)),
        })
    }
}
