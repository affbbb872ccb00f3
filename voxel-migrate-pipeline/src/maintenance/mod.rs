//! Destination preparation run before a full migration.
use crate::errors::StepError;
use serde::Serialize;
use tracing::info;
use voxel_migrate_repository::{TargetRepository, TargetTable};

/// Tables cleared by `reset`, children before parents.
pub const RESET_ORDER: [TargetTable; 11] = [
    TargetTable::InvoiceCaseServices,
    TargetTable::PaymentPlatformAccessTokens,
    TargetTable::PaymentTransactions,
    TargetTable::CaseFiles,
    TargetTable::CaseServices,
    TargetTable::CaseStudyPurposes,
    TargetTable::CasePatients,
    TargetTable::Cases,
    TargetTable::RadiologistInvoiceCaseServices,
    TargetTable::Invoices,
    TargetTable::RadiologistInvoices,
];

/// Enum labels the migrated data needs, as `(enum type, label)`.
pub const REQUIRED_ENUM_VALUES: [(&str, &str); 2] = [
    ("enum_Users_userType", "CLINIC_USERS"),
    ("enum_Invoices_invoiceType", "ADHOC"),
];

/// What a `reset` changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResetReport {
    pub deleted: Vec<(String, u64)>,
    pub legacy_id_column_added: bool,
    pub enum_values_added: Vec<String>,
}

impl ResetReport {
    pub fn deleted_total(&self) -> u64 {
        self.deleted.iter().map(|(_, rows)| rows).sum()
    }
}

/// Clears the migrated tables and installs the schema additions the steps rely on.
///
/// Safe to run repeatedly. In dry-run nothing is executed.
pub async fn reset(target: &dyn TargetRepository, dry_run: bool) -> Result<ResetReport, StepError> {
    info!("\n=== Resetting destination ===");
    let mut report = ResetReport::default();
    if dry_run {
        for table in RESET_ORDER {
            info!(table = table.as_str(), "[DRY RUN] Would delete all rows");
        }
        return Ok(report);
    }

    for table in RESET_ORDER {
        let rows = target.delete_all(table).await?;
        info!(table = table.as_str(), rows, "✓ Cleared");
        report.deleted.push((table.as_str().to_string(), rows));
    }

    report.legacy_id_column_added = target.ensure_legacy_id_column().await?;
    if report.legacy_id_column_added {
        info!("✓ Added Users.olduserid");
    }
    for (enum_type, value) in REQUIRED_ENUM_VALUES {
        if target.ensure_enum_value(enum_type, value).await? {
            info!(enum_type, value, "✓ Added enum value");
            report.enum_values_added.push(format!("{enum_type}.{value}"));
        }
    }

    info!(deleted = report.deleted_total(), "Reset complete");
    Ok(report)
}
