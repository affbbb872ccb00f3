//! Migrates the case lines of radiologist invoices.
use crate::errors::StepError;
use crate::mapper::IdMap;
use crate::stats::RunStats;
use crate::steps::{
    after_cleanup, apply_precondition, orphan_counts, release_key, restore_key, Domain,
    MigrationStep, RowSink, StepContext, TablePrecondition, Verification,
};
use crate::transform::{
    now, parse_amount, parse_date_midnight, parse_timestamp, RowOutcome, SkipReason,
};
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::NaiveDateTime;
use tracing::{info, warn};
use voxel_migrate_repository::{LegacyTable, OrphanCheck, TargetTable};
use voxel_migrate_shared::types::{
    CaseId, LegacyCaseId, LegacyRadiologistInvoiceLine, NewRadiologistInvoiceCaseService,
    RadiologistInvoiceId, TargetRow,
};

fn transform(
    line: &LegacyRadiologistInvoiceLine,
    cases: &IdMap<String, LegacyCaseId>,
    timestamp: NaiveDateTime,
) -> RowOutcome<TargetRow> {
    let (Some(invoice_id), Some(detail_id)) = (line.invoice_id, line.detail_id) else {
        return RowOutcome::Skip(SkipReason::MissingRequiredField("invoice_id/detail_id"));
    };
    let Some(case_number) = line
        .case_id
        .as_deref()
        .map(str::trim)
        .filter(|number| !number.is_empty())
    else {
        return RowOutcome::Skip(SkipReason::MissingRequiredField("case_id"));
    };
    let Some(legacy_case) = cases.get(&case_number.to_string()) else {
        warn!(detail_id, case_number, "Case number not found in tbl_cases");
        return RowOutcome::Skip(SkipReason::UnresolvedMapping("case"));
    };

    let keys = (
        i32::try_from(detail_id),
        i32::try_from(invoice_id),
        i32::try_from(legacy_case.0),
    );
    let (Ok(id), Ok(invoice_id), Ok(case_id)) = keys else {
        return RowOutcome::Skip(SkipReason::InvalidValue("id"));
    };

    let amount = parse_amount(line.detail_revenue_amount.as_deref()).or(BigDecimal::from(0));
    let created_at = parse_timestamp(line.created_at.as_deref())
        .or_else(|| parse_date_midnight(line.created_at.as_deref()))
        .unwrap_or(timestamp);

    RowOutcome::Migrate(TargetRow::RadiologistInvoiceCaseService(
        NewRadiologistInvoiceCaseService {
            id,
            invoice_id: RadiologistInvoiceId(invoice_id),
            case_id: CaseId(case_id),
            amount,
            created_at,
            updated_at: timestamp,
        },
    ))
}

pub struct RadiologistInvoiceCaseServicesStep;

#[async_trait]
impl MigrationStep for RadiologistInvoiceCaseServicesStep {
    fn name(&self) -> &'static str {
        "radiologist-invoice-case-services"
    }

    fn domain(&self) -> Domain {
        Domain::Invoices
    }

    fn table(&self) -> TargetTable {
        TargetTable::RadiologistInvoiceCaseServices
    }

    fn precondition(&self) -> TablePrecondition {
        TablePrecondition::Truncate
    }

    async fn run(&self, ctx: &StepContext) -> Result<RunStats, StepError> {
        apply_precondition(self, ctx).await?;

        let lines = ctx.source.radiologist_invoice_lines().await?;
        info!(count = lines.len(), "Read legacy radiologist invoice lines");
        let cases = IdMap::from_pairs(
            "voxel_cases_id -> cases_id",
            ctx.source.case_keys().await?.into_iter().filter_map(|key| {
                key.voxel_cases_id
                    .map(|number| number.trim().to_string())
                    .filter(|number| !number.is_empty())
                    .map(|number| (number, key.cases_id))
            }),
        );

        release_key(ctx, self.table()).await?;
        let timestamp = now();
        let loaded = async {
            let mut sink = RowSink::new(self, ctx);
            for line in &lines {
                sink.settle(transform(line, &cases, timestamp)).await?;
            }
            sink.finish().await
        }
        .await;
        after_cleanup(loaded, restore_key(ctx, self.table()).await)
    }

    async fn verify(&self, ctx: &StepContext) -> Result<Verification, StepError> {
        let source = ctx.source.count(LegacyTable::RadiologistInvoiceDetails).await?;
        let target = ctx.target.count(self.table()).await?;
        let mut verification = Verification::new(self.name(), Some(source), target);
        verification.orphans =
            orphan_counts(ctx, &[OrphanCheck::RadiologistInvoiceLineWithoutCase]).await?;
        Ok(verification)
    }
}
