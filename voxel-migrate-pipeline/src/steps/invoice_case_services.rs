//! Migrates the billed cases of clinic invoices.
use crate::errors::StepError;
use crate::stats::RunStats;
use crate::steps::{
    apply_precondition, orphan_counts, Domain, MigrationStep, RowSink, StepContext,
    TablePrecondition, Verification,
};
use crate::transform::{
    clamp_amount, now, parse_amount, parse_date_midnight, parse_timestamp, ParsedAmount,
    RowOutcome, SkipReason,
};
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::NaiveDateTime;
use std::collections::HashSet;
use tracing::{info, warn};
use voxel_migrate_repository::{LegacyTable, OrphanCheck, TargetTable};
use voxel_migrate_shared::types::{
    CaseId, InvoiceId, LegacyClientInvoiceLine, NewInvoiceCaseService, TargetRow,
};

/// Destination keys a line must reference.
struct Parents {
    invoices: HashSet<i32>,
    cases: HashSet<i32>,
}

/// Clamps an amount, recording a warning when it had to be bounded.
fn bounded(value: BigDecimal, field: &str, stats: &mut RunStats) -> BigDecimal {
    let clamped = clamp_amount(&value);
    if clamped.was_clamped() {
        warn!(field, original = %value, clamped = %clamped.value(), "Amount out of range");
        stats.record_warning(&format!("{field}_clamped"));
    } else if clamped.was_rounded() {
        stats.count(&format!("{field}_rounded"));
    }
    clamped.into_value()
}

fn transform(
    line: &LegacyClientInvoiceLine,
    parents: &Parents,
    timestamp: NaiveDateTime,
    stats: &mut RunStats,
) -> RowOutcome<TargetRow> {
    let Some(legacy_invoice) = line.client_invoice_id else {
        return RowOutcome::Skip(SkipReason::MissingRequiredField("client_invoice_id"));
    };
    let Some(legacy_case) = line.case_id else {
        return RowOutcome::Skip(SkipReason::MissingRequiredField("case_id"));
    };
    let invoice_id = i32::try_from(legacy_invoice.0).ok();
    let case_id = i32::try_from(legacy_case.0).ok();
    let Some(invoice_id) = invoice_id.filter(|id| parents.invoices.contains(id)) else {
        return RowOutcome::Skip(SkipReason::ForeignKeyMissing("invoice"));
    };
    let Some(case_id) = case_id.filter(|id| parents.cases.contains(id)) else {
        return RowOutcome::Skip(SkipReason::ForeignKeyMissing("case"));
    };

    let amount = match parse_amount(line.total_amount.as_deref()) {
        ParsedAmount::Invalid => {
            warn!(invoice_id, case_id, raw = ?line.total_amount, "Unparseable total_amount");
            return RowOutcome::Skip(SkipReason::InvalidValue("total_amount"));
        }
        parsed => bounded(parsed.or(BigDecimal::from(0)), "amount", stats),
    };
    let rush_fee = match parse_amount(line.rush_fee.as_deref()) {
        ParsedAmount::Invalid => {
            warn!(invoice_id, case_id, raw = ?line.rush_fee, "Invalid rush_fee, setting to 0.00");
            stats.record_warning("invalid_rush_fee");
            BigDecimal::from(0)
        }
        parsed => bounded(parsed.or(BigDecimal::from(0)), "rush_fee", stats),
    };
    let created_at = parse_timestamp(line.case_date.as_deref())
        .or_else(|| parse_date_midnight(line.case_date.as_deref()))
        .unwrap_or(timestamp);

    RowOutcome::Migrate(TargetRow::InvoiceCaseService(NewInvoiceCaseService {
        invoice_id: InvoiceId(invoice_id),
        case_id: CaseId(case_id),
        amount,
        rush_fee,
        created_at,
    }))
}

pub struct InvoiceCaseServicesStep;

#[async_trait]
impl MigrationStep for InvoiceCaseServicesStep {
    fn name(&self) -> &'static str {
        "invoice-case-services"
    }

    fn domain(&self) -> Domain {
        Domain::Invoices
    }

    fn table(&self) -> TargetTable {
        TargetTable::InvoiceCaseServices
    }

    fn precondition(&self) -> TablePrecondition {
        TablePrecondition::AssumeEmpty
    }

    async fn run(&self, ctx: &StepContext) -> Result<RunStats, StepError> {
        apply_precondition(self, ctx).await?;

        let lines = ctx.source.client_invoice_lines().await?;
        info!(count = lines.len(), "Read legacy client invoice lines");
        let parents = Parents {
            invoices: ctx.target.key_set(TargetTable::Invoices).await?,
            cases: ctx.target.key_set(TargetTable::Cases).await?,
        };
        info!(
            invoices = parents.invoices.len(),
            cases = parents.cases.len(),
            "Loaded parent keys"
        );

        let timestamp = now();
        let mut sink = RowSink::new(self, ctx);
        for line in &lines {
            let outcome = transform(line, &parents, timestamp, sink.stats());
            sink.settle(outcome).await?;
        }
        sink.finish().await
    }

    async fn verify(&self, ctx: &StepContext) -> Result<Verification, StepError> {
        let source = ctx.source.count(LegacyTable::ClientInvoiceDetails).await?;
        let target = ctx.target.count(self.table()).await?;
        let mut verification = Verification::new(self.name(), Some(source), target);
        verification.orphans = orphan_counts(
            ctx,
            &[
                OrphanCheck::InvoiceLineWithoutInvoice,
                OrphanCheck::InvoiceLineWithoutCase,
            ],
        )
        .await?;
        Ok(verification)
    }
}
