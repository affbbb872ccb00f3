//! Migrates radiologist payout invoices, keeping their legacy numbering.
use crate::errors::StepError;
use crate::mapper::{legacy_radiologist_map, IdMap};
use crate::normalizer::month_number;
use crate::stats::RunStats;
use crate::steps::{
    after_cleanup, apply_precondition, release_key, restore_key, Domain, MigrationStep, RowSink,
    StepContext, TablePrecondition, Verification,
};
use crate::transform::{parse_int, RowOutcome, SkipReason};
use async_trait::async_trait;
use tracing::{info, warn};
use voxel_migrate_repository::{LegacyTable, TargetTable};
use voxel_migrate_shared::types::{
    LegacyRadiologistInvoice, LegacyUserId, NewRadiologistInvoice, RadiologistInvoiceId,
    TargetRow, UserId,
};

/// Width of `RadiologistInvoices."invoiceNo"`.
pub(crate) const INVOICE_NO_MAX_LEN: usize = 30;

fn transform(
    invoice: &LegacyRadiologistInvoice,
    radiologists: &IdMap<LegacyUserId, UserId>,
    stats: &mut RunStats,
) -> RowOutcome<TargetRow> {
    let Ok(id) = i32::try_from(invoice.id) else {
        return RowOutcome::Skip(SkipReason::InvalidValue("id"));
    };
    let Some(month) = invoice.month.as_deref().and_then(month_number) else {
        warn!(invoice_id = invoice.id, month = ?invoice.month, "Invalid month");
        return RowOutcome::Skip(SkipReason::InvalidValue("month"));
    };
    let Some(year) = parse_int(invoice.year.as_deref()).and_then(|year| i32::try_from(year).ok())
    else {
        warn!(invoice_id = invoice.id, year = ?invoice.year, "Invalid year");
        return RowOutcome::Skip(SkipReason::InvalidValue("year"));
    };

    let invoice_no = invoice
        .invoice_no
        .as_deref()
        .map(str::trim)
        .filter(|number| !number.is_empty())
        .map(str::to_string);
    if let Some(number) = &invoice_no {
        if number.chars().count() > INVOICE_NO_MAX_LEN {
            return RowOutcome::Fail(format!(
                "invoice {}: invoice number exceeds {INVOICE_NO_MAX_LEN} characters: {number}",
                invoice.id
            ));
        }
    }

    let radiologist_user_id = invoice
        .radiologist_id
        .and_then(|legacy| radiologists.get(&legacy).copied());
    if radiologist_user_id.is_none() {
        warn!(invoice_id = invoice.id, radiologist_id = ?invoice.radiologist_id, "Radiologist not mapped; migrating without one");
        stats.record_warning("unmapped_radiologist");
    }

    RowOutcome::Migrate(TargetRow::RadiologistInvoice(NewRadiologistInvoice {
        id: RadiologistInvoiceId(id),
        radiologist_user_id,
        month_number: month,
        year_number: year,
        invoice_no,
    }))
}

pub struct RadiologistInvoicesStep;

#[async_trait]
impl MigrationStep for RadiologistInvoicesStep {
    fn name(&self) -> &'static str {
        "radiologist-invoices"
    }

    fn domain(&self) -> Domain {
        Domain::Invoices
    }

    fn table(&self) -> TargetTable {
        TargetTable::RadiologistInvoices
    }

    fn precondition(&self) -> TablePrecondition {
        TablePrecondition::AssumeEmpty
    }

    fn progress_every(&self) -> Option<u64> {
        Some(50)
    }

    async fn run(&self, ctx: &StepContext) -> Result<RunStats, StepError> {
        apply_precondition(self, ctx).await?;

        let invoices = ctx.source.radiologist_invoices().await?;
        info!(count = invoices.len(), "Read legacy radiologist invoices");
        let radiologists = legacy_radiologist_map(ctx.target.as_ref()).await?;

        if !ctx.options.dry_run {
            let dropped = ctx.target.drop_triggers(self.table()).await?;
            info!(dropped, "Dropped triggers before loading");
        }

        let loaded = async {
            release_key(ctx, self.table()).await?;
            let mut sink = RowSink::new(self, ctx);
            for invoice in &invoices {
                let outcome = transform(invoice, &radiologists, sink.stats());
                sink.settle(outcome).await?;
            }
            sink.finish().await
        }
        .await;

        let restored = after_cleanup(loaded, restore_key(ctx, self.table()).await);
        let trigger = if ctx.options.dry_run {
            Ok(())
        } else {
            ctx.target
                .install_radiologist_invoice_no_trigger()
                .await
                .map_err(StepError::from)
        };
        after_cleanup(restored, trigger)
    }

    async fn verify(&self, ctx: &StepContext) -> Result<Verification, StepError> {
        let source = ctx.source.count(LegacyTable::RadiologistInvoices).await?;
        let target = ctx.target.count(self.table()).await?;
        Ok(Verification::new(self.name(), Some(source), target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invoice(month: &str, year: &str, number: &str) -> LegacyRadiologistInvoice {
        LegacyRadiologistInvoice {
            id: 12,
            invoice_no: Some(number.to_string()),
            radiologist_id: Some(LegacyUserId(3)),
            month: Some(month.to_string()),
            year: Some(year.to_string()),
        }
    }

    #[test]
    fn month_names_and_unmapped_radiologists() {
        let mut stats = RunStats::new("radiologist-invoices", false);
        let outcome = transform(&invoice("February", "2022", "RI-1"), &IdMap::new("empty"), &mut stats);

        match outcome {
            RowOutcome::Migrate(TargetRow::RadiologistInvoice(row)) => {
                assert_eq!(row.id, RadiologistInvoiceId(12));
                assert_eq!(row.month_number, 2);
                assert_eq!(row.year_number, 2022);
                assert_eq!(row.radiologist_user_id, None);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(stats.warning_count("unmapped_radiologist"), 1);
    }

    #[test]
    fn invalid_month_or_year_is_skipped() {
        let mut stats = RunStats::new("radiologist-invoices", false);
        let map = IdMap::new("empty");
        assert_eq!(
            transform(&invoice("Smarch", "2022", "A"), &map, &mut stats),
            RowOutcome::Skip(SkipReason::InvalidValue("month"))
        );
        assert_eq!(
            transform(&invoice("3", "twenty", "A"), &map, &mut stats),
            RowOutcome::Skip(SkipReason::InvalidValue("year"))
        );
    }

    #[test]
    fn long_invoice_numbers_fail() {
        let mut stats = RunStats::new("radiologist-invoices", false);
        let outcome = transform(&invoice("3", "2022", &"9".repeat(31)), &IdMap::new("empty"), &mut stats);
        assert!(matches!(outcome, RowOutcome::Fail(_)));
    }
}
