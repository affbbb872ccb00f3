//! Migrates clinic invoices, keeping their legacy numbering.
use crate::errors::StepError;
use crate::mapper::{owner_location_map, IdMap};
use crate::normalizer::{self, FALLBACK_INVOICE_TYPES};
use crate::stats::RunStats;
use crate::steps::radiologist_invoices::INVOICE_NO_MAX_LEN;
use crate::steps::{
    after_cleanup, apply_precondition, release_key, restore_key, Domain, MigrationStep, RowSink,
    StepContext, TablePrecondition, UnmappedLocation, Verification,
};
use crate::transform::{now, parse_int, parse_timestamp, RowOutcome, SkipReason};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use std::ops::RangeInclusive;
use tracing::{debug, info, warn};
use voxel_migrate_repository::{LegacyTable, TargetTable};
use voxel_migrate_shared::types::{
    ClinicLocationId, InvoiceId, LegacyClientInvoice, LegacyUserId, NewInvoice, TargetRow,
};

const PLAUSIBLE_YEARS: RangeInclusive<i32> = 1900..=2100;

struct InvoiceMapping<'a> {
    locations: &'a IdMap<LegacyUserId, ClinicLocationId>,
    unmapped_location: UnmappedLocation,
    invoice_types: &'a [String],
    timestamp: NaiveDateTime,
}

impl InvoiceMapping<'_> {
    /// `Err` carries the skip for `SkipInvalid`; `Ok(None)` migrates with a null location.
    fn location(
        &self,
        invoice: &LegacyClientInvoice,
        stats: &mut RunStats,
    ) -> Result<Option<ClinicLocationId>, SkipReason> {
        if let Some(location) = invoice.user_id.and_then(|user| self.locations.get(&user)) {
            return Ok(Some(*location));
        }
        match self.unmapped_location {
            UnmappedLocation::Null => {
                warn!(invoice_id = %invoice.id, user_id = ?invoice.user_id, "No clinic location; setting clinicLocationId to NULL");
                stats.record_warning("null_clinic_location");
                Ok(None)
            }
            UnmappedLocation::SkipInvalid => Err(SkipReason::UnresolvedMapping("clinic_location")),
            UnmappedLocation::UseDefault(location) => {
                stats.record_warning("default_clinic_location");
                Ok(Some(location))
            }
        }
    }

    fn transform(
        &self,
        invoice: &LegacyClientInvoice,
        stats: &mut RunStats,
    ) -> RowOutcome<TargetRow> {
        let Ok(id) = i32::try_from(invoice.id.0) else {
            return RowOutcome::Skip(SkipReason::InvalidValue("id"));
        };
        let Some(invoice_no) = invoice
            .invoice_no
            .as_deref()
            .map(str::trim)
            .filter(|number| !number.is_empty())
        else {
            return RowOutcome::Fail(format!("invoice {}: missing invoice_no", invoice.id));
        };
        let Some(raw_type) = invoice
            .invoice_type
            .as_deref()
            .filter(|kind| !kind.trim().is_empty())
        else {
            return RowOutcome::Fail(format!("invoice {}: missing invoice_type", invoice.id));
        };
        if invoice_no.chars().count() > INVOICE_NO_MAX_LEN {
            return RowOutcome::Fail(format!(
                "invoice {}: invoice number exceeds {INVOICE_NO_MAX_LEN} characters: {invoice_no}",
                invoice.id
            ));
        }

        let Some(month) = invoice.month.as_deref().and_then(normalizer::month_number) else {
            return RowOutcome::Fail(format!("invoice {}: invalid month {:?}", invoice.id, invoice.month));
        };
        let Some(year) = parse_int(invoice.year.as_deref()).and_then(|year| i32::try_from(year).ok())
        else {
            return RowOutcome::Fail(format!("invoice {}: invalid year {:?}", invoice.id, invoice.year));
        };
        if !PLAUSIBLE_YEARS.contains(&year) {
            warn!(invoice_id = %invoice.id, year, "Unusual year");
            stats.record_warning("unusual_year");
        }

        let invoice_type = normalizer::invoice_type(raw_type, self.invoice_types);
        if invoice_type.fell_back {
            warn!(invoice_id = %invoice.id, raw = raw_type, mapped = %invoice_type.value, "Unknown invoice type");
            stats.record_warning("invoice_type_fallback");
        }

        let clinic_location_id = match self.location(invoice, stats) {
            Ok(location) => location,
            Err(reason) => return RowOutcome::Skip(reason),
        };

        RowOutcome::Migrate(TargetRow::Invoice(NewInvoice {
            id: InvoiceId(id),
            invoice_type: invoice_type.value,
            clinic_location_id,
            month_number: month,
            year_number: year,
            emailed_status: invoice.send_status.is_some_and(|status| status != 0),
            created_at: parse_timestamp(invoice.created_at.as_deref()).unwrap_or(self.timestamp),
            updated_at: self.timestamp,
            invoice_no: invoice_no.to_string(),
        }))
    }
}

pub struct InvoicesStep;

#[async_trait]
impl MigrationStep for InvoicesStep {
    fn name(&self) -> &'static str {
        "invoices"
    }

    fn domain(&self) -> Domain {
        Domain::Invoices
    }

    fn table(&self) -> TargetTable {
        TargetTable::Invoices
    }

    fn precondition(&self) -> TablePrecondition {
        TablePrecondition::AssumeEmpty
    }

    fn progress_every(&self) -> Option<u64> {
        Some(100)
    }

    async fn run(&self, ctx: &StepContext) -> Result<RunStats, StepError> {
        apply_precondition(self, ctx).await?;

        let invoices = ctx.source.client_invoices().await?;
        info!(count = invoices.len(), "Read legacy client invoices");
        let locations = owner_location_map(ctx.target.as_ref()).await?;
        if locations.is_empty() {
            warn!("No clinic location mappings found");
        }
        let mut invoice_types = ctx.target.invoice_type_labels().await?;
        if invoice_types.is_empty() {
            warn!("Could not read invoice type labels; using the built-in list");
            invoice_types = FALLBACK_INVOICE_TYPES.iter().map(|label| label.to_string()).collect();
        }
        debug!(?invoice_types, "Allowed invoice types");

        let mapping = InvoiceMapping {
            locations: &locations,
            unmapped_location: ctx.options.unmapped_location,
            invoice_types: &invoice_types,
            timestamp: now(),
        };

        if !ctx.options.dry_run {
            ctx.target.set_triggers_enabled(self.table(), false).await?;
        }

        let loaded = async {
            release_key(ctx, self.table()).await?;
            let mut sink = RowSink::new(self, ctx);
            for invoice in &invoices {
                let outcome = mapping.transform(invoice, sink.stats());
                sink.settle(outcome).await?;
            }
            sink.finish().await
        }
        .await;

        let restored = after_cleanup(loaded, restore_key(ctx, self.table()).await);
        let triggers = if ctx.options.dry_run {
            Ok(())
        } else {
            ctx.target
                .set_triggers_enabled(self.table(), true)
                .await
                .map_err(StepError::from)
        };
        after_cleanup(restored, triggers)
    }

    async fn verify(&self, ctx: &StepContext) -> Result<Verification, StepError> {
        let source = ctx.source.count(LegacyTable::ClientInvoices).await?;
        let target = ctx.target.count(self.table()).await?;
        Ok(Verification::new(self.name(), Some(source), target))
    }
}
