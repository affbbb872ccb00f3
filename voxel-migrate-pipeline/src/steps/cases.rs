//! Migrates cases, keeping the legacy case id as `cId`.
use crate::errors::StepError;
use crate::mapper::{
    legacy_radiologist_map, owner_location_map, FallbackLadder, IdMap, NameIndex, Resolution,
};
use crate::normalizer::{self, LifecycleFlags};
use crate::stats::RunStats;
use crate::steps::{
    after_cleanup, apply_precondition, release_key, restore_key, Domain, MigrationStep, RowSink,
    StepContext, TablePrecondition, Verification,
};
use crate::transform::{
    clamp_amount, now, parse_amount, parse_date_midnight, parse_timestamp, ParsedAmount,
    RowOutcome, SkipReason,
};
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::NaiveDateTime;
use std::collections::HashSet;
use tracing::{debug, info, warn};
use voxel_migrate_repository::{LegacyTable, TargetTable};
use voxel_migrate_shared::types::{
    CaseId, ClinicLocationId, InvoiceId, LegacyCase, LegacyCaseId, LegacyUserId, NewCase,
    TargetRow, TargetUser, UserId,
};

/// Cost recorded for cases whose legacy total is missing or not positive.
fn minimum_cost() -> BigDecimal {
    BigDecimal::new(100.into(), 2)
}

/// `"nameTitle firstName lastName"`, the form legacy referring-doctor names take.
fn display_name(user: &TargetUser) -> String {
    [&user.name_title, &user.first_name, &user.last_name]
        .into_iter()
        .flatten()
        .map(|part| part.trim())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// A parsed and clamped amount; absent and unparseable input give `None`.
fn amount(raw: Option<&str>, field: &str, stats: &mut RunStats) -> Option<BigDecimal> {
    let value = match parse_amount(raw) {
        ParsedAmount::Value(value) => value,
        ParsedAmount::Absent => return None,
        ParsedAmount::Invalid => {
            stats.record_warning(&format!("invalid_{field}"));
            return None;
        }
    };
    let clamped = clamp_amount(&value);
    if clamped.was_clamped() {
        stats.record_warning(&format!("{field}_clamped"));
    } else if clamped.was_rounded() {
        stats.count(&format!("{field}_rounded"));
    }
    Some(clamped.into_value())
}

struct CaseMapping {
    legacy_doctors: HashSet<LegacyUserId>,
    doctors: IdMap<LegacyUserId, UserId>,
    doctor_names: NameIndex<UserId>,
    radiologists: IdMap<LegacyUserId, UserId>,
    locations: IdMap<LegacyUserId, ClinicLocationId>,
    invoices: IdMap<LegacyCaseId, InvoiceId>,
    timestamp: NaiveDateTime,
}

impl CaseMapping {
    fn doctor(&self, case: &LegacyCase, doctor: LegacyUserId, stats: &mut RunStats) -> Option<UserId> {
        let resolution = FallbackLadder::new()
            .exact(&self.doctors)
            .by_name(&self.doctor_names)
            .resolve(Some(&doctor), case.reffering_doctor.as_deref());
        stats.count(&format!("doctor_{}", resolution.rung()));
        match &resolution {
            Resolution::ByName(user) => {
                info!(cases_id = %case.cases_id, referring = ?case.reffering_doctor, %user, "Used referring doctor name");
            }
            Resolution::Missing => {
                warn!(cases_id = %case.cases_id, %doctor, referring = ?case.reffering_doctor, "Doctor not mapped; skipping case");
            }
            _ => {}
        }
        resolution.value()
    }

    fn transform(&self, case: &LegacyCase, stats: &mut RunStats) -> RowOutcome<TargetRow> {
        let Ok(id) = i32::try_from(case.cases_id.0) else {
            return RowOutcome::Skip(SkipReason::InvalidValue("cases_id"));
        };
        let Some(legacy_doctor) = case.doctor_id.filter(|doctor| self.legacy_doctors.contains(doctor))
        else {
            return RowOutcome::Skip(SkipReason::InvalidValue("doctor_id"));
        };
        let Some(doctor) = self.doctor(case, legacy_doctor, stats) else {
            return RowOutcome::Skip(SkipReason::UnresolvedMapping("doctor"));
        };

        let radiologist = case
            .assigned_radiologist_id
            .and_then(|legacy| self.radiologists.get(&legacy).copied());
        if case.assigned_radiologist_id.is_some() && radiologist.is_none() {
            warn!(cases_id = %case.cases_id, radiologist = ?case.assigned_radiologist_id, "Radiologist not mapped; setting to NULL");
            stats.record_warning("unmapped_radiologist");
        }

        let status = normalizer::case_status(LifecycleFlags {
            draft: case.draft_status,
            submitted: case.submitted_status,
            completed: case.completed_status,
            archived: case.archived_status,
        });
        if status.fell_back {
            stats.record_warning("status_default");
        }
        let review_status = normalizer::review_status(case.review_status.as_deref()).map(|review| {
            if review.fell_back {
                stats.record_warning("review_status_default");
            }
            review.value
        });
        let is_deleted = normalizer::is_deleted_from_status(case.status);
        if is_deleted.fell_back {
            warn!(cases_id = %case.cases_id, status = ?case.status, "Unexpected case status; treating as live");
            stats.record_warning("unexpected_status");
        }

        let total_service_cost = amount(case.services_total_cost.as_deref(), "total_service_cost", stats)
            .filter(|cost| *cost > BigDecimal::from(0))
            .unwrap_or_else(minimum_cost);
        let revenue_amount = amount(case.revenue_amount.as_deref(), "revenue_amount", stats);

        let clinic_location_id = self.locations.get(&legacy_doctor).copied();
        if clinic_location_id.is_none() {
            debug!(cases_id = %case.cases_id, doctor = %legacy_doctor, "No clinic location for doctor");
            stats.count("missing_clinic_location");
        }
        let invoice_id = self.invoices.get(&case.cases_id).copied();
        if invoice_id.is_none() {
            stats.count("missing_invoice");
        }

        RowOutcome::Migrate(TargetRow::Case(Box::new(NewCase {
            id: CaseId(id),
            voxel_case_id: case
                .voxel_cases_id
                .as_deref()
                .map(str::trim)
                .filter(|number| !number.is_empty())
                .map(str::to_string),
            doctor_user_id: doctor,
            radiologist_user_id: radiologist,
            clinic_location_id,
            scanned_at: parse_date_midnight(case.scan_date.as_deref()),
            status: status.value,
            review_status,
            total_service_cost,
            created_by_user_id: doctor,
            is_deleted: is_deleted.value,
            created_at: parse_timestamp(case.add_time.as_deref()).unwrap_or(self.timestamp),
            updated_at: parse_timestamp(case.update_time.as_deref()),
            next_appointment_at: parse_date_midnight(case.next_appointment_date.as_deref()),
            revenue_amount,
            internal_comments: case.internal_comments.clone(),
            case_result_summary: case.case_result_summary.clone(),
            submitted_at: parse_timestamp(case.submitted_date.as_deref()),
            completed_at: parse_timestamp(case.completed_date.as_deref()),
            invoice_id,
        })))
    }
}

pub struct CasesStep;

#[async_trait]
impl MigrationStep for CasesStep {
    fn name(&self) -> &'static str {
        "cases"
    }

    fn domain(&self) -> Domain {
        Domain::Cases
    }

    fn table(&self) -> TargetTable {
        TargetTable::Cases
    }

    fn precondition(&self) -> TablePrecondition {
        TablePrecondition::DeleteAll
    }

    async fn run(&self, ctx: &StepContext) -> Result<RunStats, StepError> {
        apply_precondition(self, ctx).await?;

        let cases = ctx.source.cases().await?;
        info!(count = cases.len(), "Read legacy cases");

        let target = ctx.target.as_ref();
        let users = target.users().await?;
        let mapping = CaseMapping {
            legacy_doctors: ctx.source.user_ids().await?,
            doctors: IdMap::from_pairs(
                "olduserid -> uId",
                users
                    .iter()
                    .filter_map(|user| user.legacy_id.map(|legacy| (legacy, user.id))),
            ),
            // A display name shared by several users resolves to the last of them.
            doctor_names: NameIndex::from_pairs(
                "doctor display name -> uId",
                users.iter().map(|user| (display_name(user), user.id)),
            ),
            radiologists: legacy_radiologist_map(target).await?,
            locations: owner_location_map(target).await?,
            invoices: IdMap::from_pairs(
                "cases_id -> client_invoice_id",
                ctx.source
                    .case_invoice_links()
                    .await?
                    .into_iter()
                    .filter_map(|link| {
                        i32::try_from(link.client_invoice_id.0)
                            .ok()
                            .map(|invoice| (link.case_id, InvoiceId(invoice)))
                    }),
            ),
            timestamp: now(),
        };

        release_key(ctx, self.table()).await?;
        let loaded = async {
            let mut sink = RowSink::new(self, ctx);
            for case in &cases {
                let outcome = mapping.transform(case, sink.stats());
                let tally = match &outcome {
                    RowOutcome::Migrate(TargetRow::Case(row)) => Some((row.status, row.is_deleted)),
                    _ => None,
                };
                if sink.settle(outcome).await? {
                    if let Some((status, is_deleted)) = tally {
                        let stats = sink.stats();
                        stats.count(&format!("status_{status}"));
                        stats.count(if is_deleted { "deleted" } else { "not_deleted" });
                    }
                }
            }
            sink.finish().await
        }
        .await;
        after_cleanup(loaded, restore_key(ctx, self.table()).await)
    }

    async fn verify(&self, ctx: &StepContext) -> Result<Verification, StepError> {
        let source = ctx.source.count(LegacyTable::Cases).await?;
        let target = ctx.target.count(self.table()).await?;
        Ok(Verification::new(self.name(), Some(source), target))
    }
}
