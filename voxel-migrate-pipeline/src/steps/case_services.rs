//! Migrates billed case services.
//!
//! Cases are found through their public case number and services through
//! their title, since neither legacy id survives in the destination.
use crate::errors::StepError;
use crate::mapper::{
    legacy_case_numbers, target_case_numbers, IdMap, ServiceNameMatcher, WordOverlapMatcher,
};
use crate::stats::RunStats;
use crate::steps::{
    after_cleanup, apply_precondition, orphan_counts, release_key, restore_key, Domain,
    MigrationStep, RowSink, StepContext, TablePrecondition, Verification,
};
use crate::transform::{now, parse_amount, parse_timestamp, RowOutcome, SkipReason};
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::NaiveDateTime;
use std::collections::{BTreeSet, HashSet};
use tracing::{info, warn};
use voxel_migrate_repository::{LegacyTable, OrphanCheck, SampleQuery, TargetTable};
use voxel_migrate_shared::types::{
    CaseId, LegacyCaseId, LegacyCaseReport, LegacyServiceId, LegacyUserId, NewCaseService,
    ServiceId, TargetRow,
};

const DELETED_STATUSES: &[&str] = &["0", "deleted", "inactive", "removed"];

fn deleted_at_source(status: Option<&str>) -> bool {
    status.is_some_and(|status| DELETED_STATUSES.contains(&status.trim().to_lowercase().as_str()))
}

fn minimum_amount() -> BigDecimal {
    BigDecimal::new(100.into(), 2)
}

struct ServiceMapping {
    legacy_doctors: HashSet<LegacyUserId>,
    case_numbers: IdMap<LegacyCaseId, String>,
    cases: IdMap<String, CaseId>,
    service_names: IdMap<LegacyServiceId, String>,
    matcher: Box<dyn ServiceNameMatcher>,
    timestamp: NaiveDateTime,
}

impl ServiceMapping {
    fn case(&self, legacy: LegacyCaseId) -> Option<CaseId> {
        let number = self.case_numbers.get(&legacy)?;
        self.cases.get(number).copied()
    }

    /// Catalogue title of the legacy id first, then the row's own name.
    fn service(&mut self, report: &LegacyCaseReport) -> Option<ServiceId> {
        let by_catalogue = report
            .add_services_id
            .and_then(|legacy| self.service_names.get(&legacy).cloned())
            .and_then(|title| self.matcher.resolve(&title));
        by_catalogue.or_else(|| {
            report
                .services_name
                .as_deref()
                .and_then(|name| self.matcher.resolve(name))
        })
    }

    fn transform(&mut self, report: &LegacyCaseReport, stats: &mut RunStats) -> RowOutcome<TargetRow> {
        if deleted_at_source(report.status.as_deref()) {
            return RowOutcome::Skip(SkipReason::DeletedAtSource);
        }
        let Ok(id) = i32::try_from(report.cases_report_id) else {
            return RowOutcome::Skip(SkipReason::InvalidValue("cases_report_id"));
        };
        if !report
            .doctors_id
            .is_some_and(|doctor| self.legacy_doctors.contains(&doctor))
        {
            return RowOutcome::Skip(SkipReason::InvalidValue("doctors_id"));
        }
        let Some(case_id) = report.cases_id.and_then(|legacy| self.case(legacy)) else {
            return RowOutcome::Skip(SkipReason::UnresolvedMapping("case"));
        };
        let Some(service_id) = self.service(report) else {
            warn!(
                cases_report_id = report.cases_report_id,
                service = ?report.add_services_id,
                name = ?report.services_name,
                "Service not found"
            );
            return RowOutcome::Skip(SkipReason::UnresolvedMapping("service"));
        };

        let mut amount = parse_amount(report.price.as_deref()).or(BigDecimal::from(0));
        if amount <= BigDecimal::from(0) {
            warn!(cases_report_id = report.cases_report_id, %amount, "Amount was <= 0, setting to minimum 1.00");
            stats.record_warning("minimum_amount");
            amount = minimum_amount();
        }
        let rush_fee = parse_amount(report.rush_fee.as_deref()).or(BigDecimal::from(0));

        RowOutcome::Migrate(TargetRow::CaseService(NewCaseService {
            id,
            case_id,
            service_id,
            has_rush: rush_fee > BigDecimal::from(0),
            amount,
            rush_fee,
            created_at: parse_timestamp(report.add_time.as_deref()).unwrap_or(self.timestamp),
        }))
    }

    /// Logs how many distinct cases and services cannot be resolved before loading.
    fn log_analysis(&mut self, reports: &[LegacyCaseReport]) {
        let live: Vec<&LegacyCaseReport> = reports
            .iter()
            .filter(|report| !deleted_at_source(report.status.as_deref()))
            .collect();
        let unresolved_cases: BTreeSet<LegacyCaseId> = live
            .iter()
            .filter_map(|report| report.cases_id)
            .filter(|legacy| self.case(*legacy).is_none())
            .collect();
        let mut unresolved_services = BTreeSet::new();
        for report in &live {
            if self.service(report).is_none() {
                unresolved_services.insert(
                    report
                        .services_name
                        .clone()
                        .or_else(|| report.add_services_id.map(|id| id.to_string()))
                        .unwrap_or_default(),
                );
            }
        }
        info!(
            rows = live.len(),
            unresolved_cases = unresolved_cases.len(),
            unresolved_services = unresolved_services.len(),
            "Mapping analysis"
        );
        for service in unresolved_services.iter().take(10) {
            warn!("  unresolved service: {service:?}");
        }
    }
}

pub struct CaseServicesStep;

#[async_trait]
impl MigrationStep for CaseServicesStep {
    fn name(&self) -> &'static str {
        "case-services"
    }

    fn domain(&self) -> Domain {
        Domain::Cases
    }

    fn table(&self) -> TargetTable {
        TargetTable::CaseServices
    }

    fn precondition(&self) -> TablePrecondition {
        TablePrecondition::DeleteAll
    }

    async fn run(&self, ctx: &StepContext) -> Result<RunStats, StepError> {
        if ctx.options.dry_run {
            info!("[DRY RUN] MasterServices would be reactivated");
        } else {
            let reactivated = ctx.target.reactivate_master_services().await?;
            info!(reactivated, "Reactivated master services");
        }
        apply_precondition(self, ctx).await?;

        let reports = ctx.source.case_reports().await?;
        info!(count = reports.len(), "Read legacy case reports");

        let services = ctx.target.master_services().await?;
        let mut mapping = ServiceMapping {
            legacy_doctors: ctx.source.user_ids().await?,
            case_numbers: legacy_case_numbers(ctx.source.as_ref()).await?,
            cases: target_case_numbers(ctx.target.as_ref()).await?,
            service_names: IdMap::from_pairs(
                "services_id -> services_name",
                ctx.source
                    .services()
                    .await?
                    .into_iter()
                    .filter_map(|service| {
                        service
                            .services_name
                            .map(|name| name.trim().to_string())
                            .filter(|name| !name.is_empty())
                            .map(|name| (service.services_id, name))
                    }),
            ),
            matcher: Box::new(WordOverlapMatcher::new(&services)),
            timestamp: now(),
        };
        mapping.log_analysis(&reports);

        release_key(ctx, self.table()).await?;
        let loaded = async {
            let mut sink = RowSink::new(self, ctx);
            for report in &reports {
                let outcome = mapping.transform(report, sink.stats());
                sink.settle(outcome).await?;
            }
            sink.finish().await
        }
        .await;
        after_cleanup(loaded, restore_key(ctx, self.table()).await)
    }

    async fn verify(&self, ctx: &StepContext) -> Result<Verification, StepError> {
        let source = ctx.source.count(LegacyTable::CaseReports).await?;
        let target = ctx.target.count(self.table()).await?;
        let mut verification = Verification::new(self.name(), Some(source), target);
        verification.orphans = orphan_counts(ctx, &[OrphanCheck::CaseServiceWithoutCase]).await?;
        verification.samples = ctx.target.sample(SampleQuery::CaseServices, 5).await?;
        Ok(verification)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::str::FromStr;
    use voxel_migrate_shared::types::MasterService;

    fn mapping() -> ServiceMapping {
        let services = [
            MasterService {
                id: ServiceId(1),
                title: "Cone Beam CT  Interpretation -Radiology Report".to_string(),
            },
            MasterService {
                id: ServiceId(2),
                title: "Implant Planning".to_string(),
            },
        ];
        ServiceMapping {
            legacy_doctors: HashSet::from([LegacyUserId(10)]),
            case_numbers: IdMap::from_pairs("test", [(LegacyCaseId(500), "V-500".to_string())]),
            cases: IdMap::from_pairs("test", [("V-500".to_string(), CaseId(500))]),
            service_names: IdMap::from_pairs(
                "test",
                [(LegacyServiceId(3), "Radiology Report".to_string())],
            ),
            matcher: Box::new(WordOverlapMatcher::new(&services)),
            timestamp: NaiveDate::from_ymd_opt(2024, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
        }
    }

    fn report(service: Option<i64>, name: Option<&str>) -> LegacyCaseReport {
        LegacyCaseReport {
            cases_report_id: 61,
            cases_id: Some(LegacyCaseId(500)),
            doctors_id: Some(LegacyUserId(10)),
            add_services_id: service.map(LegacyServiceId),
            services_name: name.map(str::to_string),
            price: Some("0".to_string()),
            rush_fee: Some("25".to_string()),
            status: Some("1".to_string()),
            add_time: None,
        }
    }

    #[test]
    fn legacy_service_resolves_through_alias_and_amount_floors() {
        let mut stats = RunStats::new("case-services", false);
        match mapping().transform(&report(Some(3), None), &mut stats) {
            RowOutcome::Migrate(TargetRow::CaseService(row)) => {
                assert_eq!(row.case_id, CaseId(500));
                assert_eq!(row.service_id, ServiceId(1));
                assert_eq!(row.amount, BigDecimal::from_str("1.00").unwrap());
                assert!(row.has_rush);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(stats.warning_count("minimum_amount"), 1);
    }

    #[test]
    fn row_name_is_used_when_the_legacy_id_is_unknown() {
        let mut stats = RunStats::new("case-services", false);
        match mapping().transform(&report(Some(99), Some(" implant  planning ")), &mut stats) {
            RowOutcome::Migrate(TargetRow::CaseService(row)) => {
                assert_eq!(row.service_id, ServiceId(2));
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn deleted_rows_and_unknown_services_are_skipped() {
        let mut stats = RunStats::new("case-services", false);
        let mut deleted = report(Some(3), None);
        deleted.status = Some(" Inactive".to_string());
        assert_eq!(
            mapping().transform(&deleted, &mut stats),
            RowOutcome::Skip(SkipReason::DeletedAtSource)
        );
        assert_eq!(
            mapping().transform(&report(None, Some("teeth whitening")), &mut stats),
            RowOutcome::Skip(SkipReason::UnresolvedMapping("service"))
        );
    }
}
