//! Creates a clinic patient and its case link for each legacy case.
use crate::errors::StepError;
use crate::mapper::{chain, clinic_by_owner, legacy_user_map, IdMap};
use crate::normalizer;
use crate::stats::RunStats;
use crate::steps::{
    apply_precondition, orphan_counts, Domain, MigrationStep, RowSink, StepContext,
    TablePrecondition, Verification,
};
use crate::transform::{now, parse_date, RowOutcome, SkipReason};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::HashSet;
use tracing::{info, warn};
use uuid::Uuid;
use voxel_migrate_repository::{LegacyTable, OrphanCheck, SampleQuery, TargetTable};
use voxel_migrate_shared::types::{
    CaseId, ClinicId, LegacyCasePatient, LegacyUserId, NewCasePatient, NewClinicPatient,
    TargetRow,
};

/// Recorded when the legacy date of birth is missing or a zero date.
fn placeholder_dob() -> NaiveDate {
    NaiveDate::from_ymd_opt(1900, 1, 1).unwrap_or_default()
}

struct PatientMapping {
    legacy_doctors: HashSet<LegacyUserId>,
    clinics: IdMap<LegacyUserId, ClinicId>,
    cases: HashSet<i32>,
    /// Cases that already have a patient, grown as the run links more.
    linked: HashSet<CaseId>,
    timestamp: NaiveDateTime,
}

impl PatientMapping {
    fn transform(&self, patient: &LegacyCasePatient, stats: &mut RunStats) -> RowOutcome<TargetRow> {
        let Some(doctor) = patient
            .doctor_id
            .filter(|doctor| self.legacy_doctors.contains(doctor))
        else {
            return RowOutcome::Skip(SkipReason::InvalidValue("doctor_id"));
        };
        let Some(case_id) = i32::try_from(patient.cases_id.0).ok().map(CaseId) else {
            return RowOutcome::Skip(SkipReason::InvalidValue("cases_id"));
        };
        if self.linked.contains(&case_id) {
            return RowOutcome::Skip(SkipReason::AlreadyMigrated);
        }
        if !self.cases.contains(&case_id.0) {
            return RowOutcome::Skip(SkipReason::ForeignKeyMissing("case"));
        }
        let Some(clinic_id) = self.clinics.get(&doctor).copied() else {
            warn!(cases_id = %patient.cases_id, %doctor, "No clinic for doctor");
            return RowOutcome::Skip(SkipReason::UnresolvedMapping("clinic"));
        };

        let gender = normalizer::gender(patient.gender.as_deref());
        if gender.fell_back {
            stats.record_warning("gender_default");
        }
        let dob = parse_date(patient.dob.as_deref()).unwrap_or_else(|| {
            stats.record_warning("dob_default");
            placeholder_dob()
        });
        let first_name = patient.patient_firstname.trim().to_string();
        let last_name = patient.patient_lastname.trim().to_string();

        RowOutcome::Migrate(TargetRow::Patient(
            NewClinicPatient {
                clinic_id,
                first_name: first_name.clone(),
                last_name: last_name.clone(),
                gender: gender.value,
                dob,
                platform_id: Uuid::new_v4(),
                created_at: self.timestamp,
            },
            NewCasePatient {
                case_id,
                first_name,
                last_name,
                gender: gender.value,
                dob,
            },
        ))
    }
}

pub struct CasePatientsStep;

#[async_trait]
impl MigrationStep for CasePatientsStep {
    fn name(&self) -> &'static str {
        "case-patients"
    }

    fn domain(&self) -> Domain {
        Domain::Cases
    }

    fn table(&self) -> TargetTable {
        TargetTable::CasePatients
    }

    fn precondition(&self) -> TablePrecondition {
        TablePrecondition::Incremental
    }

    async fn run(&self, ctx: &StepContext) -> Result<RunStats, StepError> {
        apply_precondition(self, ctx).await?;

        let patients = ctx.source.case_patients().await?;
        info!(count = patients.len(), "Read legacy case patients");

        let target = ctx.target.as_ref();
        let mut mapping = PatientMapping {
            legacy_doctors: ctx.source.user_ids().await?,
            clinics: chain(
                "olduserid -> cId",
                &legacy_user_map(target).await?,
                &clinic_by_owner(target).await?,
            ),
            cases: target.key_set(TargetTable::Cases).await?,
            linked: target.case_ids_with_patient().await?,
            timestamp: now(),
        };
        info!(already_linked = mapping.linked.len(), "Cases that already have a patient");

        let mut sink = RowSink::new(self, ctx);
        for patient in &patients {
            let outcome = mapping.transform(patient, sink.stats());
            let case_id = match &outcome {
                RowOutcome::Migrate(TargetRow::Patient(_, link)) => Some(link.case_id),
                _ => None,
            };
            if sink.settle(outcome).await? {
                sink.stats().count("created_clinic_patients");
                mapping.linked.extend(case_id);
            }
        }
        sink.finish().await
    }

    async fn verify(&self, ctx: &StepContext) -> Result<Verification, StepError> {
        let source = ctx.source.count(LegacyTable::Cases).await?;
        let target = ctx.target.count(self.table()).await?;
        let mut verification = Verification::new(self.name(), Some(source), target);
        verification.orphans = orphan_counts(
            ctx,
            &[
                OrphanCheck::CasePatientWithoutCase,
                OrphanCheck::CasePatientWithoutClinicPatient,
                OrphanCheck::ClinicPatientWithoutClinic,
            ],
        )
        .await?;
        verification.samples = ctx.target.sample(SampleQuery::CasePatients, 5).await?;
        Ok(verification)
    }
}
