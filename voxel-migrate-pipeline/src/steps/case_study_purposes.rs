//! Migrates study purposes: eight flags plus the doctor's notes.
use crate::errors::StepError;
use crate::normalizer::flag;
use crate::stats::RunStats;
use crate::steps::{
    after_cleanup, apply_precondition, release_key, restore_key, Domain, MigrationStep, RowSink,
    StepContext, TablePrecondition, Verification,
};
use crate::transform::{decode_blob, now, parse_timestamp, RowOutcome, SkipReason};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use std::collections::HashSet;
use tracing::{info, warn};
use voxel_migrate_repository::TargetTable;
use voxel_migrate_shared::types::{
    CaseId, LegacyStudyPurpose, LegacyUserId, NewCaseStudyPurpose, TargetRow,
};

const DUPLICATES_SHOWN: usize = 10;

fn transform(
    purpose: &LegacyStudyPurpose,
    doctors: &HashSet<LegacyUserId>,
    timestamp: NaiveDateTime,
) -> RowOutcome<TargetRow> {
    let Ok(id) = i32::try_from(purpose.study_purposes_id) else {
        return RowOutcome::Skip(SkipReason::InvalidValue("study_purposes_id"));
    };
    let Some(legacy_case) = purpose.cases_id else {
        return RowOutcome::Skip(SkipReason::MissingRequiredField("cases_id"));
    };
    let Ok(case_id) = i32::try_from(legacy_case.0) else {
        return RowOutcome::Skip(SkipReason::InvalidValue("cases_id"));
    };
    if purpose.doctor_id.is_some_and(|doctor| !doctors.contains(&doctor)) {
        return RowOutcome::Skip(SkipReason::InvalidValue("doctor_id"));
    }

    let flags = &purpose.flags;
    RowOutcome::Migrate(TargetRow::CaseStudyPurpose(NewCaseStudyPurpose {
        id,
        case_id: CaseId(case_id),
        airway: flag(flags.airway),
        general: flag(flags.general),
        impaction: flag(flags.impaction),
        implant: flag(flags.implant),
        orthodontic: flag(flags.orthodontic),
        pathology: flag(flags.pathology),
        sinus: flag(flags.sinus),
        pain: flag(flags.pain),
        doctors_notes: decode_blob(purpose.doctors_notes.as_deref()),
        case_comments: decode_blob(purpose.cases_comments.as_deref()),
        updated_at: parse_timestamp(purpose.update_time.as_deref()).unwrap_or(timestamp),
    }))
}

pub struct CaseStudyPurposesStep;

#[async_trait]
impl MigrationStep for CaseStudyPurposesStep {
    fn name(&self) -> &'static str {
        "case-study-purposes"
    }

    fn domain(&self) -> Domain {
        Domain::Cases
    }

    fn table(&self) -> TargetTable {
        TargetTable::CaseStudyPurposes
    }

    fn precondition(&self) -> TablePrecondition {
        TablePrecondition::AssumeEmpty
    }

    async fn run(&self, ctx: &StepContext) -> Result<RunStats, StepError> {
        apply_precondition(self, ctx).await?;

        let duplicates = ctx.source.duplicate_study_purpose_cases().await?;
        if !duplicates.is_empty() {
            warn!(count = duplicates.len(), "Case ids with duplicate study purposes");
            for (case_id, rows) in duplicates.iter().take(DUPLICATES_SHOWN) {
                warn!("  case {case_id}: {rows} rows");
            }
            if duplicates.len() > DUPLICATES_SHOWN {
                warn!("  ... and {} more", duplicates.len() - DUPLICATES_SHOWN);
            }
        }

        let purposes = ctx.source.study_purposes().await?;
        info!(count = purposes.len(), "Read legacy study purposes");
        let doctors = ctx.source.user_ids().await?;
        let timestamp = now();

        release_key(ctx, self.table()).await?;
        let loaded = async {
            let mut sink = RowSink::new(self, ctx);
            sink.stats().count_by("duplicate_case_ids", duplicates.len() as u64);
            for purpose in &purposes {
                sink.settle(transform(purpose, &doctors, timestamp)).await?;
            }
            sink.finish().await
        }
        .await;
        after_cleanup(loaded, restore_key(ctx, self.table()).await)
    }

    async fn verify(&self, ctx: &StepContext) -> Result<Verification, StepError> {
        let source = ctx.source.count_study_purpose_cases().await?;
        let target = ctx.target.count(self.table()).await?;
        Ok(Verification::new(self.name(), Some(source), target))
    }
}
