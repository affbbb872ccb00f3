//! Migrates uploaded case files.
use crate::errors::StepError;
use crate::mapper::{legacy_user_map, IdMap};
use crate::stats::RunStats;
use crate::steps::{
    after_cleanup, apply_precondition, release_key, restore_key, Domain, MigrationStep, RowSink,
    StepContext, TablePrecondition, Verification,
};
use crate::transform::{now, parse_int, RowOutcome, SkipReason};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use std::collections::HashSet;
use tracing::{info, warn};
use voxel_migrate_repository::{LegacyTable, TargetTable};
use voxel_migrate_shared::types::{
    CaseId, LegacyCaseFile, LegacyUserId, NewCaseFile, TargetRow, UserId,
};

struct FileMapping {
    /// `tbl_users` and `tbl_radiologist` ids together.
    legacy_uploaders: HashSet<LegacyUserId>,
    uploaders: IdMap<LegacyUserId, UserId>,
    cases: HashSet<i32>,
    users: HashSet<i32>,
    timestamp: NaiveDateTime,
}

impl FileMapping {
    fn transform(&self, file: &LegacyCaseFile) -> RowOutcome<TargetRow> {
        let Ok(id) = i32::try_from(file.cases_file_id) else {
            return RowOutcome::Skip(SkipReason::InvalidValue("cases_file_id"));
        };
        let is_client = file
            .usertype
            .as_deref()
            .is_some_and(|kind| kind.trim().eq_ignore_ascii_case("client"));
        if is_client
            && !file
                .uploaded_by
                .is_some_and(|user| self.legacy_uploaders.contains(&user))
        {
            warn!(cases_file_id = file.cases_file_id, uploaded_by = ?file.uploaded_by, "Client uploader not found in tbl_users or tbl_radiologist");
            return RowOutcome::Skip(SkipReason::UnresolvedMapping("client_uploader"));
        }

        let Some(uploader) = file
            .uploaded_by
            .and_then(|legacy| self.uploaders.get(&legacy))
            .copied()
        else {
            return RowOutcome::Fail(format!(
                "case file {}: uploaded_by {:?} not found in Users",
                file.cases_file_id, file.uploaded_by
            ));
        };

        let Some(case_id) = file
            .cases_id
            .and_then(|legacy| i32::try_from(legacy.0).ok())
            .filter(|id| self.cases.contains(id))
        else {
            return RowOutcome::Skip(SkipReason::ForeignKeyMissing("case"));
        };
        if !self.users.contains(&uploader.0) {
            return RowOutcome::Skip(SkipReason::ForeignKeyMissing("user"));
        }

        let file_size = match file.filesize.as_deref().map(str::trim).filter(|size| !size.is_empty()) {
            None => 0,
            Some(raw) => match parse_int(Some(raw)).and_then(|size| i32::try_from(size).ok()) {
                Some(size) => size,
                None => {
                    return RowOutcome::Fail(format!(
                        "case file {}: invalid filesize {raw:?}",
                        file.cases_file_id
                    ))
                }
            },
        };

        RowOutcome::Migrate(TargetRow::CaseFile(NewCaseFile {
            id,
            case_id: CaseId(case_id),
            file_name: file.filetitle.clone(),
            file_size,
            object_key: file.bucket_url.clone().unwrap_or_default(),
            upload_by_user_id: uploader,
            created_at: self.timestamp,
        }))
    }
}

pub struct CaseFilesStep;

#[async_trait]
impl MigrationStep for CaseFilesStep {
    fn name(&self) -> &'static str {
        "case-files"
    }

    fn domain(&self) -> Domain {
        Domain::Cases
    }

    fn table(&self) -> TargetTable {
        TargetTable::CaseFiles
    }

    fn precondition(&self) -> TablePrecondition {
        TablePrecondition::Truncate
    }

    async fn run(&self, ctx: &StepContext) -> Result<RunStats, StepError> {
        apply_precondition(self, ctx).await?;

        let files = ctx.source.case_files().await?;
        info!(count = files.len(), "Read legacy case files");

        let mut legacy_uploaders = ctx.source.user_ids().await?;
        legacy_uploaders.extend(ctx.source.radiologist_ids().await?);
        let mapping = FileMapping {
            legacy_uploaders,
            uploaders: legacy_user_map(ctx.target.as_ref()).await?,
            cases: ctx.target.key_set(TargetTable::Cases).await?,
            users: ctx.target.key_set(TargetTable::Users).await?,
            timestamp: now(),
        };

        release_key(ctx, self.table()).await?;
        let loaded = async {
            let mut sink = RowSink::new(self, ctx);
            for file in &files {
                sink.settle(mapping.transform(file)).await?;
            }
            sink.finish().await
        }
        .await;
        after_cleanup(loaded, restore_key(ctx, self.table()).await)
    }

    async fn verify(&self, ctx: &StepContext) -> Result<Verification, StepError> {
        let source = ctx.source.count(LegacyTable::CaseFiles).await?;
        let target = ctx.target.count(self.table()).await?;
        Ok(Verification::new(self.name(), Some(source), target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use voxel_migrate_shared::types::LegacyCaseId;

    fn mapping() -> FileMapping {
        FileMapping {
            legacy_uploaders: HashSet::from([LegacyUserId(10), LegacyUserId(20)]),
            uploaders: IdMap::from_pairs(
                "test",
                [(LegacyUserId(10), UserId(1)), (LegacyUserId(30), UserId(3))],
            ),
            cases: HashSet::from([500]),
            users: HashSet::from([1, 3]),
            timestamp: NaiveDate::from_ymd_opt(2024, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
        }
    }

    fn file(uploader: i64, usertype: &str) -> LegacyCaseFile {
        LegacyCaseFile {
            cases_file_id: 70,
            cases_id: Some(LegacyCaseId(500)),
            filetitle: Some("scan.dcm".to_string()),
            filesize: None,
            bucket_url: None,
            uploaded_by: Some(LegacyUserId(uploader)),
            usertype: Some(usertype.to_string()),
        }
    }

    #[test]
    fn files_default_size_and_object_key() {
        match mapping().transform(&file(10, "client")) {
            RowOutcome::Migrate(TargetRow::CaseFile(row)) => {
                assert_eq!(row.id, 70);
                assert_eq!(row.file_size, 0);
                assert_eq!(row.object_key, "");
                assert_eq!(row.upload_by_user_id, UserId(1));
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn client_uploads_need_a_legacy_user() {
        assert_eq!(
            mapping().transform(&file(30, " Client ")),
            RowOutcome::Skip(SkipReason::UnresolvedMapping("client_uploader"))
        );
        assert!(matches!(
            mapping().transform(&file(30, "admin")),
            RowOutcome::Migrate(_)
        ));
    }

    #[test]
    fn unmapped_uploader_fails() {
        assert!(matches!(
            mapping().transform(&file(20, "client")),
            RowOutcome::Fail(_)
        ));
    }

    #[test]
    fn missing_case_is_a_foreign_key_skip() {
        let mut orphan = file(10, "admin");
        orphan.cases_id = Some(LegacyCaseId(501));
        assert_eq!(
            mapping().transform(&orphan),
            RowOutcome::Skip(SkipReason::ForeignKeyMissing("case"))
        );
    }
}
