//! Lists legacy users that never received a destination account.
use crate::errors::StepError;
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use voxel_migrate_repository::{SourceRepository, TargetRepository};
use voxel_migrate_shared::types::LegacyUserId;

pub const REPORT_DIR: &str = "maintenance_logs";
pub const REPORT_FILE: &str = "missing_users.json";

/// Legacy ids with no matching `Users.olduserid`, by source table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MissingUsers {
    pub tbl_users: BTreeSet<LegacyUserId>,
    pub tbl_radiologist: BTreeSet<LegacyUserId>,
}

impl MissingUsers {
    pub fn compare(
        users: &HashSet<LegacyUserId>,
        radiologists: &HashSet<LegacyUserId>,
        linked: &HashSet<LegacyUserId>,
    ) -> Self {
        Self {
            tbl_users: users.difference(linked).copied().collect(),
            tbl_radiologist: radiologists.difference(linked).copied().collect(),
        }
    }

    pub fn total(&self) -> usize {
        self.tbl_users.len() + self.tbl_radiologist.len()
    }

    fn log(&self) {
        for (table, ids) in [("tbl_users", &self.tbl_users), ("tbl_radiologist", &self.tbl_radiologist)] {
            if ids.is_empty() {
                info!(table, "✓ Every user is linked");
            } else {
                warn!(table, missing = ids.len(), "Users without a destination account");
                for id in ids.iter().take(20) {
                    warn!("  {table} {id}");
                }
            }
        }
    }
}

/// Compares legacy user ids against `Users.olduserid` and writes the
/// missing ones to `<log_root>/maintenance_logs/missing_users.json`.
///
/// # Returns
///
/// The missing users and the path of the written report.
pub async fn audit_users(
    source: &dyn SourceRepository,
    target: &dyn TargetRepository,
    log_root: &Path,
) -> Result<(MissingUsers, PathBuf), StepError> {
    info!("\n=== Auditing user links ===");
    let users = source.user_ids().await?;
    let radiologists = source.radiologist_ids().await?;
    let linked: HashSet<LegacyUserId> = target
        .users()
        .await?
        .into_iter()
        .filter_map(|user| user.legacy_id)
        .collect();

    let missing = MissingUsers::compare(&users, &radiologists, &linked);
    missing.log();

    let dir = log_root.join(REPORT_DIR);
    fs::create_dir_all(&dir)?;
    let path = dir.join(REPORT_FILE);
    fs::write(&path, serde_json::to_string_pretty(&missing)?)?;
    info!(path = %path.display(), total = missing.total(), "Wrote missing users report");
    Ok((missing, path))
}
