//! Links destination users to their legacy `tbl_users` id.
//!
//! Users already exist in the destination; this step only stamps
//! `Users.olduserid` on every user matching the legacy natural key.
use crate::errors::StepError;
use crate::stats::RunStats;
use crate::steps::{
    apply_precondition, Domain, MigrationStep, RowSink, StepContext, TablePrecondition,
    Verification,
};
use crate::transform::{now, RowOutcome, SkipReason};
use async_trait::async_trait;
use std::collections::HashMap;
use tracing::info;
use voxel_migrate_repository::{LegacyTable, TargetTable};
use voxel_migrate_shared::types::{LegacyUser, TargetRow, TargetUser, UserId, UserLegacyLink};

/// Natural key of a user: trimmed lower-case email, first and last name.
/// Internal whitespace is kept as is.
type UserKey = (String, String, String);

fn fold(value: &str) -> String {
    value.trim().to_lowercase()
}

fn key(email: &str, first: &str, last: &str) -> UserKey {
    (fold(email), fold(first), fold(last))
}

/// Indexes destination users by natural key. A user missing any of the
/// three columns has no key and is never matched.
fn index(users: &[TargetUser]) -> HashMap<UserKey, Vec<UserId>> {
    let mut index: HashMap<UserKey, Vec<UserId>> = HashMap::new();
    for user in users {
        let (Some(email), Some(first), Some(last)) = (
            user.email.as_deref(),
            user.first_name.as_deref(),
            user.last_name.as_deref(),
        ) else {
            continue;
        };
        index.entry(key(email, first, last)).or_default().push(user.id);
    }
    info!(entries = index.len(), "Built user natural-key index");
    index
}

fn transform(user: &LegacyUser, index: &HashMap<UserKey, Vec<UserId>>) -> RowOutcome<TargetRow> {
    let Some(email) = user.email.as_deref().filter(|email| !email.trim().is_empty()) else {
        return RowOutcome::Skip(SkipReason::MissingRequiredField("email"));
    };
    let first = user
        .fname
        .as_deref()
        .filter(|name| !name.trim().is_empty())
        .unwrap_or("Unknown");
    let last = user.lname.as_deref().unwrap_or_default();

    match index.get(&key(email, first, last)) {
        Some(user_ids) => RowOutcome::Migrate(TargetRow::UserLegacyLink(UserLegacyLink {
            user_ids: user_ids.clone(),
            legacy_id: user.user_id,
            updated_at: now(),
        })),
        None => RowOutcome::Skip(SkipReason::UnresolvedMapping("user")),
    }
}

pub struct UsersStep;

#[async_trait]
impl MigrationStep for UsersStep {
    fn name(&self) -> &'static str {
        "users"
    }

    fn domain(&self) -> Domain {
        Domain::Users
    }

    fn table(&self) -> TargetTable {
        TargetTable::Users
    }

    fn precondition(&self) -> TablePrecondition {
        TablePrecondition::UpdateInPlace
    }

    async fn run(&self, ctx: &StepContext) -> Result<RunStats, StepError> {
        apply_precondition(self, ctx).await?;

        let legacy_users = ctx.source.users().await?;
        info!(count = legacy_users.len(), "Read legacy users");
        let index = index(&ctx.target.users().await?);

        let mut sink = RowSink::new(self, ctx);
        for user in &legacy_users {
            let outcome = transform(user, &index);
            if let RowOutcome::Migrate(TargetRow::UserLegacyLink(link)) = &outcome {
                sink.stats().count_by("updated_users", link.user_ids.len() as u64);
            }
            sink.settle(outcome).await?;
        }
        sink.finish().await
    }

    async fn verify(&self, ctx: &StepContext) -> Result<Verification, StepError> {
        let source = ctx.source.count(LegacyTable::Users).await?;
        let linked = ctx
            .target
            .users()
            .await?
            .iter()
            .filter(|user| user.legacy_id.is_some() && !user.is_radiologist())
            .count() as i64;
        Ok(Verification::new(self.name(), Some(source), linked))
    }
}
