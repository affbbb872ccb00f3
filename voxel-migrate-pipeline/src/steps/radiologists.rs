//! Links radiologist users to their legacy `tbl_radiologist` id.
use crate::errors::StepError;
use crate::mapper::{FallbackLadder, IdMap, NameIndex, Resolution};
use crate::stats::RunStats;
use crate::steps::{
    apply_precondition, Domain, MigrationStep, RowSink, StepContext, TablePrecondition,
    Verification,
};
use crate::transform::{now, RowOutcome, SkipReason};
use async_trait::async_trait;
use std::collections::HashMap;
use tracing::{debug, info};
use voxel_migrate_repository::{LegacyTable, TargetTable};
use voxel_migrate_shared::types::{
    LegacyRadiologist, LegacyUserId, TargetRow, TargetUser, UserId, UserLegacyLink,
};

/// Lookups over the destination radiologists.
struct Radiologists {
    by_email: IdMap<String, UserId>,
    by_name: NameIndex<UserId>,
    legacy_ids: HashMap<UserId, LegacyUserId>,
}

impl Radiologists {
    fn new(users: &[TargetUser]) -> Self {
        let radiologists: Vec<&TargetUser> =
            users.iter().filter(|user| user.is_radiologist()).collect();
        let by_email = IdMap::from_pairs_first(
            "radiologist email -> uId",
            radiologists.iter().filter_map(|user| {
                user.email
                    .as_deref()
                    .map(|email| (email.trim().to_lowercase(), user.id))
            }),
        );
        let by_name = NameIndex::from_pairs_first(
            "radiologist name -> uId",
            radiologists.iter().map(|user| {
                (
                    format!(
                        "{} {}",
                        user.first_name.as_deref().unwrap_or_default(),
                        user.last_name.as_deref().unwrap_or_default()
                    ),
                    user.id,
                )
            }),
        );
        let legacy_ids = radiologists
            .iter()
            .filter_map(|user| user.legacy_id.map(|legacy| (user.id, legacy)))
            .collect();
        Self {
            by_email,
            by_name,
            legacy_ids,
        }
    }

    fn resolve(&self, radiologist: &LegacyRadiologist) -> Resolution<UserId> {
        let email = radiologist
            .email
            .as_deref()
            .map(|email| email.trim().to_lowercase());
        let name = format!(
            "{} {}",
            radiologist.fname.as_deref().unwrap_or_default(),
            radiologist.lname.as_deref().unwrap_or_default()
        );
        FallbackLadder::new()
            .exact(&self.by_email)
            .by_name(&self.by_name)
            .resolve(email.as_ref(), Some(&name))
    }
}

fn transform(
    radiologist: &LegacyRadiologist,
    lookups: &Radiologists,
    stats: &mut RunStats,
) -> RowOutcome<TargetRow> {
    let resolution = lookups.resolve(radiologist);
    stats.count(&format!("matched_{}", resolution.rung()));
    let Some(user_id) = resolution.value() else {
        return RowOutcome::Skip(SkipReason::UnresolvedMapping("radiologist"));
    };

    match lookups.legacy_ids.get(&user_id) {
        Some(existing) if *existing == radiologist.radiologist_id => {
            stats.count("already_linked");
        }
        Some(existing) => {
            debug!(user_id = %user_id, previous = %existing, legacy_id = %radiologist.radiologist_id, "Relinking radiologist");
            stats.count("relinked");
        }
        None => {}
    }

    RowOutcome::Migrate(TargetRow::UserLegacyLink(UserLegacyLink {
        user_ids: vec![user_id],
        legacy_id: radiologist.radiologist_id,
        updated_at: now(),
    }))
}

pub struct RadiologistsStep;

#[async_trait]
impl MigrationStep for RadiologistsStep {
    fn name(&self) -> &'static str {
        "radiologists"
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

        let legacy = ctx.source.radiologists().await?;
        info!(count = legacy.len(), "Read legacy radiologists");
        let lookups = Radiologists::new(&ctx.target.users().await?);

        let mut sink = RowSink::new(self, ctx);
        for radiologist in &legacy {
            let outcome = transform(radiologist, &lookups, sink.stats());
            sink.settle(outcome).await?;
        }
        sink.finish().await
    }

    async fn verify(&self, ctx: &StepContext) -> Result<Verification, StepError> {
        let source = ctx.source.count(LegacyTable::Radiologists).await?;
        let linked = ctx.target.count_linked_radiologists().await?;
        Ok(Verification::new(self.name(), Some(source), linked))
    }
}
