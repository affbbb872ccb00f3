//! Creates one clinic and one location per legacy practice.
use crate::errors::StepError;
use crate::mapper::IdMap;
use crate::normalizer;
use crate::stats::RunStats;
use crate::steps::{
    apply_precondition, orphan_counts, Domain, MigrationStep, RowSink, StepContext,
    TablePrecondition, Verification,
};
use crate::transform::{join_address, RowOutcome, SkipReason};
use async_trait::async_trait;
use std::collections::{BTreeSet, HashSet};
use tracing::{debug, info, warn};
use voxel_migrate_repository::{LegacyTable, OrphanCheck, SampleQuery, TargetTable};
use voxel_migrate_shared::types::{
    ClinicOwner, LegacyPractice, LegacyUserId, NewClinic, NewClinicLocation, PaymentMethod,
    TargetRow, TargetUser, UserId,
};

const DEFAULT_ZIPCODE: &str = "00000";

/// Resolves practice owners and hands out each destination user at most once.
pub(crate) struct OwnerPool {
    owners: IdMap<LegacyUserId, UserId>,
    available: BTreeSet<UserId>,
}

impl OwnerPool {
    pub(crate) fn new(users: &[TargetUser], clinics: &[ClinicOwner]) -> Self {
        let mut owners = IdMap::from_pairs(
            "olduserid -> uId",
            users
                .iter()
                .filter_map(|user| user.legacy_id.map(|legacy| (legacy, user.id))),
        );
        let existing: HashSet<UserId> = users.iter().map(|user| user.id).collect();
        let direct: Vec<UserId> = existing
            .iter()
            .filter(|id| !owners.contains(&LegacyUserId(i64::from(id.0))))
            .copied()
            .collect();
        for id in &direct {
            owners.insert_first(LegacyUserId(i64::from(id.0)), *id);
        }
        debug!(direct = direct.len(), "Added direct uId matches");

        let owned: HashSet<UserId> = clinics.iter().filter_map(|clinic| clinic.owner_user_id).collect();
        let available: BTreeSet<UserId> = existing.difference(&owned).copied().collect();
        info!(
            mapped = owners.len(),
            available = available.len(),
            "Owners available for clinic assignment"
        );
        Self { owners, available }
    }

    /// Claims the owner of a practice, if mapped and not yet owning a clinic.
    pub(crate) fn claim(&mut self, legacy_user: Option<LegacyUserId>) -> Option<UserId> {
        let owner = *self.owners.get(&legacy_user?)?;
        self.available.remove(&owner).then_some(owner)
    }
}

fn transform(practice: &LegacyPractice, owners: &mut OwnerPool) -> RowOutcome<TargetRow> {
    let Some(owner) = owners.claim(practice.user_id) else {
        return RowOutcome::Skip(SkipReason::NoOwnerAvailable);
    };

    let address = join_address([
        practice.street_line_one.as_deref(),
        practice.street_line_two.as_deref(),
        practice.city.as_deref(),
        practice.region.as_deref(),
        practice.country.as_deref(),
    ]);
    let contact_number = practice
        .phonenumber
        .as_deref()
        .map(str::trim)
        .filter(|phone| !phone.is_empty())
        .map(str::to_string);
    let zipcode = practice
        .zipcode
        .as_deref()
        .map(str::trim)
        .filter(|zip| !zip.is_empty())
        .unwrap_or(DEFAULT_ZIPCODE)
        .to_string();

    RowOutcome::Migrate(TargetRow::ClinicWithLocation(
        NewClinic {
            owner_user_id: owner,
            title: practice.practice_name.trim().to_string(),
            contact_number: contact_number.clone(),
            address: address.clone(),
            status: normalizer::clinic_status(practice.status.as_deref()),
            invoice_type: PaymentMethod::PayAsYouGo,
        },
        NewClinicLocation {
            contact_number,
            address,
            zipcode,
            payment_method: PaymentMethod::PayAsYouGo,
        },
    ))
}

pub struct ClinicsStep;

#[async_trait]
impl MigrationStep for ClinicsStep {
    fn name(&self) -> &'static str {
        "clinics"
    }

    fn domain(&self) -> Domain {
        Domain::Clinics
    }

    fn table(&self) -> TargetTable {
        TargetTable::Clinics
    }

    fn precondition(&self) -> TablePrecondition {
        TablePrecondition::Incremental
    }

    async fn run(&self, ctx: &StepContext) -> Result<RunStats, StepError> {
        apply_precondition(self, ctx).await?;

        let practices = ctx.source.practices().await?;
        info!(count = practices.len(), "Read legacy practices");
        let users = ctx.target.users().await?;
        if users.is_empty() {
            warn!("No destination users; every practice will be skipped");
        }
        let mut owners = OwnerPool::new(&users, &ctx.target.clinic_owners().await?);

        let mut sink = RowSink::new(self, ctx);
        for practice in &practices {
            let outcome = transform(practice, &mut owners);
            if matches!(outcome, RowOutcome::Skip(SkipReason::NoOwnerAvailable)) {
                warn!(practice_id = practice.practice_id, "No available owner for practice");
            }
            if sink.settle(outcome).await? {
                sink.stats().count("migrated_clinic_locations");
            }
        }
        sink.finish().await
    }

    async fn verify(&self, ctx: &StepContext) -> Result<Verification, StepError> {
        let source = ctx.source.count(LegacyTable::Practices).await?;
        let target = ctx.target.count(TargetTable::Clinics).await?;
        let mut verification = Verification::new(self.name(), Some(source), target);
        verification.orphans =
            orphan_counts(ctx, &[OrphanCheck::ClinicLocationWithoutClinic]).await?;
        verification.samples = ctx.target.sample(SampleQuery::ClinicsWithLocations, 5).await?;
        Ok(verification)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voxel_migrate_shared::types::ClinicId;

    fn user(id: i32, legacy: Option<i64>) -> TargetUser {
        TargetUser {
            id: UserId(id),
            email: None,
            first_name: None,
            last_name: None,
            name_title: None,
            user_type: Some("DOCTOR".to_string()),
            legacy_id: legacy.map(LegacyUserId),
        }
    }

    #[test]
    fn each_owner_is_claimed_once() {
        let mut pool = OwnerPool::new(&[user(1, Some(100))], &[]);
        assert_eq!(pool.claim(Some(LegacyUserId(100))), Some(UserId(1)));
        assert_eq!(pool.claim(Some(LegacyUserId(100))), None);
    }

    #[test]
    fn direct_uid_matches_fill_gaps() {
        let mut pool = OwnerPool::new(&[user(7, None)], &[]);
        assert_eq!(pool.claim(Some(LegacyUserId(7))), Some(UserId(7)));
    }

    #[test]
    fn users_owning_a_clinic_are_unavailable() {
        let owners = [ClinicOwner {
            clinic_id: ClinicId(1),
            owner_user_id: Some(UserId(1)),
            is_deleted: false,
        }];
        let mut pool = OwnerPool::new(&[user(1, Some(100))], &owners);
        assert_eq!(pool.claim(Some(LegacyUserId(100))), None);
        assert_eq!(pool.claim(None), None);
    }
}
