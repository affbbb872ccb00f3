//! Migrates per-clinic service prices.
//!
//! Legacy prices hang off a user; the destination prices a clinic location.
//! The location is found through `olduserid -> uId -> cId -> clId`.
use crate::errors::StepError;
use crate::mapper::{chain, clinic_by_owner, legacy_user_map, location_by_clinic, IdMap};
use crate::stats::RunStats;
use crate::steps::{
    after_cleanup, apply_precondition, release_key, restore_key, Domain, MigrationStep, RowSink,
    StepContext, TablePrecondition, Verification,
};
use crate::transform::{now, parse_amount, parse_timestamp, RowOutcome, SkipReason};
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::NaiveDateTime;
use std::collections::HashSet;
use tracing::{info, warn};
use voxel_migrate_repository::{LegacyTable, TargetTable};
use voxel_migrate_shared::types::{
    ClinicLocationId, LegacyServiceCharge, LegacyServiceId, LegacyUserId, NewServiceCharge,
    ServiceId, TargetRow,
};

/// Legacy service 6 was merged into service 5.
fn service_id(legacy: LegacyServiceId) -> Option<ServiceId> {
    let id = if legacy.0 == 6 { 5 } else { legacy.0 };
    i32::try_from(id).ok().map(ServiceId)
}

struct ChargeMapping {
    locations: IdMap<LegacyUserId, ClinicLocationId>,
    known_locations: HashSet<i32>,
    known_services: HashSet<i32>,
    timestamp: NaiveDateTime,
}

impl ChargeMapping {
    fn transform(&self, charge: &LegacyServiceCharge) -> RowOutcome<TargetRow> {
        let Ok(id) = i32::try_from(charge.usc_id) else {
            return RowOutcome::Skip(SkipReason::InvalidValue("usc_id"));
        };
        let Some(legacy_service) = charge.services_id else {
            return RowOutcome::Skip(SkipReason::MissingRequiredField("services_id"));
        };
        let Some(service) = service_id(legacy_service) else {
            return RowOutcome::Skip(SkipReason::InvalidValue("services_id"));
        };
        let Some(location) = charge.user_id.and_then(|user| self.locations.get(&user)).copied()
        else {
            return RowOutcome::Skip(SkipReason::UnresolvedMapping("clinic_location"));
        };
        if !self.known_locations.contains(&location.0) {
            warn!(usc_id = charge.usc_id, %location, "Clinic location does not exist");
            return RowOutcome::Skip(SkipReason::ForeignKeyMissing("clinic_location"));
        }
        if !self.known_services.contains(&service.0) {
            warn!(usc_id = charge.usc_id, %service, "Service does not exist in MasterServices");
            return RowOutcome::Skip(SkipReason::ForeignKeyMissing("service"));
        }

        RowOutcome::Migrate(TargetRow::ServiceCharge(NewServiceCharge {
            id,
            clinic_location_id: location,
            service_id: service,
            amount: parse_amount(charge.price.as_deref()).or(BigDecimal::from(0)),
            rush_fee: parse_amount(charge.rush_fee.as_deref()).or(BigDecimal::from(0)),
            created_at: parse_timestamp(charge.add_time.as_deref()).unwrap_or(self.timestamp),
            updated_at: parse_timestamp(charge.update_time.as_deref()),
        }))
    }
}

pub struct ServiceChargesStep;

#[async_trait]
impl MigrationStep for ServiceChargesStep {
    fn name(&self) -> &'static str {
        "service-charges"
    }

    fn domain(&self) -> Domain {
        Domain::Invoices
    }

    fn table(&self) -> TargetTable {
        TargetTable::ClinicLocationServiceCharges
    }

    fn precondition(&self) -> TablePrecondition {
        TablePrecondition::Truncate
    }

    async fn run(&self, ctx: &StepContext) -> Result<RunStats, StepError> {
        apply_precondition(self, ctx).await?;

        let charges = ctx.source.service_charges().await?;
        info!(count = charges.len(), "Read legacy service charges");

        let target = ctx.target.as_ref();
        let owners = chain(
            "olduserid -> cId",
            &legacy_user_map(target).await?,
            &clinic_by_owner(target).await?,
        );
        let locations = chain("olduserid -> clId", &owners, &location_by_clinic(target).await?);
        info!(mapped_users = locations.len(), "Built clinic location chain");

        let mapping = ChargeMapping {
            locations,
            known_locations: target.key_set(TargetTable::ClinicLocations).await?,
            known_services: target.key_set(TargetTable::MasterServices).await?,
            timestamp: now(),
        };

        release_key(ctx, self.table()).await?;
        let loaded = async {
            let mut sink = RowSink::new(self, ctx);
            for charge in &charges {
                sink.settle(mapping.transform(charge)).await?;
            }
            sink.finish().await
        }
        .await;
        after_cleanup(loaded, restore_key(ctx, self.table()).await)
    }

    async fn verify(&self, ctx: &StepContext) -> Result<Verification, StepError> {
        let source = ctx.source.count(LegacyTable::UserServiceCharges).await?;
        let target = ctx.target.count(self.table()).await?;
        Ok(Verification::new(self.name(), Some(source), target))
    }
}
