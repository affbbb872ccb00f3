//! Mappings shared by several steps, each built from one snapshot query.
use crate::errors::MapperError;
use crate::mapper::IdMap;
use voxel_migrate_repository::{SourceRepository, TargetRepository};
use voxel_migrate_shared::types::{
    CaseId, ClinicId, ClinicLocationId, LegacyCaseId, LegacyUserId, UserId,
};

/// `Users.olduserid -> Users.uId` over every linked user.
pub async fn legacy_user_map(
    target: &dyn TargetRepository,
) -> Result<IdMap<LegacyUserId, UserId>, MapperError> {
    let users = target.users().await?;
    Ok(IdMap::from_pairs(
        "olduserid -> uId",
        users
            .into_iter()
            .filter_map(|user| user.legacy_id.map(|legacy| (legacy, user.id))),
    ))
}

/// `Users.olduserid -> Users.uId` restricted to radiologist users.
pub async fn legacy_radiologist_map(
    target: &dyn TargetRepository,
) -> Result<IdMap<LegacyUserId, UserId>, MapperError> {
    let users = target.users().await?;
    Ok(IdMap::from_pairs(
        "radiologist olduserid -> uId",
        users
            .into_iter()
            .filter(|user| user.is_radiologist())
            .filter_map(|user| user.legacy_id.map(|legacy| (legacy, user.id))),
    ))
}

/// Legacy owner id to the location of the clinic that user owns, read from
/// the joined `Users`, `Clinics` and `ClinicLocations` snapshot.
pub async fn owner_location_map(
    target: &dyn TargetRepository,
) -> Result<IdMap<LegacyUserId, ClinicLocationId>, MapperError> {
    let links = target.owner_location_links().await?;
    Ok(IdMap::from_pairs(
        "olduserid -> clId",
        links
            .into_iter()
            .map(|link| (link.legacy_user_id, link.location_id)),
    ))
}

/// `Clinics.ownerUserId -> Clinics.cId` over clinics that are not deleted.
/// An owner of several clinics maps to the first.
pub async fn clinic_by_owner(
    target: &dyn TargetRepository,
) -> Result<IdMap<UserId, ClinicId>, MapperError> {
    let owners = target.clinic_owners().await?;
    Ok(IdMap::from_pairs_first(
        "uId -> cId",
        owners
            .into_iter()
            .filter(|owner| !owner.is_deleted)
            .filter_map(|owner| owner.owner_user_id.map(|user| (user, owner.clinic_id))),
    ))
}

/// `ClinicLocations.clinicId -> ClinicLocations.clId`, first location per clinic.
pub async fn location_by_clinic(
    target: &dyn TargetRepository,
) -> Result<IdMap<ClinicId, ClinicLocationId>, MapperError> {
    let locations = target.clinic_locations().await?;
    Ok(IdMap::from_pairs_first(
        "cId -> clId",
        locations
            .into_iter()
            .map(|location| (location.clinic_id, location.location_id)),
    ))
}

/// Legacy `cases_id -> voxel_cases_id`, the public case number.
pub async fn legacy_case_numbers(
    source: &dyn SourceRepository,
) -> Result<IdMap<LegacyCaseId, String>, MapperError> {
    let keys = source.case_keys().await?;
    Ok(IdMap::from_pairs(
        "cases_id -> voxel_cases_id",
        keys.into_iter().filter_map(|key| {
            key.voxel_cases_id
                .map(|number| number.trim().to_string())
                .filter(|number| !number.is_empty())
                .map(|number| (key.cases_id, number))
        }),
    ))
}

/// `Cases.voxelCaseId -> Cases.cId` over the migrated cases.
pub async fn target_case_numbers(
    target: &dyn TargetRepository,
) -> Result<IdMap<String, CaseId>, MapperError> {
    let keys = target.case_keys().await?;
    Ok(IdMap::from_pairs(
        "voxelCaseId -> cId",
        keys.into_iter().filter_map(|key| {
            key.voxel_case_id
                .map(|number| (number.trim().to_string(), key.id))
        }),
    ))
}
