//! Identifier mapping between the legacy and destination key domains.
//!
//! Every mapping is built once per step from a bulk snapshot query and then
//! consulted in memory. Chains that cross the two stores are joined here,
//! since the stores cannot be joined live.
mod fallback;
mod id_map;
mod name_index;
mod service_matcher;
mod snapshots;

pub use fallback::{FallbackLadder, Resolution};
pub use id_map::{chain, IdMap};
pub use name_index::{normalize_name, NameIndex};
pub use service_matcher::{ServiceNameMatcher, WordOverlapMatcher};
pub use snapshots::{
    clinic_by_owner, legacy_case_numbers, legacy_radiologist_map, legacy_user_map,
    location_by_clinic, owner_location_map, target_case_numbers,
};
