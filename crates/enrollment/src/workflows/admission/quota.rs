//! Quota registry: resolves which capacity bucket applies to a registrant.
//!
//! Course quotas are matched case-insensitively with a fixed precedence: a quota for the
//! registrant's exact city beats a state-wide quota, and ties between equally specific
//! quotas go to the lowest quota id. Event municipality limits are keyed exactly and created
//! on first use.

use tracing::debug;

use super::domain::{CourseId, EventId, MunicipalityLimit, Region, RegionQuota};
use super::store::{CapacityTransaction, NewMunicipalityLimit, StoreError};

/// Picks the quota for `region` out of a course's quotas.
pub fn match_quota<'a>(quotas: &'a [RegionQuota], region: &Region) -> Option<&'a RegionQuota> {
    quotas
        .iter()
        .filter(|quota| same_place(&quota.state, &region.state))
        .filter_map(|quota| match (&quota.city, &region.city) {
            (Some(quota_city), Some(city)) if same_place(quota_city, city) => Some((0u8, quota)),
            (Some(_), _) => None,
            (None, _) => Some((1u8, quota)),
        })
        .min_by_key(|(specificity, quota)| (*specificity, quota.id))
        .map(|(_, quota)| quota)
}

pub(crate) fn same_place(left: &str, right: &str) -> bool {
    left.trim().to_lowercase() == right.trim().to_lowercase()
}

/// Reads the course's quotas inside the transaction and applies [`match_quota`].
pub fn resolve_quota(
    tx: &dyn CapacityTransaction,
    course: &CourseId,
    region: &Region,
) -> Result<Option<RegionQuota>, StoreError> {
    let quotas = tx.region_quotas(course)?;
    Ok(match_quota(&quotas, region).cloned())
}

/// Finds the limit for (event, municipality, state), creating it with `default_limit` when
/// absent. A concurrent creator surfaces as [`StoreError::Conflict`], which the admission
/// retry loop resolves by re-running the transaction against the winning row.
pub fn resolve_or_create_municipality_limit(
    tx: &mut dyn CapacityTransaction,
    event: &EventId,
    municipality: &str,
    state: &str,
    default_limit: u32,
) -> Result<MunicipalityLimit, StoreError> {
    if let Some(limit) = tx.municipality_limit(event, municipality, state)? {
        return Ok(limit);
    }

    let limit = tx.insert_municipality_limit(NewMunicipalityLimit {
        event_id: event.clone(),
        municipality: municipality.to_string(),
        state: state.to_string(),
        default_limit,
    })?;
    debug!(
        event = %event,
        municipality,
        state,
        default_limit,
        "created municipality limit"
    );
    Ok(limit)
}
