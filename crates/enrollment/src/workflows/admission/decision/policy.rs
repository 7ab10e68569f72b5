use super::super::domain::EligibilityReason;
use super::{AdmissionDecision, CapacitySnapshot};

pub(crate) fn decide(snapshot: &CapacitySnapshot<'_>) -> AdmissionDecision {
    let settings = snapshot.settings;
    let quota = snapshot.quota;

    if settings.region_restriction_enabled && quota.is_none() {
        let reason = if settings.allow_all_regions {
            EligibilityReason::OutsidePriorityRegions
        } else {
            EligibilityReason::RegionNotEligible
        };
        return AdmissionDecision::Pending(reason);
    }

    let course_full = settings
        .max_enrollments
        .is_some_and(|max| snapshot.confirmed_count >= max);
    let region_full = quota.is_some_and(|quota| quota.is_full());

    if !course_full && !region_full {
        return AdmissionDecision::Confirmed;
    }

    let course_waitlist_open = settings.waitlist_enabled
        && settings
            .waitlist_limit
            .is_none_or(|limit| snapshot.waitlist_count < limit);

    // A full region quota is the bottleneck even when the course is full too. The entry then
    // waits on the region's own waitlist and takes its position there.
    let regional_quota = quota.filter(|_| region_full);
    let region_waitlist_open = regional_quota.is_none_or(|quota| quota.waitlist_has_room());

    if course_waitlist_open && region_waitlist_open {
        let position = match regional_quota {
            Some(quota) => quota.waitlist_count + 1,
            None => snapshot.waitlist_count + 1,
        };
        return AdmissionDecision::Waitlisted { position };
    }

    let reason = if !region_full || (course_full && !course_waitlist_open) {
        EligibilityReason::CourseFull
    } else {
        EligibilityReason::RegionLimitReached
    };
    AdmissionDecision::Pending(reason)
}
