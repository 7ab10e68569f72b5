use super::common::*;
use crate::workflows::admission::decision::{AdmissionDecision, CapacitySnapshot};
use crate::workflows::admission::domain::{CourseSettings, EligibilityReason, EnrollmentStatus};
use crate::workflows::admission::store::EnrollmentCounts;

fn counts(confirmed: u32, waitlisted: u32) -> EnrollmentCounts {
    EnrollmentCounts {
        confirmed,
        waitlisted,
    }
}

#[test]
fn confirms_when_nothing_is_full() {
    let course = open_course();
    let decision = CapacitySnapshot::new(&course, counts(5, 0), None).decide();
    assert_eq!(decision, AdmissionDecision::Confirmed);
    assert_eq!(decision.status(), EnrollmentStatus::Confirmed);
    assert_eq!(decision.waitlist_position(), None);
}

#[test]
fn restricted_course_without_quota_is_pending() {
    let course = restricted_course();
    let decision = CapacitySnapshot::new(&course, counts(0, 0), None).decide();
    assert_eq!(
        decision,
        AdmissionDecision::Pending(EligibilityReason::RegionNotEligible)
    );

    let course = CourseSettings {
        allow_all_regions: true,
        ..restricted_course()
    };
    let decision = CapacitySnapshot::new(&course, counts(0, 0), None).decide();
    assert_eq!(decision.reason(), Some(EligibilityReason::OutsidePriorityRegions));
    assert_eq!(decision.summary(), "pending: outside priority regions");
}

#[test]
fn full_course_waitlists_with_next_course_position() {
    let course = CourseSettings {
        max_enrollments: Some(3),
        waitlist_enabled: true,
        waitlist_limit: Some(5),
        ..open_course()
    };
    let decision = CapacitySnapshot::new(&course, counts(3, 2), None).decide();
    assert_eq!(decision, AdmissionDecision::Waitlisted { position: 3 });
}

#[test]
fn full_region_quota_uses_its_own_position() {
    let course = CourseSettings {
        waitlist_enabled: true,
        ..restricted_course()
    };
    let mut ce = quota(1, "CE", None);
    ce.limit = 2;
    ce.current_count = 2;
    ce.waitlist_count = 1;

    let decision = CapacitySnapshot::new(&course, counts(7, 4), Some(&ce)).decide();
    assert_eq!(decision, AdmissionDecision::Waitlisted { position: 2 });
}

#[test]
fn full_course_without_waitlist_is_course_full() {
    let course = CourseSettings {
        max_enrollments: Some(1),
        ..open_course()
    };
    let decision = CapacitySnapshot::new(&course, counts(1, 0), None).decide();
    assert_eq!(decision, AdmissionDecision::Pending(EligibilityReason::CourseFull));
}

#[test]
fn exhausted_course_waitlist_is_course_full() {
    let course = CourseSettings {
        max_enrollments: Some(1),
        waitlist_enabled: true,
        waitlist_limit: Some(1),
        ..open_course()
    };
    let decision = CapacitySnapshot::new(&course, counts(1, 1), None).decide();
    assert_eq!(decision.reason(), Some(EligibilityReason::CourseFull));
    assert_eq!(decision.status(), EnrollmentStatus::PendingRegion);
}

#[test]
fn full_region_without_waitlist_is_region_limit_reached() {
    let course = restricted_course();
    let mut ce = quota(1, "CE", None);
    ce.limit = 1;
    ce.current_count = 1;

    let decision = CapacitySnapshot::new(&course, counts(1, 0), Some(&ce)).decide();
    assert_eq!(
        decision,
        AdmissionDecision::Pending(EligibilityReason::RegionLimitReached)
    );
}

#[test]
fn both_full_with_closed_regional_waitlist_reports_region() {
    let course = CourseSettings {
        max_enrollments: Some(1),
        waitlist_enabled: true,
        ..restricted_course()
    };
    let mut ce = quota(1, "CE", None);
    ce.limit = 1;
    ce.current_count = 1;
    ce.waitlist_limit = Some(1);
    ce.waitlist_count = 1;

    let decision = CapacitySnapshot::new(&course, counts(1, 1), Some(&ce)).decide();
    assert_eq!(decision.reason(), Some(EligibilityReason::RegionLimitReached));
}

#[test]
fn course_bottleneck_with_matched_quota_uses_course_position() {
    let course = CourseSettings {
        max_enrollments: Some(1),
        waitlist_enabled: true,
        ..open_course()
    };
    let mut ce = quota(1, "CE", None);
    ce.current_count = 1;
    ce.waitlist_count = 0;

    let decision = CapacitySnapshot::new(&course, counts(1, 1), Some(&ce)).decide();
    assert_eq!(decision, AdmissionDecision::Waitlisted { position: 2 });
}

#[test]
fn course_bottleneck_ignores_exhausted_regional_waitlist() {
    let course = CourseSettings {
        max_enrollments: Some(1),
        waitlist_enabled: true,
        ..open_course()
    };
    let mut ce = quota(1, "CE", None);
    ce.current_count = 1;
    ce.waitlist_limit = Some(1);
    ce.waitlist_count = 1;

    let decision = CapacitySnapshot::new(&course, counts(1, 1), Some(&ce)).decide();
    assert_eq!(decision, AdmissionDecision::Waitlisted { position: 2 });
}

#[test]
fn both_full_takes_the_regional_position() {
    let course = CourseSettings {
        max_enrollments: Some(2),
        waitlist_enabled: true,
        ..restricted_course()
    };
    let mut ce = quota(1, "CE", None);
    ce.limit = 2;
    ce.current_count = 2;
    ce.waitlist_count = 0;

    let decision = CapacitySnapshot::new(&course, counts(2, 3), Some(&ce)).decide();
    assert_eq!(decision, AdmissionDecision::Waitlisted { position: 1 });
}
