use std::io::Cursor;

use super::common::*;
use crate::workflows::admission::admin::{MunicipalityLimitDraft, QuotaUpdate};
use crate::workflows::admission::domain::{
    ClassStatus, CourseSettings, EnrollmentStatus, RegionQuotaId, RegistrationStatus, UserId,
};
use crate::workflows::admission::service::AdmissionError;
use crate::workflows::quota_import::{QuotaImportError, QuotaImporter};

#[test]
fn configure_course_rejects_zero_waitlist_limit() {
    let (service, _) = build_service();
    let err = service
        .configure_course(CourseSettings {
            waitlist_enabled: true,
            waitlist_limit: Some(0),
            ..open_course()
        })
        .expect_err("zero limit");
    assert!(matches!(err, AdmissionError::InvalidConfiguration(_)));
}

#[test]
fn duplicate_quota_keys_are_refused() {
    let (service, _) = build_service();
    service.configure_course(restricted_course()).expect("course");
    service
        .add_region_quota(&course_id(), quota_draft("CE", Some("Fortaleza"), 3))
        .expect("first");

    let err = service
        .add_region_quota(&course_id(), quota_draft("ce", Some("fortaleza"), 9))
        .expect_err("same key");
    assert!(matches!(err, AdmissionError::InvalidConfiguration(_)));

    service
        .add_region_quota(&course_id(), quota_draft("CE", None, 9))
        .expect("state-wide quota is a different key");
}

#[test]
fn quota_limits_cannot_drop_below_admitted_counts() {
    let (service, _) = build_service();
    service.configure_course(restricted_course()).expect("course");
    let quota = service
        .add_region_quota(&course_id(), quota_draft("CE", None, 3))
        .expect("quota");
    for user in ["a", "b"] {
        service
            .enroll(enrollment_request(user, Some("CE"), None))
            .expect("enrolled");
    }

    let err = service
        .update_region_quota(
            quota.id,
            QuotaUpdate {
                limit: 1,
                waitlist_limit: None,
            },
        )
        .expect_err("below current count");
    assert!(matches!(err, AdmissionError::InvalidConfiguration(_)));

    let updated = service
        .update_region_quota(
            quota.id,
            QuotaUpdate {
                limit: 2,
                waitlist_limit: Some(4),
            },
        )
        .expect("equal to current count is fine");
    assert_eq!(updated.limit, 2);
    assert_eq!(updated.current_count, 2);

    let err = service
        .update_region_quota(
            RegionQuotaId(999),
            QuotaUpdate {
                limit: 2,
                waitlist_limit: None,
            },
        )
        .expect_err("unknown quota");
    assert!(matches!(err, AdmissionError::QuotaNotFound(_)));
}

#[test]
fn only_pending_enrollments_can_be_rejected() {
    let (service, _) = build_service();
    service.configure_course(restricted_course()).expect("course");
    service
        .add_region_quota(&course_id(), quota_draft("CE", None, 3))
        .expect("quota");
    service
        .enroll(enrollment_request("local", Some("CE"), None))
        .expect("confirmed");
    service
        .enroll(enrollment_request("remote", Some("AM"), None))
        .expect("pending");

    let err = service
        .reject_pending_enrollment(&UserId("local".into()), &course_id())
        .expect_err("confirmed is not pending");
    assert!(matches!(
        err,
        AdmissionError::NotPending(EnrollmentStatus::Confirmed)
    ));

    let rejected = service
        .reject_pending_enrollment(&UserId("remote".into()), &course_id())
        .expect("rejected");
    assert_eq!(rejected.status, EnrollmentStatus::Rejected);

    let roster = service.course_roster(&course_id()).expect("roster");
    assert_eq!(roster.confirmed, 1);
    assert_eq!(roster.enrollments.last().map(|row| row.status), Some("REJECTED"));
}

#[test]
fn municipality_limit_changes_apply_to_the_next_class() {
    let (service, _) = build_service();
    service.configure_event(event()).expect("event");
    service
        .register(registration_request(1, "Fortaleza", "CE"))
        .expect("first");

    let limit = service
        .set_municipality_limit(
            &event_id(),
            MunicipalityLimitDraft {
                municipality: "Fortaleza".into(),
                state: "ce".into(),
                default_limit: 5,
            },
        )
        .expect("limit updated");
    assert_eq!(limit.default_limit, 5);
    assert_eq!(limit.state, "CE");

    let second = service
        .register(registration_request(2, "Fortaleza", "CE"))
        .expect("second");
    assert_eq!(second.admission.class.limit, 2);
    assert_eq!(second.admission.class.status, ClassStatus::Closed);
    assert_eq!(second.admission.opened.as_ref().map(|class| class.limit), Some(5));
}

#[test]
fn cancelling_returns_the_seat_only_while_the_class_is_active() {
    let (service, _) = build_service();
    service.configure_event(event()).expect("event");
    for seed in 1..=3 {
        service
            .register(registration_request(seed, "Caucaia", "CE"))
            .expect("registered");
    }

    let cancelled = service.cancel_registration(&cpf(3)).expect("cancel active");
    assert_eq!(cancelled.status, RegistrationStatus::Cancelled);
    service.cancel_registration(&cpf(1)).expect("cancel closed");

    let roster = service.event_roster(&event_id()).expect("roster");
    let classes = &roster.municipalities[0].classes;
    assert_eq!(classes[0].current_count, 2);
    assert_eq!(classes[1].current_count, 0);

    let err = service.cancel_registration(&cpf(3)).expect_err("twice");
    assert!(matches!(err, AdmissionError::AlreadyCancelled));

    let mut again = registration_request(3, "Caucaia", "CE");
    again.full_name = "Retry".into();
    let err = service.register(again).expect_err("cpf stays reserved");
    assert!(matches!(err, AdmissionError::AlreadyRegistered));
}

#[test]
fn deleting_a_course_cascades() {
    let (service, _) = build_service();
    service.configure_course(open_course()).expect("course");
    service
        .enroll(enrollment_request("gone", None, None))
        .expect("enrolled");

    service.delete_course(&course_id()).expect("deleted");
    let err = service
        .enrollment(&course_id(), &UserId("gone".into()))
        .expect_err("enrollment removed");
    assert!(matches!(err, AdmissionError::EnrollmentNotFound));
    assert!(matches!(
        service.delete_course(&course_id()),
        Err(AdmissionError::CourseNotFound(_))
    ));
}

#[test]
fn deleting_an_event_frees_its_cpfs() {
    let (service, _) = build_service();
    service.configure_event(event()).expect("event");
    service
        .register(registration_request(4, "Sobral", "CE"))
        .expect("registered");

    service.delete_event(&event_id()).expect("deleted");
    assert!(matches!(
        service.registration(&cpf(4)),
        Err(AdmissionError::RegistrationNotFound)
    ));
}

#[test]
fn csv_import_upserts_quotas() {
    let (service, _) = build_service();
    service.configure_course(restricted_course()).expect("course");
    service
        .add_region_quota(&course_id(), quota_draft("CE", None, 3))
        .expect("existing quota");

    let csv = "state,city,limit,waitlist_limit\nce,,8,2\nCE,Fortaleza,4,\nSP,,10,\n";
    let summary = QuotaImporter::from_reader(&service, &course_id(), Cursor::new(csv))
        .expect("import applies");
    assert_eq!(summary.inserted, 2);
    assert_eq!(summary.updated, 1);

    let roster = service.course_roster(&course_id()).expect("roster");
    let state_wide = roster
        .quotas
        .iter()
        .find(|quota| quota.region == "CE")
        .expect("CE quota");
    assert_eq!(state_wide.limit, 8);
    assert_eq!(state_wide.waitlist_limit, Some(2));
    assert_eq!(roster.quotas.len(), 3);
}

#[test]
fn csv_import_with_a_bad_row_applies_nothing() {
    let (service, _) = build_service();
    service.configure_course(restricted_course()).expect("course");

    let csv = "state,city,limit,waitlist_limit\nCE,,8,\nCeara,,4,\n";
    let err = QuotaImporter::from_reader(&service, &course_id(), Cursor::new(csv))
        .expect_err("bad state");
    assert!(matches!(err, QuotaImportError::Row { line: 3, .. }));

    let roster = service.course_roster(&course_id()).expect("roster");
    assert!(roster.quotas.is_empty());
}
