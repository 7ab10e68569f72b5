//! Read-only roster views for administrators.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::admin::require_course;
use super::domain::{
    ClassStatus, CourseId, CourseSettings, Enrollment, EnrollmentStatus, EventId, EventSettings,
    MunicipalityClass, MunicipalityLimit, Registration,
};
use super::notify::NotificationDispatcher;
use super::service::{AdmissionError, AdmissionService};
use super::store::CapacityStore;

#[derive(Debug, Clone, Serialize)]
pub struct CourseRoster {
    pub course: CourseSettings,
    pub confirmed: u32,
    pub waitlisted: u32,
    pub quotas: Vec<QuotaUtilization>,
    pub enrollments: Vec<RosterEnrollment>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuotaUtilization {
    pub quota_id: u64,
    pub region: String,
    pub limit: u32,
    pub current_count: u32,
    pub waitlist_limit: Option<u32>,
    pub waitlist_count: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct RosterEnrollment {
    pub user_id: String,
    pub status: &'static str,
    pub waitlist_position: Option<u32>,
    pub eligibility_reason: Option<&'static str>,
    pub region: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EventRoster {
    pub event: EventSettings,
    pub municipalities: Vec<MunicipalityRoster>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MunicipalityRoster {
    pub municipality: String,
    pub state: String,
    pub default_limit: u32,
    pub classes: Vec<ClassRoster>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassRoster {
    pub class_number: u32,
    pub status: ClassStatus,
    pub current_count: u32,
    pub limit: u32,
    pub closed_at: Option<DateTime<Utc>>,
    pub registrations: Vec<RosterRegistration>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RosterRegistration {
    pub full_name: String,
    pub status: &'static str,
    pub created_at: DateTime<Utc>,
}

impl<S, N> AdmissionService<S, N>
where
    S: CapacityStore + 'static,
    N: NotificationDispatcher + 'static,
{
    /// Settings, quota utilization, and enrollments of one course.
    ///
    /// Enrollments are ordered by status (confirmed, waitlist, pending, rejected), then by
    /// waitlist position, then by creation time.
    pub fn course_roster(&self, course: &CourseId) -> Result<CourseRoster, AdmissionError> {
        self.run(|tx| {
            let settings = require_course(tx, course)?;
            let counts = tx.enrollment_counts(course)?;
            let quotas = tx
                .region_quotas(course)?
                .into_iter()
                .map(|quota| QuotaUtilization {
                    quota_id: quota.id.0,
                    region: quota.label(),
                    limit: quota.limit,
                    current_count: quota.current_count,
                    waitlist_limit: quota.waitlist_limit,
                    waitlist_count: quota.waitlist_count,
                })
                .collect();

            let mut enrollments = tx.enrollments(course)?;
            enrollments.sort_by_key(|enrollment| {
                (
                    status_rank(enrollment.status),
                    enrollment.waitlist_position.unwrap_or(0),
                    enrollment.created_at,
                    enrollment.id,
                )
            });

            Ok(CourseRoster {
                course: settings,
                confirmed: counts.confirmed,
                waitlisted: counts.waitlisted,
                quotas,
                enrollments: enrollments.iter().map(roster_enrollment).collect(),
            })
        })
    }

    /// Municipalities of one event with their class chain and registrants.
    pub fn event_roster(&self, event: &EventId) -> Result<EventRoster, AdmissionError> {
        self.run(|tx| {
            let settings = tx
                .event(event)?
                .ok_or_else(|| AdmissionError::EventNotFound(event.clone()))?;
            let registrations = tx.registrations(event)?;

            let mut municipalities = Vec::new();
            for limit in tx.municipality_limits(event)? {
                let classes = tx.classes(limit.id)?;
                municipalities.push(municipality_roster(limit, classes, &registrations));
            }

            Ok(EventRoster {
                event: settings,
                municipalities,
            })
        })
    }
}

fn status_rank(status: EnrollmentStatus) -> u8 {
    match status {
        EnrollmentStatus::Confirmed => 0,
        EnrollmentStatus::Waitlist => 1,
        EnrollmentStatus::PendingRegion => 2,
        EnrollmentStatus::Rejected => 3,
    }
}

fn roster_enrollment(enrollment: &Enrollment) -> RosterEnrollment {
    RosterEnrollment {
        user_id: enrollment.user_id.0.clone(),
        status: enrollment.status.label(),
        waitlist_position: enrollment.waitlist_position,
        eligibility_reason: enrollment.eligibility_reason.map(|reason| reason.summary()),
        region: enrollment.region.as_ref().map(|region| region.label()),
        created_at: enrollment.created_at,
    }
}

fn municipality_roster(
    limit: MunicipalityLimit,
    classes: Vec<MunicipalityClass>,
    registrations: &[Registration],
) -> MunicipalityRoster {
    let classes = classes
        .into_iter()
        .map(|class| ClassRoster {
            class_number: class.class_number,
            status: class.status,
            current_count: class.current_count,
            limit: class.limit,
            closed_at: class.closed_at,
            registrations: registrations
                .iter()
                .filter(|registration| registration.municipality_class_id == class.id)
                .map(|registration| RosterRegistration {
                    full_name: registration.full_name.clone(),
                    status: registration.status.label(),
                    created_at: registration.created_at,
                })
                .collect(),
        })
        .collect();

    MunicipalityRoster {
        municipality: limit.municipality,
        state: limit.state,
        default_limit: limit.default_limit,
        classes,
    }
}
