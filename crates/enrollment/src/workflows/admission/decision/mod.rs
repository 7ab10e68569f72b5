mod policy;

use serde::{Deserialize, Serialize};

use super::domain::{CourseSettings, EligibilityReason, EnrollmentStatus, RegionQuota};
use super::store::EnrollmentCounts;

pub(crate) use policy::decide;

/// Consistent view of the capacity inputs, read inside the admission transaction.
#[derive(Debug, Clone, Copy)]
pub struct CapacitySnapshot<'a> {
    pub settings: &'a CourseSettings,
    pub confirmed_count: u32,
    pub waitlist_count: u32,
    pub quota: Option<&'a RegionQuota>,
}

impl<'a> CapacitySnapshot<'a> {
    pub fn new(
        settings: &'a CourseSettings,
        counts: EnrollmentCounts,
        quota: Option<&'a RegionQuota>,
    ) -> Self {
        Self {
            settings,
            confirmed_count: counts.confirmed,
            waitlist_count: counts.waitlisted,
            quota,
        }
    }

    /// Runs the admission rules against this snapshot.
    pub fn decide(&self) -> AdmissionDecision {
        decide(self)
    }
}

/// Outcome of the admission rules for one course enrollment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdmissionDecision {
    Confirmed,
    Waitlisted { position: u32 },
    Pending(EligibilityReason),
}

impl AdmissionDecision {
    pub fn status(&self) -> EnrollmentStatus {
        match self {
            AdmissionDecision::Confirmed => EnrollmentStatus::Confirmed,
            AdmissionDecision::Waitlisted { .. } => EnrollmentStatus::Waitlist,
            AdmissionDecision::Pending(_) => EnrollmentStatus::PendingRegion,
        }
    }

    pub fn waitlist_position(&self) -> Option<u32> {
        match self {
            AdmissionDecision::Waitlisted { position } => Some(*position),
            _ => None,
        }
    }

    pub fn reason(&self) -> Option<EligibilityReason> {
        match self {
            AdmissionDecision::Pending(reason) => Some(*reason),
            _ => None,
        }
    }

    pub fn summary(&self) -> String {
        match self {
            AdmissionDecision::Confirmed => "enrollment confirmed".to_string(),
            AdmissionDecision::Waitlisted { position } => {
                format!("waitlisted at position {position}")
            }
            AdmissionDecision::Pending(reason) => format!("pending: {reason}"),
        }
    }
}
