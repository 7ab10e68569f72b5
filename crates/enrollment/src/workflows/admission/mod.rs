//! Capacity allocation for course enrollments and public event registrations.
//!
//! Course admissions are decided against region quotas and course-wide limits, producing
//! CONFIRMED, WAITLIST, or PENDING_REGION enrollments. Event registrations are placed into
//! numbered municipality classes that roll over as they fill. Every decision runs inside a
//! [`CapacityStore`] transaction so that counters and rows commit together.

pub mod admin;
pub(crate) mod cohort;
pub mod decision;
pub mod domain;
pub(crate) mod intake;
pub mod memory;
pub mod notify;
pub mod quota;
pub mod report;
pub mod router;
pub mod service;
pub mod store;

#[cfg(test)]
mod tests;

pub use admin::{MunicipalityLimitDraft, QuotaDraft, QuotaImportSummary, QuotaUpdate};
pub use cohort::ClassAdmission;
pub use decision::{AdmissionDecision, CapacitySnapshot};
pub use domain::{
    ClassStatus, CourseId, CourseSettings, Cpf, EligibilityReason, Enrollment, EnrollmentId,
    EnrollmentRequest, EnrollmentStatus, EnrollmentStatusView, EventId, EventSettings,
    MunicipalityClass, MunicipalityClassId, MunicipalityLimit, MunicipalityLimitId, Region,
    RegionQuota, RegionQuotaId, Registration, RegistrationId, RegistrationRequest,
    RegistrationStatus, UserId,
};
pub use intake::IntakeViolation;
pub use memory::InMemoryCapacityStore;
pub use notify::{Notification, NotificationDispatcher, NotificationError, NotificationTemplate};
pub use report::{CourseRoster, EventRoster};
pub use router::admission_router;
pub use service::{AdmissionError, AdmissionService, RegistrationReceipt, RegistrationView};
pub use store::{CapacityStore, CapacityTransaction, EnrollmentCounts, StoreError};
