use chrono::{DateTime, Utc};

use super::domain::{
    CourseId, CourseSettings, Cpf, EligibilityReason, Enrollment, EnrollmentStatus, EventId,
    EventSettings, MunicipalityClass, MunicipalityClassId, MunicipalityLimit,
    MunicipalityLimitId, Region, RegionQuota, RegionQuotaId, Registration, UserId,
};

/// Storage abstraction over the persisted capacity rows.
///
/// Every admission runs inside [`CapacityStore::transaction`]: the closure sees a consistent
/// snapshot, and either all of its writes commit or none do. Implementations must serialize
/// transactions that touch the same quota, limit, or class rows so that two admissions can
/// never both observe the last free seat.
pub trait CapacityStore: Send + Sync {
    fn transaction<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn CapacityTransaction) -> Result<T, E>,
        E: From<StoreError>;
}

/// Reads and writes available inside one store transaction.
pub trait CapacityTransaction {
    /// Store clock, used for `created_at` / `closed_at` stamps.
    fn now(&self) -> DateTime<Utc>;

    fn course(&self, id: &CourseId) -> Result<Option<CourseSettings>, StoreError>;
    fn upsert_course(&mut self, settings: CourseSettings) -> Result<(), StoreError>;
    /// Removes the course with its quotas and enrollments. Returns whether it existed.
    fn delete_course(&mut self, id: &CourseId) -> Result<bool, StoreError>;

    fn region_quota(&self, id: RegionQuotaId) -> Result<Option<RegionQuota>, StoreError>;
    fn region_quotas(&self, course: &CourseId) -> Result<Vec<RegionQuota>, StoreError>;
    fn insert_region_quota(&mut self, draft: NewRegionQuota) -> Result<RegionQuota, StoreError>;
    fn update_region_quota(&mut self, quota: &RegionQuota) -> Result<(), StoreError>;
    /// `current_count += 1`; fails with [`StoreError::Invariant`] when the quota is full.
    fn increment_quota_confirmed(&mut self, id: RegionQuotaId)
        -> Result<RegionQuota, StoreError>;
    /// `waitlist_count += 1`; fails when the quota's own waitlist limit is reached.
    fn increment_quota_waitlist(&mut self, id: RegionQuotaId) -> Result<RegionQuota, StoreError>;

    fn enrollment(
        &self,
        user: &UserId,
        course: &CourseId,
    ) -> Result<Option<Enrollment>, StoreError>;
    fn enrollments(&self, course: &CourseId) -> Result<Vec<Enrollment>, StoreError>;
    fn enrollment_counts(&self, course: &CourseId) -> Result<EnrollmentCounts, StoreError>;
    /// Fails with [`StoreError::Conflict`] when (user, course) already exists.
    fn insert_enrollment(&mut self, draft: NewEnrollment) -> Result<Enrollment, StoreError>;
    fn update_enrollment(&mut self, enrollment: &Enrollment) -> Result<(), StoreError>;

    fn event(&self, id: &EventId) -> Result<Option<EventSettings>, StoreError>;
    fn upsert_event(&mut self, settings: EventSettings) -> Result<(), StoreError>;
    /// Removes the event with its limits, classes, and registrations.
    fn delete_event(&mut self, id: &EventId) -> Result<bool, StoreError>;

    /// Exact, case-sensitive lookup on (event, municipality, state).
    fn municipality_limit(
        &self,
        event: &EventId,
        municipality: &str,
        state: &str,
    ) -> Result<Option<MunicipalityLimit>, StoreError>;
    fn municipality_limits(&self, event: &EventId) -> Result<Vec<MunicipalityLimit>, StoreError>;
    /// Fails with [`StoreError::Conflict`] when the (event, municipality, state) key exists.
    fn insert_municipality_limit(
        &mut self,
        draft: NewMunicipalityLimit,
    ) -> Result<MunicipalityLimit, StoreError>;
    fn update_municipality_limit(&mut self, limit: &MunicipalityLimit) -> Result<(), StoreError>;

    /// Classes of a limit ordered by class number.
    fn classes(&self, limit: MunicipalityLimitId) -> Result<Vec<MunicipalityClass>, StoreError>;
    fn class(&self, id: MunicipalityClassId) -> Result<Option<MunicipalityClass>, StoreError>;
    /// Opens a class as ACTIVE. Fails when another class of the limit is still ACTIVE or the
    /// number does not exceed every existing class number.
    fn insert_class(&mut self, draft: NewMunicipalityClass)
        -> Result<MunicipalityClass, StoreError>;
    fn close_class(
        &mut self,
        id: MunicipalityClassId,
        closed_at: DateTime<Utc>,
    ) -> Result<MunicipalityClass, StoreError>;
    /// `current_count += 1` on an ACTIVE class with room.
    fn increment_class_count(
        &mut self,
        id: MunicipalityClassId,
    ) -> Result<MunicipalityClass, StoreError>;
    /// `current_count -= 1` on an ACTIVE class; closed classes are left untouched.
    fn release_class_seat(
        &mut self,
        id: MunicipalityClassId,
    ) -> Result<MunicipalityClass, StoreError>;

    fn registration_by_cpf(&self, cpf: &Cpf) -> Result<Option<Registration>, StoreError>;
    fn registrations(&self, event: &EventId) -> Result<Vec<Registration>, StoreError>;
    /// Fails with [`StoreError::Conflict`] when the cpf is already registered anywhere.
    fn insert_registration(&mut self, draft: NewRegistration)
        -> Result<Registration, StoreError>;
    fn update_registration(&mut self, registration: &Registration) -> Result<(), StoreError>;
}

/// Course-wide tallies read inside the admission transaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnrollmentCounts {
    pub confirmed: u32,
    pub waitlisted: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRegionQuota {
    pub course_id: CourseId,
    pub state: String,
    pub city: Option<String>,
    pub limit: u32,
    pub waitlist_limit: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEnrollment {
    pub user_id: UserId,
    pub course_id: CourseId,
    pub status: EnrollmentStatus,
    pub waitlist_position: Option<u32>,
    pub region_quota_id: Option<RegionQuotaId>,
    pub eligibility_reason: Option<EligibilityReason>,
    pub region: Option<Region>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMunicipalityLimit {
    pub event_id: EventId,
    pub municipality: String,
    pub state: String,
    pub default_limit: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMunicipalityClass {
    pub municipality_limit_id: MunicipalityLimitId,
    pub class_number: u32,
    pub limit: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRegistration {
    pub event_id: EventId,
    pub cpf: Cpf,
    pub full_name: String,
    pub email: Option<String>,
    pub municipality_limit_id: MunicipalityLimitId,
    pub municipality_class_id: MunicipalityClassId,
    pub batch_number: u32,
}

/// Error enumeration for store failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("unique constraint violated: {0}")]
    Conflict(String),
    #[error("record not found: {0}")]
    NotFound(String),
    #[error("invariant violated: {0}")]
    Invariant(String),
    #[error("transaction could not be serialized")]
    Serialization,
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Failures a fresh attempt of the same transaction can resolve.
    ///
    /// A unique-key conflict is retryable because the next attempt re-reads the winning row:
    /// lazy limit creation finds the existing limit, duplicate enrollments and cpfs are then
    /// reported through the regular pre-checks.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Serialization | StoreError::Conflict(_))
    }

    /// Failures that callers should report as temporary unavailability.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StoreError::Serialization | StoreError::Conflict(_) | StoreError::Unavailable(_)
        )
    }
}
