use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for courses configured by administrators.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CourseId(pub String);

/// Identifier wrapper for public events.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub String);

/// Identifier wrapper for authenticated users enrolling in courses.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub String);

macro_rules! display_inner {
    ($($name:ident),+) => {
        $(
            impl fmt::Display for $name {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    write!(f, "{}", self.0)
                }
            }
        )+
    };
}

display_inner!(CourseId, EventId, UserId);

/// Store-assigned row identifiers.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct RegionQuotaId(pub u64);

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct MunicipalityLimitId(pub u64);

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct MunicipalityClassId(pub u64);

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct EnrollmentId(pub u64);

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct RegistrationId(pub u64);

display_inner!(
    RegionQuotaId,
    MunicipalityLimitId,
    MunicipalityClassId,
    EnrollmentId,
    RegistrationId
);

/// Brazilian taxpayer number, digits only. Built through intake validation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cpf(pub(crate) String);

impl Cpf {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Cpf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Declared location of a registrant. `state` is a two-letter UF code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub state: String,
    pub city: Option<String>,
}

impl Region {
    pub fn label(&self) -> String {
        match &self.city {
            Some(city) => format!("{city}/{}", self.state),
            None => self.state.clone(),
        }
    }
}

/// Course-level admission settings edited through the admin surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseSettings {
    pub course_id: CourseId,
    pub title: String,
    #[serde(default)]
    pub max_enrollments: Option<u32>,
    #[serde(default)]
    pub waitlist_enabled: bool,
    #[serde(default)]
    pub waitlist_limit: Option<u32>,
    #[serde(default)]
    pub region_restriction_enabled: bool,
    #[serde(default)]
    pub allow_all_regions: bool,
    #[serde(default = "default_open")]
    pub enrollment_open: bool,
}

/// Event-level settings edited through the admin surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSettings {
    pub event_id: EventId,
    pub title: String,
    #[serde(default = "default_open")]
    pub registration_open: bool,
}

fn default_open() -> bool {
    true
}

/// Course-scoped capacity attached to a state or a single city.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionQuota {
    pub id: RegionQuotaId,
    pub course_id: CourseId,
    pub state: String,
    pub city: Option<String>,
    pub limit: u32,
    pub current_count: u32,
    pub waitlist_limit: Option<u32>,
    pub waitlist_count: u32,
}

impl RegionQuota {
    pub fn is_full(&self) -> bool {
        self.current_count >= self.limit
    }

    /// Whether the quota's own waitlist can take another entry.
    pub fn waitlist_has_room(&self) -> bool {
        self.waitlist_limit
            .map(|limit| self.waitlist_count < limit)
            .unwrap_or(true)
    }

    pub fn label(&self) -> String {
        match &self.city {
            Some(city) => format!("{city}/{}", self.state),
            None => self.state.clone(),
        }
    }
}

/// Event-scoped capacity keyed by municipality and state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MunicipalityLimit {
    pub id: MunicipalityLimitId,
    pub event_id: EventId,
    pub municipality: String,
    pub state: String,
    pub default_limit: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClassStatus {
    Active,
    Closed,
}

/// Numbered cohort of seats under a municipality limit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MunicipalityClass {
    pub id: MunicipalityClassId,
    pub municipality_limit_id: MunicipalityLimitId,
    pub class_number: u32,
    pub limit: u32,
    pub current_count: u32,
    pub status: ClassStatus,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl MunicipalityClass {
    pub fn is_active(&self) -> bool {
        self.status == ClassStatus::Active
    }

    pub fn is_full(&self) -> bool {
        self.current_count >= self.limit
    }
}

/// Why an enrollment was not admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EligibilityReason {
    RegionNotEligible,
    OutsidePriorityRegions,
    CourseFull,
    RegionLimitReached,
}

impl EligibilityReason {
    pub const fn summary(self) -> &'static str {
        match self {
            EligibilityReason::RegionNotEligible => "region not eligible",
            EligibilityReason::OutsidePriorityRegions => "outside priority regions",
            EligibilityReason::CourseFull => "course full",
            EligibilityReason::RegionLimitReached => "region limit reached",
        }
    }
}

impl fmt::Display for EligibilityReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.summary())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnrollmentStatus {
    Confirmed,
    Waitlist,
    PendingRegion,
    Rejected,
}

impl EnrollmentStatus {
    pub const fn label(self) -> &'static str {
        match self {
            EnrollmentStatus::Confirmed => "CONFIRMED",
            EnrollmentStatus::Waitlist => "WAITLIST",
            EnrollmentStatus::PendingRegion => "PENDING_REGION",
            EnrollmentStatus::Rejected => "REJECTED",
        }
    }
}

/// Persisted outcome of a course admission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: EnrollmentId,
    pub user_id: UserId,
    pub course_id: CourseId,
    pub status: EnrollmentStatus,
    pub waitlist_position: Option<u32>,
    pub region_quota_id: Option<RegionQuotaId>,
    pub eligibility_reason: Option<EligibilityReason>,
    pub region: Option<Region>,
    pub created_at: DateTime<Utc>,
}

impl Enrollment {
    pub fn status_view(&self) -> EnrollmentStatusView {
        EnrollmentStatusView {
            enrollment_id: self.id,
            course_id: self.course_id.clone(),
            user_id: self.user_id.clone(),
            status: self.status.label(),
            waitlist_position: self.waitlist_position,
            eligibility_reason: self.eligibility_reason.map(EligibilityReason::summary),
        }
    }
}

/// Sanitized representation returned to the enrolling user.
#[derive(Debug, Clone, Serialize)]
pub struct EnrollmentStatusView {
    pub enrollment_id: EnrollmentId,
    pub course_id: CourseId,
    pub user_id: UserId,
    pub status: &'static str,
    pub waitlist_position: Option<u32>,
    pub eligibility_reason: Option<&'static str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RegistrationStatus {
    Confirmed,
    Cancelled,
}

impl RegistrationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            RegistrationStatus::Confirmed => "CONFIRMED",
            RegistrationStatus::Cancelled => "CANCELLED",
        }
    }
}

/// Persisted public event registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    pub id: RegistrationId,
    pub event_id: EventId,
    pub cpf: Cpf,
    pub full_name: String,
    pub email: Option<String>,
    pub municipality_limit_id: MunicipalityLimitId,
    pub municipality_class_id: MunicipalityClassId,
    pub batch_number: u32,
    pub status: RegistrationStatus,
    pub created_at: DateTime<Utc>,
}

/// Inbound course enrollment request, prior to intake validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollmentRequest {
    pub course_id: CourseId,
    pub user_id: UserId,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
}

/// Inbound public event registration, prior to intake validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationRequest {
    pub event_id: EventId,
    pub cpf: String,
    pub full_name: String,
    #[serde(default)]
    pub email: Option<String>,
    pub municipality: String,
    pub state: String,
}
