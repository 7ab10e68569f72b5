//! Administrator operations over course and event capacity.

use serde::{Deserialize, Serialize};
use tracing::info;

use super::domain::{
    CourseId, CourseSettings, Cpf, Enrollment, EnrollmentStatus, EventId, EventSettings,
    MunicipalityLimit, RegionQuota, RegionQuotaId, Registration, RegistrationStatus, UserId,
};
use super::intake::{normalize_region, normalize_state, IntakeViolation};
use super::notify::NotificationDispatcher;
use super::quota::same_place;
use super::service::{AdmissionError, AdmissionService};
use super::store::{CapacityStore, CapacityTransaction, NewMunicipalityLimit, NewRegionQuota};

/// New region quota for a course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaDraft {
    pub state: String,
    #[serde(default)]
    pub city: Option<String>,
    pub limit: u32,
    #[serde(default)]
    pub waitlist_limit: Option<u32>,
}

/// Capacity edit applied to an existing quota.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaUpdate {
    pub limit: u32,
    #[serde(default)]
    pub waitlist_limit: Option<u32>,
}

/// Outcome of a bulk quota import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QuotaImportSummary {
    pub inserted: usize,
    pub updated: usize,
}

/// Default class size for one municipality of an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MunicipalityLimitDraft {
    pub municipality: String,
    pub state: String,
    pub default_limit: u32,
}

impl<S, N> AdmissionService<S, N>
where
    S: CapacityStore + 'static,
    N: NotificationDispatcher + 'static,
{
    /// Creates or replaces a course's admission settings.
    pub fn configure_course(
        &self,
        settings: CourseSettings,
    ) -> Result<CourseSettings, AdmissionError> {
        if settings.course_id.0.trim().is_empty() {
            return Err(IntakeViolation::MissingCourse.into());
        }
        if settings.waitlist_limit == Some(0) {
            return Err(AdmissionError::InvalidConfiguration(
                "waitlist_limit must be positive when set".to_string(),
            ));
        }
        if settings.max_enrollments == Some(0) {
            return Err(AdmissionError::InvalidConfiguration(
                "max_enrollments must be positive when set".to_string(),
            ));
        }

        self.run(|tx| tx.upsert_course(settings.clone()).map_err(Into::into))?;
        info!(course = %settings.course_id, "course configured");
        Ok(settings)
    }

    pub fn add_region_quota(
        &self,
        course: &CourseId,
        draft: QuotaDraft,
    ) -> Result<RegionQuota, AdmissionError> {
        let draft = validate_draft(draft)?;
        let quota = self.run(|tx| {
            require_course(tx, course)?;
            let existing = tx.region_quotas(course)?;
            if existing
                .iter()
                .any(|quota| same_quota_key(quota, &draft.state, draft.city.as_deref()))
            {
                return Err(AdmissionError::InvalidConfiguration(format!(
                    "quota for {} already exists",
                    draft_label(&draft)
                )));
            }
            Ok(tx.insert_region_quota(NewRegionQuota {
                course_id: course.clone(),
                state: draft.state.clone(),
                city: draft.city.clone(),
                limit: draft.limit,
                waitlist_limit: draft.waitlist_limit,
            })?)
        })?;

        info!(
            course = %course,
            quota = %quota.id,
            region = %quota.label(),
            limit = quota.limit,
            "region quota added"
        );
        Ok(quota)
    }

    /// Changes a quota's capacity. Limits may not drop below what is already admitted.
    pub fn update_region_quota(
        &self,
        id: RegionQuotaId,
        update: QuotaUpdate,
    ) -> Result<RegionQuota, AdmissionError> {
        if update.waitlist_limit == Some(0) {
            return Err(AdmissionError::InvalidConfiguration(
                "waitlist_limit must be positive when set".to_string(),
            ));
        }

        self.run(|tx| {
            let mut quota = tx
                .region_quota(id)?
                .ok_or(AdmissionError::QuotaNotFound(id))?;
            apply_quota_update(&mut quota, update.limit, update.waitlist_limit)?;
            tx.update_region_quota(&quota)?;
            Ok(quota)
        })
    }

    /// Upserts a batch of quotas in one transaction. Drafts matching an existing (state, city)
    /// quota update its capacity; the rest are inserted. Any failure leaves every quota as it was.
    pub fn import_region_quotas(
        &self,
        course: &CourseId,
        drafts: Vec<QuotaDraft>,
    ) -> Result<QuotaImportSummary, AdmissionError> {
        let drafts = drafts
            .into_iter()
            .map(validate_draft)
            .collect::<Result<Vec<_>, _>>()?;

        let summary = self.run(|tx| {
            require_course(tx, course)?;
            let mut summary = QuotaImportSummary::default();
            for draft in &drafts {
                let existing = tx.region_quotas(course)?.into_iter().find(|quota| {
                    same_quota_key(quota, &draft.state, draft.city.as_deref())
                });
                match existing {
                    Some(mut quota) => {
                        apply_quota_update(&mut quota, draft.limit, draft.waitlist_limit)?;
                        tx.update_region_quota(&quota)?;
                        summary.updated += 1;
                    }
                    None => {
                        tx.insert_region_quota(NewRegionQuota {
                            course_id: course.clone(),
                            state: draft.state.clone(),
                            city: draft.city.clone(),
                            limit: draft.limit,
                            waitlist_limit: draft.waitlist_limit,
                        })?;
                        summary.inserted += 1;
                    }
                }
            }
            Ok(summary)
        })?;

        info!(
            course = %course,
            inserted = summary.inserted,
            updated = summary.updated,
            "region quotas imported"
        );
        Ok(summary)
    }

    /// Removes a course with every quota and enrollment under it.
    pub fn delete_course(&self, course: &CourseId) -> Result<(), AdmissionError> {
        let existed = self.run(|tx| Ok(tx.delete_course(course)?))?;
        if !existed {
            return Err(AdmissionError::CourseNotFound(course.clone()));
        }
        info!(course = %course, "course deleted");
        Ok(())
    }

    /// Moves a PENDING_REGION enrollment to REJECTED. No counters are involved.
    pub fn reject_pending_enrollment(
        &self,
        user: &UserId,
        course: &CourseId,
    ) -> Result<Enrollment, AdmissionError> {
        let enrollment = self.run(|tx| {
            let mut enrollment = tx
                .enrollment(user, course)?
                .ok_or(AdmissionError::EnrollmentNotFound)?;
            if enrollment.status != EnrollmentStatus::PendingRegion {
                return Err(AdmissionError::NotPending(enrollment.status));
            }
            enrollment.status = EnrollmentStatus::Rejected;
            tx.update_enrollment(&enrollment)?;
            Ok(enrollment)
        })?;

        info!(course = %course, user = %user, "pending enrollment rejected");
        Ok(enrollment)
    }

    pub fn configure_event(&self, settings: EventSettings) -> Result<EventSettings, AdmissionError> {
        if settings.event_id.0.trim().is_empty() {
            return Err(IntakeViolation::MissingEvent.into());
        }
        self.run(|tx| tx.upsert_event(settings.clone()).map_err(Into::into))?;
        info!(event = %settings.event_id, "event configured");
        Ok(settings)
    }

    /// Creates or edits a municipality's default class size. The ACTIVE class keeps the
    /// limit it was opened with; the new value applies from the next class on.
    pub fn set_municipality_limit(
        &self,
        event: &EventId,
        draft: MunicipalityLimitDraft,
    ) -> Result<MunicipalityLimit, AdmissionError> {
        if draft.default_limit == 0 {
            return Err(AdmissionError::InvalidConfiguration(
                "default_limit must be positive".to_string(),
            ));
        }
        let municipality = draft.municipality.trim().to_string();
        if municipality.is_empty() {
            return Err(IntakeViolation::MissingMunicipality.into());
        }
        let state = normalize_state(&draft.state)?;

        let limit = self.run(|tx| {
            if tx.event(event)?.is_none() {
                return Err(AdmissionError::EventNotFound(event.clone()));
            }
            match tx.municipality_limit(event, &municipality, &state)? {
                Some(mut limit) => {
                    limit.default_limit = draft.default_limit;
                    tx.update_municipality_limit(&limit)?;
                    Ok(limit)
                }
                None => Ok(tx.insert_municipality_limit(NewMunicipalityLimit {
                    event_id: event.clone(),
                    municipality: municipality.clone(),
                    state: state.clone(),
                    default_limit: draft.default_limit,
                })?),
            }
        })?;

        info!(
            event = %event,
            municipality = %limit.municipality,
            state = %limit.state,
            default_limit = limit.default_limit,
            "municipality limit set"
        );
        Ok(limit)
    }

    /// Marks a registration CANCELLED. The seat returns to the class only while that class
    /// is still ACTIVE; the cpf stays reserved either way.
    pub fn cancel_registration(&self, cpf: &str) -> Result<Registration, AdmissionError> {
        let cpf = Cpf::parse(cpf)?;
        let (registration, released) = self.run(|tx| {
            let mut registration = tx
                .registration_by_cpf(&cpf)?
                .ok_or(AdmissionError::RegistrationNotFound)?;
            if registration.status == RegistrationStatus::Cancelled {
                return Err(AdmissionError::AlreadyCancelled);
            }

            let released = match tx.class(registration.municipality_class_id)? {
                Some(class) if class.is_active() => {
                    tx.release_class_seat(class.id)?;
                    true
                }
                _ => false,
            };
            registration.status = RegistrationStatus::Cancelled;
            tx.update_registration(&registration)?;
            Ok((registration, released))
        })?;

        info!(
            event = %registration.event_id,
            batch_number = registration.batch_number,
            seat_released = released,
            "registration cancelled"
        );
        Ok(registration)
    }

    pub fn delete_event(&self, event: &EventId) -> Result<(), AdmissionError> {
        let existed = self.run(|tx| Ok(tx.delete_event(event)?))?;
        if !existed {
            return Err(AdmissionError::EventNotFound(event.clone()));
        }
        info!(event = %event, "event deleted");
        Ok(())
    }
}

pub(crate) fn require_course(
    tx: &dyn CapacityTransaction,
    course: &CourseId,
) -> Result<CourseSettings, AdmissionError> {
    tx.course(course)?
        .ok_or_else(|| AdmissionError::CourseNotFound(course.clone()))
}

/// Normalizes state and city the same way enrollment intake does.
pub(crate) fn validate_draft(draft: QuotaDraft) -> Result<QuotaDraft, AdmissionError> {
    if draft.limit == 0 {
        return Err(AdmissionError::InvalidConfiguration(
            "quota limit must be positive".to_string(),
        ));
    }
    if draft.waitlist_limit == Some(0) {
        return Err(AdmissionError::InvalidConfiguration(
            "waitlist_limit must be positive when set".to_string(),
        ));
    }
    let region = normalize_region(Some(draft.state.as_str()), draft.city.as_deref())?
        .ok_or(IntakeViolation::InvalidState(draft.state.clone()))?;
    Ok(QuotaDraft {
        state: region.state,
        city: region.city,
        limit: draft.limit,
        waitlist_limit: draft.waitlist_limit,
    })
}

pub(crate) fn same_quota_key(quota: &RegionQuota, state: &str, city: Option<&str>) -> bool {
    same_place(&quota.state, state)
        && match (quota.city.as_deref(), city) {
            (Some(left), Some(right)) => same_place(left, right),
            (None, None) => true,
            _ => false,
        }
}

pub(crate) fn apply_quota_update(
    quota: &mut RegionQuota,
    limit: u32,
    waitlist_limit: Option<u32>,
) -> Result<(), AdmissionError> {
    if limit < quota.current_count {
        return Err(AdmissionError::InvalidConfiguration(format!(
            "limit {limit} is below the {} seats already confirmed for {}",
            quota.current_count,
            quota.label()
        )));
    }
    if let Some(waitlist_limit) = waitlist_limit {
        if waitlist_limit < quota.waitlist_count {
            return Err(AdmissionError::InvalidConfiguration(format!(
                "waitlist_limit {waitlist_limit} is below the {} entries already waitlisted for {}",
                quota.waitlist_count,
                quota.label()
            )));
        }
    }
    quota.limit = limit;
    quota.waitlist_limit = waitlist_limit;
    Ok(())
}

fn draft_label(draft: &QuotaDraft) -> String {
    match &draft.city {
        Some(city) => format!("{city}/{}", draft.state),
        None => draft.state.clone(),
    }
}
