use std::sync::Arc;

use axum::http::StatusCode;
use serde::Serialize;
use tracing::{info, warn};

use super::cohort::{self, ClassAdmission};
use super::decision::{AdmissionDecision, CapacitySnapshot};
use super::domain::{
    CourseId, CourseSettings, Cpf, Enrollment, EnrollmentRequest, EnrollmentStatus, EventId,
    EventSettings, MunicipalityLimit, RegionQuotaId, Registration, RegistrationRequest, UserId,
};
use super::intake::{
    enrollment_from_request, registration_from_request, IntakeViolation, ValidatedEnrollment,
    ValidatedRegistration,
};
use super::notify::{Notification, NotificationDispatcher};
use super::quota;
use super::store::{CapacityStore, CapacityTransaction, NewEnrollment, NewRegistration, StoreError};
use crate::config::AllocationConfig;

/// Service composing intake validation, the capacity store, and notification dispatch.
pub struct AdmissionService<S, N> {
    pub(crate) store: Arc<S>,
    notifier: Arc<N>,
    pub(crate) config: AllocationConfig,
}

/// Result of a committed event registration.
#[derive(Debug, Clone, Serialize)]
pub struct RegistrationReceipt {
    pub registration: Registration,
    pub municipality: MunicipalityLimit,
    pub admission: ClassAdmission,
}

impl RegistrationReceipt {
    pub fn view(&self) -> RegistrationView {
        RegistrationView {
            registration_id: self.registration.id.0,
            event_id: self.registration.event_id.clone(),
            status: self.registration.status.label(),
            municipality: self.municipality.municipality.clone(),
            state: self.municipality.state.clone(),
            class_number: self.admission.class.class_number,
            batch_number: self.registration.batch_number,
        }
    }
}

/// Public representation of an event registration.
#[derive(Debug, Clone, Serialize)]
pub struct RegistrationView {
    pub registration_id: u64,
    pub event_id: EventId,
    pub status: &'static str,
    pub municipality: String,
    pub state: String,
    pub class_number: u32,
    pub batch_number: u32,
}

impl<S, N> AdmissionService<S, N>
where
    S: CapacityStore + 'static,
    N: NotificationDispatcher + 'static,
{
    pub fn new(store: Arc<S>, notifier: Arc<N>, config: AllocationConfig) -> Self {
        Self {
            store,
            notifier,
            config,
        }
    }

    /// Admit a user into a course, returning the persisted enrollment.
    pub fn enroll(&self, request: EnrollmentRequest) -> Result<Enrollment, AdmissionError> {
        let request = enrollment_from_request(request)?;

        let (enrollment, course) = self.run(|tx| admit_enrollment(tx, &request))?;

        info!(
            course = %enrollment.course_id,
            user = %enrollment.user_id,
            status = enrollment.status.label(),
            waitlist_position = ?enrollment.waitlist_position,
            reason = ?enrollment.eligibility_reason,
            "enrollment admitted"
        );

        if let Some(notification) = Notification::for_enrollment(&enrollment, &course) {
            self.notify(notification);
        }
        Ok(enrollment)
    }

    /// Register a guest for an event, assigning a municipality class.
    pub fn register(
        &self,
        request: RegistrationRequest,
    ) -> Result<RegistrationReceipt, AdmissionError> {
        let request = registration_from_request(request)?;
        let default_limit = self.config.default_municipality_limit;

        let (receipt, event) = self.run(|tx| admit_registration(tx, &request, default_limit))?;

        info!(
            event = %receipt.registration.event_id,
            municipality = %receipt.municipality.municipality,
            state = %receipt.municipality.state,
            class_number = receipt.admission.class.class_number,
            rolled_over = receipt.admission.opened.is_some(),
            "registration admitted"
        );

        self.notify(Notification::for_registration(
            &receipt.registration,
            &event,
            &receipt.municipality,
        ));
        Ok(receipt)
    }

    /// Fetch an enrollment for API responses.
    pub fn enrollment(
        &self,
        course: &CourseId,
        user: &UserId,
    ) -> Result<Enrollment, AdmissionError> {
        self.run(|tx| {
            tx.enrollment(user, course)?
                .ok_or(AdmissionError::EnrollmentNotFound)
        })
    }

    /// Fetch a registration by raw (possibly formatted) cpf.
    pub fn registration(&self, cpf: &str) -> Result<RegistrationReceipt, AdmissionError> {
        let cpf = Cpf::parse(cpf)?;
        self.run(|tx| {
            let registration = tx
                .registration_by_cpf(&cpf)?
                .ok_or(AdmissionError::RegistrationNotFound)?;
            receipt_for(tx, registration)
        })
    }

    /// Runs `work` in a store transaction, retrying retryable store failures.
    pub(crate) fn run<T, F>(&self, mut work: F) -> Result<T, AdmissionError>
    where
        F: FnMut(&mut dyn CapacityTransaction) -> Result<T, AdmissionError>,
    {
        let attempts = self.config.max_transaction_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.store.transaction(|tx| work(tx)) {
                Err(AdmissionError::Store(err)) if err.is_retryable() && attempt < attempts => {
                    warn!(attempt, error = %err, "retrying admission transaction");
                    attempt += 1;
                }
                outcome => return outcome,
            }
        }
    }

    fn notify(&self, notification: Notification) {
        let template = notification.template.label();
        if let Err(err) = self.notifier.dispatch(notification) {
            warn!(template, error = %err, "notification dispatch failed");
        }
    }
}

fn admit_enrollment(
    tx: &mut dyn CapacityTransaction,
    request: &ValidatedEnrollment,
) -> Result<(Enrollment, CourseSettings), AdmissionError> {
    let course = tx
        .course(&request.course_id)?
        .ok_or_else(|| AdmissionError::CourseNotFound(request.course_id.clone()))?;

    if tx.enrollment(&request.user_id, &request.course_id)?.is_some() {
        return Err(AdmissionError::AlreadyEnrolled {
            user: request.user_id.clone(),
            course: request.course_id.clone(),
        });
    }
    if !course.enrollment_open {
        return Err(AdmissionError::EnrollmentClosed(request.course_id.clone()));
    }

    let counts = tx.enrollment_counts(&request.course_id)?;
    let region_quota = match &request.region {
        Some(region) => quota::resolve_quota(tx, &request.course_id, region)?,
        None => None,
    };

    let decision = CapacitySnapshot::new(&course, counts, region_quota.as_ref()).decide();
    let region_quota_id: Option<RegionQuotaId> = region_quota.as_ref().map(|quota| quota.id);

    // When only the course is full, a matched quota whose own waitlist is exhausted keeps
    // its counter at the limit.
    match (decision, region_quota.as_ref()) {
        (AdmissionDecision::Confirmed, Some(quota)) => {
            tx.increment_quota_confirmed(quota.id)?;
        }
        (AdmissionDecision::Waitlisted { .. }, Some(quota)) if quota.waitlist_has_room() => {
            tx.increment_quota_waitlist(quota.id)?;
        }
        _ => {}
    }

    let enrollment = tx.insert_enrollment(NewEnrollment {
        user_id: request.user_id.clone(),
        course_id: request.course_id.clone(),
        status: decision.status(),
        waitlist_position: decision.waitlist_position(),
        region_quota_id,
        eligibility_reason: decision.reason(),
        region: request.region.clone(),
    })?;

    Ok((enrollment, course))
}

fn admit_registration(
    tx: &mut dyn CapacityTransaction,
    request: &ValidatedRegistration,
    default_limit: u32,
) -> Result<(RegistrationReceipt, EventSettings), AdmissionError> {
    let event = tx
        .event(&request.event_id)?
        .ok_or_else(|| AdmissionError::EventNotFound(request.event_id.clone()))?;

    if tx.registration_by_cpf(&request.cpf)?.is_some() {
        return Err(AdmissionError::AlreadyRegistered);
    }
    if !event.registration_open {
        return Err(AdmissionError::RegistrationClosed(request.event_id.clone()));
    }

    let municipality = quota::resolve_or_create_municipality_limit(
        tx,
        &request.event_id,
        &request.municipality,
        &request.state,
        default_limit,
    )?;
    let admission = cohort::admit(tx, &municipality)?;

    let registration = tx.insert_registration(NewRegistration {
        event_id: request.event_id.clone(),
        cpf: request.cpf.clone(),
        full_name: request.full_name.clone(),
        email: request.email.clone(),
        municipality_limit_id: municipality.id,
        municipality_class_id: admission.class.id,
        batch_number: admission.class.class_number,
    })?;

    Ok((
        RegistrationReceipt {
            registration,
            municipality,
            admission,
        },
        event,
    ))
}

pub(crate) fn receipt_for(
    tx: &mut dyn CapacityTransaction,
    registration: Registration,
) -> Result<RegistrationReceipt, AdmissionError> {
    let class = tx
        .class(registration.municipality_class_id)?
        .ok_or_else(|| {
            StoreError::NotFound(format!(
                "municipality class {}",
                registration.municipality_class_id
            ))
        })?;
    let municipality = tx
        .municipality_limits(&registration.event_id)?
        .into_iter()
        .find(|limit| limit.id == registration.municipality_limit_id)
        .ok_or_else(|| {
            StoreError::NotFound(format!(
                "municipality limit {}",
                registration.municipality_limit_id
            ))
        })?;

    Ok(RegistrationReceipt {
        registration,
        municipality,
        admission: ClassAdmission {
            class,
            opened: None,
        },
    })
}

/// Error raised by the admission service.
#[derive(Debug, thiserror::Error)]
pub enum AdmissionError {
    #[error(transparent)]
    Intake(#[from] IntakeViolation),
    #[error("user {user} is already enrolled in course {course}")]
    AlreadyEnrolled { user: UserId, course: CourseId },
    #[error("cpf is already registered")]
    AlreadyRegistered,
    #[error("course {0} not found")]
    CourseNotFound(CourseId),
    #[error("event {0} not found")]
    EventNotFound(EventId),
    #[error("enrollment for course {0} is closed")]
    EnrollmentClosed(CourseId),
    #[error("registration for event {0} is closed")]
    RegistrationClosed(EventId),
    #[error("enrollment not found")]
    EnrollmentNotFound,
    #[error("registration not found")]
    RegistrationNotFound,
    #[error("region quota {0} not found")]
    QuotaNotFound(RegionQuotaId),
    #[error("only pending enrollments can be rejected, found {}", .0.label())]
    NotPending(EnrollmentStatus),
    #[error("registration is already cancelled")]
    AlreadyCancelled,
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl AdmissionError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AdmissionError::Intake(_) | AdmissionError::InvalidConfiguration(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AdmissionError::AlreadyEnrolled { .. }
            | AdmissionError::AlreadyRegistered
            | AdmissionError::NotPending(_)
            | AdmissionError::AlreadyCancelled => StatusCode::CONFLICT,
            AdmissionError::CourseNotFound(_)
            | AdmissionError::EventNotFound(_)
            | AdmissionError::EnrollmentNotFound
            | AdmissionError::RegistrationNotFound
            | AdmissionError::QuotaNotFound(_) => StatusCode::NOT_FOUND,
            AdmissionError::EnrollmentClosed(_) | AdmissionError::RegistrationClosed(_) => {
                StatusCode::FORBIDDEN
            }
            AdmissionError::Store(err) if err.is_transient() => StatusCode::SERVICE_UNAVAILABLE,
            AdmissionError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
