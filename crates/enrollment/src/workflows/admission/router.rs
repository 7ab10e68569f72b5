use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;
use serde_json::json;

use super::admin::{MunicipalityLimitDraft, QuotaDraft, QuotaUpdate};
use super::domain::{
    CourseId, CourseSettings, EnrollmentRequest, EventId, EventSettings, RegionQuotaId,
    RegistrationRequest, UserId,
};
use super::notify::NotificationDispatcher;
use super::service::{AdmissionError, AdmissionService};
use super::store::CapacityStore;

/// Enrollment body posted to a course route; the course comes from the path.
#[derive(Debug, Clone, Deserialize)]
pub struct EnrollmentBody {
    pub user_id: UserId,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
}

/// Registration body posted to an event route; the event comes from the path.
#[derive(Debug, Clone, Deserialize)]
pub struct RegistrationBody {
    pub cpf: String,
    pub full_name: String,
    #[serde(default)]
    pub email: Option<String>,
    pub municipality: String,
    pub state: String,
}

/// Router builder exposing public admission endpoints and the admin surface.
pub fn admission_router<S, N>(service: Arc<AdmissionService<S, N>>) -> Router
where
    S: CapacityStore + 'static,
    N: NotificationDispatcher + 'static,
{
    Router::new()
        .route(
            "/api/v1/courses/:course_id/enrollments",
            post(enroll_handler::<S, N>),
        )
        .route(
            "/api/v1/courses/:course_id/enrollments/:user_id",
            get(enrollment_status_handler::<S, N>),
        )
        .route(
            "/api/v1/events/:event_id/registrations",
            post(register_handler::<S, N>),
        )
        .route(
            "/api/v1/registrations/:cpf",
            get(registration_status_handler::<S, N>),
        )
        .route(
            "/api/v1/admin/courses/:course_id",
            put(configure_course_handler::<S, N>).delete(delete_course_handler::<S, N>),
        )
        .route(
            "/api/v1/admin/courses/:course_id/quotas",
            post(add_quota_handler::<S, N>),
        )
        .route(
            "/api/v1/admin/quotas/:quota_id",
            put(update_quota_handler::<S, N>),
        )
        .route(
            "/api/v1/admin/courses/:course_id/enrollments/:user_id/reject",
            post(reject_enrollment_handler::<S, N>),
        )
        .route(
            "/api/v1/admin/courses/:course_id/roster",
            get(course_roster_handler::<S, N>),
        )
        .route(
            "/api/v1/admin/events/:event_id",
            put(configure_event_handler::<S, N>).delete(delete_event_handler::<S, N>),
        )
        .route(
            "/api/v1/admin/events/:event_id/municipalities",
            put(municipality_limit_handler::<S, N>),
        )
        .route(
            "/api/v1/admin/events/:event_id/roster",
            get(event_roster_handler::<S, N>),
        )
        .route(
            "/api/v1/admin/registrations/:cpf/cancel",
            post(cancel_registration_handler::<S, N>),
        )
        .with_state(service)
}

/// Maps an admission failure to its status code with an `{"error": ...}` body.
pub(crate) fn error_response(error: AdmissionError) -> Response {
    let status = error.status_code();
    let payload = json!({
        "error": error.to_string(),
    });
    (status, axum::Json(payload)).into_response()
}

pub(crate) async fn enroll_handler<S, N>(
    State(service): State<Arc<AdmissionService<S, N>>>,
    Path(course_id): Path<String>,
    axum::Json(body): axum::Json<EnrollmentBody>,
) -> Response
where
    S: CapacityStore + 'static,
    N: NotificationDispatcher + 'static,
{
    let request = EnrollmentRequest {
        course_id: CourseId(course_id),
        user_id: body.user_id,
        state: body.state,
        city: body.city,
    };

    match service.enroll(request) {
        Ok(enrollment) => {
            let view = enrollment.status_view();
            (StatusCode::CREATED, axum::Json(view)).into_response()
        }
        Err(AdmissionError::AlreadyEnrolled { user, course }) => {
            let payload = json!({
                "error": "already enrolled",
                "user_id": user,
                "course_id": course,
            });
            (StatusCode::CONFLICT, axum::Json(payload)).into_response()
        }
        Err(other) => error_response(other),
    }
}

pub(crate) async fn enrollment_status_handler<S, N>(
    State(service): State<Arc<AdmissionService<S, N>>>,
    Path((course_id, user_id)): Path<(String, String)>,
) -> Response
where
    S: CapacityStore + 'static,
    N: NotificationDispatcher + 'static,
{
    match service.enrollment(&CourseId(course_id), &UserId(user_id)) {
        Ok(enrollment) => (StatusCode::OK, axum::Json(enrollment.status_view())).into_response(),
        Err(other) => error_response(other),
    }
}

pub(crate) async fn register_handler<S, N>(
    State(service): State<Arc<AdmissionService<S, N>>>,
    Path(event_id): Path<String>,
    axum::Json(body): axum::Json<RegistrationBody>,
) -> Response
where
    S: CapacityStore + 'static,
    N: NotificationDispatcher + 'static,
{
    let request = RegistrationRequest {
        event_id: EventId(event_id),
        cpf: body.cpf,
        full_name: body.full_name,
        email: body.email,
        municipality: body.municipality,
        state: body.state,
    };

    match service.register(request) {
        Ok(receipt) => (StatusCode::CREATED, axum::Json(receipt.view())).into_response(),
        Err(other) => error_response(other),
    }
}

pub(crate) async fn registration_status_handler<S, N>(
    State(service): State<Arc<AdmissionService<S, N>>>,
    Path(cpf): Path<String>,
) -> Response
where
    S: CapacityStore + 'static,
    N: NotificationDispatcher + 'static,
{
    match service.registration(&cpf) {
        Ok(receipt) => (StatusCode::OK, axum::Json(receipt.view())).into_response(),
        Err(other) => error_response(other),
    }
}

async fn configure_course_handler<S, N>(
    State(service): State<Arc<AdmissionService<S, N>>>,
    Path(course_id): Path<String>,
    axum::Json(mut settings): axum::Json<CourseSettings>,
) -> Response
where
    S: CapacityStore + 'static,
    N: NotificationDispatcher + 'static,
{
    settings.course_id = CourseId(course_id);
    match service.configure_course(settings) {
        Ok(settings) => (StatusCode::OK, axum::Json(settings)).into_response(),
        Err(other) => error_response(other),
    }
}

async fn delete_course_handler<S, N>(
    State(service): State<Arc<AdmissionService<S, N>>>,
    Path(course_id): Path<String>,
) -> Response
where
    S: CapacityStore + 'static,
    N: NotificationDispatcher + 'static,
{
    match service.delete_course(&CourseId(course_id)) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(other) => error_response(other),
    }
}

async fn add_quota_handler<S, N>(
    State(service): State<Arc<AdmissionService<S, N>>>,
    Path(course_id): Path<String>,
    axum::Json(draft): axum::Json<QuotaDraft>,
) -> Response
where
    S: CapacityStore + 'static,
    N: NotificationDispatcher + 'static,
{
    match service.add_region_quota(&CourseId(course_id), draft) {
        Ok(quota) => (StatusCode::CREATED, axum::Json(quota)).into_response(),
        Err(other) => error_response(other),
    }
}

async fn update_quota_handler<S, N>(
    State(service): State<Arc<AdmissionService<S, N>>>,
    Path(quota_id): Path<u64>,
    axum::Json(update): axum::Json<QuotaUpdate>,
) -> Response
where
    S: CapacityStore + 'static,
    N: NotificationDispatcher + 'static,
{
    match service.update_region_quota(RegionQuotaId(quota_id), update) {
        Ok(quota) => (StatusCode::OK, axum::Json(quota)).into_response(),
        Err(other) => error_response(other),
    }
}

async fn reject_enrollment_handler<S, N>(
    State(service): State<Arc<AdmissionService<S, N>>>,
    Path((course_id, user_id)): Path<(String, String)>,
) -> Response
where
    S: CapacityStore + 'static,
    N: NotificationDispatcher + 'static,
{
    match service.reject_pending_enrollment(&UserId(user_id), &CourseId(course_id)) {
        Ok(enrollment) => (StatusCode::OK, axum::Json(enrollment.status_view())).into_response(),
        Err(other) => error_response(other),
    }
}

async fn course_roster_handler<S, N>(
    State(service): State<Arc<AdmissionService<S, N>>>,
    Path(course_id): Path<String>,
) -> Response
where
    S: CapacityStore + 'static,
    N: NotificationDispatcher + 'static,
{
    match service.course_roster(&CourseId(course_id)) {
        Ok(roster) => (StatusCode::OK, axum::Json(roster)).into_response(),
        Err(other) => error_response(other),
    }
}

async fn configure_event_handler<S, N>(
    State(service): State<Arc<AdmissionService<S, N>>>,
    Path(event_id): Path<String>,
    axum::Json(mut settings): axum::Json<EventSettings>,
) -> Response
where
    S: CapacityStore + 'static,
    N: NotificationDispatcher + 'static,
{
    settings.event_id = EventId(event_id);
    match service.configure_event(settings) {
        Ok(settings) => (StatusCode::OK, axum::Json(settings)).into_response(),
        Err(other) => error_response(other),
    }
}

async fn delete_event_handler<S, N>(
    State(service): State<Arc<AdmissionService<S, N>>>,
    Path(event_id): Path<String>,
) -> Response
where
    S: CapacityStore + 'static,
    N: NotificationDispatcher + 'static,
{
    match service.delete_event(&EventId(event_id)) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(other) => error_response(other),
    }
}

async fn municipality_limit_handler<S, N>(
    State(service): State<Arc<AdmissionService<S, N>>>,
    Path(event_id): Path<String>,
    axum::Json(draft): axum::Json<MunicipalityLimitDraft>,
) -> Response
where
    S: CapacityStore + 'static,
    N: NotificationDispatcher + 'static,
{
    match service.set_municipality_limit(&EventId(event_id), draft) {
        Ok(limit) => (StatusCode::OK, axum::Json(limit)).into_response(),
        Err(other) => error_response(other),
    }
}

async fn event_roster_handler<S, N>(
    State(service): State<Arc<AdmissionService<S, N>>>,
    Path(event_id): Path<String>,
) -> Response
where
    S: CapacityStore + 'static,
    N: NotificationDispatcher + 'static,
{
    match service.event_roster(&EventId(event_id)) {
        Ok(roster) => (StatusCode::OK, axum::Json(roster)).into_response(),
        Err(other) => error_response(other),
    }
}

async fn cancel_registration_handler<S, N>(
    State(service): State<Arc<AdmissionService<S, N>>>,
    Path(cpf): Path<String>,
) -> Response
where
    S: CapacityStore + 'static,
    N: NotificationDispatcher + 'static,
{
    match service.cancel_registration(&cpf) {
        Ok(registration) => {
            let payload = json!({
                "registration_id": registration.id,
                "status": registration.status.label(),
                "batch_number": registration.batch_number,
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(other) => error_response(other),
    }
}
