use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use enrollment::workflows::admission::{
    admission_router, AdmissionService, CapacityStore, NotificationDispatcher,
};
use enrollment::workflows::quota_import::quota_import_router;
use serde_json::json;
use std::sync::Arc;

pub(crate) fn with_service_routes<S, N>(service: Arc<AdmissionService<S, N>>) -> axum::Router
where
    S: CapacityStore + 'static,
    N: NotificationDispatcher + 'static,
{
    admission_router(service.clone())
        .merge(quota_import_router(service))
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::RecordingNotifier;
    use axum::body::Body;
    use axum::http::Request;
    use enrollment::config::AllocationConfig;
    use enrollment::workflows::admission::{CourseId, CourseSettings, InMemoryCapacityStore};
    use metrics_exporter_prometheus::PrometheusBuilder;
    use std::sync::atomic::AtomicBool;
    use tower::ServiceExt;

    fn app(ready: bool) -> (axum::Router, RecordingNotifier) {
        let notifier = RecordingNotifier::default();
        let service = Arc::new(AdmissionService::new(
            Arc::new(InMemoryCapacityStore::new()),
            Arc::new(notifier.clone()),
            AllocationConfig::default(),
        ));
        service
            .configure_course(CourseSettings {
                course_id: CourseId("rust-101".into()),
                title: "Rust 101".into(),
                max_enrollments: Some(10),
                waitlist_enabled: false,
                waitlist_limit: None,
                region_restriction_enabled: false,
                allow_all_regions: false,
                enrollment_open: true,
            })
            .expect("course configured");

        let state = AppState {
            readiness: Arc::new(AtomicBool::new(ready)),
            metrics: Arc::new(PrometheusBuilder::new().build_recorder().handle()),
        };
        let router = with_service_routes(service).layer(Extension(state));
        (router, notifier)
    }

    #[tokio::test]
    async fn readiness_reflects_listener_state() {
        let (router, _) = app(false);
        let response = router
            .oneshot(Request::get("/ready").body(Body::empty()).unwrap())
            .await
            .expect("route executes");
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let (router, _) = app(true);
        let response = router
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .expect("route executes");
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn enrollment_routes_are_mounted_and_notify() {
        let (router, notifier) = app(true);
        let response = router
            .oneshot(
                Request::post("/api/v1/courses/rust-101/enrollments")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"user_id":"dev-1"}"#))
                    .unwrap(),
            )
            .await
            .expect("route executes");

        assert_eq!(response.status(), StatusCode::CREATED);
        let sent = notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].recipient, "dev-1");
    }

    #[tokio::test]
    async fn quota_import_route_is_mounted() {
        let (router, _) = app(true);
        let response = router
            .oneshot(
                Request::post("/api/v1/admin/courses/rust-101/quotas/import")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        r#"{"csv":"state,city,limit,waitlist_limit\nCE,,4,\n"}"#,
                    ))
                    .unwrap(),
            )
            .await
            .expect("route executes");
        assert_eq!(response.status(), StatusCode::OK);
    }
}
