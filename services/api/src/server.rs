use crate::cli::ServeArgs;
use crate::infra::{AppState, LoggingNotifier};
use crate::routes::with_service_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use enrollment::config::AppConfig;
use enrollment::error::AppError;
use enrollment::telemetry;
use enrollment::workflows::admission::{AdmissionService, InMemoryCapacityStore};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let store = Arc::new(InMemoryCapacityStore::new());
    let notifier = Arc::new(LoggingNotifier);
    let admission_service = Arc::new(AdmissionService::new(store, notifier, config.allocation));

    let app = with_service_routes(admission_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        default_municipality_limit = config.allocation.default_municipality_limit,
        "enrollment capacity engine ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
