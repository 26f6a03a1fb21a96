use crate::cli::ServeArgs;
use crate::infra::{AppState, InMemoryDocumentStore, InMemoryTrainingStore, LogNotificationSink};
use crate::routes::base_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

use traincert::config::AppConfig;
use traincert::error::AppError;
use traincert::telemetry;
use traincert::workflows::training::certification::{
    certification_router, CertificateHistoryService, CertificationRoutes, CertificationService,
    ExpirySweep,
};
use traincert::workflows::training::gateway::PlaceholderRenderer;
use traincert::workflows::training::progress::ProgressSweep;
use traincert::workflows::training::scheduling::{schedule_router, ScheduleService};

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
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let store = Arc::new(InMemoryTrainingStore::default());
    let documents = Arc::new(InMemoryDocumentStore::default());
    let notifications = Arc::new(LogNotificationSink::default());

    let schedule_service = Arc::new(ScheduleService::new(store.clone()));
    let certification_routes = Arc::new(CertificationRoutes {
        certification: CertificationService::new(
            store.clone(),
            documents,
            notifications.clone(),
            Arc::new(PlaceholderRenderer),
        ),
        history: CertificateHistoryService::new(store.clone()),
    });

    let sweep_cancel = Arc::new(AtomicBool::new(false));
    let progress_sweep = ProgressSweep::new(store.clone(), config.sweeps.progress_interval());
    let expiry_sweep = ExpirySweep::new(
        store.clone(),
        notifications,
        config.sweeps.expiry_interval(),
    );
    tokio::spawn({
        let cancel = sweep_cancel.clone();
        async move { progress_sweep.run(cancel).await }
    });
    tokio::spawn({
        let cancel = sweep_cancel.clone();
        async move { expiry_sweep.run(cancel).await }
    });

    let app = base_routes(store)
        .merge(schedule_router(schedule_service))
        .merge(certification_router(certification_routes))
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "training certification service ready");

    let served = axum::serve(listener, app).await;
    sweep_cancel.store(true, Ordering::Release);
    served?;
    Ok(())
}
