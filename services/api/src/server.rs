use crate::cli::ServeArgs;
use crate::infra::{demo_service, AppState};
use crate::routes::with_dataq_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use chrono::Utc;
use fleet_dataq::config::AppConfig;
use fleet_dataq::error::AppError;
use fleet_dataq::telemetry;
use fleet_dataq::workflows::dataq::DataQServiceError;
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

    let (service, _) =
        demo_service(config.triage.clone(), Utc::now()).map_err(DataQServiceError::from)?;

    let app = with_dataq_routes(Arc::new(service))
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "dataq triage service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
