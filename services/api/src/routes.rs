use crate::infra::AppState;
use axum::extract::Path;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Extension;
use axum::Json;
use chrono::Utc;
use fleet_dataq::error::AppError;
use fleet_dataq::workflows::dataq::{
    dataq_router, CompanyId, DataQService, ReminderDispatcher, ReminderSweep, ViolationRepository,
};
use serde_json::json;
use std::sync::Arc;

pub(crate) fn with_dataq_routes<R, D>(service: Arc<DataQService<R, D>>) -> axum::Router
where
    R: ViolationRepository + 'static,
    D: ReminderDispatcher + 'static,
{
    let sweep_service = service.clone();
    dataq_router(service)
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
        .route(
            "/api/v1/companies/:company_id/dataq/reminders",
            post(move |Path(company_id): Path<String>| {
                reminder_sweep_endpoint(sweep_service.clone(), company_id)
            }),
        )
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

/// Run the deadline reminder sweep for one carrier on demand.
pub(crate) async fn reminder_sweep_endpoint<R, D>(
    service: Arc<DataQService<R, D>>,
    company_id: String,
) -> Result<Json<ReminderSweep>, AppError>
where
    R: ViolationRepository + 'static,
    D: ReminderDispatcher + 'static,
{
    let sweep = service.send_deadline_reminders(&CompanyId(company_id), Utc::now())?;
    Ok(Json(sweep))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::{demo_service, DEMO_CARRIER};
    use fleet_dataq::workflows::dataq::TriageConfig;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use std::sync::atomic::AtomicBool;

    fn app_state(ready: bool) -> AppState {
        let recorder = PrometheusBuilder::new().build_recorder();
        AppState {
            readiness: Arc::new(AtomicBool::new(ready)),
            metrics: Arc::new(recorder.handle()),
        }
    }

    #[tokio::test]
    async fn healthcheck_reports_ok() {
        let Json(body) = healthcheck().await;
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn readiness_reflects_startup_flag() {
        let response = readiness_endpoint(Extension(app_state(false)))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let response = readiness_endpoint(Extension(app_state(true)))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn reminder_sweep_dispatches_urgent_demo_deadline() {
        let (service, reminders) =
            demo_service(TriageConfig::default(), Utc::now()).expect("demo portfolio seeds");

        let Json(sweep) = reminder_sweep_endpoint(Arc::new(service), DEMO_CARRIER.to_string())
            .await
            .expect("sweep runs");

        assert_eq!(sweep.checked, 1);
        assert_eq!(sweep.dispatched, 1);
        assert!(sweep.failed.is_empty());
        let sent = reminders.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].violation_id.0, "dv-lamps");
        assert_eq!(sent[0].template, "dataq_deadline_urgent");
    }

    #[tokio::test]
    async fn reminder_sweep_for_unknown_carrier_is_empty() {
        let (service, _) =
            demo_service(TriageConfig::default(), Utc::now()).expect("demo portfolio seeds");

        let Json(sweep) = reminder_sweep_endpoint(Arc::new(service), "carrier-unknown".to_string())
            .await
            .expect("sweep runs");

        assert_eq!(sweep, ReminderSweep::default());
    }
}
