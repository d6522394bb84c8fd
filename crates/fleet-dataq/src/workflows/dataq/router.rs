use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::domain::{ActorId, CompanyId, DenialOptionId, RoundType, ViolationId};
use super::lifecycle::{ChallengeError, ChallengeSubmission, CourtOutcomeUpdate, ResponseUpdate};
use super::repository::{ReminderDispatcher, ViolationRepository};
use super::scan::{ScanError, ScanOptions};
use super::service::{DataQServiceError, DataQService};

type SharedService<R, D> = Arc<DataQService<R, D>>;

/// Router builder exposing scan, lifecycle, and portfolio endpoints.
pub fn dataq_router<R, D>(service: SharedService<R, D>) -> Router
where
    R: ViolationRepository + 'static,
    D: ReminderDispatcher + 'static,
{
    Router::new()
        .route(
            "/api/v1/companies/:company_id/scan",
            post(scan_company_handler::<R, D>),
        )
        .route(
            "/api/v1/companies/:company_id/health-check",
            get(health_check_handler::<R, D>),
        )
        .route(
            "/api/v1/companies/:company_id/dataq/dashboard",
            get(dashboard_handler::<R, D>),
        )
        .route(
            "/api/v1/companies/:company_id/dataq/active",
            get(active_handler::<R, D>),
        )
        .route(
            "/api/v1/companies/:company_id/dataq/deadlines",
            get(deadlines_handler::<R, D>),
        )
        .route(
            "/api/v1/companies/:company_id/dataq/analytics",
            get(analytics_handler::<R, D>),
        )
        .route(
            "/api/v1/violations/:violation_id/scan",
            post(scan_violation_handler::<R, D>),
        )
        .route(
            "/api/v1/violations/:violation_id/dataq",
            get(challenge_handler::<R, D>).post(submit_handler::<R, D>),
        )
        .route(
            "/api/v1/violations/:violation_id/dataq/status",
            post(response_handler::<R, D>),
        )
        .route(
            "/api/v1/violations/:violation_id/dataq/deadline",
            post(deadline_handler::<R, D>),
        )
        .route(
            "/api/v1/violations/:violation_id/dataq/denial-options",
            get(denial_options_handler::<R, D>),
        )
        .route(
            "/api/v1/violations/:violation_id/dataq/denial-response",
            post(denial_response_handler::<R, D>),
        )
        .route(
            "/api/v1/violations/:violation_id/dataq/rounds",
            post(round_handler::<R, D>),
        )
        .route(
            "/api/v1/violations/:violation_id/dataq/court-outcome",
            post(court_outcome_handler::<R, D>),
        )
        .route(
            "/api/v1/violations/:violation_id/dataq/close",
            post(close_handler::<R, D>),
        )
        .with_state(service)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadlineRequest {
    pub deadline: DateTime<Utc>,
    pub actor: ActorId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DenialSelectionRequest {
    pub option: DenialOptionId,
    pub actor: ActorId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundRequest {
    pub round_type: RoundType,
    pub actor: ActorId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloseRequest {
    pub actor: ActorId,
    pub notes: Option<String>,
}

/// Map a service error to a status code and a JSON body carrying the actionable message.
pub(crate) fn error_response(error: DataQServiceError) -> Response {
    let status = if error.is_not_found() {
        StatusCode::NOT_FOUND
    } else if error.is_invalid_input() {
        StatusCode::UNPROCESSABLE_ENTITY
    } else {
        match &error {
            DataQServiceError::Challenge(ChallengeError::PreconditionFailed { .. })
            | DataQServiceError::Challenge(ChallengeError::OptionUnavailable { .. }) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            DataQServiceError::Challenge(ChallengeError::InvalidTransition(_))
            | DataQServiceError::Challenge(ChallengeError::ConcurrentModification(_))
            | DataQServiceError::Scan(ScanError::ConcurrentModification(_)) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    };

    let payload = json!({
        "error": error.to_string(),
    });
    (status, Json(payload)).into_response()
}

fn respond<T: Serialize>(status: StatusCode, result: Result<T, DataQServiceError>) -> Response {
    match result {
        Ok(body) => (status, Json(body)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn scan_company_handler<R, D>(
    State(service): State<SharedService<R, D>>,
    Path(company_id): Path<String>,
    Query(options): Query<ScanOptions>,
) -> Response
where
    R: ViolationRepository + 'static,
    D: ReminderDispatcher + 'static,
{
    let company = CompanyId(company_id);
    respond(StatusCode::OK, service.scan_company(&company, options, Utc::now()))
}

pub(crate) async fn health_check_handler<R, D>(
    State(service): State<SharedService<R, D>>,
    Path(company_id): Path<String>,
) -> Response
where
    R: ViolationRepository + 'static,
    D: ReminderDispatcher + 'static,
{
    let company = CompanyId(company_id);
    respond(StatusCode::OK, service.health_check(&company, Utc::now()))
}

pub(crate) async fn dashboard_handler<R, D>(
    State(service): State<SharedService<R, D>>,
    Path(company_id): Path<String>,
) -> Response
where
    R: ViolationRepository + 'static,
    D: ReminderDispatcher + 'static,
{
    let company = CompanyId(company_id);
    respond(StatusCode::OK, service.dashboard(&company, Utc::now()))
}

pub(crate) async fn active_handler<R, D>(
    State(service): State<SharedService<R, D>>,
    Path(company_id): Path<String>,
) -> Response
where
    R: ViolationRepository + 'static,
    D: ReminderDispatcher + 'static,
{
    let company = CompanyId(company_id);
    respond(StatusCode::OK, service.active_challenges(&company, Utc::now()))
}

pub(crate) async fn deadlines_handler<R, D>(
    State(service): State<SharedService<R, D>>,
    Path(company_id): Path<String>,
) -> Response
where
    R: ViolationRepository + 'static,
    D: ReminderDispatcher + 'static,
{
    let company = CompanyId(company_id);
    respond(StatusCode::OK, service.pending_deadlines(&company, Utc::now()))
}

pub(crate) async fn analytics_handler<R, D>(
    State(service): State<SharedService<R, D>>,
    Path(company_id): Path<String>,
) -> Response
where
    R: ViolationRepository + 'static,
    D: ReminderDispatcher + 'static,
{
    let company = CompanyId(company_id);
    let analytics = service.outcome_analytics(&company).and_then(|outcomes| {
        let accuracy = service.triage_accuracy(&company)?;
        Ok(json!({
            "outcomes": outcomes,
            "triage_accuracy": accuracy,
        }))
    });
    respond(StatusCode::OK, analytics)
}

pub(crate) async fn scan_violation_handler<R, D>(
    State(service): State<SharedService<R, D>>,
    Path(violation_id): Path<String>,
    Query(options): Query<ScanOptions>,
) -> Response
where
    R: ViolationRepository + 'static,
    D: ReminderDispatcher + 'static,
{
    let id = ViolationId(violation_id);
    respond(StatusCode::OK, service.scan_violation(&id, options, Utc::now()))
}

pub(crate) async fn challenge_handler<R, D>(
    State(service): State<SharedService<R, D>>,
    Path(violation_id): Path<String>,
) -> Response
where
    R: ViolationRepository + 'static,
    D: ReminderDispatcher + 'static,
{
    let id = ViolationId(violation_id);
    let view = service.violation(&id).and_then(|violation| {
        let countdown = service.countdown(&id, Utc::now())?;
        Ok(json!({
            "violation_id": violation.id,
            "status": violation.status.label(),
            "data_q_challenge": violation.data_q_challenge,
            "countdown": countdown,
        }))
    });
    respond(StatusCode::OK, view)
}

pub(crate) async fn submit_handler<R, D>(
    State(service): State<SharedService<R, D>>,
    Path(violation_id): Path<String>,
    Json(submission): Json<ChallengeSubmission>,
) -> Response
where
    R: ViolationRepository + 'static,
    D: ReminderDispatcher + 'static,
{
    let id = ViolationId(violation_id);
    respond(
        StatusCode::CREATED,
        service.submit_challenge(&id, submission, Utc::now()),
    )
}

pub(crate) async fn response_handler<R, D>(
    State(service): State<SharedService<R, D>>,
    Path(violation_id): Path<String>,
    Json(update): Json<ResponseUpdate>,
) -> Response
where
    R: ViolationRepository + 'static,
    D: ReminderDispatcher + 'static,
{
    let id = ViolationId(violation_id);
    respond(StatusCode::OK, service.record_response(&id, update, Utc::now()))
}

pub(crate) async fn deadline_handler<R, D>(
    State(service): State<SharedService<R, D>>,
    Path(violation_id): Path<String>,
    Json(request): Json<DeadlineRequest>,
) -> Response
where
    R: ViolationRepository + 'static,
    D: ReminderDispatcher + 'static,
{
    let id = ViolationId(violation_id);
    respond(
        StatusCode::OK,
        service.set_response_deadline(&id, request.deadline, &request.actor, Utc::now()),
    )
}

pub(crate) async fn denial_options_handler<R, D>(
    State(service): State<SharedService<R, D>>,
    Path(violation_id): Path<String>,
) -> Response
where
    R: ViolationRepository + 'static,
    D: ReminderDispatcher + 'static,
{
    let id = ViolationId(violation_id);
    respond(StatusCode::OK, service.denial_options(&id))
}

pub(crate) async fn denial_response_handler<R, D>(
    State(service): State<SharedService<R, D>>,
    Path(violation_id): Path<String>,
    Json(request): Json<DenialSelectionRequest>,
) -> Response
where
    R: ViolationRepository + 'static,
    D: ReminderDispatcher + 'static,
{
    let id = ViolationId(violation_id);
    respond(
        StatusCode::OK,
        service.select_denial_option(&id, request.option, &request.actor, Utc::now()),
    )
}

pub(crate) async fn round_handler<R, D>(
    State(service): State<SharedService<R, D>>,
    Path(violation_id): Path<String>,
    Json(request): Json<RoundRequest>,
) -> Response
where
    R: ViolationRepository + 'static,
    D: ReminderDispatcher + 'static,
{
    let id = ViolationId(violation_id);
    respond(
        StatusCode::CREATED,
        service.initiate_round(&id, request.round_type, &request.actor, Utc::now()),
    )
}

pub(crate) async fn court_outcome_handler<R, D>(
    State(service): State<SharedService<R, D>>,
    Path(violation_id): Path<String>,
    Json(update): Json<CourtOutcomeUpdate>,
) -> Response
where
    R: ViolationRepository + 'static,
    D: ReminderDispatcher + 'static,
{
    let id = ViolationId(violation_id);
    respond(
        StatusCode::OK,
        service.record_court_outcome(&id, update, Utc::now()),
    )
}

pub(crate) async fn close_handler<R, D>(
    State(service): State<SharedService<R, D>>,
    Path(violation_id): Path<String>,
    Json(request): Json<CloseRequest>,
) -> Response
where
    R: ViolationRepository + 'static,
    D: ReminderDispatcher + 'static,
{
    let id = ViolationId(violation_id);
    respond(
        StatusCode::OK,
        service.close_challenge(&id, &request.actor, request.notes, Utc::now()),
    )
}
