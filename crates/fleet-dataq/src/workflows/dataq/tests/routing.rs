use super::common::*;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header::CONTENT_TYPE, Request, StatusCode},
    Json,
};
use chrono::{Duration, Utc};
use serde_json::json;
use tower::ServiceExt;

use crate::workflows::dataq::domain::{ChallengeStatus, ChallengeType, RdrType, RoundType};
use crate::workflows::dataq::lifecycle::{ChallengeSubmission, ResponseUpdate};
use crate::workflows::dataq::router::{self, DeadlineRequest, RoundRequest};
use crate::workflows::dataq::scan::ScanOptions;
use crate::workflows::dataq::{dataq_router, DataQService, TriageConfig};

fn submission() -> ChallengeSubmission {
    ChallengeSubmission {
        challenge_type: ChallengeType::DataError,
        rdr_type: Some(RdrType::InspectionViolationIncorrect),
        reason: Some("Logbook entries match ELD records".to_string()),
        response_deadline: None,
        state_review_submitted: false,
        actor: actor(),
    }
}

#[tokio::test]
async fn submit_handler_creates_challenge() {
    let (service, repository, _) = build_service([violation("v-1")]);

    let response = router::submit_handler::<MemoryViolationRepository, RecordingReminders>(
        State(Arc::new(service)),
        Path("v-1".to_string()),
        Json(submission()),
    )
    .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = read_json_body(response).await;
    assert_eq!(body["data_q_challenge"]["status"], "pending");
    assert_eq!(body["status"], "dispute_in_progress");
    assert!(repository.get("v-1").data_q_challenge.is_some());
}

#[tokio::test]
async fn duplicate_submission_conflicts() {
    let (service, _, _) = build_service([with_challenge(violation("v-1"), ChallengeStatus::Pending)]);

    let response = router::submit_handler::<MemoryViolationRepository, RecordingReminders>(
        State(Arc::new(service)),
        Path("v-1".to_string()),
        Json(submission()),
    )
    .await;

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = read_json_body(response).await;
    assert!(body["error"]
        .as_str()
        .expect("error message")
        .contains("already has a challenge"));
}

#[tokio::test]
async fn blank_reason_is_unprocessable() {
    let (service, _, _) = build_service([violation("v-1")]);
    let mut blank = submission();
    blank.reason = Some("   ".to_string());

    let response = router::submit_handler::<MemoryViolationRepository, RecordingReminders>(
        State(Arc::new(service)),
        Path("v-1".to_string()),
        Json(blank),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn unknown_violation_is_not_found() {
    let (service, _, _) = build_service([violation("v-1")]);

    let response = router::scan_violation_handler::<MemoryViolationRepository, RecordingReminders>(
        State(Arc::new(service)),
        Path("v-404".to_string()),
        Query(ScanOptions::default()),
    )
    .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn skipped_transition_is_a_conflict() {
    let (service, _, _) = build_service([with_challenge(violation("v-1"), ChallengeStatus::Pending)]);

    let response = router::response_handler::<MemoryViolationRepository, RecordingReminders>(
        State(Arc::new(service)),
        Path("v-1".to_string()),
        Json(ResponseUpdate {
            status: ChallengeStatus::Accepted,
            notes: None,
            actor: actor(),
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn round_without_denial_is_a_conflict() {
    let (service, _, _) = build_service([with_challenge(violation("v-1"), ChallengeStatus::Pending)]);

    let response = router::round_handler::<MemoryViolationRepository, RecordingReminders>(
        State(Arc::new(service)),
        Path("v-1".to_string()),
        Json(RoundRequest {
            round_type: RoundType::Reconsideration,
            actor: actor(),
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn repeated_write_conflicts_surface_as_conflict() {
    let inner = MemoryViolationRepository::seeded([violation("v-1")]);
    let service = DataQService::new(
        Arc::new(ContendedRepository::new(inner, 2)),
        Arc::new(RecordingReminders::default()),
        FleetFixture::standard().into_sources(),
        TriageConfig::default(),
    );

    let response = router::submit_handler::<ContendedRepository, RecordingReminders>(
        State(Arc::new(service)),
        Path("v-1".to_string()),
        Json(submission()),
    )
    .await;

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = read_json_body(response).await;
    assert!(body["error"]
        .as_str()
        .expect("error message")
        .contains("retry"));
}

#[tokio::test]
async fn repository_outage_is_an_internal_error() {
    let service = DataQService::new(
        Arc::new(UnavailableRepository),
        Arc::new(RecordingReminders::default()),
        FleetFixture::standard().into_sources(),
        TriageConfig::default(),
    );

    let response = router::dashboard_handler::<UnavailableRepository, RecordingReminders>(
        State(Arc::new(service)),
        Path(company().0),
    )
    .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = read_json_body(response).await;
    assert!(body["error"]
        .as_str()
        .expect("error message")
        .contains("database offline"));
}

#[tokio::test]
async fn deadline_handler_feeds_the_countdown_view() {
    let (service, _, _) = build_service([with_challenge(violation("v-1"), ChallengeStatus::Pending)]);
    let service = Arc::new(service);

    let response = router::deadline_handler::<MemoryViolationRepository, RecordingReminders>(
        State(service.clone()),
        Path("v-1".to_string()),
        Json(DeadlineRequest {
            deadline: Utc::now() + Duration::days(10) - Duration::minutes(5),
            actor: actor(),
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = router::challenge_handler::<MemoryViolationRepository, RecordingReminders>(
        State(service),
        Path("v-1".to_string()),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body["countdown"]["has_pending_deadline"], true);
    assert_eq!(body["countdown"]["days_remaining"], 10);
    assert_eq!(body["countdown"]["is_urgent"], false);
}

#[tokio::test]
async fn router_serves_challenge_workflow_over_http() {
    let (service, repository, _) = build_service([violation("v-1")]);
    let app = dataq_router(Arc::new(service));

    let payload = json!({
        "challenge_type": "data_error",
        "rdr_type": "INSPECTION_VIOLATION_INCORRECT",
        "reason": "Logbook entries match ELD records",
        "response_deadline": null,
        "actor": "safety-manager",
    });
    let response = app
        .clone()
        .oneshot(
            Request::post("/api/v1/violations/v-1/dataq")
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(payload.to_string()))
                .expect("request"),
        )
        .await
        .expect("router response");
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .oneshot(
            Request::get("/api/v1/companies/carrier-ridgeline/dataq/dashboard")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("router response");
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body["total_filed"], 1);
    assert_eq!(body["active"], 1);
    assert_eq!(body["success_rate"], 0);

    let stored = repository.get("v-1");
    assert_eq!(
        stored.data_q_challenge.map(|challenge| challenge.status),
        Some(ChallengeStatus::Pending)
    );
}

#[tokio::test]
async fn router_scans_with_force_query() {
    let (service, repository, _) = build_service([violation("v-1")]);
    let app = dataq_router(Arc::new(service));

    let response = app
        .oneshot(
            Request::post("/api/v1/companies/carrier-ridgeline/scan?force=true")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("router response");

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body["scanned"], 1);
    assert!(repository.get("v-1").scan_results.is_some());
}
