use super::common::*;
use chrono::Duration;

use crate::workflows::dataq::domain::{ChallengeStatus, Violation};
use crate::workflows::dataq::lifecycle::days_remaining;
use crate::workflows::dataq::portfolio::{
    batch_dashboard, health_check_summary, outcome_analytics, triage_accuracy,
};
use crate::workflows::dataq::triage::{ScanResult, TriageCategory, TriageEngine};
use crate::workflows::dataq::TriageConfig;

fn scan_result(priority_score: i32, category: TriageCategory) -> ScanResult {
    let mut result = TriageEngine::default()
        .score(&facts())
        .expect("fixture facts score");
    result.priority_score = priority_score;
    result.category = category;
    result
}

fn challenged(name: &str, status: ChallengeStatus) -> Violation {
    with_challenge(violation(name), status)
}

/// Three accepted, two denied, five pending; two of the pending carry future deadlines.
fn ten_challenges() -> Vec<Violation> {
    let mut records = Vec::new();
    for index in 0..3 {
        records.push(challenged(&format!("won-{index}"), ChallengeStatus::Accepted));
    }
    for index in 0..2 {
        records.push(challenged(&format!("lost-{index}"), ChallengeStatus::Denied));
    }
    for index in 0..5 {
        let mut record = challenged(&format!("open-{index}"), ChallengeStatus::Pending);
        if index < 2 {
            record
                .data_q_challenge
                .as_mut()
                .expect("challenge")
                .pending_response_deadline = Some(now() + Duration::days(7));
        }
        records.push(record);
    }
    records
}

#[test]
fn dashboard_counts_every_filed_challenge() {
    let mut records = ten_challenges();
    records.push(violation("never-filed"));

    let dashboard = batch_dashboard(&records, now());

    assert_eq!(dashboard.won, 3);
    assert_eq!(dashboard.lost, 2);
    assert_eq!(dashboard.active, 5);
    assert_eq!(dashboard.pending_response, 2);
    assert_eq!(dashboard.total_filed, 10);
    assert_eq!(dashboard.success_rate, 30);
}

#[test]
fn pending_response_counts_only_deadlines_still_ahead() {
    let with_deadline = |name: &str, offset: Duration| {
        let mut record = challenged(name, ChallengeStatus::UnderReview);
        if let Some(challenge) = record.data_q_challenge.as_mut() {
            challenge.pending_response_deadline = Some(now() + offset);
        }
        record
    };
    let records = vec![
        with_deadline("later-today", Duration::hours(6)),
        with_deadline("lapsed", -Duration::days(1)),
        challenged("no-deadline", ChallengeStatus::Pending),
    ];

    assert_eq!(days_remaining(&records[0], now()), Some(1));
    assert_eq!(days_remaining(&records[1], now()), Some(-1));
    assert_eq!(days_remaining(&records[2], now()), None);

    let dashboard = batch_dashboard(&records, now());
    assert_eq!(dashboard.active, 3);
    assert_eq!(dashboard.pending_response, 1);
}

#[test]
fn empty_portfolio_reports_zero_rates() {
    let dashboard = batch_dashboard(&[], now());
    assert_eq!(dashboard.total_filed, 0);
    assert_eq!(dashboard.success_rate, 0);

    let analytics = outcome_analytics(&[], 800.0);
    assert_eq!(analytics.success_rate, 0);
    assert_eq!(analytics.estimated_savings, 0);
}

#[test]
fn outcome_analytics_uses_resolved_challenges() {
    let analytics = outcome_analytics(&ten_challenges(), 800.0);

    assert_eq!(analytics.total_filed, 10);
    assert_eq!(analytics.won, 3);
    assert_eq!(analytics.lost, 2);
    assert_eq!(analytics.pending, 5);
    assert_eq!(analytics.success_rate, 60);
    assert_eq!(analytics.severity_points_removed, 21);
    assert_eq!(analytics.estimated_savings, 16_800);
}

#[test]
fn triage_accuracy_scores_predictions_against_outcomes() {
    let resolved = |name: &str, status: ChallengeStatus, score: i32| {
        let mut record = challenged(name, status);
        record.scan_results = Some(scan_result(score, TriageCategory::WorthChallenging));
        record
    };
    let records = vec![
        resolved("a-80", ChallengeStatus::Accepted, 80),
        resolved("a-45", ChallengeStatus::Accepted, 45),
        resolved("a-30", ChallengeStatus::Accepted, 30),
        resolved("d-70", ChallengeStatus::Denied, 70),
        resolved("d-20", ChallengeStatus::Denied, 20),
        challenged("a-unscanned", ChallengeStatus::Accepted),
        resolved("p-90", ChallengeStatus::Pending, 90),
    ];

    let accuracy = triage_accuracy(&records);

    assert_eq!(accuracy.total_resolved, 5);
    assert_eq!(accuracy.correct_predictions, 3);
    assert_eq!(accuracy.over_predicted, 1);
    assert_eq!(accuracy.under_predicted, 1);
    assert_eq!(accuracy.accuracy, 60);
}

#[test]
fn health_check_summarizes_scanned_violations_in_window() {
    let scanned = |name: &str, score: i32, category: TriageCategory| {
        let mut record = violation(name);
        record.scan_results = Some(scan_result(score, category));
        record
    };
    let mut stale = scanned("v-stale", 40, TriageCategory::Unlikely);
    if let Some(result) = stale.scan_results.as_mut() {
        result.stale = true;
        result.flags.clear();
        result.flag_count = 0;
    }
    let expired = aged(scanned("v-expired", 99, TriageCategory::EasyWin), 800);

    let records = vec![
        scanned("v-1", 90, TriageCategory::EasyWin),
        scanned("v-2", 80, TriageCategory::EasyWin),
        scanned("v-3", 60, TriageCategory::WorthChallenging),
        scanned("v-4", 55, TriageCategory::WorthChallenging),
        scanned("v-5", 52, TriageCategory::ExpiringSoon),
        scanned("v-6", 30, TriageCategory::Unlikely),
        stale,
        expired,
        violation("v-unscanned"),
    ];

    let lookback = TriageConfig::default().impact.lookback_months;
    let summary = health_check_summary(&records, now(), lookback);

    assert_eq!(summary.total_violations, 8);
    assert_eq!(summary.scanned_count, 7);
    assert_eq!(summary.stale_count, 1);
    assert_eq!(summary.actionable, 4);
    let easy = summary
        .categories
        .get(&TriageCategory::EasyWin)
        .expect("easy wins counted");
    assert_eq!(easy.count, 2);
    assert_eq!(easy.average_priority, 85);
    assert_eq!(
        summary
            .categories
            .get(&TriageCategory::Unlikely)
            .map(|stat| stat.count),
        Some(2)
    );
    assert_eq!(summary.total_estimated_savings, 4 * 36_100);
    assert_eq!(summary.total_points_removable, 4 * 21);

    let top: Vec<_> = summary
        .top_flagged
        .iter()
        .map(|entry| entry.violation_id.0.as_str())
        .collect();
    assert_eq!(top, vec!["v-1", "v-2", "v-3", "v-4", "v-5"]);
}

#[test]
fn aggregator_reads_company_records() {
    let (service, _, _) = build_service(ten_challenges());

    let dashboard = service.dashboard(&company(), now()).expect("dashboard");
    assert_eq!(dashboard.total_filed, 10);
    assert_eq!(dashboard.success_rate, 30);

    let analytics = service.outcome_analytics(&company()).expect("analytics");
    assert_eq!(analytics.success_rate, 60);

    let accuracy = service.triage_accuracy(&company()).expect("accuracy");
    assert_eq!(accuracy.total_resolved, 0);

    let health = service.health_check(&company(), now()).expect("health");
    assert_eq!(health.total_violations, 10);
    assert_eq!(health.scanned_count, 0);
}
