use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{months_between, Basic, ChallengeStatus, CompanyId, Violation, ViolationId};
use super::lifecycle::days_remaining;
use super::repository::{RepositoryError, ViolationFilter, ViolationRepository};
use super::triage::{TriageCategory, TriageConfig};

const PREDICTS_SUCCESS_SCORE: i32 = 60;
const PREDICTS_FAILURE_SCORE: i32 = 40;
const TOP_FLAGGED_LIMIT: usize = 5;

fn percent(part: usize, whole: usize) -> u32 {
    if whole == 0 {
        0
    } else {
        (part as f64 / whole as f64 * 100.0).round() as u32
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchDashboard {
    pub active: usize,
    pub pending_response: usize,
    pub won: usize,
    pub lost: usize,
    pub total_filed: usize,
    pub success_rate: u32,
}

/// Dashboard over every challenge ever filed. `success_rate` is won over total filed.
pub fn batch_dashboard(violations: &[Violation], now: DateTime<Utc>) -> BatchDashboard {
    let mut dashboard = BatchDashboard::default();

    for violation in violations {
        let Some(status) = violation.challenge_status() else {
            continue;
        };
        dashboard.total_filed += 1;

        if status.is_active() {
            dashboard.active += 1;
        }
        if days_remaining(violation, now).is_some_and(|days| days > 0) {
            dashboard.pending_response += 1;
        }
        match status {
            ChallengeStatus::Accepted => dashboard.won += 1,
            ChallengeStatus::Denied => dashboard.lost += 1,
            _ => {}
        }
    }

    dashboard.success_rate = percent(dashboard.won, dashboard.total_filed);
    dashboard
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeAnalytics {
    pub total_filed: usize,
    pub won: usize,
    pub lost: usize,
    pub pending: usize,
    /// Won over resolved (won plus lost), unlike the dashboard rate.
    pub success_rate: u32,
    pub severity_points_removed: u32,
    pub estimated_savings: u64,
}

pub fn outcome_analytics(violations: &[Violation], savings_per_point: f32) -> OutcomeAnalytics {
    let mut analytics = OutcomeAnalytics::default();

    for violation in violations {
        let Some(status) = violation.challenge_status() else {
            continue;
        };
        analytics.total_filed += 1;
        match status {
            ChallengeStatus::Accepted => {
                analytics.won += 1;
                analytics.severity_points_removed += u32::from(violation.severity_weight);
            }
            ChallengeStatus::Denied => analytics.lost += 1,
            ChallengeStatus::Pending | ChallengeStatus::UnderReview => analytics.pending += 1,
        }
    }

    analytics.success_rate = percent(analytics.won, analytics.won + analytics.lost);
    analytics.estimated_savings =
        (analytics.severity_points_removed as f32 * savings_per_point).round().max(0.0) as u64;
    analytics
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriageAccuracy {
    pub total_resolved: usize,
    pub correct_predictions: usize,
    pub accuracy: u32,
    pub over_predicted: usize,
    pub under_predicted: usize,
}

/// Compares stored priority scores with resolved outcomes. Scores in the 40-59 band count as correct.
pub fn triage_accuracy(violations: &[Violation]) -> TriageAccuracy {
    let mut accuracy = TriageAccuracy::default();

    for violation in violations {
        let accepted = match violation.challenge_status() {
            Some(ChallengeStatus::Accepted) => true,
            Some(ChallengeStatus::Denied) => false,
            _ => continue,
        };
        let Some(result) = &violation.scan_results else {
            continue;
        };
        accuracy.total_resolved += 1;

        let score = result.priority_score;
        if score >= PREDICTS_SUCCESS_SCORE {
            if accepted {
                accuracy.correct_predictions += 1;
            } else {
                accuracy.over_predicted += 1;
            }
        } else if score < PREDICTS_FAILURE_SCORE {
            if accepted {
                accuracy.under_predicted += 1;
            } else {
                accuracy.correct_predictions += 1;
            }
        } else {
            accuracy.correct_predictions += 1;
        }
    }

    accuracy.accuracy = percent(accuracy.correct_predictions, accuracy.total_resolved);
    accuracy
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryStat {
    pub count: usize,
    pub average_priority: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlaggedViolation {
    pub violation_id: ViolationId,
    pub violation_code: Option<String>,
    pub basic: Basic,
    pub category: TriageCategory,
    pub priority_score: i32,
    pub flag_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheckSummary {
    pub total_violations: usize,
    pub scanned_count: usize,
    pub stale_count: usize,
    pub categories: BTreeMap<TriageCategory, CategoryStat>,
    /// Violations in `easy_win` or `worth_challenging`.
    pub actionable: usize,
    pub total_estimated_savings: u64,
    pub total_points_removable: u64,
    pub top_flagged: Vec<FlaggedViolation>,
}

/// Scan health over violations still inside the look-back window.
pub fn health_check_summary(
    violations: &[Violation],
    now: DateTime<Utc>,
    lookback_months: u32,
) -> HealthCheckSummary {
    let mut summary = HealthCheckSummary::default();
    let mut priority_totals: BTreeMap<TriageCategory, i64> = BTreeMap::new();
    let mut flagged = Vec::new();

    for violation in violations
        .iter()
        .filter(|violation| months_between(violation.violation_date, now) < lookback_months)
    {
        summary.total_violations += 1;
        let Some(result) = &violation.scan_results else {
            continue;
        };
        summary.scanned_count += 1;
        if result.stale {
            summary.stale_count += 1;
        }

        summary.categories.entry(result.category).or_default().count += 1;
        *priority_totals.entry(result.category).or_insert(0) += i64::from(result.priority_score);

        let actionable = matches!(
            result.category,
            TriageCategory::EasyWin | TriageCategory::WorthChallenging
        );
        if actionable {
            summary.actionable += 1;
            if result.roi_estimate.estimated_annual_savings > 0 {
                summary.total_estimated_savings +=
                    u64::from(result.roi_estimate.estimated_annual_savings);
                summary.total_points_removable += u64::from(result.csa_impact.points_removed);
            }
        }

        if result.flag_count > 0 {
            flagged.push(FlaggedViolation {
                violation_id: violation.id.clone(),
                violation_code: violation.violation_code.clone(),
                basic: violation.basic,
                category: result.category,
                priority_score: result.priority_score,
                flag_count: result.flag_count,
            });
        }
    }

    for (category, stat) in summary.categories.iter_mut() {
        let total = priority_totals.get(category).copied().unwrap_or(0);
        stat.average_priority = (total as f64 / stat.count.max(1) as f64).round() as i32;
    }

    flagged.sort_by(|a, b| {
        b.priority_score
            .cmp(&a.priority_score)
            .then_with(|| a.violation_id.cmp(&b.violation_id))
    });
    flagged.truncate(TOP_FLAGGED_LIMIT);
    summary.top_flagged = flagged;

    summary
}

/// Read-only aggregation over a company's violations.
pub struct PortfolioAggregator<R> {
    repository: Arc<R>,
    config: Arc<TriageConfig>,
}

impl<R> PortfolioAggregator<R>
where
    R: ViolationRepository + 'static,
{
    pub fn new(repository: Arc<R>, config: Arc<TriageConfig>) -> Self {
        Self { repository, config }
    }

    fn records(
        &self,
        company: &CompanyId,
        filter: &ViolationFilter,
    ) -> Result<Vec<Violation>, RepositoryError> {
        Ok(self
            .repository
            .company_violations(company, filter)?
            .into_iter()
            .map(|stored| stored.record)
            .collect())
    }

    pub fn batch_dashboard(
        &self,
        company: &CompanyId,
        now: DateTime<Utc>,
    ) -> Result<BatchDashboard, RepositoryError> {
        let filed = self.records(company, &ViolationFilter::submitted())?;
        Ok(batch_dashboard(&filed, now))
    }

    pub fn outcome_analytics(&self, company: &CompanyId) -> Result<OutcomeAnalytics, RepositoryError> {
        let filed = self.records(company, &ViolationFilter::submitted())?;
        Ok(outcome_analytics(&filed, self.config.roi.savings_per_point))
    }

    pub fn triage_accuracy(&self, company: &CompanyId) -> Result<TriageAccuracy, RepositoryError> {
        let resolved = self.records(
            company,
            &ViolationFilter::with_statuses([ChallengeStatus::Accepted, ChallengeStatus::Denied]),
        )?;
        Ok(triage_accuracy(&resolved))
    }

    pub fn health_check_summary(
        &self,
        company: &CompanyId,
        now: DateTime<Utc>,
    ) -> Result<HealthCheckSummary, RepositoryError> {
        let all = self.records(company, &ViolationFilter::default())?;
        Ok(health_check_summary(&all, now, self.config.impact.lookback_months))
    }
}
