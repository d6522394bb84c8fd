use serde::{Deserialize, Serialize};

use super::super::domain::ChallengeStatus;
use super::super::facts::FactBundle;
use super::super::impact::CsaImpact;
use super::checks::{CheckOutcome, Confidence};
use super::config::{TriageConfig, TriageWeights};
use super::TimeContext;

/// Named components that sum to the priority score.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TriageBreakdown {
    pub violation_type_score: i32,
    pub evidence_score: i32,
    pub recency_score: i32,
    pub jurisdiction_score: i32,
    pub regulatory_impact_score: i32,
    pub error_prone_bonus: i32,
    pub flag_bonus: i32,
    pub penalty_deductions: i32,
    /// Severity weight times time weight; feeds the impact calculators, not the total.
    pub severity_points: u32,
}

impl TriageBreakdown {
    pub fn total(&self) -> i32 {
        self.violation_type_score
            + self.evidence_score
            + self.recency_score
            + self.jurisdiction_score
            + self.regulatory_impact_score
            + self.error_prone_bonus
            + self.flag_bonus
            + self.penalty_deductions
    }
}

pub(crate) struct ErrorProneCode {
    pub prefix: &'static str,
    pub boost: u8,
    pub reason: &'static str,
}

/// Regulation sections with historically elevated DataQ success.
pub(crate) const ERROR_PRONE_CODES: &[ErrorProneCode] = &[
    ErrorProneCode {
        prefix: "391.41",
        boost: 15,
        reason: "Medical certificate issues often involve clerical errors",
    },
    ErrorProneCode {
        prefix: "391.45",
        boost: 12,
        reason: "Medical examiner certification status can be verified",
    },
    ErrorProneCode {
        prefix: "395.8",
        boost: 18,
        reason: "ELD data can provide contradicting evidence",
    },
    ErrorProneCode {
        prefix: "395.3",
        boost: 15,
        reason: "Hours violations often involve complex calculations",
    },
    ErrorProneCode {
        prefix: "393.9",
        boost: 10,
        reason: "Inoperative equipment may have been fixed on scene",
    },
    ErrorProneCode {
        prefix: "393.45",
        boost: 12,
        reason: "Brake adjustment can be verified with documentation",
    },
    ErrorProneCode {
        prefix: "393.47",
        boost: 10,
        reason: "Brake tubing issues may be misidentified",
    },
    ErrorProneCode {
        prefix: "392.2",
        boost: 8,
        reason: "State or local law violations may not apply to a CMV",
    },
    ErrorProneCode {
        prefix: "392.16",
        boost: 10,
        reason: "Seat belt violations may have extenuating circumstances",
    },
];

/// Section prefix of a regulation code, e.g. `395.8(e)` becomes `395.8`.
pub(crate) fn code_prefix(code: &str) -> Option<String> {
    let mut parts = code.trim().split('.');
    let part = parts.next()?.trim();
    let section: String = parts
        .next()?
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    if part.is_empty() || section.is_empty() {
        return None;
    }
    Some(format!("{part}.{section}"))
}

pub(crate) fn error_prone_entry(code: Option<&str>) -> Option<&'static ErrorProneCode> {
    let prefix = code.and_then(code_prefix)?;
    ERROR_PRONE_CODES.iter().find(|entry| entry.prefix == prefix)
}

pub(crate) fn error_prone_boost(code: Option<&str>) -> u8 {
    error_prone_entry(code).map(|entry| entry.boost).unwrap_or(0)
}

pub(crate) fn score_breakdown(
    facts: &FactBundle,
    time: &TimeContext,
    checks: &[CheckOutcome],
    impact: &CsaImpact,
    config: &TriageConfig,
) -> TriageBreakdown {
    let weights = &config.weights;

    TriageBreakdown {
        violation_type_score: violation_type_score(facts, checks, weights),
        evidence_score: evidence_score(facts, weights),
        recency_score: recency_score(time.months_old, weights),
        jurisdiction_score: jurisdiction_score(facts, weights),
        regulatory_impact_score: regulatory_impact_score(impact, weights),
        error_prone_bonus: error_prone_bonus(facts, weights),
        flag_bonus: flag_bonus(checks, weights),
        penalty_deductions: penalty_deductions(facts, time, weights),
        severity_points: time.severity_points,
    }
}

fn violation_type_score(
    facts: &FactBundle,
    checks: &[CheckOutcome],
    weights: &TriageWeights,
) -> i32 {
    let from_checks = checks
        .iter()
        .filter(|check| check.flagged)
        .filter_map(|check| weights.check_scores.get(&check.kind).copied());
    let from_basic = weights.basic_scores.get(&facts.basic).copied();

    from_checks.chain(from_basic).max().unwrap_or(0)
}

fn evidence_score(facts: &FactBundle, weights: &TriageWeights) -> i32 {
    let required: Vec<_> = facts.evidence.iter().filter(|item| item.required).collect();
    let (obtained, total) = if required.is_empty() {
        (
            facts.evidence.iter().filter(|item| item.obtained).count(),
            facts.evidence.len(),
        )
    } else {
        (
            required.iter().filter(|item| item.obtained).count(),
            required.len(),
        )
    };

    let checklist = if total == 0 {
        0
    } else {
        ((obtained as f32 / total as f32) * weights.evidence_max as f32).round() as i32
    };
    let attached = i32::try_from(facts.document_count)
        .unwrap_or(i32::MAX)
        .saturating_mul(weights.points_per_document)
        .min(weights.document_cap);

    (checklist + attached).min(weights.evidence_max)
}

fn recency_score(months_old: u32, weights: &TriageWeights) -> i32 {
    weights
        .recency_bands
        .iter()
        .find(|band| months_old < band.under_months)
        .map(|band| band.score)
        .unwrap_or(0)
}

fn jurisdiction_score(facts: &FactBundle, weights: &TriageWeights) -> i32 {
    let Some(stats) = &facts.jurisdiction_stats else {
        return 0;
    };
    let raw = ((stats.approval_rate - weights.national_approval_rate) * weights.jurisdiction_scale)
        .round() as i32;
    raw.clamp(-weights.jurisdiction_cap, weights.jurisdiction_cap)
}

fn regulatory_impact_score(impact: &CsaImpact, weights: &TriageWeights) -> i32 {
    let change = impact.percentile_change.unwrap_or(0.0).max(0.0);
    let raw = impact.points_removed as f32 * weights.impact_points_factor
        + change * weights.impact_percentile_factor;
    let bonus = if impact.crosses_threshold {
        weights.impact_threshold_bonus
    } else {
        0
    };
    (raw.round() as i32 + bonus).min(weights.impact_cap)
}

fn error_prone_bonus(facts: &FactBundle, weights: &TriageWeights) -> i32 {
    let boost = error_prone_boost(facts.violation_code.as_deref());
    ((f32::from(boost) * weights.error_prone_factor).round() as i32).min(weights.error_prone_cap)
}

fn flag_bonus(checks: &[CheckOutcome], weights: &TriageWeights) -> i32 {
    let supporting: Vec<_> = checks
        .iter()
        .filter(|check| check.flagged && check.kind.supports_challenge())
        .collect();
    let high = supporting
        .iter()
        .filter(|check| check.confidence == Some(Confidence::High))
        .count() as i32;
    let raw = supporting.len() as i32 * weights.flag_per_check + high * weights.flag_per_high_confidence;
    raw.min(weights.flag_cap)
}

fn penalty_deductions(facts: &FactBundle, time: &TimeContext, weights: &TriageWeights) -> i32 {
    let mut penalty = 0;
    match facts.prior_challenge_status {
        Some(ChallengeStatus::Denied) => penalty += weights.prior_denial_penalty,
        Some(status) if status.is_active() => penalty += weights.active_challenge_penalty,
        _ => {}
    }
    if time.months_old > weights.late_window_months {
        penalty += weights.late_window_penalty;
    }
    penalty.max(weights.penalty_floor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_prefix_strips_paragraph_suffixes() {
        assert_eq!(code_prefix("395.8(e)").as_deref(), Some("395.8"));
        assert_eq!(code_prefix("392.2S").as_deref(), Some("392.2"));
        assert_eq!(code_prefix(" 393.75A ").as_deref(), Some("393.75"));
        assert_eq!(code_prefix("395"), None);
        assert_eq!(code_prefix(""), None);
    }

    #[test]
    fn error_prone_boost_matches_known_sections() {
        assert_eq!(error_prone_boost(Some("395.8(e)")), 18);
        assert_eq!(error_prone_boost(Some("391.41")), 15);
        assert_eq!(error_prone_boost(Some("392.16")), 10);
        assert_eq!(error_prone_boost(Some("999.1")), 0);
        assert_eq!(error_prone_boost(None), 0);
    }

    #[test]
    fn recency_bands_step_down_with_age() {
        let weights = TriageWeights::default();
        assert_eq!(recency_score(0, &weights), 15);
        assert_eq!(recency_score(6, &weights), 12);
        assert_eq!(recency_score(12, &weights), 8);
        assert_eq!(recency_score(18, &weights), 4);
        assert_eq!(recency_score(23, &weights), 1);
        assert_eq!(recency_score(24, &weights), 0);
    }
}
