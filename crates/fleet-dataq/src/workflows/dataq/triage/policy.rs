use serde::{Deserialize, Serialize};

use super::super::domain::{ChallengeStatus, ViolationStatus};
use super::super::facts::FactBundle;
use super::config::TriageConfig;
use super::TimeContext;

/// Triage bucket assigned to a scanned violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriageCategory {
    EasyWin,
    WorthChallenging,
    ExpiringSoon,
    Unlikely,
}

impl TriageCategory {
    pub fn ordered() -> [TriageCategory; 4] {
        [
            TriageCategory::EasyWin,
            TriageCategory::WorthChallenging,
            TriageCategory::ExpiringSoon,
            TriageCategory::Unlikely,
        ]
    }

    pub fn label(self) -> &'static str {
        match self {
            TriageCategory::EasyWin => "Easy Win",
            TriageCategory::WorthChallenging => "Worth Challenging",
            TriageCategory::ExpiringSoon => "Expiring Soon",
            TriageCategory::Unlikely => "Unlikely",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationAction {
    Strong,
    WorthTrying,
    Weak,
    NotRecommended,
}

impl RecommendationAction {
    pub fn label(self) -> &'static str {
        match self {
            RecommendationAction::Strong => "Strong Candidate",
            RecommendationAction::WorthTrying => "Worth Trying",
            RecommendationAction::Weak => "Weak Case",
            RecommendationAction::NotRecommended => "Not Recommended",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub action: RecommendationAction,
    pub label: String,
    pub reason: String,
}

/// Conditions that keep an otherwise high-scoring violation out of `easy_win`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Disqualifier {
    AlreadyAccepted,
    AlreadyCleared,
}

pub(crate) fn disqualifier(facts: &FactBundle) -> Option<Disqualifier> {
    if facts.prior_challenge_status == Some(ChallengeStatus::Accepted) {
        return Some(Disqualifier::AlreadyAccepted);
    }
    match facts.violation_status {
        ViolationStatus::Dismissed | ViolationStatus::Resolved => Some(Disqualifier::AlreadyCleared),
        _ => None,
    }
}

/// First matching rule wins; a disqualified easy-win candidate falls through to the next rule.
pub(crate) fn classify(
    score: i32,
    time: &TimeContext,
    disqualifier: Option<Disqualifier>,
    config: &TriageConfig,
) -> TriageCategory {
    if time.months_until_expiry <= config.expiry_window_months {
        TriageCategory::ExpiringSoon
    } else if score >= config.easy_win_score && disqualifier.is_none() {
        TriageCategory::EasyWin
    } else if score >= config.worth_challenging_score {
        TriageCategory::WorthChallenging
    } else {
        TriageCategory::Unlikely
    }
}

pub(crate) fn recommend(
    category: TriageCategory,
    score: i32,
    time: &TimeContext,
    disqualifier: Option<Disqualifier>,
    config: &TriageConfig,
) -> Recommendation {
    let (action, reason) = match category {
        TriageCategory::EasyWin => (
            RecommendationAction::Strong,
            format!("Priority score {score} with strong grounds; file promptly"),
        ),
        TriageCategory::WorthChallenging => {
            let reason = match disqualifier {
                Some(Disqualifier::AlreadyAccepted) => {
                    "A previous challenge was already accepted for this violation".to_string()
                }
                Some(Disqualifier::AlreadyCleared) => {
                    "Violation is already dismissed or resolved".to_string()
                }
                None => format!("Priority score {score}; a challenge has a reasonable chance"),
            };
            (RecommendationAction::WorthTrying, reason)
        }
        TriageCategory::ExpiringSoon if score >= config.not_recommended_floor => (
            RecommendationAction::Weak,
            format!(
                "Ages out of the look-back window in {} month(s); natural decay may beat a challenge",
                time.months_until_expiry
            ),
        ),
        TriageCategory::Unlikely if score >= config.not_recommended_floor => (
            RecommendationAction::Weak,
            format!("Priority score {score}; limited grounds for a challenge"),
        ),
        TriageCategory::ExpiringSoon | TriageCategory::Unlikely => (
            RecommendationAction::NotRecommended,
            format!(
                "Priority score {score} is below {}; challenging is unlikely to pay off",
                config.not_recommended_floor
            ),
        ),
    };

    Recommendation {
        action,
        label: action.label().to_string(),
        reason,
    }
}
