mod checks;
pub mod config;
mod policy;
mod rules;

pub use checks::{CheckKind, CheckOutcome, Confidence};
pub use config::{ImpactConfig, RecencyBand, RoiTable, TriageConfig, TriageWeights};
pub use policy::{Recommendation, RecommendationAction, TriageCategory};
pub use rules::TriageBreakdown;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{months_between, ViolationId};
use super::facts::FactBundle;
use super::impact::{self, CsaImpact, RoiEstimate, TimeDecay};

/// Bumped whenever scoring semantics change so stale stored results can be told apart.
pub const SCAN_VERSION: u32 = 2;

const MAX_SEVERITY_WEIGHT: u8 = 10;

#[derive(Debug, thiserror::Error)]
pub enum TriageError {
    #[error("invalid input for {field}: {reason}")]
    InvalidInput { field: &'static str, reason: String },
}

/// Age of the violation relative to the scan instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TimeContext {
    pub months_old: u32,
    pub months_until_expiry: u32,
    pub severity_points: u32,
}

/// Flagged check surfaced on the scan result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriageFlag {
    pub kind: CheckKind,
    pub label: String,
    pub confidence: Confidence,
    pub reason: String,
}

/// Output of a triage pass, persisted on the violation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    pub violation_id: ViolationId,
    pub scanned_at: DateTime<Utc>,
    pub scan_version: u32,
    pub priority_score: i32,
    pub category: TriageCategory,
    pub flag_count: usize,
    pub flags: Vec<TriageFlag>,
    pub checks: Vec<CheckOutcome>,
    pub triage_breakdown: TriageBreakdown,
    /// Why the violation code earned an error-prone bonus, when it did.
    pub error_prone_reason: Option<String>,
    pub csa_impact: CsaImpact,
    pub roi_estimate: RoiEstimate,
    pub time_decay: TimeDecay,
    pub recommendation: Recommendation,
    /// Set when the stored result could not be refreshed on the latest scan.
    #[serde(default)]
    pub stale: bool,
}

/// Stateless scorer that applies the triage configuration to a fact bundle.
#[derive(Debug, Clone, Default)]
pub struct TriageEngine {
    config: TriageConfig,
}

impl TriageEngine {
    pub fn new(config: TriageConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TriageConfig {
        &self.config
    }

    /// Score a fact bundle. Identical bundles produce identical results.
    pub fn score(&self, facts: &FactBundle) -> Result<ScanResult, TriageError> {
        validate(facts)?;

        let impact_config = &self.config.impact;
        let months_old = months_between(facts.violation_date, facts.as_of);
        let time = TimeContext {
            months_old,
            months_until_expiry: impact_config.lookback_months.saturating_sub(months_old),
            severity_points: impact::severity_points(facts.severity_weight, months_old, impact_config),
        };

        let checks = checks::evaluate(facts, &time, &self.config);
        let csa_impact =
            impact::percentile_impact(&facts.standing, time.severity_points, impact_config);
        let triage_breakdown = rules::score_breakdown(facts, &time, &checks, &csa_impact, &self.config);
        let priority_score = triage_breakdown.total();

        let disqualifier = policy::disqualifier(facts);
        let category = policy::classify(priority_score, &time, disqualifier, &self.config);
        let recommendation =
            policy::recommend(category, priority_score, &time, disqualifier, &self.config);

        let roi_estimate = impact::roi_estimate(&csa_impact, &self.config.roi);
        let time_decay = impact::time_decay_projection(
            months_old,
            facts.severity_weight,
            &facts.standing,
            impact_config,
        );

        let flags: Vec<TriageFlag> = checks
            .iter()
            .filter(|check| check.flagged)
            .map(|check| TriageFlag {
                kind: check.kind,
                label: check.label.clone(),
                confidence: check.confidence.unwrap_or(Confidence::Low),
                reason: check.reason.clone().unwrap_or_default(),
            })
            .collect();

        Ok(ScanResult {
            violation_id: facts.violation_id.clone(),
            scanned_at: facts.as_of,
            scan_version: SCAN_VERSION,
            priority_score,
            category,
            flag_count: flags.len(),
            flags,
            checks,
            triage_breakdown,
            error_prone_reason: rules::error_prone_entry(facts.violation_code.as_deref())
                .map(|entry| entry.reason.to_string()),
            csa_impact,
            roi_estimate,
            time_decay,
            recommendation,
            stale: false,
        })
    }
}

fn validate(facts: &FactBundle) -> Result<(), TriageError> {
    match facts.violation_code.as_deref().map(str::trim) {
        None | Some("") => {
            return Err(TriageError::InvalidInput {
                field: "violation_code",
                reason: "violation code is required".to_string(),
            })
        }
        Some(_) => {}
    }
    if facts.severity_weight > MAX_SEVERITY_WEIGHT {
        return Err(TriageError::InvalidInput {
            field: "severity_weight",
            reason: format!(
                "severity weight {} exceeds {MAX_SEVERITY_WEIGHT}",
                facts.severity_weight
            ),
        });
    }
    Ok(())
}
