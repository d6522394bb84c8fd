use chrono::Duration;
use serde::{Deserialize, Serialize};

use super::super::domain::{CourtOutcome, DriverEmployment};
use super::super::facts::{FactBundle, PeerViolation};
use super::config::TriageConfig;
use super::TimeContext;

/// Violation-level heuristics evaluated during a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    WrongCarrier,
    Duplicate,
    SeverityOutlier,
    CourtDismissal,
    NearingExpiry,
    ProceduralError,
    NonReportableCrash,
    PreventabilityReview,
    JurisdictionProcedural,
}

impl CheckKind {
    pub fn ordered() -> [CheckKind; 9] {
        [
            CheckKind::WrongCarrier,
            CheckKind::Duplicate,
            CheckKind::SeverityOutlier,
            CheckKind::CourtDismissal,
            CheckKind::NearingExpiry,
            CheckKind::ProceduralError,
            CheckKind::NonReportableCrash,
            CheckKind::PreventabilityReview,
            CheckKind::JurisdictionProcedural,
        ]
    }

    pub fn label(self) -> &'static str {
        match self {
            CheckKind::WrongCarrier => "Wrong Carrier",
            CheckKind::Duplicate => "Duplicate Violation",
            CheckKind::SeverityOutlier => "Severity Outlier",
            CheckKind::CourtDismissal => "Court Dismissal",
            CheckKind::NearingExpiry => "Nearing Expiry",
            CheckKind::ProceduralError => "Procedural Error",
            CheckKind::NonReportableCrash => "Non-Reportable Crash",
            CheckKind::PreventabilityReview => "Crash Preventability Review",
            CheckKind::JurisdictionProcedural => "Favorable Jurisdiction",
        }
    }

    /// Expiry is a timing signal, not grounds for a challenge.
    pub fn supports_challenge(self) -> bool {
        !matches!(self, CheckKind::NearingExpiry)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckOutcome {
    pub kind: CheckKind,
    pub label: String,
    pub flagged: bool,
    pub confidence: Option<Confidence>,
    pub reason: Option<String>,
}

impl CheckOutcome {
    fn clear(kind: CheckKind) -> Self {
        Self {
            kind,
            label: kind.label().to_string(),
            flagged: false,
            confidence: None,
            reason: None,
        }
    }

    fn flagged(kind: CheckKind, confidence: Confidence, reason: impl Into<String>) -> Self {
        Self {
            kind,
            label: kind.label().to_string(),
            flagged: true,
            confidence: Some(confidence),
            reason: Some(reason.into()),
        }
    }
}

pub(crate) fn evaluate(
    facts: &FactBundle,
    time: &TimeContext,
    config: &TriageConfig,
) -> Vec<CheckOutcome> {
    CheckKind::ordered()
        .into_iter()
        .map(|kind| match kind {
            CheckKind::WrongCarrier => wrong_carrier(facts),
            CheckKind::Duplicate => duplicate(facts),
            CheckKind::SeverityOutlier => severity_outlier(facts, config),
            CheckKind::CourtDismissal => court_dismissal(facts),
            CheckKind::NearingExpiry => nearing_expiry(time, config),
            CheckKind::ProceduralError => procedural_error(facts),
            CheckKind::NonReportableCrash => non_reportable_crash(facts),
            CheckKind::PreventabilityReview => preventability_review(facts),
            CheckKind::JurisdictionProcedural => jurisdiction_procedural(facts, config),
        })
        .collect()
}

fn wrong_carrier(facts: &FactBundle) -> CheckOutcome {
    let kind = CheckKind::WrongCarrier;
    if let (Some(ours), Some(recorded)) = (
        facts.company_dot.as_deref(),
        facts.inspection.carrier_dot.as_deref(),
    ) {
        if normalize(ours) != normalize(recorded) {
            return CheckOutcome::flagged(
                kind,
                Confidence::High,
                format!("Inspection lists USDOT {recorded}, carrier of record is {ours}"),
            );
        }
    }

    match facts.driver.as_ref().map(|driver| driver.employment) {
        Some(DriverEmployment::OwnerOperator) => CheckOutcome::flagged(
            kind,
            Confidence::Medium,
            "Driver is an owner-operator who may run under their own authority",
        ),
        Some(DriverEmployment::Leased) => CheckOutcome::flagged(
            kind,
            Confidence::Medium,
            "Driver is leased and the violation may belong to the lessor",
        ),
        _ => CheckOutcome::clear(kind),
    }
}

fn duplicate(facts: &FactBundle) -> CheckOutcome {
    let kind = CheckKind::Duplicate;
    let Some(code) = facts.violation_code.as_deref().map(normalize) else {
        return CheckOutcome::clear(kind);
    };

    let window = Duration::hours(24);
    let candidates: Vec<&PeerViolation> = facts
        .peers
        .iter()
        .filter(|peer| peer.violation_code.as_deref().map(normalize).as_deref() == Some(code.as_str()))
        .filter(|peer| peer.inspection_number != facts.inspection.inspection_number)
        .filter(|peer| (peer.violation_date - facts.violation_date).abs() <= window)
        .collect();

    let exact = candidates.iter().find(|peer| {
        let same_vehicle = matches!(
            (&peer.vehicle_id, &facts.vehicle_id),
            (Some(theirs), Some(ours)) if theirs == ours
        );
        same_vehicle || same_place(peer, facts)
    });

    match (exact, candidates.first()) {
        (Some(peer), _) => CheckOutcome::flagged(
            kind,
            Confidence::High,
            format!(
                "Same code cited on inspection {} within 24 hours",
                peer.inspection_number
            ),
        ),
        (None, Some(peer)) => CheckOutcome::flagged(
            kind,
            Confidence::Medium,
            format!(
                "Same code cited on inspection {} within 24 hours at a different location",
                peer.inspection_number
            ),
        ),
        (None, None) => CheckOutcome::clear(kind),
    }
}

fn same_place(peer: &PeerViolation, facts: &FactBundle) -> bool {
    let eq = |a: &Option<String>, b: &Option<String>| match (a, b) {
        (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
        _ => false,
    };
    eq(&peer.location.city, &facts.location.city) && eq(&peer.location.state, &facts.location.state)
}

fn severity_outlier(facts: &FactBundle, config: &TriageConfig) -> CheckOutcome {
    if facts.severity_weight >= config.weights.severity_outlier_weight {
        CheckOutcome::flagged(
            CheckKind::SeverityOutlier,
            Confidence::Medium,
            format!(
                "High severity weight ({}) carries significant regulatory impact",
                facts.severity_weight
            ),
        )
    } else {
        CheckOutcome::clear(CheckKind::SeverityOutlier)
    }
}

fn court_dismissal(facts: &FactBundle) -> CheckOutcome {
    let kind = CheckKind::CourtDismissal;
    match facts.court_outcome {
        Some(CourtOutcome::Dismissed) => CheckOutcome::flagged(
            kind,
            Confidence::High,
            "Citation was dismissed in court; the roadside record should follow",
        ),
        Some(CourtOutcome::Reduced) => CheckOutcome::flagged(
            kind,
            Confidence::Medium,
            "Citation was reduced in court",
        ),
        _ => CheckOutcome::clear(kind),
    }
}

fn nearing_expiry(time: &TimeContext, config: &TriageConfig) -> CheckOutcome {
    let kind = CheckKind::NearingExpiry;
    if time.months_until_expiry > config.expiry_window_months {
        return CheckOutcome::clear(kind);
    }
    let reason = if time.months_until_expiry == 0 {
        "Violation has aged out of the look-back window".to_string()
    } else {
        format!(
            "Violation ages out in {} month(s)",
            time.months_until_expiry
        )
    };
    CheckOutcome::flagged(kind, Confidence::High, reason)
}

fn procedural_error(facts: &FactBundle) -> CheckOutcome {
    let mut missing = Vec::new();
    if is_blank(facts.inspection.inspector_name.as_deref()) {
        missing.push("inspector name");
    }
    if is_blank(facts.inspection.inspector_badge.as_deref()) {
        missing.push("inspector badge");
    }
    if facts.inspection.level.is_none() {
        missing.push("inspection level");
    }

    if missing.is_empty() {
        return CheckOutcome::clear(CheckKind::ProceduralError);
    }
    let confidence = if missing.len() >= 2 {
        Confidence::Medium
    } else {
        Confidence::Low
    };
    CheckOutcome::flagged(
        CheckKind::ProceduralError,
        confidence,
        format!("Inspection report is missing {}", missing.join(", ")),
    )
}

fn crash_in_scope(facts: &FactBundle) -> bool {
    facts.crash_related || facts.basic == super::super::domain::Basic::CrashIndicator
}

fn non_reportable_crash(facts: &FactBundle) -> CheckOutcome {
    let kind = CheckKind::NonReportableCrash;
    match facts.crash {
        Some(crash) if crash_in_scope(facts) && !crash.is_recordable() => CheckOutcome::flagged(
            kind,
            Confidence::Medium,
            "Crash had no fatality, injury, or tow-away and does not meet the reportable definition",
        ),
        _ => CheckOutcome::clear(kind),
    }
}

fn preventability_review(facts: &FactBundle) -> CheckOutcome {
    let kind = CheckKind::PreventabilityReview;
    match facts.crash {
        Some(crash) if crash_in_scope(facts) && crash.crash_type.is_preventability_eligible() => {
            CheckOutcome::flagged(
                kind,
                Confidence::Low,
                "Crash type is eligible for a not-preventable determination",
            )
        }
        _ => CheckOutcome::clear(kind),
    }
}

fn jurisdiction_procedural(facts: &FactBundle, config: &TriageConfig) -> CheckOutcome {
    let kind = CheckKind::JurisdictionProcedural;
    match &facts.jurisdiction_stats {
        Some(stats) if stats.approval_rate >= config.weights.national_approval_rate => {
            CheckOutcome::flagged(
                kind,
                Confidence::Low,
                format!(
                    "{} approves {:.0}% of challenges (national average {:.0}%)",
                    stats.jurisdiction,
                    stats.approval_rate * 100.0,
                    config.weights.national_approval_rate * 100.0
                ),
            )
        }
        _ => CheckOutcome::clear(kind),
    }
}

fn normalize(value: &str) -> String {
    value.trim().to_ascii_uppercase()
}

fn is_blank(value: Option<&str>) -> bool {
    value.map(str::trim).map_or(true, str::is_empty)
}
