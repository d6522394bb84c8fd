use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::super::domain::Basic;
use super::checks::CheckKind;

/// Calibration for the triage engine, impact calculators, and lifecycle countdowns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriageConfig {
    pub easy_win_score: i32,
    pub worth_challenging_score: i32,
    pub not_recommended_floor: i32,
    pub expiry_window_months: u32,
    pub urgent_days: i64,
    pub scan_cooldown_hours: i64,
    pub weights: TriageWeights,
    pub impact: ImpactConfig,
    pub roi: RoiTable,
}

impl Default for TriageConfig {
    fn default() -> Self {
        Self {
            easy_win_score: 75,
            worth_challenging_score: 50,
            not_recommended_floor: 20,
            expiry_window_months: 6,
            urgent_days: 3,
            scan_cooldown_hours: 24,
            weights: TriageWeights::default(),
            impact: ImpactConfig::default(),
            roi: RoiTable::default(),
        }
    }
}

/// Upper age bound (exclusive) and the recency points awarded below it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RecencyBand {
    pub under_months: u32,
    pub score: i32,
}

/// Weights behind each `TriageBreakdown` component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriageWeights {
    pub check_scores: BTreeMap<CheckKind, i32>,
    pub basic_scores: BTreeMap<Basic, i32>,
    pub evidence_max: i32,
    pub points_per_document: i32,
    pub document_cap: i32,
    pub recency_bands: Vec<RecencyBand>,
    pub national_approval_rate: f32,
    pub jurisdiction_scale: f32,
    pub jurisdiction_cap: i32,
    pub impact_points_factor: f32,
    pub impact_percentile_factor: f32,
    pub impact_threshold_bonus: i32,
    pub impact_cap: i32,
    pub error_prone_factor: f32,
    pub error_prone_cap: i32,
    pub flag_per_check: i32,
    pub flag_per_high_confidence: i32,
    pub flag_cap: i32,
    pub severity_outlier_weight: u8,
    pub active_challenge_penalty: i32,
    pub prior_denial_penalty: i32,
    pub late_window_months: u32,
    pub late_window_penalty: i32,
    pub penalty_floor: i32,
}

impl Default for TriageWeights {
    fn default() -> Self {
        let check_scores = BTreeMap::from([
            (CheckKind::CourtDismissal, 30),
            (CheckKind::WrongCarrier, 28),
            (CheckKind::Duplicate, 28),
            (CheckKind::NonReportableCrash, 20),
            (CheckKind::PreventabilityReview, 12),
            (CheckKind::ProceduralError, 10),
        ]);
        let basic_scores = BTreeMap::from([
            (Basic::HoursOfService, 10),
            (Basic::DriverFitness, 8),
            (Basic::VehicleMaintenance, 5),
        ]);

        Self {
            check_scores,
            basic_scores,
            evidence_max: 15,
            points_per_document: 2,
            document_cap: 6,
            recency_bands: vec![
                RecencyBand { under_months: 6, score: 15 },
                RecencyBand { under_months: 12, score: 12 },
                RecencyBand { under_months: 18, score: 8 },
                RecencyBand { under_months: 21, score: 4 },
                RecencyBand { under_months: 24, score: 1 },
            ],
            national_approval_rate: 0.40,
            jurisdiction_scale: 75.0,
            jurisdiction_cap: 15,
            impact_points_factor: 2.0,
            impact_percentile_factor: 3.0,
            impact_threshold_bonus: 10,
            impact_cap: 25,
            error_prone_factor: 0.55,
            error_prone_cap: 10,
            flag_per_check: 3,
            flag_per_high_confidence: 2,
            flag_cap: 10,
            severity_outlier_weight: 7,
            active_challenge_penalty: -40,
            prior_denial_penalty: -25,
            late_window_months: 21,
            late_window_penalty: -5,
            penalty_floor: -40,
        }
    }
}

/// Look-back and time-weight schedule used by the impact calculators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactConfig {
    pub lookback_months: u32,
    pub recent_window_months: u32,
    pub recent_time_weight: u8,
    pub aging_time_weight: u8,
    pub horizons_months: Vec<u32>,
    pub percentile_per_point: BTreeMap<Basic, f32>,
}

impl ImpactConfig {
    pub fn percentile_per_point(&self, basic: Basic) -> f32 {
        self.percentile_per_point
            .get(&basic)
            .copied()
            .unwrap_or_else(|| basic.percentile_per_point())
    }
}

impl Default for ImpactConfig {
    fn default() -> Self {
        Self {
            lookback_months: 24,
            recent_window_months: 12,
            recent_time_weight: 3,
            aging_time_weight: 2,
            horizons_months: vec![6, 12, 18, 24],
            percentile_per_point: Basic::ordered()
                .into_iter()
                .map(|basic| (basic, basic.percentile_per_point()))
                .collect(),
        }
    }
}

/// Insurance savings calibration. The mid tier is the headline figure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoiTable {
    pub savings_per_point: f32,
    pub threshold_bonus: f32,
    pub low_multiplier: f32,
    pub high_multiplier: f32,
}

impl Default for RoiTable {
    fn default() -> Self {
        Self {
            savings_per_point: 800.0,
            threshold_bonus: 2_500.0,
            low_multiplier: 0.5,
            high_multiplier: 1.5,
        }
    }
}
