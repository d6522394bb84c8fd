//! Regulatory impact calculators: percentile movement, insurance ROI, and
//! natural time decay. All functions are pure and deterministic.

use serde::{Deserialize, Serialize};

use super::domain::Basic;
use super::facts::BasicStanding;
use super::triage::config::{ImpactConfig, RoiTable};

/// Time weight applied to a violation of the given age.
pub fn time_weight(months_old: u32, config: &ImpactConfig) -> u8 {
    if months_old >= config.lookback_months {
        0
    } else if months_old < config.recent_window_months {
        config.recent_time_weight
    } else {
        config.aging_time_weight
    }
}

/// Severity points currently contributed to the BASIC measure.
pub fn severity_points(severity_weight: u8, months_old: u32, config: &ImpactConfig) -> u32 {
    u32::from(severity_weight) * u32::from(time_weight(months_old, config))
}

/// Projected effect on the BASIC percentile if the violation is removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CsaImpact {
    pub basic: Basic,
    pub points_removed: u32,
    pub threshold: f32,
    pub current_percent: Option<f32>,
    pub projected_percent: Option<f32>,
    pub percentile_change: Option<f32>,
    pub crosses_threshold: bool,
}

pub fn percentile_impact(
    standing: &BasicStanding,
    points_removed: u32,
    config: &ImpactConfig,
) -> CsaImpact {
    let scale = config.percentile_per_point(standing.basic);
    let (projected, change, crosses) = match standing.current_percent {
        Some(current) => {
            let projected = (current - points_removed as f32 * scale).max(0.0);
            let crosses = current >= standing.threshold && projected < standing.threshold;
            (Some(projected), Some(current - projected), crosses)
        }
        None => (None, None, false),
    };

    CsaImpact {
        basic: standing.basic,
        points_removed,
        threshold: standing.threshold,
        current_percent: standing.current_percent,
        projected_percent: projected,
        percentile_change: change,
        crosses_threshold: crosses,
    }
}

/// Estimated annual insurance savings from removing the violation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoiEstimate {
    pub estimated_annual_savings: u32,
    pub savings_low: u32,
    pub savings_high: u32,
    pub points_removed: u32,
    pub percentile_change: f32,
    pub crosses_threshold: bool,
    /// BASIC threshold the removal drops below, if any.
    pub threshold_crossed: Option<f32>,
}

impl RoiEstimate {
    fn none(points_removed: u32) -> Self {
        Self {
            estimated_annual_savings: 0,
            savings_low: 0,
            savings_high: 0,
            points_removed,
            percentile_change: 0.0,
            crosses_threshold: false,
            threshold_crossed: None,
        }
    }
}

pub fn roi_estimate(impact: &CsaImpact, table: &RoiTable) -> RoiEstimate {
    let change = impact.percentile_change.unwrap_or(0.0).max(0.0);
    if change <= 0.0 {
        return RoiEstimate::none(impact.points_removed);
    }

    let bonus = if impact.crosses_threshold {
        table.threshold_bonus
    } else {
        0.0
    };
    let base = (change * table.savings_per_point + bonus).max(0.0);
    let dollars = |multiplier: f32| (base * multiplier).round().max(0.0) as u32;

    RoiEstimate {
        estimated_annual_savings: dollars(1.0),
        savings_low: dollars(table.low_multiplier),
        savings_high: dollars(table.high_multiplier),
        points_removed: impact.points_removed,
        percentile_change: change,
        crosses_threshold: impact.crosses_threshold,
        threshold_crossed: impact.crosses_threshold.then_some(impact.threshold),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecayHorizon {
    pub months_ahead: u32,
    pub time_weight: u8,
    pub remaining_points: u32,
    pub projected_percent: Option<f32>,
    pub below_threshold: bool,
}

/// How the violation's weight fades over the look-back window without a challenge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeDecay {
    pub months_old: u32,
    pub months_until_expiry: u32,
    pub current_time_weight: u8,
    pub current_points: u32,
    pub horizons: Vec<DecayHorizon>,
}

pub fn time_decay_projection(
    months_old: u32,
    severity_weight: u8,
    standing: &BasicStanding,
    config: &ImpactConfig,
) -> TimeDecay {
    let scale = config.percentile_per_point(standing.basic);
    let current_points = severity_points(severity_weight, months_old, config);

    let horizons = config
        .horizons_months
        .iter()
        .map(|&ahead| {
            let future_age = months_old.saturating_add(ahead);
            let remaining_points = severity_points(severity_weight, future_age, config);
            let shed = current_points.saturating_sub(remaining_points);
            let projected = standing
                .current_percent
                .map(|current| (current - shed as f32 * scale).max(0.0));
            let below_threshold = match (standing.current_percent, projected) {
                (Some(current), Some(projected)) => {
                    current >= standing.threshold && projected < standing.threshold
                }
                _ => false,
            };

            DecayHorizon {
                months_ahead: ahead,
                time_weight: time_weight(future_age, config),
                remaining_points,
                projected_percent: projected,
                below_threshold,
            }
        })
        .collect();

    TimeDecay {
        months_old,
        months_until_expiry: config.lookback_months.saturating_sub(months_old),
        current_time_weight: time_weight(months_old, config),
        current_points,
        horizons,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn standing(current: Option<f32>) -> BasicStanding {
        BasicStanding {
            basic: Basic::HoursOfService,
            current_percent: current,
            threshold: 65.0,
        }
    }

    #[test]
    fn time_weight_follows_lookback_schedule() {
        let config = ImpactConfig::default();
        assert_eq!(time_weight(0, &config), 3);
        assert_eq!(time_weight(11, &config), 3);
        assert_eq!(time_weight(12, &config), 2);
        assert_eq!(time_weight(23, &config), 2);
        assert_eq!(time_weight(24, &config), 0);
    }

    #[test]
    fn projected_percentile_never_goes_negative() {
        let config = ImpactConfig::default();
        let impact = percentile_impact(&standing(Some(10.0)), 30, &config);
        assert_eq!(impact.projected_percent, Some(0.0));
        assert_eq!(impact.percentile_change, Some(10.0));
        assert!(!impact.crosses_threshold);
    }

    #[test]
    fn missing_standing_yields_no_roi() {
        let config = ImpactConfig::default();
        let impact = percentile_impact(&standing(None), 21, &config);
        assert!(impact.current_percent.is_none());
        assert!(impact.projected_percent.is_none());

        let roi = roi_estimate(&impact, &RoiTable::default());
        assert_eq!(roi.estimated_annual_savings, 0);
        assert_eq!(roi.savings_high, 0);
        assert_eq!(roi.points_removed, 21);
        assert_eq!(roi.threshold_crossed, None);
    }
}
