use crate::config::ScoringConfig;
use crate::models::{CapacityHealth, RiskBand, RiskComponents, SetupRecord, SignalsRecord};

/// Stateless calculator turning a sprint setup into risk and capacity signals.
#[derive(Debug, Clone, Default)]
pub struct SignalEngine {
    config: ScoringConfig,
}

/// Denominator used when computing a variance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variance {
    /// Divide by `n - 1`.
    Sample,
    /// Divide by `n`.
    Population,
}

impl SignalEngine {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Total over its input: missing history, an empty team or zero-length
    /// sprint all produce zero-valued signals instead of an error.
    pub fn compute(&self, setup: &SetupRecord) -> SignalsRecord {
        let cfg = &self.config;

        let sprint_days = non_negative(setup.sprint_days);
        let team_members = non_negative(setup.team_members);
        let leave_days = non_negative(setup.leave_days);
        let committed_sp = non_negative(setup.committed_sp);

        // A zero sprint means "no data", not zero delivered points.
        let velocities: Vec<f64> = [setup.v1, setup.v2, setup.v3]
            .into_iter()
            .map(non_negative)
            .filter(|v| *v > 0.0)
            .collect();

        let avg_velocity = mean(&velocities);
        let vol = coefficient_of_variation(&velocities, Variance::Sample);

        let ideal_person_days = bounded(sprint_days * team_members);
        let available_person_days = (ideal_person_days - leave_days).max(0.0);
        let availability_ratio = ratio(available_person_days, ideal_person_days);
        let capacity_sp = avg_velocity * availability_ratio;

        let overcommit_ratio = bounded(ratio(committed_sp, avg_velocity));
        let capacity_shortfall_ratio = bounded(ratio(committed_sp, capacity_sp));

        let components = RiskComponents {
            over: clamp(
                (overcommit_ratio - 1.0) * cfg.over_multiplier,
                0.0,
                cfg.over_cap,
            ),
            cap: clamp(
                (capacity_shortfall_ratio - 1.0) * cfg.capacity_multiplier,
                0.0,
                cfg.capacity_cap,
            ),
            vola: clamp(vol * cfg.volatility_multiplier, 0.0, cfg.volatility_cap),
        };
        let risk_score = clamp(components.over + components.cap + components.vola, 0.0, 100.0).round();

        let base_confidence = if committed_sp > 0.0 {
            capacity_sp / committed_sp * 100.0
        } else {
            0.0
        };
        let confidence = clamp(
            base_confidence - vol * cfg.confidence_volatility_scale,
            0.0,
            100.0,
        )
        .round();

        let risk_band = if risk_score <= cfg.low_band_max {
            RiskBand::Low
        } else if risk_score <= cfg.moderate_band_max {
            RiskBand::Moderate
        } else {
            RiskBand::High
        };

        let capacity_health = if committed_sp > 0.0 && capacity_sp > 0.0 {
            let coverage = capacity_sp / committed_sp;
            Some(if coverage >= cfg.healthy_ratio {
                CapacityHealth::Healthy
            } else if coverage >= cfg.at_risk_ratio {
                CapacityHealth::AtRisk
            } else {
                CapacityHealth::Critical
            })
        } else {
            None
        };

        SignalsRecord {
            sprint_days,
            team_members,
            leave_days,
            committed_sp,
            velocities,
            avg_velocity,
            vol,
            ideal_person_days,
            available_person_days,
            availability_ratio,
            capacity_sp,
            overcommit_ratio,
            capacity_shortfall_ratio,
            risk_score,
            confidence,
            risk_band,
            capacity_health,
            components,
        }
    }
}

/// Floors missing, negative and non-finite inputs at zero.
pub fn non_negative(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

pub fn clamp(value: f64, min: f64, max: f64) -> f64 {
    if value.is_nan() {
        return min;
    }
    value.max(min).min(max)
}

/// Keeps a non-negative result finite: NaN becomes `0` and overflow saturates
/// at `f64::MAX`.
pub fn bounded(value: f64) -> f64 {
    clamp(value, 0.0, f64::MAX)
}

pub fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

/// Running average, so values near `f64::MAX` cannot overflow a sum.
pub fn mean(values: &[f64]) -> f64 {
    values
        .iter()
        .enumerate()
        .fold(0.0, |m, (i, x)| m + (x - m) / (i + 1) as f64)
}

/// Standard deviation over mean; `0` with fewer than two points.
///
/// Values are divided by their largest magnitude first. The ratio is scale
/// free, and the squares then stay in `0..=1`.
pub fn coefficient_of_variation(values: &[f64], variance: Variance) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let scale = values.iter().fold(0.0f64, |acc, x| acc.max(x.abs()));
    if !scale.is_finite() || scale <= 0.0 {
        return 0.0;
    }
    let scaled: Vec<f64> = values.iter().map(|x| x / scale).collect();
    let m = mean(&scaled);
    if m <= 0.0 {
        return 0.0;
    }
    let squares: f64 = scaled.iter().map(|x| (x - m).powi(2)).sum();
    let denominator = match variance {
        Variance::Sample => values.len() - 1,
        Variance::Population => values.len(),
    };
    finite_or_zero((squares / denominator as f64).sqrt() / m)
}
