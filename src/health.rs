use crate::models::{Snapshot, SprintMode, Trend};
use crate::signals::{coefficient_of_variation, Variance};

/// Number of consecutive most-recent snapshots that were overcommitted.
pub fn overcommit_streak(history: &[Snapshot]) -> usize {
    history
        .iter()
        .rev()
        .take_while(|s| s.overcommit_ratio > 1.01)
        .count()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Predictability {
    High,
    Medium,
    Low,
}

impl Predictability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Predictability::High => "High",
            Predictability::Medium => "Medium",
            Predictability::Low => "Low",
        }
    }

    pub fn hint(&self) -> &'static str {
        match self {
            Predictability::High => "Velocity is consistent (low volatility).",
            Predictability::Medium => "Some volatility. Slicing and WIP control help.",
            Predictability::Low => "High volatility. Predictability will suffer.",
        }
    }
}

/// Velocity consistency over the last five snapshots; `None` below two data points.
pub fn predictability(history: &[Snapshot]) -> Option<Predictability> {
    let start = history.len().saturating_sub(5);
    let velocities: Vec<f64> = history[start..]
        .iter()
        .map(|s| s.avg_velocity)
        .filter(|v| *v > 0.0)
        .collect();
    if velocities.len() < 2 {
        return None;
    }
    let cv = coefficient_of_variation(&velocities, Variance::Population);
    Some(if cv <= 0.10 {
        Predictability::High
    } else if cv <= 0.25 {
        Predictability::Medium
    } else {
        Predictability::Low
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StabilityLabel {
    Stable,
    Watch,
    Fragile,
}

impl StabilityLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            StabilityLabel::Stable => "Stable",
            StabilityLabel::Watch => "Watch",
            StabilityLabel::Fragile => "Fragile",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StabilityIndex {
    pub percent: u8,
    pub label: StabilityLabel,
}

/// Blend of current risk, risk direction, overcommit and confidence.
pub fn stability_index(history: &[Snapshot]) -> Option<StabilityIndex> {
    let last = history.last()?;
    let previous = history.len().checked_sub(2).map(|i| &history[i]);

    let trend_score = match previous.map(|p| Trend::between(p.risk_score, last.risk_score)) {
        Some(Trend::Up) => 0.2,
        Some(Trend::Down) => 0.8,
        _ => 0.5,
    };
    let over_score = if last.overcommit_ratio <= 1.0 {
        1.0
    } else if last.overcommit_ratio <= 1.15 {
        0.6
    } else {
        0.2
    };

    let index = 0.45 * unit(1.0 - last.risk_score / 100.0)
        + 0.25 * trend_score
        + 0.20 * over_score
        + 0.10 * unit(last.confidence / 100.0);
    let percent = (index * 100.0).round().clamp(0.0, 100.0) as u8;

    let label = if percent < 45 {
        StabilityLabel::Fragile
    } else if percent < 70 {
        StabilityLabel::Watch
    } else {
        StabilityLabel::Stable
    };
    Some(StabilityIndex { percent, label })
}

fn unit(x: f64) -> f64 {
    if x.is_finite() {
        x.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

fn mode_label(mode: SprintMode) -> &'static str {
    match mode {
        SprintMode::Stable => "Stable",
        SprintMode::Watch => "Watch",
        SprintMode::Rescue => "Rescue",
    }
}

fn arrow(trend: Trend, higher_is_better: bool) -> &'static str {
    match (trend, higher_is_better) {
        (Trend::Flat, _) => "—",
        (Trend::Up, true) | (Trend::Down, false) => "▲",
        (Trend::Down, true) | (Trend::Up, false) => "▼",
    }
}

/// Plain-language explanation of the latest snapshot and its movement.
pub fn narrative(history: &[Snapshot]) -> Vec<String> {
    let Some(last) = history.last() else {
        return vec![
            "No snapshots yet. Save a snapshot to start tracking sprint health.".to_string(),
        ];
    };
    let previous = history.len().checked_sub(2).map(|i| &history[i]);
    let mut lines = Vec::new();

    lines.push(format!(
        "Current sprint posture: {} with risk {}/100 and confidence {}%.",
        mode_label(last.mode),
        last.risk_score,
        last.confidence
    ));

    if last.overcommit_ratio > 1.01 {
        let pct_over = ((last.overcommit_ratio - 1.0) * 100.0).round();
        lines.push(format!(
            "Commitment is above capacity by approximately {pct_over}%. This is a scope signal, not an individual performance issue."
        ));
    } else if last.capacity_sp > 0.0 && last.committed_sp > 0.0 {
        lines.push(
            "Commitment is broadly aligned with capacity, which supports predictability.".to_string(),
        );
    } else {
        lines.push("Add committed points and velocities to the setup for a fuller picture.".to_string());
    }

    if let Some(prev) = previous {
        let risk = Trend::between(prev.risk_score, last.risk_score);
        let capacity = Trend::between(prev.capacity_sp, last.capacity_sp);
        let committed = Trend::between(prev.committed_sp, last.committed_sp);
        lines.push(format!(
            "Trend vs previous snapshot: Risk {}, Capacity {}, Commitment {}.",
            arrow(risk, false),
            arrow(capacity, true),
            arrow(committed, true)
        ));

        let capacity_delta = ((last.capacity_sp - prev.capacity_sp) * 10.0).round() / 10.0;
        let committed_delta = ((last.committed_sp - prev.committed_sp) * 10.0).round() / 10.0;
        if capacity_delta.abs() >= 5.0 || committed_delta.abs() >= 5.0 {
            lines.push(format!(
                "Key movement: capacity changed by {capacity_delta} SP and commitment changed by {committed_delta} SP."
            ));
        }
    }

    let stance = if last.risk_score >= 70.0 {
        "protect the sprint goal, de-scope early, and run daily unblock checkpoints."
    } else if last.risk_score >= 40.0 {
        "run a Day-3 checkpoint and keep WIP low to protect predictability."
    } else {
        "maintain flow discipline and keep scope changes visible and explicit."
    };
    lines.push(format!("Recommended stance: {stance}"));
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(risk: f64, confidence: f64, over: f64, velocity: f64, committed: f64, capacity: f64) -> Snapshot {
        Snapshot {
            sprint_id: "SPRINT_20260105_0930".to_string(),
            timestamp: 0,
            risk_score: risk,
            confidence,
            overcommit_ratio: over,
            avg_velocity: velocity,
            committed_sp: committed,
            capacity_sp: capacity,
            mode: SprintMode::Stable,
        }
    }

    #[test]
    fn streak_counts_trailing_overcommits() {
        let history = vec![
            snap(50.0, 60.0, 1.3, 40.0, 52.0, 40.0),
            snap(20.0, 80.0, 0.9, 40.0, 36.0, 40.0),
            snap(40.0, 70.0, 1.2, 40.0, 48.0, 40.0),
            snap(45.0, 65.0, 1.05, 40.0, 42.0, 40.0),
        ];
        assert_eq!(overcommit_streak(&history), 2);
        assert_eq!(overcommit_streak(&[]), 0);
    }

    #[test]
    fn predictability_needs_two_velocities() {
        assert_eq!(predictability(&[snap(0.0, 0.0, 0.0, 40.0, 0.0, 0.0)]), None);
        let steady = vec![
            snap(0.0, 0.0, 0.0, 40.0, 0.0, 0.0),
            snap(0.0, 0.0, 0.0, 0.0, 0.0, 0.0),
            snap(0.0, 0.0, 0.0, 42.0, 0.0, 0.0),
        ];
        assert_eq!(predictability(&steady), Some(Predictability::High));
    }

    #[test]
    fn predictability_only_looks_at_last_five() {
        let mut history = vec![snap(0.0, 0.0, 0.0, 5.0, 0.0, 0.0); 3];
        history.extend(vec![snap(0.0, 0.0, 0.0, 30.0, 0.0, 0.0); 2]);
        history.extend(vec![snap(0.0, 0.0, 0.0, 40.0, 0.0, 0.0); 3]);
        // last five: 30, 30, 40, 40, 40 -> population CV ~0.13
        assert_eq!(predictability(&history), Some(Predictability::Medium));

        let wild = vec![
            snap(0.0, 0.0, 0.0, 10.0, 0.0, 0.0),
            snap(0.0, 0.0, 0.0, 40.0, 0.0, 0.0),
        ];
        assert_eq!(predictability(&wild), Some(Predictability::Low));
    }

    #[test]
    fn stability_index_rewards_falling_risk() {
        let history = vec![
            snap(60.0, 50.0, 1.3, 40.0, 52.0, 40.0),
            snap(20.0, 90.0, 0.9, 40.0, 36.0, 40.0),
        ];
        // 0.45 * 0.8 + 0.25 * 0.8 + 0.20 * 1.0 + 0.10 * 0.9 = 0.85
        let index = stability_index(&history).unwrap();
        assert_eq!(index.percent, 85);
        assert_eq!(index.label, StabilityLabel::Stable);
    }

    #[test]
    fn stability_index_flags_fragile_sprints() {
        let history = vec![
            snap(40.0, 50.0, 1.1, 40.0, 44.0, 40.0),
            snap(80.0, 10.0, 1.6, 40.0, 64.0, 40.0),
        ];
        // 0.45 * 0.2 + 0.25 * 0.2 + 0.20 * 0.2 + 0.10 * 0.1 = 0.19
        let index = stability_index(&history).unwrap();
        assert_eq!(index.percent, 19);
        assert_eq!(index.label, StabilityLabel::Fragile);
        assert_eq!(stability_index(&[]), None);
    }

    #[test]
    fn narrative_for_empty_history() {
        let lines = narrative(&[]);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("No snapshots yet"));
    }

    #[test]
    fn narrative_calls_out_big_movements() {
        let history = vec![
            snap(20.0, 80.0, 0.9, 40.0, 36.0, 40.0),
            snap(75.0, 30.0, 1.25, 40.0, 50.0, 32.0),
        ];
        let lines = narrative(&history);
        assert_eq!(lines.len(), 5);
        assert!(lines[1].contains("approximately 25%"));
        assert_eq!(
            lines[2],
            "Trend vs previous snapshot: Risk ▼, Capacity ▼, Commitment ▲."
        );
        assert!(lines[3].contains("capacity changed by -8 SP"));
        assert!(lines[4].contains("de-scope early"));
    }
}
