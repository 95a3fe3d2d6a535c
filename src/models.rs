use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Sprint setup as captured by the planning form.
///
/// Every field deserialises leniently: numbers, numeric strings, `null` and
/// missing keys are all accepted, and anything unreadable becomes `0`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupRecord {
    #[serde(default, deserialize_with = "lenient_number")]
    pub sprint_days: f64,
    #[serde(default, deserialize_with = "lenient_number")]
    pub team_members: f64,
    #[serde(default, deserialize_with = "lenient_number")]
    pub leave_days: f64,
    #[serde(rename = "committedSP", default, deserialize_with = "lenient_number")]
    pub committed_sp: f64,
    #[serde(default, deserialize_with = "lenient_number")]
    pub v1: f64,
    #[serde(default, deserialize_with = "lenient_number")]
    pub v2: f64,
    #[serde(default, deserialize_with = "lenient_number")]
    pub v3: f64,
}

/// Partial update merged over a stored [`SetupRecord`].
#[derive(Debug, Clone, Default)]
pub struct SetupPatch {
    pub sprint_days: Option<f64>,
    pub team_members: Option<f64>,
    pub leave_days: Option<f64>,
    pub committed_sp: Option<f64>,
    pub v1: Option<f64>,
    pub v2: Option<f64>,
    pub v3: Option<f64>,
}

impl SetupPatch {
    pub fn is_empty(&self) -> bool {
        self.sprint_days.is_none()
            && self.team_members.is_none()
            && self.leave_days.is_none()
            && self.committed_sp.is_none()
            && self.v1.is_none()
            && self.v2.is_none()
            && self.v3.is_none()
    }

    pub fn apply(&self, setup: &SetupRecord) -> SetupRecord {
        SetupRecord {
            sprint_days: self.sprint_days.unwrap_or(setup.sprint_days),
            team_members: self.team_members.unwrap_or(setup.team_members),
            leave_days: self.leave_days.unwrap_or(setup.leave_days),
            committed_sp: self.committed_sp.unwrap_or(setup.committed_sp),
            v1: self.v1.unwrap_or(setup.v1),
            v2: self.v2.unwrap_or(setup.v2),
            v3: self.v3.unwrap_or(setup.v3),
        }
    }
}

pub(crate) fn lenient_number<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().map(number_from_value).unwrap_or(0.0))
}

/// Reads a loosely typed JSON value as a number, falling back to `0`.
pub fn number_from_value(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskBand {
    Low,
    Moderate,
    High,
}

impl RiskBand {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskBand::Low => "Low",
            RiskBand::Moderate => "Moderate",
            RiskBand::High => "High",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CapacityHealth {
    Healthy,
    AtRisk,
    Critical,
}

impl CapacityHealth {
    pub fn as_str(&self) -> &'static str {
        match self {
            CapacityHealth::Healthy => "Healthy",
            CapacityHealth::AtRisk => "At Risk",
            CapacityHealth::Critical => "Critical",
        }
    }
}

/// The three clamped penalty contributions that make up the risk score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct RiskComponents {
    pub over: f64,
    pub cap: f64,
    pub vola: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalsRecord {
    pub sprint_days: f64,
    pub team_members: f64,
    pub leave_days: f64,
    #[serde(rename = "committedSP")]
    pub committed_sp: f64,
    pub velocities: Vec<f64>,
    pub avg_velocity: f64,
    pub vol: f64,
    pub ideal_person_days: f64,
    pub available_person_days: f64,
    pub availability_ratio: f64,
    #[serde(rename = "capacitySP")]
    pub capacity_sp: f64,
    pub overcommit_ratio: f64,
    pub capacity_shortfall_ratio: f64,
    pub risk_score: f64,
    pub confidence: f64,
    pub risk_band: RiskBand,
    pub capacity_health: Option<CapacityHealth>,
    pub components: RiskComponents,
}

impl SignalsRecord {
    pub fn capacity_health_label(&self) -> &'static str {
        self.capacity_health.map(|h| h.as_str()).unwrap_or("—")
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SprintMode {
    #[default]
    Stable,
    Watch,
    Rescue,
}

impl SprintMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SprintMode::Stable => "stable",
            SprintMode::Watch => "watch",
            SprintMode::Rescue => "rescue",
        }
    }
}

/// One persisted entry of the sprint history log.
///
/// Numeric fields read `null`, strings and missing keys the same way
/// [`SetupRecord`] does, so one unreadable number never drops the entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub sprint_id: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    #[serde(default, deserialize_with = "lenient_number")]
    pub risk_score: f64,
    #[serde(default, deserialize_with = "lenient_number")]
    pub confidence: f64,
    #[serde(default, deserialize_with = "lenient_number")]
    pub overcommit_ratio: f64,
    #[serde(default, deserialize_with = "lenient_number")]
    pub avg_velocity: f64,
    #[serde(rename = "committedSP", default, deserialize_with = "lenient_number")]
    pub committed_sp: f64,
    #[serde(rename = "capacitySP", default, deserialize_with = "lenient_number")]
    pub capacity_sp: f64,
    #[serde(default)]
    pub mode: SprintMode,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
    Saved(Snapshot),
    /// Rejected because the last entry is too recent; carries that entry.
    Duplicate(Snapshot),
}

impl SaveOutcome {
    pub fn is_saved(&self) -> bool {
        matches!(self, SaveOutcome::Saved(_))
    }

    pub fn snapshot(&self) -> &Snapshot {
        match self {
            SaveOutcome::Saved(s) | SaveOutcome::Duplicate(s) => s,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    Up,
    Down,
    Flat,
}

impl Trend {
    /// Direction of `current` relative to `previous`; NaN compares as flat.
    pub fn between(previous: f64, current: f64) -> Self {
        match current.partial_cmp(&previous) {
            Some(std::cmp::Ordering::Greater) => Trend::Up,
            Some(std::cmp::Ordering::Less) => Trend::Down,
            _ => Trend::Flat,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Trend::Up => "up",
            Trend::Down => "down",
            Trend::Flat => "flat",
        }
    }
}

/// Numeric snapshot fields that can be trended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    RiskScore,
    Confidence,
    OvercommitRatio,
    AvgVelocity,
    CommittedSp,
    CapacitySp,
}

impl Metric {
    pub fn value(&self, snapshot: &Snapshot) -> f64 {
        match self {
            Metric::RiskScore => snapshot.risk_score,
            Metric::Confidence => snapshot.confidence,
            Metric::OvercommitRatio => snapshot.overcommit_ratio,
            Metric::AvgVelocity => snapshot.avg_velocity,
            Metric::CommittedSp => snapshot.committed_sp,
            Metric::CapacitySp => snapshot.capacity_sp,
        }
    }
}

impl FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match normalized.as_str() {
            "riskscore" | "risk" => Ok(Metric::RiskScore),
            "confidence" => Ok(Metric::Confidence),
            "overcommitratio" | "overcommit" => Ok(Metric::OvercommitRatio),
            "avgvelocity" | "velocity" => Ok(Metric::AvgVelocity),
            "committedsp" | "committed" => Ok(Metric::CommittedSp),
            "capacitysp" | "capacity" => Ok(Metric::CapacitySp),
            _ => Err(format!("unknown metric `{s}`")),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Metric::RiskScore => "riskScore",
            Metric::Confidence => "confidence",
            Metric::OvercommitRatio => "overcommitRatio",
            Metric::AvgVelocity => "avgVelocity",
            Metric::CommittedSp => "committedSP",
            Metric::CapacitySp => "capacitySP",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setup_accepts_numbers_strings_and_missing_fields() {
        let setup: SetupRecord = serde_json::from_str(
            r#"{"sprintDays": "10", "teamMembers": 5, "leaveDays": null, "committedSP": " 42.5 ", "v1": "abc", "v2": true}"#,
        )
        .unwrap();

        assert_eq!(setup.sprint_days, 10.0);
        assert_eq!(setup.team_members, 5.0);
        assert_eq!(setup.leave_days, 0.0);
        assert_eq!(setup.committed_sp, 42.5);
        assert_eq!(setup.v1, 0.0);
        assert_eq!(setup.v2, 0.0);
        assert_eq!(setup.v3, 0.0);
    }

    #[test]
    fn patch_only_overrides_given_fields() {
        let stored = SetupRecord {
            sprint_days: 10.0,
            team_members: 4.0,
            v1: 30.0,
            ..Default::default()
        };
        let patch = SetupPatch {
            team_members: Some(6.0),
            v2: Some(32.0),
            ..Default::default()
        };

        let merged = patch.apply(&stored);
        assert_eq!(merged.sprint_days, 10.0);
        assert_eq!(merged.team_members, 6.0);
        assert_eq!(merged.v1, 30.0);
        assert_eq!(merged.v2, 32.0);
        assert!(!patch.is_empty());
        assert!(SetupPatch::default().is_empty());
    }

    #[test]
    fn snapshot_uses_camel_case_keys() {
        let snapshot = Snapshot {
            sprint_id: "SPRINT_20260105_0930".to_string(),
            timestamp: 1_767_605_400_000,
            risk_score: 22.0,
            confidence: 73.0,
            overcommit_ratio: 1.11,
            avg_velocity: 45.0,
            committed_sp: 50.0,
            capacity_sp: 40.5,
            mode: SprintMode::Stable,
        };
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["sprintId"], "SPRINT_20260105_0930");
        assert_eq!(json["committedSP"], 50.0);
        assert_eq!(json["capacitySP"], 40.5);
        assert_eq!(json["mode"], "stable");
    }

    #[test]
    fn snapshot_reads_null_numbers_as_zero() {
        let snapshot: Snapshot = serde_json::from_str(
            r#"{"sprintId": "SPRINT_20260105_0930", "timestamp": 1767605400000, "riskScore": 22, "confidence": null, "overcommitRatio": null, "avgVelocity": "45", "committedSP": null, "mode": "watch"}"#,
        )
        .unwrap();

        assert_eq!(snapshot.risk_score, 22.0);
        assert_eq!(snapshot.confidence, 0.0);
        assert_eq!(snapshot.overcommit_ratio, 0.0);
        assert_eq!(snapshot.avg_velocity, 45.0);
        assert_eq!(snapshot.committed_sp, 0.0);
        assert_eq!(snapshot.capacity_sp, 0.0);
        assert_eq!(snapshot.mode, SprintMode::Watch);
    }

    #[test]
    fn trend_treats_nan_as_flat() {
        assert_eq!(Trend::between(1.0, 2.0), Trend::Up);
        assert_eq!(Trend::between(2.0, 1.0), Trend::Down);
        assert_eq!(Trend::between(2.0, 2.0), Trend::Flat);
        assert_eq!(Trend::between(f64::NAN, 2.0), Trend::Flat);
    }

    #[test]
    fn metric_names_parse_in_several_spellings() {
        assert_eq!("riskScore".parse::<Metric>(), Ok(Metric::RiskScore));
        assert_eq!("capacity-sp".parse::<Metric>(), Ok(Metric::CapacitySp));
        assert_eq!("committed_sp".parse::<Metric>(), Ok(Metric::CommittedSp));
        assert!("mood".parse::<Metric>().is_err());
    }
}
