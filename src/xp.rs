use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::{Clock, SystemClock};
use crate::models::{lenient_number, SignalsRecord};
use crate::storage::{Storage, XP_KEY};

pub const LEVEL_SIZE: u64 = 300;

const LEVEL_TITLES: [&str; 6] = [
    "Rookie",
    "Sprint Scout",
    "Sprint Runner",
    "Velocity Cheetah",
    "Scrum Legend",
    "Agile Mythic",
];

/// Signals remembered from the last award, used to reward improvement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct XpMetrics {
    #[serde(default, deserialize_with = "lenient_number")]
    pub risk_score: f64,
    #[serde(default, deserialize_with = "lenient_number")]
    pub confidence: f64,
    #[serde(default, deserialize_with = "lenient_number")]
    pub overcommit_ratio: f64,
    #[serde(default, deserialize_with = "lenient_number")]
    pub vol: f64,
}

impl XpMetrics {
    fn from_signals(signals: &SignalsRecord) -> Self {
        Self {
            risk_score: signals.risk_score,
            confidence: signals.confidence,
            overcommit_ratio: signals.overcommit_ratio,
            vol: signals.vol,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct XpState {
    #[serde(default)]
    pub total_xp: u64,
    #[serde(default)]
    pub streak: u32,
    #[serde(default)]
    pub best_streak: u32,
    /// `YYYY-MM-DD` (UTC) of the last award, empty before the first one.
    #[serde(default)]
    pub last_award_day: String,
    #[serde(default)]
    pub last_metrics: Option<XpMetrics>,
}

/// XP granted by one check-in. Empty when today was already awarded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct XpAward {
    pub gained: u64,
    pub reasons: Vec<String>,
}

impl XpAward {
    pub fn is_empty(&self) -> bool {
        self.gained == 0 && self.reasons.is_empty()
    }

    fn add(&mut self, xp: u64, reason: &str) {
        self.gained += xp;
        self.reasons.push(format!("+{xp} {reason}"));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Level {
    pub level: u64,
    pub in_level: u64,
    pub next: u64,
    pub title: &'static str,
}

pub fn level_info(total_xp: u64) -> Level {
    let level = total_xp / LEVEL_SIZE + 1;
    let title_index = usize::try_from(level - 1)
        .unwrap_or(usize::MAX)
        .min(LEVEL_TITLES.len() - 1);
    Level {
        level,
        in_level: total_xp % LEVEL_SIZE,
        next: LEVEL_SIZE,
        title: LEVEL_TITLES[title_index],
    }
}

/// Low risk, solid confidence and no overcommit.
pub fn is_stable(signals: &SignalsRecord) -> bool {
    signals.risk_score < 40.0 && signals.confidence >= 70.0 && signals.overcommit_ratio <= 1.0
}

/// Scores one check-in against `state` and folds the result into it.
pub fn apply_award(state: &mut XpState, signals: &SignalsRecord, day: &str) -> XpAward {
    let mut award = XpAward::default();

    if signals.committed_sp > 0.0 || !signals.velocities.is_empty() {
        award.add(5, "Daily check-in");
    }
    if signals.confidence >= 75.0 {
        award.add(15, "Confidence ≥ 75");
    }
    if signals.overcommit_ratio > 0.0 && signals.overcommit_ratio <= 1.0 {
        award.add(25, "No overcommit");
    }
    if signals.vol > 0.0 && signals.vol < 0.30 {
        award.add(10, "Low volatility");
    }
    if let Some(previous) = state.last_metrics {
        if previous.risk_score - signals.risk_score >= 5.0 {
            award.add(20, "Risk improved");
        }
    }

    if is_stable(signals) {
        state.streak += 1;
        state.best_streak = state.best_streak.max(state.streak);
        award.add(10, "Stable streak day");
    } else {
        state.streak = 0;
        award.reasons.push("Streak reset (not stable)".to_string());
    }

    state.total_xp = state.total_xp.saturating_add(award.gained);
    state.last_award_day = day.to_string();
    state.last_metrics = Some(XpMetrics::from_signals(signals));
    award
}

pub fn day_key(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d").to_string()
}

/// Daily XP and stability streak, awarded at most once per UTC day.
pub struct XpStore<'a, S, C = SystemClock> {
    storage: &'a S,
    clock: C,
}

impl<'a, S: Storage> XpStore<'a, S, SystemClock> {
    pub fn new(storage: &'a S) -> Self {
        Self::with_clock(storage, SystemClock)
    }
}

impl<'a, S: Storage, C: Clock> XpStore<'a, S, C> {
    pub fn with_clock(storage: &'a S, clock: C) -> Self {
        Self { storage, clock }
    }

    pub async fn load(&self) -> XpState {
        let raw = match self.storage.get(XP_KEY).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return XpState::default(),
            Err(err) => {
                tracing::warn!(error = %err, "could not read xp state");
                return XpState::default();
            }
        };
        serde_json::from_str(&raw).unwrap_or_else(|err| {
            tracing::warn!(error = %err, "ignoring malformed xp state");
            XpState::default()
        })
    }

    pub async fn award(&self, signals: &SignalsRecord) -> XpAward {
        let mut state = self.load().await;
        let day = day_key(self.clock.now());
        if state.last_award_day == day {
            tracing::debug!(day = %day, "xp already awarded today");
            return XpAward::default();
        }

        let award = apply_award(&mut state, signals, &day);
        match serde_json::to_string(&state) {
            Ok(encoded) => {
                if let Err(err) = self.storage.set(XP_KEY, &encoded).await {
                    tracing::warn!(error = %err, "could not persist xp state");
                }
            }
            Err(err) => tracing::warn!(error = %err, "could not encode xp state"),
        }
        tracing::info!(gained = award.gained, total = state.total_xp, streak = state.streak, "xp awarded");
        award
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::models::SetupRecord;
    use crate::signals::SignalEngine;
    use crate::storage::MemoryStorage;
    use chrono::{Duration, TimeZone};

    fn reference() -> SignalsRecord {
        SignalEngine::default().compute(&SetupRecord {
            sprint_days: 10.0,
            team_members: 5.0,
            leave_days: 5.0,
            committed_sp: 50.0,
            v1: 40.0,
            v2: 45.0,
            v3: 50.0,
        })
    }

    fn healthy() -> SignalsRecord {
        SignalEngine::default().compute(&SetupRecord {
            sprint_days: 10.0,
            team_members: 5.0,
            leave_days: 0.0,
            committed_sp: 40.0,
            v1: 40.0,
            v2: 42.0,
            v3: 44.0,
        })
    }

    #[test]
    fn levels_advance_every_three_hundred() {
        assert_eq!(
            level_info(0),
            Level {
                level: 1,
                in_level: 0,
                next: 300,
                title: "Rookie"
            }
        );
        let third = level_info(650);
        assert_eq!((third.level, third.in_level, third.title), (3, 50, "Sprint Runner"));
        assert_eq!(level_info(10_000).title, "Agile Mythic");
    }

    #[test]
    fn overcommitted_sprint_breaks_the_streak() {
        let mut state = XpState {
            streak: 3,
            best_streak: 3,
            ..Default::default()
        };
        let award = apply_award(&mut state, &reference(), "2026-01-05");
        assert_eq!(award.gained, 30);
        assert_eq!(
            award.reasons,
            vec![
                "+5 Daily check-in",
                "+15 Confidence ≥ 75",
                "+10 Low volatility",
                "Streak reset (not stable)"
            ]
        );
        assert_eq!(state.streak, 0);
        assert_eq!(state.best_streak, 3);
        assert_eq!(state.last_award_day, "2026-01-05");
        assert_eq!(state.last_metrics.map(|m| m.risk_score), Some(22.0));
    }

    #[test]
    fn empty_setup_earns_nothing() {
        let mut state = XpState::default();
        let award = apply_award(&mut state, &SignalEngine::default().compute(&SetupRecord::default()), "2026-01-05");
        assert_eq!(award.gained, 0);
        assert!(!award.is_empty());
        assert_eq!(state.total_xp, 0);
    }

    #[tokio::test]
    async fn xp_is_awarded_once_per_day() {
        let storage = MemoryStorage::new();
        let clock = ManualClock::at(Utc.with_ymd_and_hms(2026, 1, 5, 9, 30, 0).unwrap());
        let store = XpStore::with_clock(&storage, &clock);

        assert_eq!(store.award(&reference()).await.gained, 30);
        assert!(store.award(&healthy()).await.is_empty());
        assert_eq!(store.load().await.total_xp, 30);

        clock.advance(Duration::days(1));
        let improved = store.award(&healthy()).await;
        assert_eq!(improved.gained, 85);
        assert!(improved.reasons.contains(&"+20 Risk improved".to_string()));

        clock.advance(Duration::days(1));
        assert_eq!(store.award(&healthy()).await.gained, 65);
        let state = store.load().await;
        assert_eq!(state.total_xp, 180);
        assert_eq!((state.streak, state.best_streak), (2, 2));
        assert_eq!(state.last_award_day, "2026-01-07");

        clock.advance(Duration::days(1));
        store.award(&reference()).await;
        let state = store.load().await;
        assert_eq!((state.streak, state.best_streak), (0, 2));
        assert_eq!(state.total_xp, 210);
    }

    #[tokio::test]
    async fn day_boundary_is_utc_midnight() {
        let storage = MemoryStorage::new();
        let clock = ManualClock::at(Utc.with_ymd_and_hms(2026, 1, 5, 23, 30, 0).unwrap());
        let store = XpStore::with_clock(&storage, &clock);

        assert!(!store.award(&healthy()).await.is_empty());
        clock.advance(Duration::hours(1));
        assert!(!store.award(&healthy()).await.is_empty());
        assert_eq!(store.load().await.streak, 2);
    }

    #[tokio::test]
    async fn malformed_state_starts_over() {
        let storage = MemoryStorage::new();
        storage.set(XP_KEY, "{\"totalXp\": \"lots\"").await.unwrap();
        assert_eq!(XpStore::new(&storage).load().await, XpState::default());

        storage
            .set(XP_KEY, r#"{"totalXp": 120, "lastMetrics": {"riskScore": null}}"#)
            .await
            .unwrap();
        let state = XpStore::new(&storage).load().await;
        assert_eq!(state.total_xp, 120);
        assert_eq!(state.last_metrics, Some(XpMetrics::default()));
    }
}
