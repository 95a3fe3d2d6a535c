use chrono::{DateTime, Utc};

use crate::clock::{Clock, SystemClock};
use crate::config::HistoryConfig;
use crate::models::{Metric, SaveOutcome, SignalsRecord, Snapshot, SprintMode, Trend};
use crate::signals::finite_or_zero;
use crate::storage::{Storage, StorageError, CURRENT_SPRINT_KEY, HISTORY_KEY};

/// Bounded, append-only log of signal snapshots plus the current sprint id.
///
/// Storage failures never reach callers: unreadable state reads as empty and
/// failed writes are logged and dropped.
pub struct HistoryStore<'a, S, C = SystemClock> {
    storage: &'a S,
    clock: C,
    config: HistoryConfig,
}

impl<'a, S: Storage> HistoryStore<'a, S, SystemClock> {
    pub fn new(storage: &'a S) -> Self {
        Self::with_clock(storage, SystemClock, HistoryConfig::default())
    }
}

impl<'a, S: Storage, C: Clock> HistoryStore<'a, S, C> {
    pub fn with_clock(storage: &'a S, clock: C, config: HistoryConfig) -> Self {
        Self {
            storage,
            clock,
            config,
        }
    }

    /// Returns the stored sprint id, creating and persisting one on first use.
    pub async fn current_sprint_id(&self) -> String {
        match self.storage.get(CURRENT_SPRINT_KEY).await {
            Ok(Some(id)) if !id.trim().is_empty() => return id,
            Ok(_) => {}
            Err(err) => tracing::warn!(error = %err, "could not read current sprint id"),
        }
        self.reset_current_sprint().await
    }

    /// Starts a new sprint without touching the log.
    pub async fn reset_current_sprint(&self) -> String {
        let id = sprint_id_for(self.clock.now());
        self.write(CURRENT_SPRINT_KEY, &id).await;
        tracing::info!(sprint_id = %id, "started new sprint");
        id
    }

    pub async fn save_snapshot(&self, signals: &SignalsRecord, force: bool) -> SaveOutcome {
        let mut history = self.history().await;
        let now = self.clock.now().timestamp_millis();

        if !force {
            if let Some(last) = history.last() {
                if (now - last.timestamp).abs() < self.config.dedup_window_ms {
                    tracing::debug!(
                        last_timestamp = last.timestamp,
                        "snapshot rejected as duplicate"
                    );
                    return SaveOutcome::Duplicate(last.clone());
                }
            }
        }

        let snapshot = Snapshot {
            sprint_id: self.current_sprint_id().await,
            timestamp: now,
            risk_score: finite_or_zero(signals.risk_score),
            confidence: finite_or_zero(signals.confidence),
            overcommit_ratio: finite_or_zero(signals.overcommit_ratio),
            avg_velocity: finite_or_zero(signals.avg_velocity),
            committed_sp: finite_or_zero(signals.committed_sp),
            capacity_sp: finite_or_zero(signals.capacity_sp),
            mode: self.mode_for(finite_or_zero(signals.risk_score)),
        };

        history.push(snapshot.clone());
        if history.len() > self.config.max_entries {
            let excess = history.len() - self.config.max_entries;
            history.drain(..excess);
            tracing::debug!(evicted = excess, "evicted oldest snapshots");
        }

        if let Err(err) = self.write_history(&history).await {
            tracing::warn!(error = %err, "could not persist sprint history");
        }
        SaveOutcome::Saved(snapshot)
    }

    /// Oldest first. Entries that cannot be read are skipped one by one.
    pub async fn history(&self) -> Vec<Snapshot> {
        let raw = match self.storage.get(HISTORY_KEY).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(err) => {
                tracing::warn!(error = %err, "could not read sprint history");
                return Vec::new();
            }
        };
        let entries = match serde_json::from_str::<Vec<serde_json::Value>>(&raw) {
            Ok(entries) => entries,
            Err(err) => {
                tracing::warn!(error = %err, "ignoring malformed sprint history");
                return Vec::new();
            }
        };
        entries
            .into_iter()
            .enumerate()
            .filter_map(|(index, entry)| match serde_json::from_value::<Snapshot>(entry) {
                Ok(snapshot) => Some(snapshot),
                Err(err) => {
                    tracing::warn!(index, error = %err, "skipping malformed snapshot");
                    None
                }
            })
            .collect()
    }

    pub async fn last(&self) -> Option<Snapshot> {
        self.history().await.pop()
    }

    pub async fn trend(&self, metric: Metric) -> Trend {
        let history = self.history().await;
        match history.as_slice() {
            [.., previous, last] => Trend::between(metric.value(previous), metric.value(last)),
            _ => Trend::Flat,
        }
    }

    /// Empties the log; the current sprint id is kept.
    pub async fn clear_history(&self) {
        if let Err(err) = self.storage.remove(HISTORY_KEY).await {
            tracing::warn!(error = %err, "could not clear sprint history");
        }
    }

    pub fn mode_for(&self, risk_score: f64) -> SprintMode {
        if risk_score >= self.config.rescue_risk {
            SprintMode::Rescue
        } else if risk_score >= self.config.watch_risk {
            SprintMode::Watch
        } else {
            SprintMode::Stable
        }
    }

    async fn write_history(&self, history: &[Snapshot]) -> Result<(), StorageError> {
        let encoded = serde_json::to_string(history)?;
        self.storage.set(HISTORY_KEY, &encoded).await
    }

    async fn write(&self, key: &str, value: &str) {
        if let Err(err) = self.storage.set(key, value).await {
            tracing::warn!(key, error = %err, "could not persist value");
        }
    }
}

/// Minute-precision, lexically sortable sprint id such as `SPRINT_20260105_0930`.
pub fn sprint_id_for(at: DateTime<Utc>) -> String {
    at.format("SPRINT_%Y%m%d_%H%M").to_string()
}
