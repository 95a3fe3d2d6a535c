use crate::models::{SetupPatch, SetupRecord};
use crate::storage::{Storage, SETUP_KEY};

/// Persists the planning form as a single JSON blob.
pub struct SetupStore<'a, S> {
    storage: &'a S,
}

impl<'a, S: Storage> SetupStore<'a, S> {
    pub fn new(storage: &'a S) -> Self {
        Self { storage }
    }

    /// Absent or unreadable setup comes back as an all-zero record.
    pub async fn load(&self) -> SetupRecord {
        let raw = match self.storage.get(SETUP_KEY).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return SetupRecord::default(),
            Err(err) => {
                tracing::warn!(error = %err, "could not read sprint setup");
                return SetupRecord::default();
            }
        };
        serde_json::from_str(&raw).unwrap_or_else(|err| {
            tracing::warn!(error = %err, "ignoring malformed sprint setup");
            SetupRecord::default()
        })
    }

    pub async fn save(&self, setup: &SetupRecord) {
        let encoded = match serde_json::to_string(setup) {
            Ok(encoded) => encoded,
            Err(err) => {
                tracing::warn!(error = %err, "could not encode sprint setup");
                return;
            }
        };
        if let Err(err) = self.storage.set(SETUP_KEY, &encoded).await {
            tracing::warn!(error = %err, "could not persist sprint setup");
        }
    }

    /// Merges `patch` over the stored setup and persists the result.
    pub async fn update(&self, patch: &SetupPatch) -> SetupRecord {
        let merged = patch.apply(&self.load().await);
        self.save(&merged).await;
        merged
    }
}
