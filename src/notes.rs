use std::collections::BTreeMap;

use serde_json::Value;

use crate::advice::Ceremony;
use crate::storage::{Storage, NOTES_KEY};

/// Field id to recorded value for one ceremony.
pub type CeremonyNotes = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Number,
    Text,
    Choice(&'static [&'static str]),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteField {
    pub id: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
}

const PLANNING_FIELDS: &[NoteField] = &[
    NoteField {
        id: "finalCommit",
        label: "Final Commitment (SP)",
        kind: FieldKind::Number,
    },
    NoteField {
        id: "riskAcceptance",
        label: "Risk Acceptance",
        kind: FieldKind::Choice(&["Low", "Medium", "High"]),
    },
];

const DAILY_FIELDS: &[NoteField] = &[
    NoteField {
        id: "blockerOwner",
        label: "Blocker Owner",
        kind: FieldKind::Text,
    },
    NoteField {
        id: "wipMove",
        label: "WIP Decision",
        kind: FieldKind::Choice(&["No change", "Reduce WIP", "Pause new work"]),
    },
];

const REFINEMENT_FIELDS: &[NoteField] = &[NoteField {
    id: "readyCount",
    label: "Items marked Ready",
    kind: FieldKind::Number,
}];

const REVIEW_FIELDS: &[NoteField] = &[NoteField {
    id: "shipped",
    label: "Status",
    kind: FieldKind::Choice(&["Ahead", "On track", "Behind"]),
}];

const RETRO_FIELDS: &[NoteField] = &[NoteField {
    id: "experiment",
    label: "Chosen Experiment",
    kind: FieldKind::Text,
}];

pub fn note_fields(ceremony: Ceremony) -> &'static [NoteField] {
    match ceremony {
        Ceremony::Planning => PLANNING_FIELDS,
        Ceremony::Daily => DAILY_FIELDS,
        Ceremony::Refinement => REFINEMENT_FIELDS,
        Ceremony::Review => REVIEW_FIELDS,
        Ceremony::Retro => RETRO_FIELDS,
    }
}

fn storage_key(ceremony: Ceremony) -> &'static str {
    match ceremony {
        Ceremony::Planning => "planning",
        Ceremony::Daily => "daily",
        Ceremony::Refinement => "refine",
        Ceremony::Review => "review",
        Ceremony::Retro => "retro",
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum NoteError {
    #[error("{ceremony} notes have no field `{field}` (expected one of: {expected})")]
    UnknownField {
        ceremony: &'static str,
        field: String,
        expected: String,
    },
    #[error("`{field}` must be a number, got `{value}`")]
    InvalidNumber { field: &'static str, value: String },
    #[error("`{field}` must be one of: {options}")]
    InvalidChoice {
        field: &'static str,
        options: String,
    },
}

/// Checks one `field=value` pair and returns the canonical field id with the
/// value as it will be stored.
fn validate(
    ceremony: Ceremony,
    field: &str,
    value: &str,
) -> Result<(&'static str, String), NoteError> {
    let fields = note_fields(ceremony);
    let Some(known) = fields.iter().find(|f| f.id.eq_ignore_ascii_case(field)) else {
        return Err(NoteError::UnknownField {
            ceremony: ceremony.as_str(),
            field: field.to_string(),
            expected: fields.iter().map(|f| f.id).collect::<Vec<_>>().join(", "),
        });
    };
    let value = value.trim();
    if value.is_empty() {
        return Ok((known.id, String::new()));
    }
    let stored = match known.kind {
        FieldKind::Text => value.to_string(),
        FieldKind::Number => match value.parse::<f64>() {
            Ok(n) if n.is_finite() => value.to_string(),
            _ => {
                return Err(NoteError::InvalidNumber {
                    field: known.id,
                    value: value.to_string(),
                })
            }
        },
        FieldKind::Choice(options) => options
            .iter()
            .find(|o| o.eq_ignore_ascii_case(value))
            .map(|o| o.to_string())
            .ok_or_else(|| NoteError::InvalidChoice {
                field: known.id,
                options: options.join(", "),
            })?,
    };
    Ok((known.id, stored))
}

/// Parses a `field=value` command line argument.
pub fn parse_assignment(input: &str) -> Result<(String, String), String> {
    let (field, value) = input
        .split_once('=')
        .ok_or_else(|| format!("expected field=value, got `{input}`"))?;
    let field = field.trim();
    if field.is_empty() {
        return Err(format!("missing field name in `{input}`"));
    }
    Ok((field.to_string(), value.to_string()))
}

/// Decision notes recorded per ceremony, all kept under one storage key.
pub struct NotesStore<'a, S> {
    storage: &'a S,
}

impl<'a, S: Storage> NotesStore<'a, S> {
    pub fn new(storage: &'a S) -> Self {
        Self { storage }
    }

    async fn load_all(&self) -> BTreeMap<String, CeremonyNotes> {
        let raw = match self.storage.get(NOTES_KEY).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return BTreeMap::new(),
            Err(err) => {
                tracing::warn!(error = %err, "could not read ceremony notes");
                return BTreeMap::new();
            }
        };
        match serde_json::from_str::<BTreeMap<String, BTreeMap<String, Value>>>(&raw) {
            Ok(all) => all
                .into_iter()
                .map(|(ceremony, fields)| {
                    let fields = fields
                        .into_iter()
                        .map(|(id, value)| match value {
                            Value::String(s) => (id, s),
                            other => (id, other.to_string()),
                        })
                        .collect();
                    (ceremony, fields)
                })
                .collect(),
            Err(err) => {
                tracing::warn!(error = %err, "ignoring malformed ceremony notes");
                BTreeMap::new()
            }
        }
    }

    async fn store_all(&self, all: &BTreeMap<String, CeremonyNotes>) {
        let encoded = match serde_json::to_string(all) {
            Ok(encoded) => encoded,
            Err(err) => {
                tracing::warn!(error = %err, "could not encode ceremony notes");
                return;
            }
        };
        if let Err(err) = self.storage.set(NOTES_KEY, &encoded).await {
            tracing::warn!(error = %err, "could not persist ceremony notes");
        }
    }

    pub async fn get(&self, ceremony: Ceremony) -> CeremonyNotes {
        self.load_all()
            .await
            .remove(storage_key(ceremony))
            .unwrap_or_default()
    }

    /// Merges `updates` into the ceremony's notes. An empty value removes
    /// that field. Nothing is written unless every update is valid.
    pub async fn save(
        &self,
        ceremony: Ceremony,
        updates: &[(String, String)],
    ) -> Result<CeremonyNotes, NoteError> {
        let validated = updates
            .iter()
            .map(|(field, value)| validate(ceremony, field, value))
            .collect::<Result<Vec<_>, NoteError>>()?;

        let mut all = self.load_all().await;
        let key = storage_key(ceremony);
        let mut notes = all.remove(key).unwrap_or_default();
        for (id, value) in validated {
            if value.is_empty() {
                notes.remove(id);
            } else {
                notes.insert(id.to_string(), value);
            }
        }
        if !notes.is_empty() {
            all.insert(key.to_string(), notes.clone());
        }
        self.store_all(&all).await;
        Ok(notes)
    }

    pub async fn clear(&self, ceremony: Ceremony) {
        let mut all = self.load_all().await;
        if all.remove(storage_key(ceremony)).is_some() {
            self.store_all(&all).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn set(field: &str, value: &str) -> (String, String) {
        (field.to_string(), value.to_string())
    }

    #[tokio::test]
    async fn notes_are_kept_per_ceremony() {
        let storage = MemoryStorage::new();
        let notes = NotesStore::new(&storage);

        let planning = notes
            .save(
                Ceremony::Planning,
                &[set("finalCommit", "42"), set("riskacceptance", "medium")],
            )
            .await
            .unwrap();
        assert_eq!(planning.get("finalCommit").map(String::as_str), Some("42"));
        assert_eq!(planning.get("riskAcceptance").map(String::as_str), Some("Medium"));

        notes
            .save(Ceremony::Retro, &[set("experiment", "Max 3 WIP")])
            .await
            .unwrap();
        assert_eq!(notes.get(Ceremony::Planning).await, planning);
        assert_eq!(notes.get(Ceremony::Retro).await.len(), 1);
        assert!(notes.get(Ceremony::Daily).await.is_empty());

        let raw = storage.get(NOTES_KEY).await.unwrap().unwrap();
        let stored: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(stored["retro"]["experiment"], "Max 3 WIP");
    }

    #[tokio::test]
    async fn empty_value_removes_a_field_and_clear_drops_the_ceremony() {
        let storage = MemoryStorage::new();
        let notes = NotesStore::new(&storage);
        notes
            .save(
                Ceremony::Daily,
                &[set("blockerOwner", "Sam"), set("wipMove", "Reduce WIP")],
            )
            .await
            .unwrap();

        let updated = notes
            .save(Ceremony::Daily, &[set("blockerOwner", " ")])
            .await
            .unwrap();
        assert_eq!(updated.keys().collect::<Vec<_>>(), vec!["wipMove"]);

        notes
            .save(Ceremony::Review, &[set("shipped", "On track")])
            .await
            .unwrap();
        notes.clear(Ceremony::Daily).await;
        assert!(notes.get(Ceremony::Daily).await.is_empty());
        assert_eq!(notes.get(Ceremony::Review).await.len(), 1);
    }

    #[tokio::test]
    async fn invalid_updates_change_nothing() {
        let storage = MemoryStorage::new();
        let notes = NotesStore::new(&storage);

        let err = notes
            .save(
                Ceremony::Refinement,
                &[set("readyCount", "3"), set("owner", "Sam")],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, NoteError::UnknownField { .. }));
        assert!(err.to_string().contains("readyCount"));

        assert_eq!(
            notes
                .save(Ceremony::Refinement, &[set("readyCount", "many")])
                .await,
            Err(NoteError::InvalidNumber {
                field: "readyCount",
                value: "many".to_string()
            })
        );
        assert!(matches!(
            notes.save(Ceremony::Review, &[set("shipped", "Late")]).await,
            Err(NoteError::InvalidChoice { .. })
        ));
        assert_eq!(storage.get(NOTES_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn hand_edited_notes_load_leniently() {
        let storage = MemoryStorage::new();
        storage
            .set(NOTES_KEY, r#"{"refine": {"readyCount": 4}}"#)
            .await
            .unwrap();
        let notes = NotesStore::new(&storage);
        assert_eq!(
            notes.get(Ceremony::Refinement).await.get("readyCount").map(String::as_str),
            Some("4")
        );

        storage.set(NOTES_KEY, "[").await.unwrap();
        assert!(notes.get(Ceremony::Refinement).await.is_empty());
    }

    #[test]
    fn assignments_split_on_the_first_equals() {
        assert_eq!(
            parse_assignment("experiment=a=b").unwrap(),
            ("experiment".to_string(), "a=b".to_string())
        );
        assert_eq!(parse_assignment("shipped=").unwrap().1, "");
        assert!(parse_assignment("shipped").is_err());
        assert!(parse_assignment("=x").is_err());
    }
}
