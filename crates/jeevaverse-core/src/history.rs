//! Persisted conversation log
//!
//! The whole log is written as one record after every mutation. The record
//! carries a version number; the unversioned array written by older
//! front ends is still accepted and upgraded on the next write.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::state::{Role, Turn, TurnContent};
use crate::store::Store;

pub const LOG_KEY: &str = "jeevaVerseLog";
pub const RECORD_VERSION: u32 = 1;

#[derive(Serialize)]
struct LogRecordRef<'a> {
    version: u32,
    turns: &'a [Turn],
}

#[derive(Deserialize)]
struct LogRecord {
    version: u32,
    turns: Vec<Turn>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StoredLog {
    Versioned(LogRecord),
    Legacy(Vec<Turn>),
}

/// Decode a stored record. `None` means the value is unusable.
fn decode(raw: &str) -> Option<Vec<Turn>> {
    match serde_json::from_str::<StoredLog>(raw).ok()? {
        StoredLog::Versioned(record) if record.version <= RECORD_VERSION => Some(record.turns),
        StoredLog::Versioned(record) => {
            log::warn!("Conversation log has unknown version {}", record.version);
            None
        }
        StoredLog::Legacy(turns) => {
            log::info!("Upgrading unversioned conversation log ({} turns)", turns.len());
            Some(turns)
        }
    }
}

pub struct LogStore {
    store: Arc<Store>,
    turns: Vec<Turn>,
}

impl LogStore {
    /// Load the log, falling back to an empty one. Never fails.
    pub fn load(store: Arc<Store>) -> Self {
        let raw = match store.get(LOG_KEY) {
            Ok(raw) => raw,
            Err(e) => {
                log::warn!("Could not read conversation log: {e:#}");
                None
            }
        };

        let turns = match raw {
            None => Vec::new(),
            Some(raw) => decode(&raw).unwrap_or_else(|| {
                Self::preserve_unreadable(&store, &raw);
                Vec::new()
            }),
        };

        Self { store, turns }
    }

    fn preserve_unreadable(store: &Store, raw: &str) {
        let key = format!("{LOG_KEY}.unreadable");
        log::warn!("Conversation log is unreadable; keeping a copy under {key}");
        if let Err(e) = store.set(&key, raw) {
            log::warn!("Could not preserve unreadable log: {e:#}");
        }
    }

    pub fn append(&mut self, role: Role, content: TurnContent) -> Turn {
        let turn = Turn::new(role, content);
        self.turns.push(turn.clone());
        self.save();
        turn
    }

    pub fn clear(&mut self) {
        self.turns.clear();
        self.save();
    }

    /// Oldest first
    pub fn all(&self) -> &[Turn] {
        &self.turns
    }

    /// Newest first, for the history panel
    pub fn recent(&self) -> Vec<&Turn> {
        self.turns.iter().rev().collect()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    fn save(&self) {
        let record = LogRecordRef {
            version: RECORD_VERSION,
            turns: &self.turns,
        };
        let result = serde_json::to_string(&record)
            .map_err(anyhow::Error::from)
            .and_then(|json| self.store.set(LOG_KEY, &json));

        if let Err(e) = result {
            log::warn!("Failed to persist conversation log: {e:#}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> Arc<Store> {
        Arc::new(Store::open_in_memory().unwrap())
    }

    #[test]
    fn test_empty_when_nothing_stored() {
        let log = LogStore::load(store());
        assert!(log.is_empty());
    }

    #[test]
    fn test_round_trip() {
        let store = store();
        let mut log = LogStore::load(store.clone());
        log.append(Role::User, TurnContent::text("hello"));
        log.append(Role::Model, TurnContent::text("hi"));
        log.append(
            Role::User,
            TurnContent {
                text: String::new(),
                image: Some("data:image/png;base64,YWJj".to_string()),
            },
        );

        let reloaded = LogStore::load(store);
        assert_eq!(reloaded.all(), log.all());
    }

    #[test]
    fn test_append_returns_stored_turn() {
        let mut log = LogStore::load(store());
        let turn = log.append(Role::Model, TurnContent::text("hi"));
        assert_eq!(log.all().last(), Some(&turn));
    }

    #[test]
    fn test_clear_persists_empty() {
        let store = store();
        let mut log = LogStore::load(store.clone());
        log.append(Role::User, TurnContent::text("hello"));
        log.clear();

        assert!(log.all().is_empty());
        assert!(LogStore::load(store).is_empty());
    }

    #[test]
    fn test_recent_is_reversed() {
        let mut log = LogStore::load(store());
        for text in ["a", "b", "c"] {
            log.append(Role::User, TurnContent::text(text));
        }

        let recent: Vec<&str> = log.recent().iter().map(|t| t.content.text.as_str()).collect();
        assert_eq!(recent, vec!["c", "b", "a"]);
    }

    #[test]
    fn test_legacy_array_is_read() {
        let store = store();
        store
            .set(
                LOG_KEY,
                r#"[{"role":"user","content":{"text":"hello","image":null},"timestamp":"2025-01-02T03:04:05.678Z"},
                   {"role":"model","content":{"text":"hi"},"timestamp":"2025-01-02T03:04:07.000Z"}]"#,
            )
            .unwrap();

        let log = LogStore::load(store.clone());
        assert_eq!(log.len(), 2);
        assert_eq!(log.all()[1].role, Role::Model);
        assert_eq!(log.all()[1].content.text, "hi");
    }

    #[test]
    fn test_legacy_is_upgraded_on_write() {
        let store = store();
        store.set(LOG_KEY, "[]").unwrap();

        let mut log = LogStore::load(store.clone());
        log.append(Role::User, TurnContent::text("hello"));

        let raw = store.get(LOG_KEY).unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["version"], RECORD_VERSION);
    }

    #[test]
    fn test_garbage_is_preserved_and_ignored() {
        let store = store();
        store.set(LOG_KEY, "{not json").unwrap();

        let log = LogStore::load(store.clone());
        assert!(log.is_empty());
        assert_eq!(
            store.get(&format!("{LOG_KEY}.unreadable")).unwrap().as_deref(),
            Some("{not json")
        );
    }

    #[test]
    fn test_future_version_is_not_loaded() {
        let store = store();
        store.set(LOG_KEY, r#"{"version":99,"turns":[]}"#).unwrap();

        assert!(LogStore::load(store.clone()).is_empty());
        assert!(store.get(&format!("{LOG_KEY}.unreadable")).unwrap().is_some());
    }
}
