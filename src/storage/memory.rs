//! In-memory reference implementation of the persistence gateway.
//!
//! A single mutex guards the whole map, so every multi-record operation is
//! trivially atomic. Used by tests and as the fallback store when no database
//! path is configured.

use super::{apply_changes, FieldChanges, GameStore, RecordKey};
use anyhow::{bail, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<RecordKey, Value>>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail. Lets tests exercise the
    /// "transaction did not commit" paths without a real backend.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            bail!("memory store writes disabled");
        }
        Ok(())
    }
}

#[async_trait]
impl GameStore for MemoryStore {
    async fn get(&self, key: &RecordKey) -> Result<Option<Value>> {
        Ok(self.records.lock().get(key).cloned())
    }

    async fn put(&self, key: &RecordKey, body: Value) -> Result<()> {
        self.check_writable()?;
        self.records.lock().insert(key.clone(), body);
        Ok(())
    }

    async fn put_many(&self, items: Vec<(RecordKey, Value)>) -> Result<()> {
        self.check_writable()?;
        if items.is_empty() {
            bail!("put_many requires at least one record");
        }
        let mut records = self.records.lock();
        for (key, body) in items {
            records.insert(key, body);
        }
        Ok(())
    }

    async fn put_and_update(
        &self,
        put: (RecordKey, Value),
        update: (RecordKey, FieldChanges),
    ) -> Result<()> {
        self.check_writable()?;
        let mut records = self.records.lock();

        // Validate the update target before touching anything so the
        // operation stays all-or-nothing.
        let (update_key, changes) = update;
        let mut body = match records.get(&update_key) {
            Some(body) => body.clone(),
            None => bail!("update target {update_key} not found"),
        };
        apply_changes(&mut body, &changes)?;

        records.insert(put.0, put.1);
        records.insert(update_key, body);
        Ok(())
    }

    async fn update(&self, key: &RecordKey, changes: FieldChanges) -> Result<()> {
        self.update_many(vec![(key.clone(), changes)]).await
    }

    async fn update_many(&self, updates: Vec<(RecordKey, FieldChanges)>) -> Result<()> {
        self.check_writable()?;
        if updates.is_empty() {
            bail!("update_many requires at least one record");
        }
        let mut records = self.records.lock();

        // Stage all patched bodies first; commit only if every target exists.
        let mut staged = Vec::with_capacity(updates.len());
        for (key, changes) in updates {
            let mut body = match records.get(&key) {
                Some(body) => body.clone(),
                None => bail!("update target {key} not found"),
            };
            apply_changes(&mut body, &changes)?;
            staged.push((key, body));
        }
        for (key, body) in staged {
            records.insert(key, body);
        }
        Ok(())
    }

    async fn delete(&self, key: &RecordKey) -> Result<()> {
        self.check_writable()?;
        match self.records.lock().remove(key) {
            Some(_) => Ok(()),
            None => bail!("record {key} not found"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn key(pk: &str, sk: &str) -> RecordKey {
        RecordKey::new(pk, sk)
    }

    #[tokio::test]
    async fn put_then_get_roundtrip() {
        let store = MemoryStore::new();
        let k = key("user#u1", "profile");

        store.put(&k, json!({ "name": "satoshi" })).await.unwrap();
        let body = store.get(&k).await.unwrap().unwrap();
        assert_eq!(body["name"], "satoshi");
    }

    #[tokio::test]
    async fn get_missing_returns_none() {
        let store = MemoryStore::new();
        assert!(store.get(&key("user#u1", "game")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_missing_record_fails() {
        let store = MemoryStore::new();
        let mut changes = FieldChanges::new();
        changes.insert("score".into(), json!(1));
        assert!(store.update(&key("user#u1", "game"), changes).await.is_err());
    }

    #[tokio::test]
    async fn put_and_update_is_atomic_on_missing_target() {
        let store = MemoryStore::new();
        let bet_key = key("user#u1#bets", "bet#b1");
        let game_key = key("user#u1#game", "game");

        let mut changes = FieldChanges::new();
        changes.insert("current_bet".into(), json!("b1"));

        // Game record does not exist, so the put must not land either.
        let result = store
            .put_and_update((bet_key.clone(), json!({ "state": "open" })), (game_key, changes))
            .await;
        assert!(result.is_err());
        assert!(store.get(&bet_key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_many_applies_all_or_nothing() {
        let store = MemoryStore::new();
        let a = key("user#u1#bets", "bet#b1");
        let b = key("user#u1#game", "game");
        store.put(&a, json!({ "state": "open" })).await.unwrap();
        store.put(&b, json!({ "score": 0 })).await.unwrap();

        let mut bet_changes = FieldChanges::new();
        bet_changes.insert("state".into(), json!("won"));
        let mut game_changes = FieldChanges::new();
        game_changes.insert("score".into(), json!(1));
        let missing = key("user#u2#game", "game");

        // One missing target aborts the whole batch.
        let result = store
            .update_many(vec![
                (a.clone(), bet_changes.clone()),
                (missing, game_changes.clone()),
            ])
            .await;
        assert!(result.is_err());
        assert_eq!(store.get(&a).await.unwrap().unwrap()["state"], "open");

        store
            .update_many(vec![(a.clone(), bet_changes), (b.clone(), game_changes)])
            .await
            .unwrap();
        assert_eq!(store.get(&a).await.unwrap().unwrap()["state"], "won");
        assert_eq!(store.get(&b).await.unwrap().unwrap()["score"], 1);
    }

    #[tokio::test]
    async fn fail_writes_blocks_mutations_but_not_reads() {
        let store = MemoryStore::new();
        let k = key("user#u1", "profile");
        store.put(&k, json!({ "name": "n" })).await.unwrap();

        store.set_fail_writes(true);
        assert!(store.put(&k, json!({ "name": "m" })).await.is_err());
        assert_eq!(store.get(&k).await.unwrap().unwrap()["name"], "n");

        store.set_fail_writes(false);
        store.put(&k, json!({ "name": "m" })).await.unwrap();
    }
}
