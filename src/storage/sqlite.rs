//! SQLite implementation of the persistence gateway.
//!
//! One `records` table holds every entity as a JSON body keyed by (pk, sk).
//! Multi-record operations run inside a single rusqlite transaction; the busy
//! timeout bounds how long any call can block on a locked database.

use super::{apply_changes, FieldChanges, GameStore, RecordKey};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, Transaction};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path).context("open game db")?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.pragma_update(None, "journal_mode", "WAL").ok();
        conn.pragma_update(None, "synchronous", "NORMAL").ok();

        conn.execute(
            "CREATE TABLE IF NOT EXISTS records (
                pk TEXT NOT NULL,
                sk TEXT NOT NULL,
                body TEXT NOT NULL,
                updated_at INTEGER NOT NULL,
                PRIMARY KEY (pk, sk)
            )",
            [],
        )?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn put_in_tx(tx: &Transaction<'_>, key: &RecordKey, body: &Value) -> Result<()> {
        tx.execute(
            "INSERT OR REPLACE INTO records (pk, sk, body, updated_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                key.pk,
                key.sk,
                serde_json::to_string(body)?,
                Utc::now().timestamp_millis()
            ],
        )?;
        Ok(())
    }

    fn update_in_tx(tx: &Transaction<'_>, key: &RecordKey, changes: &FieldChanges) -> Result<()> {
        let raw: Option<String> = tx
            .query_row(
                "SELECT body FROM records WHERE pk = ?1 AND sk = ?2",
                params![key.pk, key.sk],
                |row| row.get(0),
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })?;

        let Some(raw) = raw else {
            bail!("update target {key} not found");
        };

        let mut body: Value = serde_json::from_str(&raw).context("corrupt record body")?;
        apply_changes(&mut body, changes)?;
        Self::put_in_tx(tx, key, &body)
    }
}

#[async_trait]
impl GameStore for SqliteStore {
    async fn get(&self, key: &RecordKey) -> Result<Option<Value>> {
        let conn = self.conn.lock().await;
        let mut stmt =
            conn.prepare_cached("SELECT body FROM records WHERE pk = ?1 AND sk = ?2")?;
        let mut rows = stmt.query(params![key.pk, key.sk])?;
        match rows.next()? {
            Some(row) => {
                let raw: String = row.get(0)?;
                Ok(Some(serde_json::from_str(&raw).context("corrupt record body")?))
            }
            None => Ok(None),
        }
    }

    async fn put(&self, key: &RecordKey, body: Value) -> Result<()> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;
        Self::put_in_tx(&tx, key, &body)?;
        tx.commit().context("commit put")
    }

    async fn put_many(&self, items: Vec<(RecordKey, Value)>) -> Result<()> {
        if items.is_empty() {
            bail!("put_many requires at least one record");
        }
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;
        for (key, body) in &items {
            Self::put_in_tx(&tx, key, body)?;
        }
        tx.commit().context("commit put_many")
    }

    async fn put_and_update(
        &self,
        put: (RecordKey, Value),
        update: (RecordKey, FieldChanges),
    ) -> Result<()> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;
        // Patch first: a missing update target aborts before the put lands.
        Self::update_in_tx(&tx, &update.0, &update.1)?;
        Self::put_in_tx(&tx, &put.0, &put.1)?;
        tx.commit().context("commit put_and_update")
    }

    async fn update(&self, key: &RecordKey, changes: FieldChanges) -> Result<()> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;
        Self::update_in_tx(&tx, key, &changes)?;
        tx.commit().context("commit update")
    }

    async fn update_many(&self, updates: Vec<(RecordKey, FieldChanges)>) -> Result<()> {
        if updates.is_empty() {
            bail!("update_many requires at least one record");
        }
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;
        for (key, changes) in &updates {
            Self::update_in_tx(&tx, key, changes)?;
        }
        tx.commit().context("commit update_many")
    }

    async fn delete(&self, key: &RecordKey) -> Result<()> {
        let conn = self.conn.lock().await;
        let affected = conn.execute(
            "DELETE FROM records WHERE pk = ?1 AND sk = ?2",
            params![key.pk, key.sk],
        )?;
        if affected == 0 {
            bail!("record {key} not found");
        }
        Ok(())
    }
}
