//! Persistence gateway
//!
//! A key-addressed transactional record store. Records are JSON bodies keyed
//! by a `(pk, sk)` pair; partial updates are field patches merged into the
//! stored body. Multi-record operations are all-or-nothing: a subsequent read
//! never observes a partially applied transaction.
//!
//! No business logic lives here; the typed stores in `crate::game` own the
//! key schemas and record shapes.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};

/// Composite key addressing a single record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordKey {
    pub pk: String,
    pub sk: String,
}

impl RecordKey {
    pub fn new(pk: impl Into<String>, sk: impl Into<String>) -> Self {
        Self {
            pk: pk.into(),
            sk: sk.into(),
        }
    }
}

impl std::fmt::Display for RecordKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.pk, self.sk)
    }
}

/// Field-level changes merged into an existing record body.
pub type FieldChanges = Map<String, Value>;

/// Transactional record store contract.
///
/// Every operation is bounded: implementations must fail within a finite
/// timeout rather than hang. Updates target existing records; updating a
/// missing record is an error, and inside a multi-record operation that
/// error aborts the whole transaction.
#[async_trait]
pub trait GameStore: Send + Sync {
    /// Point read. `Ok(None)` means the record does not exist.
    async fn get(&self, key: &RecordKey) -> Result<Option<Value>>;

    /// Create or replace a single record.
    async fn put(&self, key: &RecordKey, body: Value) -> Result<()>;

    /// Create or replace several records atomically.
    async fn put_many(&self, items: Vec<(RecordKey, Value)>) -> Result<()>;

    /// Create one record and patch another in the same transaction.
    async fn put_and_update(
        &self,
        put: (RecordKey, Value),
        update: (RecordKey, FieldChanges),
    ) -> Result<()>;

    /// Merge field changes into a single existing record.
    async fn update(&self, key: &RecordKey, changes: FieldChanges) -> Result<()>;

    /// Merge field changes into several existing records atomically.
    async fn update_many(&self, updates: Vec<(RecordKey, FieldChanges)>) -> Result<()>;

    /// Remove a record. Deleting a missing record is an error.
    async fn delete(&self, key: &RecordKey) -> Result<()>;
}

/// Merge a field patch into a JSON object body, overwriting existing fields.
fn apply_changes(body: &mut Value, changes: &FieldChanges) -> Result<()> {
    let obj = body
        .as_object_mut()
        .ok_or_else(|| anyhow::anyhow!("record body is not a JSON object"))?;
    for (field, value) in changes {
        obj.insert(field.clone(), value.clone());
    }
    Ok(())
}
