use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;

use super::mapping::BankProfile;
use super::transaction::TransactionRecord;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Profile store unavailable: {0}")]
    Unavailable(String),
    #[error("Corrupt profile data: {0}")]
    Corrupt(String),
}

/// Remembered bank layouts keyed by header signature. Writes are
/// last-writer-wins per signature.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn find(&self, signature: &str) -> Result<Option<BankProfile>, StoreError>;
    async fn save(&self, profile: BankProfile) -> Result<(), StoreError>;
    async fn list(&self) -> Result<Vec<BankProfile>, StoreError>;
}

#[derive(Debug, Default)]
pub struct MemoryProfileStore {
    profiles: Mutex<HashMap<String, BankProfile>>,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProfileStore for MemoryProfileStore {
    async fn find(&self, signature: &str) -> Result<Option<BankProfile>, StoreError> {
        let profiles = self
            .profiles
            .lock()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(profiles.get(signature).cloned())
    }

    async fn save(&self, profile: BankProfile) -> Result<(), StoreError> {
        let mut profiles = self
            .profiles
            .lock()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        profiles.insert(profile.signature.clone(), profile);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<BankProfile>, StoreError> {
        let profiles = self
            .profiles
            .lock()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        let mut all: Vec<_> = profiles.values().cloned().collect();
        all.sort_by(|a, b| a.signature.cmp(&b.signature));
        Ok(all)
    }
}

#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct SinkError(pub String);

/// What the persistence collaborator reports back for one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SinkReceipt {
    pub imported: usize,
    pub errors: usize,
}

/// Downstream persistence for finalized records. Called exactly once per
/// successful import with the full batch; a failure means nothing was saved.
#[async_trait]
pub trait TransactionSink: Send + Sync {
    async fn persist_batch(&self, records: &[TransactionRecord]) -> Result<SinkReceipt, SinkError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{CanonicalField, ColumnMapping};

    fn mapping(date: &str) -> ColumnMapping {
        ColumnMapping::default()
            .with(CanonicalField::Date, date)
            .with(CanonicalField::Description, "Concepto")
            .with(CanonicalField::Amount, "Importe")
    }

    #[tokio::test]
    async fn memory_store_round_trip() {
        let store = MemoryProfileStore::new();
        assert!(store.find("concepto|fecha|importe").await.unwrap().is_none());

        store
            .save(BankProfile::new("concepto|fecha|importe", mapping("Fecha"), "Banco"))
            .await
            .unwrap();
        let found = store.find("concepto|fecha|importe").await.unwrap().unwrap();
        assert_eq!(found.profile_name, "Banco");
        assert_eq!(found.column_map, mapping("Fecha"));
    }

    #[tokio::test]
    async fn memory_store_last_writer_wins() {
        let store = MemoryProfileStore::new();
        store.save(BankProfile::new("sig", mapping("A"), "first")).await.unwrap();
        store.save(BankProfile::new("sig", mapping("B"), "second")).await.unwrap();

        let all = store.list().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].profile_name, "second");
        assert_eq!(all[0].column_map.date.as_deref(), Some("B"));
    }
}
