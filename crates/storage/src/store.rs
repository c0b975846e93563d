use async_trait::async_trait;
use peso_core::{
    BankProfile, ProfileStore, SinkError, SinkReceipt, StoreError, TransactionRecord,
    TransactionSink,
};
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::db::{get_setting, insert_transactions, put_setting, DbPool};

/// Settings key holding every bank profile as one JSON object keyed by
/// header signature.
pub const PROFILES_KEY: &str = "budget_import_bank_profiles";

fn unavailable(e: sqlx::Error) -> StoreError {
    StoreError::Unavailable(e.to_string())
}

pub struct SqliteProfileStore {
    pool: DbPool,
}

impl SqliteProfileStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn load(&self) -> Result<BTreeMap<String, BankProfile>, StoreError> {
        let Some(json) = get_setting(&self.pool, PROFILES_KEY).await.map_err(unavailable)? else {
            return Ok(BTreeMap::new());
        };
        let mut profiles: BTreeMap<String, BankProfile> =
            serde_json::from_str(&json).map_err(|e| StoreError::Corrupt(e.to_string()))?;
        for (signature, profile) in profiles.iter_mut() {
            profile.signature = signature.clone();
        }
        Ok(profiles)
    }
}

#[async_trait]
impl ProfileStore for SqliteProfileStore {
    async fn find(&self, signature: &str) -> Result<Option<BankProfile>, StoreError> {
        Ok(self.load().await?.remove(signature))
    }

    async fn save(&self, profile: BankProfile) -> Result<(), StoreError> {
        let mut profiles = self.load().await?;
        debug!(signature = %profile.signature, name = %profile.profile_name, "saving bank profile");
        profiles.insert(profile.signature.clone(), profile);
        let json =
            serde_json::to_string(&profiles).map_err(|e| StoreError::Corrupt(e.to_string()))?;
        put_setting(&self.pool, PROFILES_KEY, &json)
            .await
            .map_err(unavailable)
    }

    async fn list(&self) -> Result<Vec<BankProfile>, StoreError> {
        Ok(self.load().await?.into_values().collect())
    }
}

pub struct SqliteTransactionSink {
    pool: DbPool,
}

impl SqliteTransactionSink {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TransactionSink for SqliteTransactionSink {
    async fn persist_batch(&self, records: &[TransactionRecord]) -> Result<SinkReceipt, SinkError> {
        let imported = insert_transactions(&self.pool, records)
            .await
            .map_err(|e| SinkError(e.to_string()))?;
        info!(imported, "batch stored");
        Ok(SinkReceipt {
            imported,
            errors: 0,
        })
    }
}
