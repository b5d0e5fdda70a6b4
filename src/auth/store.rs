//! Credential records and the key-value backends they live in.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, path::Path, sync::Arc, time::Duration};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, error, instrument, warn};

pub const USER_KEY_PREFIX: &str = "user:";
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("backend request failed: {0}")]
    Backend(String),
    #[error("backend returned HTTP {0}")]
    Status(u16),
    #[error("failed to read users file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid credential record: {0}")]
    Json(#[from] serde_json::Error),
}

/// Stored login credentials for one account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub id: String,
    pub username: String,
    pub password_hash: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_login: Option<DateTime<Utc>>,
}

#[must_use]
pub fn user_key(username: &str) -> String {
    format!("{USER_KEY_PREFIX}{username}")
}

/// Async string-valued point lookups.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// # Errors
    /// Returns an error if the backend could not answer.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
}

/// Username to credential record. Every failure is reported as absence.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get(&self, username: &str) -> Option<CredentialRecord>;
}

/// Process-local key-value map, seeded from a users file or by hand.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    entries: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put(&self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.write().await.insert(key.into(), value.into());
    }

    /// Store a record under its `user:<username>` key.
    ///
    /// # Errors
    /// Returns an error if the record cannot be serialized.
    pub async fn put_record(&self, record: &CredentialRecord) -> Result<(), StoreError> {
        let value = serde_json::to_string(record)?;
        self.put(user_key(&record.username), value).await;
        Ok(())
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Load a JSON array of credential records.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or is not a list of records.
    pub async fn from_users_file(path: &Path) -> Result<Self, StoreError> {
        let raw = tokio::fs::read_to_string(path).await?;
        Self::from_users_json(&raw).await
    }

    /// # Errors
    /// Returns an error if `raw` is not a JSON array of credential records.
    pub async fn from_users_json(raw: &str) -> Result<Self, StoreError> {
        let records: Vec<CredentialRecord> = serde_json::from_str(raw)?;
        let store = Self::new();
        for record in &records {
            store.put_record(record).await?;
        }
        Ok(store)
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.read().await.get(key).cloned())
    }
}

/// Credential lookups over any [`KeyValueStore`], bounded by a timeout.
#[derive(Clone)]
pub struct KvCredentialStore {
    kv: Arc<dyn KeyValueStore>,
    timeout: Duration,
}

impl KvCredentialStore {
    #[must_use]
    pub fn new(kv: Arc<dyn KeyValueStore>, timeout: Duration) -> Self {
        Self { kv, timeout }
    }
}

#[async_trait]
impl CredentialStore for KvCredentialStore {
    #[instrument(skip(self))]
    async fn get(&self, username: &str) -> Option<CredentialRecord> {
        let key = user_key(username);
        let raw = match tokio::time::timeout(self.timeout, self.kv.get(&key)).await {
            Ok(Ok(Some(raw))) => raw,
            Ok(Ok(None)) => {
                debug!("no credential record");
                return None;
            }
            Ok(Err(err)) => {
                error!("credential lookup failed: {err}");
                return None;
            }
            Err(_) => {
                warn!("credential lookup timed out after {:?}", self.timeout);
                return None;
            }
        };

        match serde_json::from_str::<CredentialRecord>(&raw) {
            Ok(record) if record.username == username => Some(record),
            Ok(record) => {
                warn!(stored = %record.username, "credential record belongs to another user");
                None
            }
            Err(err) => {
                error!("credential record is not decodable: {err}");
                None
            }
        }
    }
}
