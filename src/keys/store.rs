//! Key persistence boundary.
//!
//! Counter updates go through the store so that a database-backed implementation can make
//! them atomic. The in-memory store below is best-effort under concurrent load.

use super::ApiKeyRecord;
use crate::{Error, ErrorContext, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::SystemTime;

#[async_trait]
pub trait KeyStore: Send + Sync {
    /// All keys (active or not) registered for `provider`.
    async fn keys_for(&self, provider: &str) -> Result<Vec<ApiKeyRecord>>;

    /// `requests_today += 1`, `last_used_at = now`.
    async fn increment_usage(&self, key_id: &str) -> Result<()>;

    /// Record a failure; `deactivate` excludes the key from future selection.
    async fn mark_error(&self, key_id: &str, message: &str, deactivate: bool) -> Result<()>;

    /// Explicit daily reset of `requests_today` for every key.
    async fn reset_daily_usage(&self) -> Result<()>;
}

/// In-memory store keyed by provider name.
#[derive(Debug, Default)]
pub struct InMemoryKeyStore {
    keys: RwLock<HashMap<String, Vec<ApiKeyRecord>>>,
}

impl InMemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, record: ApiKeyRecord) {
        if let Ok(mut keys) = self.keys.write() {
            keys.entry(record.provider.clone()).or_default().push(record);
        }
    }

    pub fn with_key(self, record: ApiKeyRecord) -> Self {
        self.insert(record);
        self
    }

    /// Snapshot of a single key, for inspection.
    pub fn get(&self, key_id: &str) -> Option<ApiKeyRecord> {
        let keys = self.keys.read().ok()?;
        keys.values().flatten().find(|k| k.id == key_id).cloned()
    }

    fn update<F>(&self, key_id: &str, f: F) -> Result<()>
    where
        F: FnOnce(&mut ApiKeyRecord),
    {
        let mut keys = self.keys.write().map_err(|_| poisoned())?;
        let record = keys
            .values_mut()
            .flatten()
            .find(|k| k.id == key_id)
            .ok_or_else(|| {
                Error::runtime_with_context(
                    format!("unknown API key id '{}'", key_id),
                    ErrorContext::new().with_source("key_store"),
                )
            })?;
        f(record);
        Ok(())
    }
}

fn poisoned() -> Error {
    Error::runtime_with_context("key store lock poisoned", ErrorContext::new().with_source("key_store"))
}

#[async_trait]
impl KeyStore for InMemoryKeyStore {
    async fn keys_for(&self, provider: &str) -> Result<Vec<ApiKeyRecord>> {
        let keys = self.keys.read().map_err(|_| poisoned())?;
        Ok(keys.get(provider).cloned().unwrap_or_default())
    }

    async fn increment_usage(&self, key_id: &str) -> Result<()> {
        self.update(key_id, |k| {
            k.requests_today = k.requests_today.saturating_add(1);
            k.last_used_at = Some(SystemTime::now());
        })
    }

    async fn mark_error(&self, key_id: &str, message: &str, deactivate: bool) -> Result<()> {
        self.update(key_id, |k| {
            k.last_error_at = Some(SystemTime::now());
            k.last_error = Some(message.to_string());
            if deactivate {
                k.is_active = false;
            }
        })
    }

    async fn reset_daily_usage(&self) -> Result<()> {
        let mut keys = self.keys.write().map_err(|_| poisoned())?;
        for k in keys.values_mut().flatten() {
            k.requests_today = 0;
        }
        Ok(())
    }
}
