//! API key bookkeeping and selection.
//!
//! [`KeyManager`] decides which credentials a dispatcher may try, and records the outcome
//! of each attempt. Eligible keys are active and under their daily limit, ordered by
//! priority (descending) then by today's usage (ascending).

pub mod store;

pub use store::{InMemoryKeyStore, KeyStore};

use crate::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, warn};

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKeyRecord {
    pub id: String,
    pub provider: String,
    secret: String,
    pub priority: i32,
    #[serde(default)]
    pub daily_limit: Option<u32>,
    #[serde(default)]
    pub requests_today: u32,
    #[serde(default)]
    pub last_used_at: Option<SystemTime>,
    #[serde(default)]
    pub last_error_at: Option<SystemTime>,
    #[serde(default)]
    pub last_error: Option<String>,
    pub is_active: bool,
}

impl ApiKeyRecord {
    pub fn new(
        id: impl Into<String>,
        provider: impl Into<String>,
        secret: impl Into<String>,
        priority: i32,
    ) -> Self {
        Self {
            id: id.into(),
            provider: provider.into(),
            secret: secret.into(),
            priority,
            daily_limit: None,
            requests_today: 0,
            last_used_at: None,
            last_error_at: None,
            last_error: None,
            is_active: true,
        }
    }

    pub fn with_daily_limit(mut self, limit: u32) -> Self {
        self.daily_limit = Some(limit);
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }

    pub fn is_eligible(&self) -> bool {
        self.is_active
            && self
                .daily_limit
                .map_or(true, |limit| self.requests_today < limit)
    }
}

impl fmt::Debug for ApiKeyRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiKeyRecord")
            .field("id", &self.id)
            .field("provider", &self.provider)
            .field("secret", &"<redacted>")
            .field("priority", &self.priority)
            .field("daily_limit", &self.daily_limit)
            .field("requests_today", &self.requests_today)
            .field("is_active", &self.is_active)
            .finish()
    }
}

/// Filter to eligible keys and order them for dispatch.
pub fn select_candidates(keys: Vec<ApiKeyRecord>) -> Vec<ApiKeyRecord> {
    let mut eligible: Vec<ApiKeyRecord> = keys.into_iter().filter(|k| k.is_eligible()).collect();
    eligible.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then(a.requests_today.cmp(&b.requests_today))
    });
    eligible
}

#[derive(Clone)]
pub struct KeyManager {
    store: Arc<dyn KeyStore>,
}

impl KeyManager {
    pub fn new(store: Arc<dyn KeyStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn KeyStore> {
        &self.store
    }

    /// Eligible keys for `provider`, in dispatch order.
    pub async fn eligible_keys(&self, provider: &str) -> Result<Vec<ApiKeyRecord>> {
        let keys = self.store.keys_for(provider).await?;
        let total = keys.len();
        let eligible = select_candidates(keys);
        debug!(provider, total, eligible = eligible.len(), "selected API keys");
        Ok(eligible)
    }

    /// Called only after a confirmed success. A store failure is logged, not surfaced.
    pub async fn increment_usage(&self, key: &ApiKeyRecord) {
        if let Err(e) = self.store.increment_usage(&key.id).await {
            warn!(key_id = key.id.as_str(), error = %e, "failed to record key usage");
        }
    }

    pub async fn mark_error(&self, key: &ApiKeyRecord, message: &str, deactivate: bool) {
        if deactivate {
            warn!(key_id = key.id.as_str(), provider = key.provider.as_str(), "deactivating API key");
        }
        if let Err(e) = self.store.mark_error(&key.id, message, deactivate).await {
            warn!(key_id = key.id.as_str(), error = %e, "failed to record key error");
        }
    }

    pub async fn reset_daily_usage(&self) -> Result<()> {
        self.store.reset_daily_usage().await
    }
}

impl fmt::Debug for KeyManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyManager").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(id: &str, priority: i32) -> ApiKeyRecord {
        ApiKeyRecord::new(id, "openai", format!("sk-{id}"), priority)
    }

    #[test]
    fn selection_orders_by_priority_then_usage() {
        let mut busy = key("busy", 10);
        busy.requests_today = 7;
        let mut idle = key("idle", 10);
        idle.requests_today = 1;
        let low = key("low", 1);
        let ids: Vec<String> = select_candidates(vec![low, busy, idle])
            .into_iter()
            .map(|k| k.id)
            .collect();
        assert_eq!(ids, vec!["idle", "busy", "low"]);
    }

    #[test]
    fn selection_excludes_inactive_and_exhausted() {
        let mut capped = key("capped", 5).with_daily_limit(2);
        capped.requests_today = 2;
        let off = key("off", 9).inactive();
        let ok = key("ok", 1).with_daily_limit(2);
        let ids: Vec<String> = select_candidates(vec![capped, off, ok])
            .into_iter()
            .map(|k| k.id)
            .collect();
        assert_eq!(ids, vec!["ok"]);
    }

    #[test]
    fn debug_redacts_secret() {
        let rendered = format!("{:?}", key("a", 1));
        assert!(!rendered.contains("sk-a"));
        assert!(rendered.contains("<redacted>"));
    }

    #[tokio::test]
    async fn usage_and_errors_are_recorded() {
        let store = Arc::new(InMemoryKeyStore::new().with_key(key("a", 1).with_daily_limit(1)));
        let manager = KeyManager::new(store.clone());
        let k = manager.eligible_keys("openai").await.unwrap().remove(0);

        manager.increment_usage(&k).await;
        let after = store.get("a").unwrap();
        assert_eq!(after.requests_today, 1);
        assert!(after.last_used_at.is_some());
        assert!(manager.eligible_keys("openai").await.unwrap().is_empty());

        manager.mark_error(&k, "invalid api key", true).await;
        let after = store.get("a").unwrap();
        assert!(!after.is_active);
        assert_eq!(after.last_error.as_deref(), Some("invalid api key"));

        manager.reset_daily_usage().await.unwrap();
        assert_eq!(store.get("a").unwrap().requests_today, 0);
    }
}
