//! Provider boundary: the adapter interface each vendor client implements, and the
//! registry mapping provider names to adapters.
//!
//! Wire formats are out of scope here. An adapter receives a [`ProviderRequest`] and one
//! credential, and either returns a complete [`ChatResponse`] or pushes text deltas into a
//! [`ChatSink`].

pub mod sink;

pub use sink::{ChannelSink, ChatSink, MemorySink};

use crate::keys::ApiKeyRecord;
use crate::types::{ChatResponse, Message};
use crate::{Error, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

/// Request handed to an adapter for one provider/model/credential attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderRequest {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    pub stream: bool,
}

#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// One-shot chat completion.
    async fn chat_completion(
        &self,
        request: &ProviderRequest,
        credential: &ApiKeyRecord,
    ) -> Result<ChatResponse>;

    /// Streaming chat completion. Resolves once the upstream stream is finished.
    /// Calls `sink.write` for every delta and `sink.end` once on success.
    async fn stream_chat_completion(
        &self,
        request: &ProviderRequest,
        credential: &ApiKeyRecord,
        sink: &dyn ChatSink,
    ) -> Result<()>;
}

/// Provider name → adapter map, built once and shared by reference.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    adapters: HashMap<String, Arc<dyn ProviderAdapter>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, provider: impl Into<String>, adapter: Arc<dyn ProviderAdapter>) {
        self.adapters.insert(provider.into(), adapter);
    }

    pub fn get(&self, provider: &str) -> Result<Arc<dyn ProviderAdapter>> {
        self.adapters
            .get(provider)
            .cloned()
            .ok_or_else(|| Error::UnknownProvider(provider.to_string()))
    }

    pub fn contains(&self, provider: &str) -> bool {
        self.adapters.contains_key(provider)
    }

    pub fn providers(&self) -> impl Iterator<Item = &str> {
        self.adapters.keys().map(|s| s.as_str())
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&str> = self.providers().collect();
        names.sort_unstable();
        f.debug_struct("ProviderRegistry")
            .field("providers", &names)
            .finish()
    }
}
