//! Provider/model catalog used to build auto-mode candidate lists.
//!
//! CRUD of providers and models lives outside the gateway; [`Catalog`] is the read-only
//! view the dispatchers need. [`StaticCatalog`] is the in-memory implementation built
//! from configuration.

use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderCandidate {
    pub name: String,
    pub priority: i32,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelCandidate {
    pub provider: String,
    pub name: String,
    pub priority: i32,
    pub is_active: bool,
}

/// One provider/model pair in dispatch order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub provider: String,
    pub model: String,
}

impl Candidate {
    /// `provider:model`
    pub fn token(&self) -> String {
        format!("{}:{}", self.provider, self.model)
    }
}

#[async_trait]
pub trait Catalog: Send + Sync {
    async fn providers(&self) -> Result<Vec<ProviderCandidate>>;
    async fn models(&self, provider: &str) -> Result<Vec<ModelCandidate>>;
}

/// Active providers by priority desc, then within each, active models by priority desc.
pub async fn ordered_candidates(catalog: &dyn Catalog) -> Result<Vec<Candidate>> {
    let mut providers: Vec<ProviderCandidate> = catalog
        .providers()
        .await?
        .into_iter()
        .filter(|p| p.is_active)
        .collect();
    providers.sort_by(|a, b| b.priority.cmp(&a.priority));

    let mut out = Vec::new();
    for provider in providers {
        let mut models: Vec<ModelCandidate> = catalog
            .models(&provider.name)
            .await?
            .into_iter()
            .filter(|m| m.is_active)
            .collect();
        models.sort_by(|a, b| b.priority.cmp(&a.priority));
        out.extend(models.into_iter().map(|m| Candidate {
            provider: provider.name.clone(),
            model: m.name,
        }));
    }
    Ok(out)
}

/// Highest-priority active model of `provider`, if any.
pub async fn default_model(catalog: &dyn Catalog, provider: &str) -> Result<Option<String>> {
    Ok(catalog
        .models(provider)
        .await?
        .into_iter()
        .filter(|m| m.is_active)
        .max_by_key(|m| m.priority)
        .map(|m| m.name))
}

#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    providers: Vec<ProviderCandidate>,
    models: Vec<ModelCandidate>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn provider(mut self, name: impl Into<String>, priority: i32) -> Self {
        self.providers.push(ProviderCandidate {
            name: name.into(),
            priority,
            is_active: true,
        });
        self
    }

    pub fn model(mut self, provider: impl Into<String>, name: impl Into<String>, priority: i32) -> Self {
        self.models.push(ModelCandidate {
            provider: provider.into(),
            name: name.into(),
            priority,
            is_active: true,
        });
        self
    }

    pub fn push_provider(&mut self, provider: ProviderCandidate) {
        self.providers.push(provider);
    }

    pub fn push_model(&mut self, model: ModelCandidate) {
        self.models.push(model);
    }
}

#[async_trait]
impl Catalog for StaticCatalog {
    async fn providers(&self) -> Result<Vec<ProviderCandidate>> {
        Ok(self.providers.clone())
    }

    async fn models(&self, provider: &str) -> Result<Vec<ModelCandidate>> {
        Ok(self
            .models
            .iter()
            .filter(|m| m.provider == provider)
            .cloned()
            .collect())
    }
}
