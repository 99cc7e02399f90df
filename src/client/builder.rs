use crate::catalog::{Catalog, StaticCatalog};
use crate::client::core::Gateway;
use crate::config::GatewayConfig;
use crate::dispatch::{DirectDispatcher, Router};
use crate::keys::{InMemoryKeyStore, KeyManager, KeyStore};
use crate::orchestrator::ToolOrchestrator;
use crate::provider::{ProviderAdapter, ProviderRegistry};
use crate::resilience::{ExponentialBackoff, RetryOptions};
use crate::types::request::DEFAULT_MAX_TOOL_ITERATIONS;
use crate::{Error, ErrorContext, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Builder for [`Gateway`].
///
/// Adapters are registered explicitly by provider name; the catalog and key store default
/// to empty in-memory implementations.
pub struct GatewayBuilder {
    registry: ProviderRegistry,
    catalog: Option<Arc<dyn Catalog>>,
    key_store: Option<Arc<dyn KeyStore>>,
    retry: RetryOptions,
    tool_backoff: ExponentialBackoff,
    max_tool_iterations: u32,
}

impl GatewayBuilder {
    pub fn new() -> Self {
        Self {
            registry: ProviderRegistry::new(),
            catalog: None,
            key_store: None,
            retry: RetryOptions::default(),
            tool_backoff: ExponentialBackoff::default(),
            max_tool_iterations: DEFAULT_MAX_TOOL_ITERATIONS,
        }
    }

    /// Start from a loaded configuration: catalog, keys, retry and tool-loop settings.
    pub fn from_config(config: &GatewayConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::new()
            .catalog(Arc::new(config.build_catalog()))
            .key_store(Arc::new(config.build_key_store()?))
            .retry_options(config.retry_options())
            .tool_backoff(config.tool_backoff())
            .max_tool_iterations(config.tools.max_iterations))
    }

    pub fn with_adapter(mut self, provider: impl Into<String>, adapter: Arc<dyn ProviderAdapter>) -> Self {
        self.registry.register(provider, adapter);
        self
    }

    pub fn catalog(mut self, catalog: Arc<dyn Catalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn key_store(mut self, store: Arc<dyn KeyStore>) -> Self {
        self.key_store = Some(store);
        self
    }

    pub fn retry_options(mut self, retry: RetryOptions) -> Self {
        self.retry = retry;
        self
    }

    /// Attempts per key and the fixed delay between them.
    pub fn retry(self, max_attempts: u32, delay: Duration) -> Self {
        self.retry_options(RetryOptions {
            max_attempts: max_attempts.max(1),
            delay,
        })
    }

    pub fn tool_backoff(mut self, backoff: ExponentialBackoff) -> Self {
        self.tool_backoff = backoff;
        self
    }

    /// Ceiling applied to every request's `max_tool_iterations`.
    pub fn max_tool_iterations(mut self, n: u32) -> Self {
        self.max_tool_iterations = n;
        self
    }

    pub fn build(self) -> Result<Gateway> {
        if self.registry.providers().next().is_none() {
            return Err(Error::configuration_with_context(
                "no provider adapters registered",
                ErrorContext::new()
                    .with_details("call with_adapter() for each provider")
                    .with_source("gateway_builder"),
            ));
        }

        let catalog = self
            .catalog
            .unwrap_or_else(|| Arc::new(StaticCatalog::new()) as Arc<dyn Catalog>);
        let key_store = self
            .key_store
            .unwrap_or_else(|| Arc::new(InMemoryKeyStore::new()) as Arc<dyn KeyStore>);

        let providers: Vec<&str> = self.registry.providers().collect();
        info!(
            providers = ?providers,
            max_attempts = self.retry.max_attempts,
            max_tool_iterations = self.max_tool_iterations,
            "building gateway"
        );

        let direct = DirectDispatcher::new(Arc::new(self.registry), KeyManager::new(key_store), self.retry);
        let router = Arc::new(Router::new(direct, catalog));
        let orchestrator = ToolOrchestrator::new(router.clone(), self.tool_backoff);
        Ok(Gateway::from_router(router, orchestrator, self.max_tool_iterations))
    }
}

impl Default for GatewayBuilder {
    fn default() -> Self {
        Self::new()
    }
}
