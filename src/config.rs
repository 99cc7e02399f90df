//! Gateway configuration loaded from YAML.
//!
//! ```yaml
//! retry:
//!   max_retries: 3
//!   retry_delay_ms: 1000
//! tools:
//!   max_iterations: 5
//! providers:
//!   - name: openai
//!     priority: 10
//!     models:
//!       - { name: gpt-4o, priority: 10 }
//!     keys:
//!       - { id: primary, secret_env: OPENAI_API_KEY, priority: 10, daily_limit: 1000 }
//! ```
//!
//! Environment overrides (applied by [`GatewayConfig::from_file`] and
//! [`GatewayConfig::with_env_overrides`]):
//! - `AI_GATEWAY_MAX_RETRIES`
//! - `AI_GATEWAY_RETRY_DELAY_MS`
//! - `AI_GATEWAY_MAX_TOOL_ITERATIONS`

use crate::catalog::{ModelCandidate, ProviderCandidate, StaticCatalog};
use crate::keys::{ApiKeyRecord, InMemoryKeyStore};
use crate::resilience::{ExponentialBackoff, RetryOptions};
use crate::types::request::DEFAULT_MAX_TOOL_ITERATIONS;
use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

pub const ENV_MAX_RETRIES: &str = "AI_GATEWAY_MAX_RETRIES";
pub const ENV_RETRY_DELAY_MS: &str = "AI_GATEWAY_RETRY_DELAY_MS";
pub const ENV_MAX_TOOL_ITERATIONS: &str = "AI_GATEWAY_MAX_TOOL_ITERATIONS";

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub retry: RetryConfig,
    pub tools: ToolLoopConfig,
    pub providers: Vec<ProviderConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Attempts per key, including the first.
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolLoopConfig {
    pub max_iterations: u32,
    pub handler_max_retries: u32,
    pub handler_base_delay_ms: u64,
    pub handler_max_delay_ms: u64,
}

impl Default for ToolLoopConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_TOOL_ITERATIONS,
            handler_max_retries: 2,
            handler_base_delay_ms: 500,
            handler_max_delay_ms: 5000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub name: String,
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub models: Vec<ModelConfig>,
    #[serde(default)]
    pub keys: Vec<KeyConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub name: String,
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_true")]
    pub active: bool,
}

#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyConfig {
    /// Defaults to `<provider>-<index>`.
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, skip_serializing)]
    pub secret: Option<String>,
    /// Environment variable holding the secret. Used when `secret` is absent.
    #[serde(default)]
    pub secret_env: Option<String>,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub daily_limit: Option<u32>,
    #[serde(default = "default_true")]
    pub active: bool,
}

impl fmt::Debug for KeyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyConfig")
            .field("id", &self.id)
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .field("secret_env", &self.secret_env)
            .field("priority", &self.priority)
            .field("daily_limit", &self.daily_limit)
            .field("active", &self.active)
            .finish()
    }
}

impl KeyConfig {
    fn resolve_secret(&self) -> Option<String> {
        self.secret
            .clone()
            .or_else(|| self.secret_env.as_deref().and_then(|var| std::env::var(var).ok()))
            .filter(|s| !s.trim().is_empty())
    }
}

fn config_error(message: impl Into<String>, field: impl Into<String>) -> Error {
    Error::configuration_with_context(
        message,
        ErrorContext::new()
            .with_field_path(field)
            .with_source("config_loader"),
    )
}

fn parse_override<T: std::str::FromStr>(var: &str, raw: &str) -> Result<T> {
    raw.trim().parse::<T>().map_err(|_| {
        Error::configuration_with_context(
            format!("invalid value '{}' for {}", raw, var),
            ErrorContext::new()
                .with_details("expected a non-negative integer")
                .with_source("env"),
        )
    })
}

impl GatewayConfig {
    /// Parse and validate YAML. Environment overrides are not applied.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: GatewayConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a YAML file, apply environment overrides and validate.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let config: GatewayConfig = serde_yaml::from_str(&raw)?;
        let config = config.with_env_overrides()?;
        config.validate()?;
        debug!(path = %path.display(), providers = config.providers.len(), "loaded gateway config");
        Ok(config)
    }

    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|var| std::env::var(var).ok())
    }

    /// Apply overrides from an arbitrary variable source.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_MAX_RETRIES) {
            self.retry.max_retries = parse_override(ENV_MAX_RETRIES, &raw)?;
        }
        if let Some(raw) = lookup(ENV_RETRY_DELAY_MS) {
            self.retry.retry_delay_ms = parse_override(ENV_RETRY_DELAY_MS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_MAX_TOOL_ITERATIONS) {
            self.tools.max_iterations = parse_override(ENV_MAX_TOOL_ITERATIONS, &raw)?;
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.retry.max_retries < 1 {
            return Err(config_error("max_retries must be at least 1", "retry.max_retries"));
        }
        if self.tools.handler_base_delay_ms > self.tools.handler_max_delay_ms {
            return Err(config_error(
                "handler_base_delay_ms exceeds handler_max_delay_ms",
                "tools.handler_base_delay_ms",
            ));
        }

        let mut names = HashSet::new();
        for (i, provider) in self.providers.iter().enumerate() {
            if provider.name.trim().is_empty() {
                return Err(config_error("provider name is empty", format!("providers[{}].name", i)));
            }
            if !names.insert(provider.name.as_str()) {
                return Err(config_error(
                    format!("duplicate provider '{}'", provider.name),
                    format!("providers[{}].name", i),
                ));
            }
            for (j, model) in provider.models.iter().enumerate() {
                if model.name.trim().is_empty() {
                    return Err(config_error(
                        "model name is empty",
                        format!("providers[{}].models[{}].name", i, j),
                    ));
                }
            }
            for (j, key) in provider.keys.iter().enumerate() {
                if key.resolve_secret().is_none() {
                    let field = format!("providers[{}].keys[{}]", i, j);
                    let message = match &key.secret_env {
                        Some(var) => format!("environment variable '{}' is not set", var),
                        None => "key has neither secret nor secret_env".to_string(),
                    };
                    return Err(config_error(message, field));
                }
            }
        }
        Ok(())
    }

    pub fn retry_options(&self) -> RetryOptions {
        RetryOptions {
            max_attempts: self.retry.max_retries.max(1),
            delay: Duration::from_millis(self.retry.retry_delay_ms),
        }
    }

    pub fn tool_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            max_retries: self.tools.handler_max_retries,
            base_delay: Duration::from_millis(self.tools.handler_base_delay_ms),
            max_delay: Duration::from_millis(self.tools.handler_max_delay_ms),
        }
    }

    pub fn build_catalog(&self) -> StaticCatalog {
        let mut catalog = StaticCatalog::new();
        for provider in &self.providers {
            catalog.push_provider(ProviderCandidate {
                name: provider.name.clone(),
                priority: provider.priority,
                is_active: provider.active,
            });
            for model in &provider.models {
                catalog.push_model(ModelCandidate {
                    provider: provider.name.clone(),
                    name: model.name.clone(),
                    priority: model.priority,
                    is_active: model.active,
                });
            }
        }
        catalog
    }

    pub fn build_key_store(&self) -> Result<InMemoryKeyStore> {
        let store = InMemoryKeyStore::new();
        for (i, provider) in self.providers.iter().enumerate() {
            for (j, key) in provider.keys.iter().enumerate() {
                let secret = key.resolve_secret().ok_or_else(|| {
                    config_error("key secret could not be resolved", format!("providers[{}].keys[{}]", i, j))
                })?;
                let id = key
                    .id
                    .clone()
                    .unwrap_or_else(|| format!("{}-{}", provider.name, j));
                let mut record = ApiKeyRecord::new(id, provider.name.clone(), secret, key.priority);
                if let Some(limit) = key.daily_limit {
                    record = record.with_daily_limit(limit);
                }
                if !key.active {
                    record = record.inactive();
                }
                store.insert(record);
            }
        }
        Ok(store)
    }
}
