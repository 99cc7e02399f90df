use super::{AutoFallbackDispatcher, ChatDispatch, DirectDispatcher, TextStream};
use crate::catalog::{default_model, Catalog};
use crate::types::{ChatRequest, ChatResponse};
use crate::{Error, ErrorContext, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// How a request will be dispatched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Direct { provider: String, model: String },
    /// Auto mode, optionally restricted to one model name.
    Auto { model: Option<String> },
}

/// Chooses between direct and auto dispatch from the request's hints.
#[derive(Clone)]
pub struct Router {
    direct: DirectDispatcher,
    auto: AutoFallbackDispatcher,
    catalog: Arc<dyn Catalog>,
}

impl Router {
    pub fn new(direct: DirectDispatcher, catalog: Arc<dyn Catalog>) -> Self {
        let auto = AutoFallbackDispatcher::new(direct.clone(), catalog.clone());
        Self {
            direct,
            auto,
            catalog,
        }
    }

    pub fn direct(&self) -> &DirectDispatcher {
        &self.direct
    }

    pub fn auto(&self) -> &AutoFallbackDispatcher {
        &self.auto
    }

    pub async fn resolve(&self, request: &ChatRequest) -> Result<Route> {
        let route = match (&request.provider, &request.model) {
            (Some(provider), Some(model)) => Route::Direct {
                provider: provider.clone(),
                model: model.clone(),
            },
            (Some(provider), None) => {
                let model = default_model(self.catalog.as_ref(), provider)
                    .await?
                    .ok_or_else(|| {
                        Error::configuration_with_context(
                            format!("provider '{}' has no active model", provider),
                            ErrorContext::new()
                                .with_field_path("request.provider")
                                .with_source("router"),
                        )
                    })?;
                Route::Direct {
                    provider: provider.clone(),
                    model,
                }
            }
            (None, model) => Route::Auto {
                model: model.clone(),
            },
        };
        debug!(?route, "resolved route");
        Ok(route)
    }
}

#[async_trait]
impl ChatDispatch for Router {
    async fn dispatch(&self, request: &ChatRequest) -> Result<ChatResponse> {
        match self.resolve(request).await? {
            Route::Direct { provider, model } => self.direct.dispatch(&provider, &model, request).await,
            Route::Auto { model } => self.auto.dispatch(request, model.as_deref()).await,
        }
    }

    async fn dispatch_stream(&self, request: &ChatRequest) -> Result<TextStream> {
        match self.resolve(request).await? {
            Route::Direct { provider, model } => {
                self.direct.dispatch_stream(&provider, &model, request).await
            }
            Route::Auto { model } => self.auto.dispatch_stream(request, model.as_deref()).await,
        }
    }
}
