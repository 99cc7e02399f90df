use crate::client::builder::GatewayBuilder;
use crate::dispatch::{ChatDispatch, Route, Router, TextStream};
use crate::orchestrator::ToolOrchestrator;
use crate::tools::ToolHandler;
use crate::types::{ChatRequest, ChatResponse, StreamEvent};
use crate::{BoxStream, Result};
use futures::StreamExt;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Chat-completion router over a set of provider adapters.
///
/// Cheap to clone; every clone shares the same registry, key store and catalog.
#[derive(Clone)]
pub struct Gateway {
    pub(crate) router: Arc<Router>,
    pub(crate) orchestrator: ToolOrchestrator,
    pub(crate) max_tool_iterations: u32,
}

impl Gateway {
    pub fn builder() -> GatewayBuilder {
        GatewayBuilder::new()
    }

    pub(crate) fn from_router(
        router: Arc<Router>,
        orchestrator: ToolOrchestrator,
        max_tool_iterations: u32,
    ) -> Self {
        Self {
            router,
            orchestrator,
            max_tool_iterations,
        }
    }

    fn capped(&self, mut request: ChatRequest) -> ChatRequest {
        request.max_tool_iterations = request.max_tool_iterations.min(self.max_tool_iterations);
        request
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// How `request` would be dispatched, without dispatching it.
    pub async fn plan(&self, request: &ChatRequest) -> Result<Route> {
        self.router.resolve(request).await
    }

    #[instrument(skip_all, fields(provider = ?request.provider, model = ?request.model))]
    pub async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        self.router.dispatch(&request).await
    }

    /// Stream text events followed by a terminal [`StreamEvent::Finished`].
    ///
    /// A failure, including cancellation, ends the stream with an error item instead.
    pub fn chat_stream(&self, request: ChatRequest) -> BoxStream<'static, StreamEvent> {
        let router = self.router.clone();
        let opened = futures::stream::once(async move { router.dispatch_stream(&request).await });
        Box::pin(opened.flat_map(|res| match res {
            Ok(text) => text_events(text),
            Err(e) => {
                debug!(error = %e, "stream failed before first chunk");
                let failed: BoxStream<'static, StreamEvent> =
                    Box::pin(futures::stream::once(futures::future::ready(Err(e))));
                failed
            }
        }))
    }

    /// Run the tool loop to completion and return the final response.
    pub async fn chat_with_tools(
        &self,
        request: ChatRequest,
        handler: Arc<dyn ToolHandler>,
    ) -> Result<ChatResponse> {
        let request = self.capped(request);
        self.orchestrator.run(&request, handler).await
    }

    pub fn chat_stream_with_tools(
        &self,
        request: ChatRequest,
        handler: Arc<dyn ToolHandler>,
    ) -> BoxStream<'static, StreamEvent> {
        self.orchestrator.run_stream(self.capped(request), handler)
    }
}

/// Map a text stream to events, ending with `Finished` only on a clean end.
fn text_events(text: TextStream) -> BoxStream<'static, StreamEvent> {
    Box::pin(futures::stream::unfold(Some(text), |state| async move {
        let mut text = state?;
        match text.next().await {
            Some(Ok(chunk)) => Some((Ok(StreamEvent::text(chunk)), Some(text))),
            Some(Err(e)) => Some((Err(e), None)),
            None => Some((
                Ok(StreamEvent::Finished {
                    finish_reason: "stop".to_string(),
                }),
                None,
            )),
        }
    }))
}
