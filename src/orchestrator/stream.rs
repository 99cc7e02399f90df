//! Streaming tool loop.
//!
//! Runs on its own task and pushes events into a channel. Text is forwarded as soon as the
//! parser releases it; the upstream provider stream is dropped the moment a tool block
//! closes, which stops further generation.

use super::{append_turn, resolve, seed_conversation, Detected, ToolOrchestrator};
use crate::resilience::{AbortOnDrop, CancellationBridge, ControlledStream};
use crate::tools::{ParserEvent, ToolHandler, ToolStreamParser};
use crate::types::{ChatRequest, StreamEvent};
use crate::{BoxStream, Result};
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedSender};
use tracing::{debug, info};

type EventSender = UnboundedSender<Result<StreamEvent>>;

fn emit(tx: &EventSender, event: StreamEvent) {
    // A closed receiver means the consumer is gone and this task is about to be aborted.
    let _ = tx.send(Ok(event));
}

fn finished(reason: &str) -> StreamEvent {
    StreamEvent::Finished {
        finish_reason: reason.to_string(),
    }
}

impl ToolOrchestrator {
    /// Streaming tool loop.
    ///
    /// Cancellation seen between turns ends the stream cleanly with a `cancelled` finish
    /// reason. Cancellation or failure while a provider or tool call is in flight ends it
    /// with an error item. Dropping the stream aborts the loop.
    pub fn run_stream(
        &self,
        request: ChatRequest,
        handler: Arc<dyn ToolHandler>,
    ) -> BoxStream<'static, StreamEvent> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let this = self.clone();
        let handle = tokio::spawn(async move {
            if let Err(e) = this.stream_loop(&request, handler.as_ref(), &tx).await {
                debug!(error = %e, "tool stream ended with error");
                let _ = tx.send(Err(e));
            }
        });

        let events = futures::stream::poll_fn(move |cx| rx.poll_recv(cx));
        Box::pin(ControlledStream::new(
            Box::pin(events),
            None,
            Some(AbortOnDrop::new(handle)),
        ))
    }

    async fn stream_loop(
        &self,
        request: &ChatRequest,
        handler: &dyn ToolHandler,
        tx: &EventSender,
    ) -> Result<()> {
        let cancel = CancellationBridge::new(request.cancel.clone());
        let mut turn = seed_conversation(request);
        let max_iterations = request.max_tool_iterations;
        let mut iteration = 0;

        while iteration < max_iterations {
            if cancel.is_cancelled() {
                info!(iteration, "request cancelled between turns");
                emit(tx, finished("cancelled"));
                return Ok(());
            }

            let mut upstream = self.dispatcher.dispatch_stream(&turn).await?;
            let mut parser = ToolStreamParser::new();
            let mut visible = String::new();
            let mut detected: Option<Detected> = None;

            'consume: while let Some(chunk) = upstream.next().await {
                let chunk = chunk?;
                for event in parser.feed(&chunk) {
                    match event {
                        ParserEvent::Text(text) => {
                            visible.push_str(&text);
                            emit(tx, StreamEvent::text(text));
                        }
                        ParserEvent::ToolPending => emit(tx, StreamEvent::ToolPending),
                        other => {
                            detected = Detected::from_event(other);
                            break 'consume;
                        }
                    }
                }
            }
            // Stop the provider as soon as the call is complete.
            drop(upstream);

            let Some(detected) = detected else {
                for event in parser.finish() {
                    if let ParserEvent::Text(text) = event {
                        emit(tx, StreamEvent::text(text));
                    }
                }
                emit(tx, finished("stop"));
                return Ok(());
            };
            iteration += 1;

            let outcome = match resolve(&turn.tools, &detected) {
                Ok(call) => {
                    info!(iteration, tool = call.name.as_str(), "executing tool call");
                    emit(tx, StreamEvent::ToolExecuting { call: call.clone() });
                    self.invoke(handler, call, &cancel).await?
                }
                Err(outcome) => outcome,
            };
            emit(tx, outcome.event());
            append_turn(&mut turn, visible, &detected, &outcome);
        }

        if cancel.is_cancelled() {
            emit(tx, finished("cancelled"));
            return Ok(());
        }

        // The final turn is forwarded raw.
        info!(max_iterations, "tool iteration limit reached, streaming final turn");
        let mut upstream = self.dispatcher.dispatch_stream(&turn).await?;
        while let Some(chunk) = upstream.next().await {
            emit(tx, StreamEvent::text(chunk?));
        }
        emit(tx, finished("stop"));
        Ok(())
    }
}
