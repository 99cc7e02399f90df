//! Single provider/model dispatch across that provider's credentials.

use super::TextStream;
use crate::client::error_classification::classify;
use crate::error_code::ErrorCategory;
use crate::keys::{ApiKeyRecord, KeyManager};
use crate::provider::{ChannelSink, ChatSink, ProviderAdapter, ProviderRegistry, ProviderRequest};
use crate::resilience::{AbortOnDrop, CancellationBridge, ControlledStream, RetryExecutor, RetryOptions};
use crate::types::{ChatRequest, ChatResponse, Message};
use crate::{Error, Result};
use futures::StreamExt;
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Provider end-of-stream sentinels that must never reach the caller.
const STREAM_SENTINELS: &[&str] = &["[DONE]", "data: [DONE]"];

fn is_sentinel(line: &str) -> bool {
    STREAM_SENTINELS.contains(&line.trim())
}

/// Remove sentinel lines from a chunk, wherever they sit. `None` when only sentinels and
/// blank lines were left.
fn strip_sentinels(chunk: String) -> Option<String> {
    if !chunk.lines().any(is_sentinel) {
        return Some(chunk);
    }
    let kept: Vec<&str> = chunk
        .split_inclusive('\n')
        .filter(|line| !is_sentinel(line))
        .collect();
    if kept.iter().all(|line| line.trim().is_empty()) {
        return None;
    }
    Some(kept.concat())
}

/// Build the adapter request: optional system prompt first, then the conversation.
pub(crate) fn provider_request(model: &str, request: &ChatRequest, stream: bool) -> ProviderRequest {
    let mut messages = Vec::with_capacity(request.messages.len() + 1);
    if let Some(prompt) = request.system_prompt.as_deref().filter(|p| !p.trim().is_empty()) {
        messages.push(Message::system(prompt));
    }
    messages.extend(request.messages.iter().cloned());
    ProviderRequest {
        model: model.to_string(),
        messages,
        temperature: request.temperature,
        max_tokens: request.max_tokens,
        stream,
    }
}

/// Executes one provider+model call, rotating through eligible keys.
///
/// Each key attempt is wrapped in a [`RetryExecutor`]. On success the key's usage is
/// recorded and no other key is tried. A failure whose classification rotates keys marks
/// the key and moves on; any other failure is returned at once.
#[derive(Clone)]
pub struct DirectDispatcher {
    registry: Arc<ProviderRegistry>,
    keys: KeyManager,
    retry: RetryOptions,
}

impl DirectDispatcher {
    pub fn new(registry: Arc<ProviderRegistry>, keys: KeyManager, retry: RetryOptions) -> Self {
        Self {
            registry,
            keys,
            retry,
        }
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn keys(&self) -> &KeyManager {
        &self.keys
    }

    pub async fn dispatch(
        &self,
        provider: &str,
        model: &str,
        request: &ChatRequest,
    ) -> Result<ChatResponse> {
        let adapter = self.registry.get(provider)?;
        let provider_req = provider_request(model, request, false);
        let adapter = &adapter;
        let provider_req = &provider_req;

        let (mut response, _key) = self
            .rotate(provider, model, request, |key| async move {
                adapter.chat_completion(provider_req, &key).await
            })
            .await?;
        response.provider = Some(provider.to_string());
        response.model = Some(model.to_string());
        Ok(response)
    }

    /// Streaming variant. Rotation and retries only happen before the first chunk arrives;
    /// once text has been produced, later failures surface as an error item in the stream.
    pub async fn dispatch_stream(
        &self,
        provider: &str,
        model: &str,
        request: &ChatRequest,
    ) -> Result<TextStream> {
        let adapter = self.registry.get(provider)?;
        let provider_req = provider_request(model, request, true);
        let adapter = &adapter;
        let provider_req = &provider_req;
        let token = request.cancel.clone();
        let token = &token;

        let (stream, _key) = self
            .rotate(provider, model, request, |key| async move {
                open_stream(adapter.clone(), provider_req.clone(), key, token.clone()).await
            })
            .await?;
        Ok(stream)
    }

    async fn rotate<T, F, Fut>(
        &self,
        provider: &str,
        model: &str,
        request: &ChatRequest,
        call: F,
    ) -> Result<(T, ApiKeyRecord)>
    where
        F: Fn(ApiKeyRecord) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let cancel = CancellationBridge::new(request.cancel.clone());
        cancel.check()?;

        let keys = self.keys.eligible_keys(provider).await?;
        if keys.is_empty() {
            warn!(provider, model, "no eligible API keys");
            return Err(Error::NoEligibleKeys {
                provider: provider.to_string(),
            });
        }

        let mut tried: HashSet<String> = HashSet::new();
        let mut attempts = 0usize;
        let mut last_err: Option<Error> = None;

        for key in keys {
            if !tried.insert(key.secret().to_string()) {
                debug!(provider, key_id = key.id.as_str(), "skipping duplicate key");
                continue;
            }
            attempts += 1;

            let executor = RetryExecutor::new(self.retry, cancel.clone());
            let outcome = executor
                .run_if(|_| call(key.clone()), |e| classify(e).is_retryable)
                .await;

            match outcome {
                Ok(value) => {
                    self.keys.increment_usage(&key).await;
                    info!(
                        provider,
                        model,
                        key_id = key.id.as_str(),
                        rotations = attempts - 1,
                        "provider call succeeded"
                    );
                    return Ok((value, key));
                }
                Err(e) if e.is_cancelled() => return Err(e),
                Err(e) => {
                    let c = classify(&e);
                    if !c.should_rotate_key {
                        warn!(provider, model, category = %c.category, error = %e, "non-rotatable failure");
                        return Err(e);
                    }
                    warn!(
                        provider,
                        model,
                        key_id = key.id.as_str(),
                        category = %c.category,
                        error = %e,
                        "rotating to next API key"
                    );
                    self.keys
                        .mark_error(&key, &e.to_string(), c.category == ErrorCategory::Auth)
                        .await;
                    last_err = Some(e);
                }
            }
        }

        let source = last_err.unwrap_or_else(|| Error::NoEligibleKeys {
            provider: provider.to_string(),
        });
        Err(Error::KeysExhausted {
            provider: provider.to_string(),
            model: model.to_string(),
            attempts,
            source: Box::new(source),
        })
    }
}

/// Start the adapter's stream on a background task and wait for its first chunk.
///
/// An error before any output is returned as `Err` so the caller may retry or rotate.
/// Dropping the returned stream aborts the producer task.
async fn open_stream(
    adapter: Arc<dyn ProviderAdapter>,
    request: ProviderRequest,
    key: ApiKeyRecord,
    token: Option<tokio_util::sync::CancellationToken>,
) -> Result<TextStream> {
    let (tx, mut rx) = mpsc::unbounded_channel::<Result<String>>();
    let sink = ChannelSink::new(tx);

    let handle = tokio::spawn(async move {
        match adapter
            .stream_chat_completion(&request, &key, &sink)
            .await
        {
            Ok(()) => sink.end(),
            Err(e) => sink.fail(e),
        }
    });
    let producer = AbortOnDrop::new(handle);

    let first = loop {
        match rx.recv().await {
            Some(Ok(chunk)) => match strip_sentinels(chunk) {
                Some(chunk) => break Some(Ok(chunk)),
                None => continue,
            },
            other => break other,
        }
    };

    match first {
        None => Ok(Box::pin(futures::stream::empty::<Result<String>>())),
        Some(Err(e)) => Err(e),
        Some(Ok(chunk)) => {
            let rest = futures::stream::poll_fn(move |cx| rx.poll_recv(cx)).filter_map(|item| {
                futures::future::ready(match item {
                    Ok(chunk) => strip_sentinels(chunk).map(Ok),
                    Err(e) => Some(Err(e)),
                })
            });
            let stream = futures::stream::once(async move { Ok(chunk) }).chain(rest);
            Ok(Box::pin(ControlledStream::new(
                Box::pin(stream),
                token,
                Some(producer),
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinels_are_detected() {
        assert!(is_sentinel("[DONE]"));
        assert!(is_sentinel(" data: [DONE]\n\n"));
        assert!(!is_sentinel("DONE"));
    }

    #[test]
    fn sentinel_lines_are_stripped_inside_chunks() {
        assert_eq!(strip_sentinels("[DONE]".into()), None);
        assert_eq!(strip_sentinels("data: [DONE]\n\n".into()), None);
        assert_eq!(strip_sentinels("Bye.\ndata: [DONE]\n".into()).as_deref(), Some("Bye.\n"));
        assert_eq!(strip_sentinels("[DONE]\nlate".into()).as_deref(), Some("late"));
        assert_eq!(
            strip_sentinels("the word [DONE] mid-line".into()).as_deref(),
            Some("the word [DONE] mid-line")
        );
        assert_eq!(strip_sentinels("".into()).as_deref(), Some(""));
    }

    #[test]
    fn system_prompt_is_prepended() {
        let req = ChatRequest::new(vec![Message::user("hi")]).system_prompt("be brief");
        let p = provider_request("m", &req, true);
        assert_eq!(p.messages[0], Message::system("be brief"));
        assert_eq!(p.messages[1], Message::user("hi"));
        assert!(p.stream);
    }
}
