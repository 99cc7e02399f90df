//! Shared test helpers: a scripted provider adapter and gateway wiring.

#![allow(dead_code)]

use ai_lib_gateway::keys::{ApiKeyRecord, InMemoryKeyStore};
use ai_lib_gateway::provider::{ChatSink, ProviderAdapter, ProviderRequest};
use ai_lib_gateway::{ChatResponse, Error, Gateway, Result, StaticCatalog};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// What the adapter does for one call.
#[derive(Debug, Clone)]
pub enum Step {
    /// Whole reply; streamed as a single chunk.
    Reply(String),
    /// Streamed chunk by chunk; concatenated for non-streaming calls.
    Chunks(Vec<String>),
    /// Fail before producing anything.
    Fail(Option<u16>, String),
    /// Stream the chunks, then fail.
    ChunksThenFail(Vec<String>, String),
    /// Never respond.
    Hang,
    /// Stream `"x"` every few milliseconds until the consumer goes away.
    Endless,
    /// Stream the chunks, then behave like `Endless`.
    ChunksThenEndless(Vec<String>),
}

impl Step {
    pub fn reply(text: &str) -> Self {
        Step::Reply(text.to_string())
    }

    pub fn chunks(parts: &[&str]) -> Self {
        Step::Chunks(parts.iter().map(|s| s.to_string()).collect())
    }

    pub fn fail(status: u16, message: &str) -> Self {
        Step::Fail(Some(status), message.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub key_id: String,
    pub request: ProviderRequest,
}

/// Adapter whose behaviour is chosen per call: a per-secret override first, then the
/// next queued step, then the default.
pub struct ScriptedAdapter {
    name: String,
    default: Step,
    queue: Mutex<VecDeque<Step>>,
    per_secret: Mutex<HashMap<String, Step>>,
    calls: Mutex<Vec<RecordedCall>>,
    writes: AtomicUsize,
}

impl ScriptedAdapter {
    pub fn new(name: &str, default: Step) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            default,
            queue: Mutex::new(VecDeque::new()),
            per_secret: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            writes: AtomicUsize::new(0),
        })
    }

    pub fn then(&self, step: Step) -> &Self {
        self.queue.lock().unwrap().push_back(step);
        self
    }

    pub fn on_secret(&self, secret: &str, step: Step) -> &Self {
        self.per_secret.lock().unwrap().insert(secret.to_string(), step);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn key_ids(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.key_id).collect()
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn next_step(&self, request: &ProviderRequest, key: &ApiKeyRecord) -> Step {
        self.calls.lock().unwrap().push(RecordedCall {
            key_id: key.id.clone(),
            request: request.clone(),
        });
        if let Some(step) = self.per_secret.lock().unwrap().get(key.secret()) {
            return step.clone();
        }
        self.queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.default.clone())
    }

    fn failure(&self, status: Option<u16>, message: &str) -> Error {
        Error::provider(self.name.clone(), status, message)
    }
}

#[async_trait]
impl ProviderAdapter for ScriptedAdapter {
    async fn chat_completion(&self, request: &ProviderRequest, key: &ApiKeyRecord) -> Result<ChatResponse> {
        match self.next_step(request, key) {
            Step::Reply(text) => Ok(ChatResponse::text(text)),
            Step::Chunks(parts) => Ok(ChatResponse::text(parts.concat())),
            Step::Fail(status, message) => Err(self.failure(status, &message)),
            Step::ChunksThenFail(_, message) => Err(self.failure(None, &message)),
            Step::Hang | Step::Endless | Step::ChunksThenEndless(_) => {
                futures::future::pending().await
            }
        }
    }

    async fn stream_chat_completion(
        &self,
        request: &ProviderRequest,
        key: &ApiKeyRecord,
        sink: &dyn ChatSink,
    ) -> Result<()> {
        let write = |chunk: &str| {
            self.writes.fetch_add(1, Ordering::SeqCst);
            sink.write(chunk)
        };
        match self.next_step(request, key) {
            Step::Reply(text) => {
                write(&text);
            }
            Step::Chunks(parts) => {
                for part in parts {
                    if !write(&part) {
                        return Ok(());
                    }
                    tokio::task::yield_now().await;
                }
            }
            Step::Fail(status, message) => return Err(self.failure(status, &message)),
            Step::ChunksThenFail(parts, message) => {
                for part in parts {
                    write(&part);
                }
                return Err(self.failure(None, &message));
            }
            Step::Hang => futures::future::pending::<()>().await,
            Step::Endless => loop {
                if !write("x") {
                    return Ok(());
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            },
            Step::ChunksThenEndless(parts) => {
                for part in parts {
                    if !write(&part) {
                        return Ok(());
                    }
                }
                loop {
                    if !write("x") {
                        return Ok(());
                    }
                    tokio::time::sleep(Duration::from_millis(5)).await;
                }
            }
        }
        sink.end();
        Ok(())
    }
}

pub fn key(id: &str, provider: &str, priority: i32) -> ApiKeyRecord {
    ApiKeyRecord::new(id, provider, format!("secret-{id}"), priority)
}

/// Catalog with one model per provider: `(provider, provider priority, model)`.
pub fn catalog(entries: &[(&str, i32, &str)]) -> StaticCatalog {
    entries.iter().fold(StaticCatalog::new(), |c, (provider, priority, model)| {
        c.provider(*provider, *priority).model(*provider, *model, 10)
    })
}

pub struct Harness {
    pub gateway: Gateway,
    pub store: Arc<InMemoryKeyStore>,
}

/// Gateway over the given adapters with fast retries (2 attempts, 1ms apart).
pub fn harness(
    adapters: &[(&str, Arc<ScriptedAdapter>)],
    catalog: StaticCatalog,
    keys: Vec<ApiKeyRecord>,
) -> Harness {
    let store = Arc::new(InMemoryKeyStore::new());
    for k in keys {
        store.insert(k);
    }
    let mut builder = Gateway::builder()
        .catalog(Arc::new(catalog))
        .key_store(store.clone())
        .retry(2, Duration::from_millis(1))
        .tool_backoff(ai_lib_gateway::resilience::ExponentialBackoff {
            max_retries: 1,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        });
    for (name, adapter) in adapters {
        builder = builder.with_adapter(*name, adapter.clone());
    }
    Harness {
        gateway: builder.build().expect("gateway builds"),
        store,
    }
}
