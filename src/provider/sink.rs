//! Sinks a provider adapter pushes streaming text into.

use crate::{Error, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tokio::sync::mpsc::UnboundedSender;

/// Push-side of a streaming response.
///
/// Adapters call [`write`](ChatSink::write) for every text delta and [`end`](ChatSink::end)
/// exactly once when the upstream stream completes. `write` returns `false` once the
/// consumer is gone; adapters should stop generating at that point.
pub trait ChatSink: Send + Sync {
    fn write(&self, chunk: &str) -> bool;
    fn end(&self);
    fn is_writable(&self) -> bool;
}

/// Sink backed by an unbounded tokio channel.
pub struct ChannelSink {
    tx: Mutex<Option<UnboundedSender<Result<String>>>>,
}

impl ChannelSink {
    pub fn new(tx: UnboundedSender<Result<String>>) -> Self {
        Self {
            tx: Mutex::new(Some(tx)),
        }
    }

    /// Push a terminal error and close the channel.
    pub fn fail(&self, error: Error) {
        if let Ok(mut guard) = self.tx.lock() {
            if let Some(tx) = guard.take() {
                let _ = tx.send(Err(error));
            }
        }
    }
}

impl ChatSink for ChannelSink {
    fn write(&self, chunk: &str) -> bool {
        let Ok(mut guard) = self.tx.lock() else {
            return false;
        };
        let Some(tx) = guard.as_ref() else {
            return false;
        };
        if tx.send(Ok(chunk.to_string())).is_err() {
            guard.take();
            return false;
        }
        true
    }

    fn end(&self) {
        if let Ok(mut guard) = self.tx.lock() {
            guard.take();
        }
    }

    fn is_writable(&self) -> bool {
        self.tx
            .lock()
            .map(|g| g.as_ref().is_some_and(|tx| !tx.is_closed()))
            .unwrap_or(false)
    }
}

/// In-memory sink for tests.
#[derive(Default)]
pub struct MemorySink {
    chunks: Mutex<Vec<String>>,
    ended: AtomicBool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn chunks(&self) -> Vec<String> {
        self.chunks.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn text(&self) -> String {
        self.chunks().concat()
    }

    pub fn is_ended(&self) -> bool {
        self.ended.load(Ordering::SeqCst)
    }
}

impl ChatSink for MemorySink {
    fn write(&self, chunk: &str) -> bool {
        if self.is_ended() {
            return false;
        }
        match self.chunks.lock() {
            Ok(mut chunks) => {
                chunks.push(chunk.to_string());
                true
            }
            Err(_) => false,
        }
    }

    fn end(&self) {
        self.ended.store(true, Ordering::SeqCst);
    }

    fn is_writable(&self) -> bool {
        !self.is_ended()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_sink_closes_on_end() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let sink = ChannelSink::new(tx);
        assert!(sink.write("a"));
        sink.end();
        assert!(!sink.is_writable());
        assert!(!sink.write("b"));
        assert_eq!(rx.try_recv().unwrap().unwrap(), "a");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn channel_sink_reports_dropped_consumer() {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let sink = ChannelSink::new(tx);
        drop(rx);
        assert!(!sink.is_writable());
        assert!(!sink.write("x"));
    }

    #[test]
    fn memory_sink_collects() {
        let sink = MemorySink::new();
        sink.write("he");
        sink.write("llo");
        sink.end();
        assert!(!sink.write("!"));
        assert_eq!(sink.text(), "hello");
        assert!(sink.is_ended());
    }
}
