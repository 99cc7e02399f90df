//! Server-sent-event framing for streamed responses.

use crate::types::StreamEvent;
use crate::BoxStream;
use bytes::Bytes;
use futures::StreamExt;

/// Map an event stream to `data: <json>\n\n` frames.
///
/// Errors pass through unchanged so the transport can close the connection as failed,
/// which the client sees as distinct from a clean end.
pub fn sse_stream(events: BoxStream<'static, StreamEvent>) -> BoxStream<'static, Bytes> {
    Box::pin(events.map(|item| item.map(|event| event.to_sse_frame())))
}
