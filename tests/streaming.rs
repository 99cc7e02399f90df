//! Plain streaming: sentinel filtering, terminal events, cancellation and early drop.

mod common;

use ai_lib_gateway::{ChatRequest, Error, Message, StreamEvent};
use common::{catalog, harness, key, Harness, ScriptedAdapter, Step};
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;

fn single(adapter: &Arc<ScriptedAdapter>) -> Harness {
    harness(
        &[("openai", adapter.clone())],
        catalog(&[("openai", 10, "gpt-4o")]),
        vec![key("k", "openai", 10)],
    )
}

fn request() -> ChatRequest {
    ChatRequest::new(vec![Message::user("stream please")])
        .provider("openai")
        .model("gpt-4o")
}

fn texts(events: &[ai_lib_gateway::Result<StreamEvent>]) -> String {
    events
        .iter()
        .filter_map(|e| match e {
            Ok(StreamEvent::TextDelta { content }) => Some(content.as_str()),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn done_sentinel_is_dropped_and_finished_is_last() {
    let adapter = ScriptedAdapter::new("openai", Step::chunks(&["Hel", "lo", "[DONE]"]));
    let h = single(&adapter);

    let events: Vec<_> = h.gateway.chat_stream(request()).collect().await;
    assert_eq!(texts(&events), "Hello");
    assert_eq!(events.len(), 3);
    match events.last() {
        Some(Ok(StreamEvent::Finished { finish_reason })) => assert_eq!(finish_reason, "stop"),
        other => panic!("unexpected tail: {other:?}"),
    }
    assert!(adapter.calls()[0].request.stream);
}

#[tokio::test]
async fn done_line_glued_to_text_is_dropped() {
    let adapter = ScriptedAdapter::new(
        "openai",
        Step::chunks(&["data: [DONE]\n\n", "Hel", "lo\ndata: [DONE]\n\n"]),
    );
    let h = single(&adapter);

    let events: Vec<_> = h.gateway.chat_stream(request()).collect().await;
    assert_eq!(texts(&events), "Hello\n");
    assert!(matches!(events.last(), Some(Ok(StreamEvent::Finished { .. }))));
}

#[tokio::test]
async fn cancelling_a_pending_stream_yields_cancelled() {
    let adapter = ScriptedAdapter::new("openai", Step::Hang);
    let h = single(&adapter);
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let events: Vec<_> = tokio::time::timeout(
        Duration::from_secs(2),
        h.gateway.chat_stream(request().cancel_token(token)).collect::<Vec<_>>(),
    )
    .await
    .expect("stream ends after cancellation");

    assert!(matches!(events.last(), Some(Err(Error::Cancelled))));
    assert!(!events.iter().any(|e| matches!(e, Ok(StreamEvent::Finished { .. }))));
}

#[tokio::test]
async fn cancelling_mid_stream_stops_delivery() {
    let adapter = ScriptedAdapter::new("openai", Step::Endless);
    let h = single(&adapter);
    let token = CancellationToken::new();

    let mut stream = h.gateway.chat_stream(request().cancel_token(token.clone()));
    let first = stream.next().await.expect("first item");
    assert!(matches!(first, Ok(StreamEvent::TextDelta { .. })));

    token.cancel();
    let mut rest = Vec::new();
    while let Some(item) = stream.next().await {
        rest.push(item);
    }
    assert!(matches!(rest.last(), Some(Err(Error::Cancelled))));
    assert_eq!(rest.iter().filter(|e| e.is_err()).count(), 1);
}

#[tokio::test]
async fn failure_after_first_chunk_surfaces_as_error_item() {
    let adapter = ScriptedAdapter::new(
        "openai",
        Step::ChunksThenFail(vec!["partial ".into(), "answer".into()], "connection reset".into()),
    );
    let h = single(&adapter);

    let events: Vec<_> = h.gateway.chat_stream(request()).collect().await;
    assert_eq!(texts(&events), "partial answer");
    match events.last() {
        Some(Err(e)) => assert!(e.to_string().contains("connection reset")),
        other => panic!("expected error item, got {other:?}"),
    }
    // Already streaming: no retry and no Finished.
    assert_eq!(adapter.call_count(), 1);
    assert!(!events.iter().any(|e| matches!(e, Ok(StreamEvent::Finished { .. }))));
}

#[tokio::test]
async fn dropping_the_stream_stops_the_producer() {
    let adapter = ScriptedAdapter::new("openai", Step::Endless);
    let h = single(&adapter);

    let stream = h.gateway.chat_stream(request());
    let taken: Vec<_> = stream.take(3).collect().await;
    assert_eq!(taken.len(), 3);

    tokio::time::sleep(Duration::from_millis(30)).await;
    let settled = adapter.writes();
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(adapter.writes(), settled);
}

#[tokio::test]
async fn chunks_arrive_in_order_through_sse() {
    let adapter = ScriptedAdapter::new("openai", Step::chunks(&["a", "b", "c"]));
    let h = single(&adapter);

    let frames: Vec<_> = ai_lib_gateway::sse_stream(h.gateway.chat_stream(request()))
        .collect()
        .await;
    let body: String = frames
        .iter()
        .map(|f| String::from_utf8_lossy(f.as_ref().unwrap()).into_owned())
        .collect();
    let a = body.find("\"a\"").unwrap();
    let b = body.find("\"b\"").unwrap();
    let c = body.find("\"c\"").unwrap();
    assert!(a < b && b < c);
    assert!(body.contains(r#""finish_reason":"stop""#));
}
