//! Benchmarks for tool-call detection on chunked model output
//!
//! This benchmark measures:
//! - Plain-text passthrough (no markers) at typical delta sizes
//! - Tool-call detection when the block arrives in one chunk vs. byte by byte
//! - SSE framing of text events

use ai_lib_gateway::tools::{ParserEvent, ToolStreamParser};
use ai_lib_gateway::StreamEvent;
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

const PROSE: &str = "The forecast for Oslo shows light rain in the morning, clearing by noon. \
Temperatures stay between 8 and 12 degrees, with a light breeze from the west [1]. ";

const TOOL_TURN: &str = r#"Let me look that up. [tool]{"name":"get_weather","params":{"city":"Oslo","unit":"c","days":3}}[/tool]"#;

fn chunk(text: &str, size: usize) -> Vec<String> {
    text.as_bytes()
        .chunks(size)
        .map(|c| String::from_utf8_lossy(c).into_owned())
        .collect()
}

fn run(chunks: &[String]) -> usize {
    let mut parser = ToolStreamParser::new();
    let mut events = 0;
    for c in chunks {
        for event in parser.feed(c) {
            if matches!(event, ParserEvent::ToolCall { .. }) {
                return events + 1;
            }
            events += 1;
        }
    }
    events + parser.finish().len()
}

fn bench_passthrough(c: &mut Criterion) {
    let mut group = c.benchmark_group("parser_passthrough");
    let text = PROSE.repeat(20);
    group.throughput(Throughput::Bytes(text.len() as u64));

    for size in [4usize, 16, 64] {
        let chunks = chunk(&text, size);
        group.bench_function(format!("chunk_{size}"), |b| b.iter(|| run(black_box(&chunks))));
    }
    group.finish();
}

fn bench_tool_detection(c: &mut Criterion) {
    let mut group = c.benchmark_group("parser_tool_detection");
    group.throughput(Throughput::Bytes(TOOL_TURN.len() as u64));

    let whole = vec![TOOL_TURN.to_string()];
    group.bench_function("single_chunk", |b| b.iter(|| run(black_box(&whole))));

    let bytes = chunk(TOOL_TURN, 1);
    group.bench_function("byte_chunks", |b| b.iter(|| run(black_box(&bytes))));
    group.finish();
}

fn bench_sse_framing(c: &mut Criterion) {
    let event = StreamEvent::text("Hello there, how can I help?");
    c.bench_function("sse_text_frame", |b| b.iter(|| black_box(&event).to_sse_frame()));
}

criterion_group!(benches, bench_passthrough, bench_tool_detection, bench_sse_framing);
criterion_main!(benches);
