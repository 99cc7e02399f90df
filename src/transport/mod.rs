//! Outbound framing of gateway responses.

pub mod sse;

pub use sse::sse_stream;
