//! HTTP client for the assistant server.
//!
//! Two endpoints: `/create_thread` (plain JSON request/response) and
//! `/chat_stream` (streamed UTF-8 reply, with a single-JSON fallback).

mod client;
mod decode;

pub use client::{AssistantBackend, BackendClient, EMPTY_REPLY_FALLBACK};
pub use decode::Utf8StreamDecoder;
