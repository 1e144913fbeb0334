//! Types shared between the backend client and the popup runtime.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A conversation bound to one webpage.
///
/// Replaced wholesale whenever the active page URL changes; never persisted
/// across popup runs. An empty `thread_id` never reaches the wire — sending
/// is refused before any network call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Opaque server-side conversation identifier.
    pub thread_id: String,
    /// The page this conversation is about.
    pub website_url: String,
}

impl Session {
    pub fn new(thread_id: impl Into<String>, website_url: impl Into<String>) -> Self {
        Self {
            thread_id: thread_id.into(),
            website_url: website_url.into(),
        }
    }
}

/// One unit of a streamed assistant reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StreamChunk {
    /// A decoded text fragment, in arrival order.
    Text(String),
    /// The reply finished normally; no more fragments follow.
    Done,
    /// The reply failed after zero or more fragments; terminal.
    Error(String),
}

/// A message in the popup's in-memory transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String, // "user" | "assistant"
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".into(),
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}
