//! Error taxonomy for the chat pipeline.
//!
//! Every variant is handled at the call site by substituting user-visible
//! text in the display sink; nothing here propagates past the controller.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChatError {
    /// The create-thread endpoint was unreachable or answered with an
    /// application-level `error` field.
    #[error("could not create thread: {0}")]
    SessionCreation(String),

    /// A message was submitted with no live session. Checked before any
    /// network call is made.
    #[error("no active thread")]
    NoActiveSession,

    /// Non-success HTTP status, or the request never reached the server.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The byte stream failed after fragments were already delivered.
    #[error("stream interrupted: {0}")]
    MidStream(String),
}

impl ChatError {
    /// True when the failure happened after partial reply text was shown.
    pub fn is_mid_stream(&self) -> bool {
        matches!(self, ChatError::MidStream(_))
    }
}
