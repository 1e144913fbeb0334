//! Events delivered by the host environment to the popup runtime.
//!
//! A host is anything that can say "the page changed" and "the user sent
//! a message": a browser-extension binding, a stdin loop, a test script.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageEvent {
    /// The active page navigated to a new URL.
    UrlChanged(String),
    /// The user submitted a message about the current page.
    Submitted(String),
}

/// Abstract source of page events (tab listener, stdin loop, test script).
#[async_trait::async_trait]
pub trait EventSource: Send {
    /// Next event, or `None` when the host is shutting down.
    async fn next_event(&mut self) -> Option<PageEvent>;
}
