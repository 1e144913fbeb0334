//! The popup's conversation controller.
//!
//! Owns the one mutable session and drives a single exchange at a time:
//! user message out, streamed reply fragments in, everything rendered
//! through the display sink. Errors never propagate past this layer; they
//! become visible text instead.

use backend::AssistantBackend;
use shared::chat_api::{ChatMessage, Session, StreamChunk};
use shared::events::PageEvent;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::sink::DisplaySink;

// Wording shown in the chat panel.
pub const NOTICE_INIT: &str = "Initializing... Please wait while I analyze this website.";
pub const NOTICE_READY: &str = "Ready! What would you like to know about this website?";
pub const NOTICE_INIT_FAILED: &str =
    "Sorry, I couldn't connect to the website. Please try again later.";
pub const NOTICE_NAVIGATED: &str =
    "I notice you've navigated to a new page. Let me analyze it...";
pub const NOTICE_NAV_READY: &str = "I'm ready to answer questions about this new page.";
pub const NOTICE_NAV_FAILED: &str =
    "I had trouble analyzing this new page. Please try refreshing.";
pub const NOTICE_BUSY: &str = "One moment - I'm still answering your previous question.";
pub const REPLY_ERROR: &str = "Sorry, I encountered an error. Please try again.";

/// Lifecycle of one exchange. Terminal states stay until the next submit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeState {
    Idle,
    Sending,
    Streaming,
    Completed,
    Failed,
}

pub struct PopupController {
    backend: Arc<dyn AssistantBackend>,
    sink: Arc<dyn DisplaySink>,
    session: Option<Session>,
    state: ExchangeState,
    transcript: Vec<ChatMessage>,
    cancel_root: CancellationToken,
}

impl PopupController {
    pub fn new(backend: Arc<dyn AssistantBackend>, sink: Arc<dyn DisplaySink>) -> Self {
        Self {
            backend,
            sink,
            session: None,
            state: ExchangeState::Idle,
            transcript: Vec::new(),
            cancel_root: CancellationToken::new(),
        }
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn state(&self) -> ExchangeState {
        self.state
    }

    pub fn transcript(&self) -> &[ChatMessage] {
        &self.transcript
    }

    /// Cancelling this token aborts the active stream (and all future ones).
    pub fn cancel_handle(&self) -> CancellationToken {
        self.cancel_root.clone()
    }

    fn is_busy(&self) -> bool {
        matches!(self.state, ExchangeState::Sending | ExchangeState::Streaming)
    }

    /// Popup-open initialization: bind a thread to the starting page.
    pub async fn start(&mut self, website_url: &str) {
        self.sink.notice(NOTICE_INIT);
        match self.backend.open_thread(website_url, None).await {
            Ok(session) => {
                self.session = Some(session);
                self.sink.notice(NOTICE_READY);
            }
            Err(e) => {
                tracing::warn!(url = %website_url, error = %e, "initial thread creation failed");
                self.session = None;
                self.sink.notice(NOTICE_INIT_FAILED);
            }
        }
    }

    pub async fn handle_event(&mut self, event: PageEvent) {
        match event {
            PageEvent::UrlChanged(url) => self.url_changed(&url).await,
            PageEvent::Submitted(text) => self.submit(&text).await,
        }
    }

    /// The page navigated: rebind the thread to the new URL. The previous
    /// session is passed along so the server can update the existing thread
    /// context instead of allocating a fresh one.
    async fn url_changed(&mut self, url: &str) {
        self.sink.notice(NOTICE_NAVIGATED);
        let previous = self.session.take();
        match self.backend.open_thread(url, previous.as_ref()).await {
            Ok(session) => {
                self.session = Some(session);
                self.sink.notice(NOTICE_NAV_READY);
            }
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "thread rebind failed");
                // Messaging stays disabled until the next navigation.
                self.sink.notice(NOTICE_NAV_FAILED);
            }
        }
    }

    /// Run one exchange: send the message, stream the reply into the sink.
    pub async fn submit(&mut self, text: &str) {
        if self.is_busy() {
            self.sink.notice(NOTICE_BUSY);
            return;
        }
        let text = text.trim();
        if text.is_empty() {
            return;
        }

        self.sink.user_message(text);
        self.transcript.push(ChatMessage::user(text));
        self.sink.begin_reply();

        // No live session: fail locally, zero network calls.
        let Some(session) = self.session.clone() else {
            tracing::warn!("message submitted with no active thread");
            self.fail_exchange();
            return;
        };

        self.state = ExchangeState::Sending;
        let exchange = Uuid::new_v4();
        tracing::debug!(%exchange, thread_id = %session.thread_id, "sending message");

        let (tx, mut rx) = mpsc::unbounded_channel();
        let cancel = self.cancel_root.child_token();
        let backend = Arc::clone(&self.backend);
        let message = text.to_string();
        let send_task =
            tokio::spawn(async move { backend.send_message(&session, &message, tx, cancel).await });

        let mut reply = String::new();
        let mut failed = false;
        while let Some(chunk) = rx.recv().await {
            match chunk {
                StreamChunk::Text(fragment) => {
                    self.state = ExchangeState::Streaming;
                    reply.push_str(&fragment);
                    self.sink.append_reply(&fragment);
                }
                StreamChunk::Done => break,
                StreamChunk::Error(e) => {
                    tracing::warn!(%exchange, error = %e, "reply stream failed mid-flight");
                    failed = true;
                    break;
                }
            }
        }

        match send_task.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::warn!(%exchange, error = %e, "exchange failed");
                failed = true;
            }
            Err(e) => {
                tracing::warn!(%exchange, error = %e, "stream task aborted");
                failed = true;
            }
        }

        if failed {
            self.fail_exchange();
        } else {
            self.sink.finalize_reply();
            self.transcript.push(ChatMessage::assistant(reply));
            self.state = ExchangeState::Completed;
        }
    }

    fn fail_exchange(&mut self) {
        self.sink.fail_reply(REPLY_ERROR);
        self.transcript.push(ChatMessage::assistant(REPLY_ERROR));
        self.state = ExchangeState::Failed;
    }
}
