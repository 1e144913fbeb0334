use futures::{Stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use shared::chat_api::{Session, StreamChunk};
use shared::error::ChatError;
use shared::settings::AppSettings;
use std::sync::LazyLock;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

use crate::decode::Utf8StreamDecoder;

/// Rendered when the fallback path yields an empty or unparseable payload.
pub const EMPTY_REPLY_FALLBACK: &str = "No response received";

static SHARED_HTTP: LazyLock<Client> = LazyLock::new(|| {
    Client::builder()
        // Connect timeout only. A whole-request timeout would sever
        // long-running streamed replies mid-answer.
        .connect_timeout(Duration::from_secs(10))
        .pool_max_idle_per_host(2)
        .build()
        .expect("failed to build HTTP client")
});

#[derive(Debug, Serialize)]
struct CreateThreadRequest<'a> {
    website_url: &'a str,
    /// Reuse the server-side thread on navigation instead of allocating a
    /// new one for every page.
    #[serde(skip_serializing_if = "Option::is_none")]
    thread_id: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct CreateThreadResponse {
    #[serde(default)]
    thread_id: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct ChatStreamRequest<'a> {
    thread_id: &'a str,
    message: &'a str,
}

/// Single-payload fallback body, for servers without a streaming channel.
#[derive(Debug, Deserialize)]
struct ChatFallbackResponse {
    #[serde(default)]
    response: Option<String>,
}

/// Seam for the popup controller; lets tests drive exchanges without a server.
#[async_trait::async_trait]
pub trait AssistantBackend: Send + Sync {
    /// Bind (or rebind) a conversation thread to a page URL.
    async fn open_thread(
        &self,
        website_url: &str,
        previous: Option<&Session>,
    ) -> Result<Session, ChatError>;

    /// Send one message and stream the reply into `tx`.
    ///
    /// On success the channel always ends with `Done`. A failure after
    /// fragments were delivered ends it with `Error` instead; a transport
    /// failure before any fragment returns `Err` with nothing sent.
    async fn send_message(
        &self,
        session: &Session,
        message: &str,
        tx: UnboundedSender<StreamChunk>,
        cancel: CancellationToken,
    ) -> Result<(), ChatError>;
}

pub struct BackendClient {
    http: Client,
    base: String,
}

impl BackendClient {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            http: SHARED_HTTP.clone(),
            base: base.into(),
        }
    }

    pub fn from_settings(settings: &AppSettings) -> Self {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(settings.connect_timeout_secs))
            .pool_max_idle_per_host(2)
            .build()
            .expect("failed to build HTTP client");
        Self {
            http,
            base: settings.backend_base_url.clone(),
        }
    }
}

#[async_trait::async_trait]
impl AssistantBackend for BackendClient {
    async fn open_thread(
        &self,
        website_url: &str,
        previous: Option<&Session>,
    ) -> Result<Session, ChatError> {
        if website_url.is_empty() {
            return Err(ChatError::SessionCreation("empty page URL".into()));
        }

        let url = format!("{}/create_thread", self.base);
        let req = CreateThreadRequest {
            website_url,
            thread_id: previous.map(|s| s.thread_id.as_str()),
        };
        let resp = self
            .http
            .post(url)
            .json(&req)
            .send()
            .await
            .map_err(|e| ChatError::Transport(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(ChatError::Transport(format!(
                "create_thread returned {}",
                resp.status()
            )));
        }

        let body: CreateThreadResponse = resp
            .json()
            .await
            .map_err(|e| ChatError::SessionCreation(e.to_string()))?;
        if let Some(message) = body.error {
            return Err(ChatError::SessionCreation(message));
        }
        let thread_id = body
            .thread_id
            .ok_or_else(|| ChatError::SessionCreation("response carried no thread_id".into()))?;

        tracing::debug!(thread_id = %thread_id, url = %website_url, "thread ready");
        Ok(Session::new(thread_id, website_url))
    }

    async fn send_message(
        &self,
        session: &Session,
        message: &str,
        tx: UnboundedSender<StreamChunk>,
        cancel: CancellationToken,
    ) -> Result<(), ChatError> {
        // Checked before any network call.
        if session.thread_id.is_empty() {
            return Err(ChatError::NoActiveSession);
        }

        let url = format!("{}/chat_stream", self.base);
        let req = ChatStreamRequest {
            thread_id: &session.thread_id,
            message,
        };
        let resp = self
            .http
            .post(url)
            .json(&req)
            .send()
            .await
            .map_err(|e| ChatError::Transport(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(ChatError::Transport(format!(
                "chat_stream returned {}",
                resp.status()
            )));
        }

        // A JSON content type means the server has no incremental channel:
        // the whole reply arrives as one `{"response": ...}` payload.
        let is_json = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("application/json"));

        if is_json {
            let body = resp
                .text()
                .await
                .map_err(|e| ChatError::Transport(e.to_string()))?;
            let text = serde_json::from_str::<ChatFallbackResponse>(&body)
                .ok()
                .and_then(|b| b.response)
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| EMPTY_REPLY_FALLBACK.to_string());
            let _ = tx.send(StreamChunk::Text(text));
            let _ = tx.send(StreamChunk::Done);
            return Ok(());
        }

        pump_chunks(Box::pin(resp.bytes_stream()), &tx, &cancel).await;
        Ok(())
    }
}

/// Drive a byte stream to completion, decoding incrementally and forwarding
/// every non-empty fragment in arrival order. Always terminates the channel
/// with `Done` or `Error`.
async fn pump_chunks<S, B, E>(
    mut stream: S,
    tx: &UnboundedSender<StreamChunk>,
    cancel: &CancellationToken,
) where
    S: Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    let mut decoder = Utf8StreamDecoder::new();

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!("stream cancelled by caller");
                let _ = tx.send(StreamChunk::Done);
                return;
            }
            next = stream.next() => next,
        };

        match next {
            Some(Ok(bytes)) => {
                let text = decoder.feed(bytes.as_ref());
                if !text.is_empty() {
                    let _ = tx.send(StreamChunk::Text(text));
                }
            }
            Some(Err(e)) => {
                // Never a silent stop: partial replies end with a visible
                // error signal.
                let _ = tx.send(StreamChunk::Error(format!("stream read error: {e}")));
                return;
            }
            None => break,
        }
    }

    let tail = decoder.finish();
    if !tail.is_empty() {
        let _ = tx.send(StreamChunk::Text(tail));
    }
    let _ = tx.send(StreamChunk::Done);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use tokio::sync::mpsc;

    /// Accept one connection on a loopback port and answer with a scripted
    /// HTTP response. Returns the base URL to point the client at.
    fn spawn_one_shot_server(response: Vec<Vec<u8>>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind loopback");
        let port = listener.local_addr().unwrap().port();

        std::thread::spawn(move || {
            let (mut socket, _) = listener.accept().expect("accept");
            // Drain the request head plus a little body; enough for tests.
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf);
            for part in response {
                socket.write_all(&part).expect("write response");
                socket.flush().ok();
                std::thread::sleep(Duration::from_millis(10));
            }
        });

        format!("http://127.0.0.1:{port}")
    }

    fn http_response(status: &str, content_type: &str, body: &str) -> Vec<u8> {
        format!(
            "HTTP/1.1 {status}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        )
        .into_bytes()
    }

    fn session() -> Session {
        Session::new("thread_1", "https://example.com")
    }

    async fn collect(mut rx: mpsc::UnboundedReceiver<StreamChunk>) -> Vec<StreamChunk> {
        let mut chunks = Vec::new();
        while let Some(chunk) = rx.recv().await {
            chunks.push(chunk);
        }
        chunks
    }

    fn fragments(chunks: &[StreamChunk]) -> Vec<&str> {
        chunks
            .iter()
            .filter_map(|c| match c {
                StreamChunk::Text(t) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_open_thread_returns_server_thread_id() {
        let base = spawn_one_shot_server(vec![http_response(
            "200 OK",
            "application/json",
            r#"{"thread_id": "th_42"}"#,
        )]);
        let client = BackendClient::new(base);

        let session = client
            .open_thread("https://example.com/article", None)
            .await
            .unwrap();
        assert_eq!(session.thread_id, "th_42");
        assert_eq!(session.website_url, "https://example.com/article");
    }

    #[tokio::test]
    async fn test_open_thread_error_field_fails_session_creation() {
        let base = spawn_one_shot_server(vec![http_response(
            "200 OK",
            "application/json",
            r#"{"error": "could not fetch page"}"#,
        )]);
        let client = BackendClient::new(base);

        let err = client.open_thread("https://example.com", None).await;
        assert!(matches!(err, Err(ChatError::SessionCreation(_))));
    }

    #[tokio::test]
    async fn test_open_thread_non_2xx_is_transport_failure() {
        let base =
            spawn_one_shot_server(vec![http_response("500 Internal Server Error", "text/plain", "")]);
        let client = BackendClient::new(base);

        let err = client.open_thread("https://example.com", None).await;
        assert!(matches!(err, Err(ChatError::Transport(_))));
    }

    #[tokio::test]
    async fn test_empty_thread_id_fails_before_any_network_call() {
        // Unroutable base: reaching the network would fail differently.
        let client = BackendClient::new("http://127.0.0.1:1");
        let (tx, _rx) = mpsc::unbounded_channel();

        let err = client
            .send_message(
                &Session::new("", "https://example.com"),
                "hello",
                tx,
                CancellationToken::new(),
            )
            .await;
        assert!(matches!(err, Err(ChatError::NoActiveSession)));
    }

    #[tokio::test]
    async fn test_streamed_reply_concatenates_in_order() {
        let head = b"HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n".to_vec();
        let base = spawn_one_shot_server(vec![
            head,
            b"3\r\nHel\r\n".to_vec(),
            b"6\r\nlo wor\r\n".to_vec(),
            b"2\r\nld\r\n".to_vec(),
            b"0\r\n\r\n".to_vec(),
        ]);
        let client = BackendClient::new(base);
        let (tx, rx) = mpsc::unbounded_channel();

        client
            .send_message(&session(), "hi", tx, CancellationToken::new())
            .await
            .unwrap();

        let chunks = collect(rx).await;
        assert_eq!(fragments(&chunks).concat(), "Hello world");
        assert!(matches!(chunks.last(), Some(StreamChunk::Done)));
    }

    #[tokio::test]
    async fn test_json_fallback_yields_exactly_one_fragment() {
        let base = spawn_one_shot_server(vec![http_response(
            "200 OK",
            "application/json",
            r#"{"response": "Hi"}"#,
        )]);
        let client = BackendClient::new(base);
        let (tx, rx) = mpsc::unbounded_channel();

        client
            .send_message(&session(), "hey", tx, CancellationToken::new())
            .await
            .unwrap();

        let chunks = collect(rx).await;
        assert_eq!(fragments(&chunks), vec!["Hi"]);
        assert!(matches!(chunks.last(), Some(StreamChunk::Done)));
    }

    #[tokio::test]
    async fn test_json_fallback_empty_body_yields_fallback_string() {
        let base = spawn_one_shot_server(vec![http_response("200 OK", "application/json", "")]);
        let client = BackendClient::new(base);
        let (tx, rx) = mpsc::unbounded_channel();

        client
            .send_message(&session(), "hey", tx, CancellationToken::new())
            .await
            .unwrap();

        let chunks = collect(rx).await;
        assert_eq!(fragments(&chunks), vec![EMPTY_REPLY_FALLBACK]);
    }

    #[tokio::test]
    async fn test_chat_stream_http_500_yields_zero_fragments() {
        let base =
            spawn_one_shot_server(vec![http_response("500 Internal Server Error", "text/plain", "")]);
        let client = BackendClient::new(base);
        let (tx, rx) = mpsc::unbounded_channel();

        let err = client
            .send_message(&session(), "hi", tx, CancellationToken::new())
            .await;
        assert!(matches!(err, Err(ChatError::Transport(_))));
        assert!(collect(rx).await.is_empty());
    }

    // pump_chunks properties, independent of HTTP framing.

    #[tokio::test]
    async fn test_pump_reassembles_split_multibyte_character() {
        // "día" with the é-style two-byte í split across chunks
        let bytes = "día".as_bytes();
        let chunks: Vec<Result<Vec<u8>, String>> =
            vec![Ok(bytes[..2].to_vec()), Ok(bytes[2..].to_vec())];
        let (tx, rx) = mpsc::unbounded_channel();

        pump_chunks(
            futures::stream::iter(chunks),
            &tx,
            &CancellationToken::new(),
        )
        .await;
        drop(tx);

        let out = collect(rx).await;
        assert_eq!(fragments(&out).concat(), "día");
    }

    #[tokio::test]
    async fn test_pump_mid_stream_failure_ends_with_error_signal() {
        let chunks: Vec<Result<Vec<u8>, String>> = vec![
            Ok(b"first ".to_vec()),
            Ok(b"second".to_vec()),
            Err("connection reset".to_string()),
        ];
        let (tx, rx) = mpsc::unbounded_channel();

        pump_chunks(
            futures::stream::iter(chunks),
            &tx,
            &CancellationToken::new(),
        )
        .await;
        drop(tx);

        let out = collect(rx).await;
        assert_eq!(fragments(&out), vec!["first ", "second"]);
        assert!(matches!(out.last(), Some(StreamChunk::Error(_))));
    }

    #[tokio::test]
    async fn test_pump_cancellation_stops_delivery() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let chunks: Vec<Result<Vec<u8>, String>> =
            vec![Ok(b"never ".to_vec()), Ok(b"delivered".to_vec())];
        let (tx, rx) = mpsc::unbounded_channel();

        pump_chunks(futures::stream::iter(chunks), &tx, &cancel).await;
        drop(tx);

        let out = collect(rx).await;
        assert!(fragments(&out).is_empty());
        assert!(matches!(out.last(), Some(StreamChunk::Done)));
    }
}
