//! Page Pal terminal front-end.
//!
//! Stands in for the browser popup: stdin supplies events, stdout is the
//! display sink, and the controller in between is the same one any other
//! host binding would drive.

use backend::BackendClient;
use popup::controller::PopupController;
use popup::host::{self, StdinEventSource};
use popup::sink::{DisplaySink, TerminalSink};
use shared::events::EventSource;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let settings = host::load_settings();
    let start_url = std::env::args().nth(1).or_else(|| settings.start_url.clone());

    let backend = Arc::new(BackendClient::from_settings(&settings));
    let sink = Arc::new(TerminalSink::new());
    let mut controller = PopupController::new(backend, sink.clone());

    match start_url {
        Some(url) => controller.start(&url).await,
        None => sink.notice("No page yet. Use `/url <address>` to pick one."),
    }

    let mut events = StdinEventSource::new();
    while let Some(event) = events.next_event().await {
        controller.handle_event(event).await;
    }

    Ok(())
}
