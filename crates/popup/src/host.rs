//! Terminal host binding: stdin as the event source, a JSON file under the
//! user config dir as the settings store.

use shared::events::{EventSource, PageEvent};
use shared::settings::AppSettings;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

/// Turns stdin lines into page events.
///
/// `/url <address>` navigates, `/quit` shuts down, anything else is a
/// message about the current page.
pub struct StdinEventSource {
    lines: Lines<BufReader<Stdin>>,
}

impl StdinEventSource {
    pub fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }
}

impl Default for StdinEventSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl EventSource for StdinEventSource {
    async fn next_event(&mut self) -> Option<PageEvent> {
        loop {
            let line = match self.lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) | Err(_) => return None,
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if line == "/quit" {
                return None;
            }
            if let Some(raw) = line.strip_prefix("/url ") {
                match url::Url::parse(raw.trim()) {
                    Ok(parsed) => return Some(PageEvent::UrlChanged(parsed.to_string())),
                    Err(e) => {
                        tracing::warn!(input = raw, error = %e, "not a valid URL");
                        continue;
                    }
                }
            }
            return Some(PageEvent::Submitted(line.to_string()));
        }
    }
}

/// Settings from `<config dir>/page-pal/settings.json`, defaults when the
/// file is missing or the platform has no config dir.
pub fn load_settings() -> AppSettings {
    let Some(dirs) = directories::ProjectDirs::from("", "", "page-pal") else {
        return AppSettings::default();
    };
    load_settings_from(&dirs.config_dir().join("settings.json"))
}

pub fn load_settings_from(path: &Path) -> AppSettings {
    match std::fs::read_to_string(path) {
        Ok(raw) => match serde_json::from_str(&raw) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "settings file unreadable, using defaults");
                AppSettings::default()
            }
        },
        Err(_) => AppSettings::default(),
    }
}
