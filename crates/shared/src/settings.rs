//! Runtime settings. Pure data; file IO lives in the popup crate.

use serde::{Deserialize, Serialize};

fn default_backend_base_url() -> String {
    "http://127.0.0.1:5000".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    /// Base URL of the assistant server (`/create_thread`, `/chat_stream`).
    #[serde(default = "default_backend_base_url")]
    pub backend_base_url: String,
    /// TCP connect timeout. There is deliberately no whole-request timeout:
    /// it would sever long-running streamed replies.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Page to open a thread for at startup, when the host supplies none.
    #[serde(default)]
    pub start_url: Option<String>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            backend_base_url: default_backend_base_url(),
            connect_timeout_secs: default_connect_timeout_secs(),
            start_url: None,
        }
    }
}
