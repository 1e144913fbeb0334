//! Display sink: where reply fragments and notices become visible.
//!
//! The controller never touches a screen itself; any front-end that can
//! show a growing reply implements this trait.

use parking_lot::Mutex;
use std::io::Write;

pub trait DisplaySink: Send + Sync {
    /// Show the user's own message in the conversation.
    fn user_message(&self, text: &str);
    /// Open an assistant reply that will grow fragment by fragment.
    fn begin_reply(&self);
    /// Append one fragment to the open reply.
    fn append_reply(&self, fragment: &str);
    /// The open reply is complete.
    fn finalize_reply(&self);
    /// Replace the open reply with an error message.
    fn fail_reply(&self, message: &str);
    /// Out-of-band status line (initializing, ready, navigation).
    fn notice(&self, text: &str);
}

/// Stdout-backed sink for the terminal front-end.
pub struct TerminalSink {
    reply_open: Mutex<bool>,
}

impl TerminalSink {
    pub fn new() -> Self {
        Self {
            reply_open: Mutex::new(false),
        }
    }
}

impl Default for TerminalSink {
    fn default() -> Self {
        Self::new()
    }
}

impl DisplaySink for TerminalSink {
    fn user_message(&self, _text: &str) {
        // The terminal already shows what the user typed.
    }

    fn begin_reply(&self) {
        print!("pal> ");
        let _ = std::io::stdout().flush();
        *self.reply_open.lock() = true;
    }

    fn append_reply(&self, fragment: &str) {
        print!("{fragment}");
        let _ = std::io::stdout().flush();
    }

    fn finalize_reply(&self) {
        println!();
        *self.reply_open.lock() = false;
    }

    fn fail_reply(&self, message: &str) {
        let mut open = self.reply_open.lock();
        if *open {
            println!();
        }
        println!("pal> {message}");
        *open = false;
    }

    fn notice(&self, text: &str) {
        println!("[page-pal] {text}");
    }
}
