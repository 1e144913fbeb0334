//! Incremental UTF-8 decoder for streamed response bodies.
//!
//! Chunk boundaries fall anywhere, including inside a multi-byte character.
//! Decoding each chunk independently would mangle those characters, so the
//! decoder keeps the incomplete trailing sequence and prepends it to the
//! next chunk.

/// Stateful decoder that buffers incomplete trailing bytes across chunks.
pub struct Utf8StreamDecoder {
    pending: Vec<u8>,
}

impl Utf8StreamDecoder {
    pub fn new() -> Self {
        Self {
            pending: Vec::new(),
        }
    }

    /// Feed raw bytes from the response body. Returns the text that can be
    /// decoded so far; an incomplete trailing sequence is held back.
    pub fn feed(&mut self, chunk: &[u8]) -> String {
        self.pending.extend_from_slice(chunk);

        let mut out = String::new();
        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(text) => {
                    out.push_str(text);
                    self.pending.clear();
                    break;
                }
                Err(err) => {
                    let valid = err.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&self.pending[..valid]));
                    match err.error_len() {
                        // Genuinely invalid bytes: replace and keep scanning.
                        Some(bad) => {
                            out.push('\u{FFFD}');
                            self.pending.drain(..valid + bad);
                        }
                        // Incomplete sequence at the end: wait for more bytes.
                        None => {
                            self.pending.drain(..valid);
                            break;
                        }
                    }
                }
            }
        }
        out
    }

    /// Flush any bytes still held back at end of stream. A dangling partial
    /// sequence at that point is truncated input and decodes lossily.
    pub fn finish(&mut self) -> String {
        if self.pending.is_empty() {
            return String::new();
        }
        let tail = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        tail
    }
}

impl Default for Utf8StreamDecoder {
    fn default() -> Self {
        Self::new()
    }
}
