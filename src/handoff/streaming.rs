//! SSE streaming helpers for the chat completions endpoint.
//!
//! OpenAI streams `data: {json}` events separated by blank lines and ends
//! the stream with `data: [DONE]`.

use serde::Deserialize;

pub const DONE_MARKER: &str = "[DONE]";

/// Parse complete SSE events that have no `event:` prefix.
///
/// Returns just the data payloads and removes processed events from the
/// buffer. A trailing partial event stays buffered for the next chunk.
pub fn parse_data_only_sse_events(buffer: &mut String) -> Vec<String> {
    let mut events = Vec::new();

    while let Some(pos) = buffer.find("\n\n") {
        let event_block = buffer[..pos].to_string();
        *buffer = buffer[pos + 2..].to_string();

        for line in event_block.lines() {
            let line = line.trim_end_matches('\r');
            if let Some(data) = line.strip_prefix("data:") {
                let data = data.trim_start();
                if !data.is_empty() {
                    events.push(data.to_string());
                }
            }
        }
    }

    events
}

/// Turns raw network chunks into SSE data payloads.
///
/// A chunk boundary can fall inside a multi-byte character, so an
/// incomplete UTF-8 sequence at the end of a chunk is held back until the
/// next one arrives.
#[derive(Debug, Default)]
pub struct SseDecoder {
    pending: Vec<u8>,
    text: String,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one chunk and returns the payloads of every event it completed.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);

        let complete = match std::str::from_utf8(&self.pending) {
            Ok(_) => self.pending.len(),
            Err(e) if e.error_len().is_none() => e.valid_up_to(),
            // Genuinely invalid bytes are replaced rather than stalling the stream.
            Err(_) => self.pending.len(),
        };

        let tail = self.pending.split_off(complete);
        self.text.push_str(&String::from_utf8_lossy(&self.pending));
        self.pending = tail;

        parse_data_only_sse_events(&mut self.text)
    }
}

#[derive(Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
}

#[derive(Deserialize, Default)]
struct StreamDelta {
    content: Option<String>,
}

/// What one streamed event contributes to the answer.
#[derive(Debug, PartialEq, Eq)]
pub enum StreamEvent {
    Delta(String),
    Done,
    /// Role-only or empty chunks, and payloads we do not understand.
    Ignored,
}

/// Interpret a single `data:` payload.
pub fn classify_event(data: &str) -> StreamEvent {
    if data.trim() == DONE_MARKER {
        return StreamEvent::Done;
    }

    match serde_json::from_str::<StreamChunk>(data) {
        Ok(chunk) => {
            let text: String = chunk
                .choices
                .into_iter()
                .filter_map(|c| c.delta.content)
                .collect();
            if text.is_empty() {
                StreamEvent::Ignored
            } else {
                StreamEvent::Delta(text)
            }
        }
        Err(e) => {
            log::debug!("[VISION] Skipping unparseable stream event: {}", e);
            StreamEvent::Ignored
        }
    }
}
