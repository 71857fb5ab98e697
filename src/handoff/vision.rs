//! Image-to-chat: sends a capture to the OpenAI chat completions API.
//!
//! Streams the answer and hands every text delta to a callback as it
//! arrives. Requires `OPENAI_API_KEY`.

use super::streaming::{self, SseDecoder, StreamEvent};
use super::transcript::TranscriptEntry;
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::Serialize;

pub const API_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
const MAX_TOKENS: u32 = 1024;
const TIMEOUT_SECS: u64 = 60;

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: Vec<ContentPart>,
}

#[derive(Serialize)]
#[serde(tag = "type")]
enum ContentPart {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image_url")]
    ImageUrl { image_url: ImageUrlDetail },
}

#[derive(Serialize)]
struct ImageUrlDetail {
    url: String,
    detail: String,
}

#[derive(Debug, thiserror::Error)]
pub enum VisionError {
    #[error("OPENAI_API_KEY is not set")]
    MissingApiKey,

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Response stream ended without any content")]
    EmptyAnswer,
}

pub struct VisionClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
    api_url: String,
}

impl VisionClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self, VisionError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            model: model.into(),
            api_url: API_URL.to_string(),
        })
    }

    /// Reads the key from `OPENAI_API_KEY` (a `.env` file is honoured).
    pub fn from_env(model: impl Into<String>) -> Result<Self, VisionError> {
        match std::env::var("OPENAI_API_KEY") {
            Ok(key) if !key.trim().is_empty() => Self::new(key.trim(), model),
            _ => Err(VisionError::MissingApiKey),
        }
    }

    /// Points the client at a compatible endpoint instead of api.openai.com.
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    /// Asks `prompt` about the PNG, with earlier transcript turns as context.
    ///
    /// `on_delta` sees each streamed text fragment; the full answer is returned.
    pub async fn ask<F>(
        &self,
        png: &[u8],
        prompt: &str,
        history: &[TranscriptEntry],
        mut on_delta: F,
    ) -> Result<String, VisionError>
    where
        F: FnMut(&str),
    {
        let request = build_request(&self.model, png, prompt, history);

        log::info!("[VISION] Model: {}", self.model);
        let start = std::time::Instant::now();

        let mut response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            log::error!("[VISION] API returned {}: {}", status, body);
            return Err(VisionError::Api {
                status: status.as_u16(),
                body,
            });
        }

        log::info!("[VISION] TTFB: {}ms", start.elapsed().as_millis());

        let mut answer = String::new();
        let mut decoder = SseDecoder::new();
        let mut ttft_logged = false;

        'stream: while let Some(chunk) = response.chunk().await? {
            for data in decoder.feed(&chunk) {
                match streaming::classify_event(&data) {
                    StreamEvent::Delta(text) => {
                        if !ttft_logged {
                            log::info!("[VISION] TTFT: {}ms", start.elapsed().as_millis());
                            ttft_logged = true;
                        }
                        on_delta(&text);
                        answer.push_str(&text);
                    }
                    StreamEvent::Done => break 'stream,
                    StreamEvent::Ignored => {}
                }
            }
        }

        log::info!(
            "[VISION] Answer complete: {} chars in {}ms",
            answer.len(),
            start.elapsed().as_millis()
        );

        if answer.trim().is_empty() {
            return Err(VisionError::EmptyAnswer);
        }
        Ok(answer)
    }
}

fn build_request<'a>(
    model: &'a str,
    png: &[u8],
    prompt: &str,
    history: &[TranscriptEntry],
) -> ChatRequest<'a> {
    let mut messages: Vec<ChatMessage> = history
        .iter()
        .map(|entry| ChatMessage {
            role: entry.role.clone(),
            content: vec![ContentPart::Text {
                text: entry.content.clone(),
            }],
        })
        .collect();

    messages.push(ChatMessage {
        role: "user".to_string(),
        content: vec![
            ContentPart::Text {
                text: prompt.to_string(),
            },
            ContentPart::ImageUrl {
                image_url: ImageUrlDetail {
                    url: format!("data:image/png;base64,{}", STANDARD.encode(png)),
                    detail: "high".to_string(),
                },
            },
        ],
    });

    ChatRequest {
        model,
        messages,
        max_tokens: MAX_TOKENS,
        stream: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_carries_image_and_history() {
        let history = vec![
            TranscriptEntry::new("user", "what is this?"),
            TranscriptEntry::new("assistant", "a chart"),
        ];
        let request = build_request("gpt-4o-mini", &[1, 2, 3], "and now?", &history);
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["model"], "gpt-4o-mini");
        assert_eq!(json["stream"], true);
        let messages = json["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1]["role"], "assistant");
        assert_eq!(messages[1]["content"][0]["text"], "a chart");

        let last = &messages[2]["content"];
        assert_eq!(last[0]["type"], "text");
        assert_eq!(last[0]["text"], "and now?");
        assert_eq!(last[1]["type"], "image_url");
        assert_eq!(last[1]["image_url"]["url"], "data:image/png;base64,AQID");
    }

    #[test]
    fn api_url_can_be_overridden() {
        let client = VisionClient::new("sk-test", DEFAULT_MODEL).unwrap();
        assert_eq!(client.api_url, API_URL);

        let client = client.with_api_url("http://127.0.0.1:8080/v1/chat/completions");
        assert_eq!(client.api_url, "http://127.0.0.1:8080/v1/chat/completions");
    }

    #[test]
    fn from_env_requires_key() {
        // Only meaningful when the variable is absent from the test environment.
        if std::env::var("OPENAI_API_KEY").is_err() {
            assert!(matches!(
                VisionClient::from_env(DEFAULT_MODEL),
                Err(VisionError::MissingApiKey)
            ));
        }
    }
}
