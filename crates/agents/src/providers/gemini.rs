//! Google Gemini backend over `streamGenerateContent` (SSE).

use std::fmt;

use {
    courier_config::AgentConfig,
    courier_sessions::{Content, Session},
    futures::StreamExt,
    secrecy::{ExposeSecret, Secret},
    serde_json::{Value, json},
    tracing::{debug, trace, warn},
};

use crate::{
    error::{Error, Result},
    model::{ReasoningBackend, ResponseEvent, ResponseStream},
};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

pub struct GeminiBackend {
    api_key: Secret<String>,
    model: String,
    base_url: String,
    /// Author name stamped on emitted events.
    agent_name: String,
    instruction: Option<String>,
    google_search: bool,
    max_output_tokens: u32,
    client: reqwest::Client,
}

impl fmt::Debug for GeminiBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiBackend")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("agent_name", &self.agent_name)
            .field("google_search", &self.google_search)
            .finish_non_exhaustive()
    }
}

impl GeminiBackend {
    pub fn new(api_key: Secret<String>, model: impl Into<String>) -> Self {
        Self {
            api_key,
            model: model.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            agent_name: "courier".to_string(),
            instruction: None,
            google_search: false,
            max_output_tokens: 8192,
            client: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &AgentConfig) -> Result<Self> {
        let model = config.model.trim();
        if model.is_empty() || model.contains(['/', '?', '#', ' ']) {
            return Err(Error::InvalidModel {
                model: config.model.clone(),
            });
        }
        let client = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(Error::Client)?;
        let instruction = Some(config.instruction.clone()).filter(|s| !s.trim().is_empty());
        Ok(Self {
            api_key: config.api_key.clone(),
            model: model.to_string(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            agent_name: config.app_name.clone(),
            instruction,
            google_search: config.google_search,
            max_output_tokens: config.max_output_tokens,
            client,
        })
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    #[must_use]
    pub fn with_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = Some(instruction.into());
        self
    }

    #[must_use]
    pub fn with_google_search(mut self, enabled: bool) -> Self {
        self.google_search = enabled;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn request_body(&self, history: &[Content], text: &str) -> Value {
        let mut contents: Vec<Value> = history.iter().map(to_gemini_content).collect();
        contents.push(to_gemini_content(&Content::user(text)));

        let mut body = json!({
            "contents": contents,
            "generationConfig": {
                "maxOutputTokens": self.max_output_tokens,
            },
        });
        if let Some(ref instruction) = self.instruction {
            body["systemInstruction"] = json!({ "parts": [{ "text": instruction }] });
        }
        if self.google_search {
            body["tools"] = json!([{ "google_search": {} }]);
        }
        body
    }
}

fn to_gemini_content(content: &Content) -> Value {
    json!({
        "role": content.role.as_str(),
        "parts": [{ "text": content.text }],
    })
}

/// Text and completion state carried by one SSE `data:` payload.
#[derive(Debug, Default, PartialEq, Eq)]
struct Chunk {
    texts: Vec<String>,
    finish_reason: Option<String>,
}

fn parse_chunk(data: &str) -> Result<Chunk> {
    let evt: Value = serde_json::from_str(data)
        .map_err(|e| Error::reasoning_failed(format!("malformed stream event: {e}")))?;

    if let Some(err) = evt.get("error") {
        let message = err["message"].as_str().unwrap_or("unknown error");
        return Err(Error::reasoning_failed(format!("backend error: {message}")));
    }

    let candidate = &evt["candidates"][0];
    let texts = candidate["content"]["parts"]
        .as_array()
        .map(|parts| {
            parts
                .iter()
                .filter_map(|part| part["text"].as_str())
                .filter(|text| !text.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    // A blocked prompt has no candidates, only a block reason.
    let finish_reason = candidate["finishReason"]
        .as_str()
        .or_else(|| evt["promptFeedback"]["blockReason"].as_str())
        .map(str::to_string);

    Ok(Chunk {
        texts,
        finish_reason,
    })
}

/// Splits a byte stream into SSE events.
///
/// Bytes are buffered raw and only complete events are decoded, so a UTF-8
/// sequence split across network chunks is reassembled intact.
#[derive(Debug, Default)]
struct SseBuffer {
    buf: Vec<u8>,
}

impl SseBuffer {
    fn push(&mut self, bytes: &[u8]) {
        // `\r` never occurs inside a multi-byte sequence; dropping it turns
        // CRLF framing into LF framing.
        self.buf.extend(bytes.iter().copied().filter(|&b| b != b'\r'));
    }

    /// Next complete event block, without its terminating blank line.
    fn next_event(&mut self) -> Option<Result<String>> {
        let pos = self.buf.windows(2).position(|w| w == b"\n\n")?;
        let block: Vec<u8> = self.buf.drain(..pos + 2).take(pos).collect();
        Some(
            String::from_utf8(block)
                .map_err(|e| Error::reasoning_failed(format!("stream event is not UTF-8: {e}"))),
        )
    }
}

impl ReasoningBackend for GeminiBackend {
    fn name(&self) -> &str {
        "gemini"
    }

    fn run_turn(&self, session: Session, text: String) -> ResponseStream<'_> {
        Box::pin(async_stream::stream! {
            let history = session.history().await;
            let body = self.request_body(&history, &text);
            let url = format!(
                "{}/v1beta/models/{}:streamGenerateContent?alt=sse",
                self.base_url, self.model
            );

            debug!(
                model = %self.model,
                identity = %session.identity(),
                history_len = history.len(),
                google_search = self.google_search,
                "gemini stream request"
            );
            trace!(body = %body, "gemini request body");

            let resp = match self
                .client
                .post(&url)
                .header("x-goog-api-key", self.api_key.expose_secret())
                .header("content-type", "application/json")
                .json(&body)
                .send()
                .await
            {
                Ok(r) => r,
                Err(e) => {
                    yield Err(Error::reasoning_failed(e.without_url().to_string()));
                    return;
                },
            };

            let status = resp.status();
            if !status.is_success() {
                let body_text = resp.text().await.unwrap_or_default();
                warn!(status = %status, body = %body_text, "gemini API error");
                yield Err(Error::reasoning_failed(format!("HTTP {}: {body_text}", status.as_u16())));
                return;
            }

            let mut byte_stream = resp.bytes_stream();
            let mut events = SseBuffer::default();
            let mut answer = String::new();

            while let Some(chunk) = byte_stream.next().await {
                let chunk = match chunk {
                    Ok(c) => c,
                    Err(e) => {
                        yield Err(Error::reasoning_failed(e.without_url().to_string()));
                        return;
                    },
                };
                events.push(&chunk);

                while let Some(block) = events.next_event() {
                    let block = match block {
                        Ok(b) => b,
                        Err(e) => {
                            yield Err(e);
                            return;
                        },
                    };

                    for line in block.lines() {
                        let Some(data) = line.strip_prefix("data: ") else {
                            continue;
                        };
                        let parsed = match parse_chunk(data) {
                            Ok(p) => p,
                            Err(e) => {
                                yield Err(e);
                                return;
                            },
                        };

                        for piece in parsed.texts {
                            answer.push_str(&piece);
                            yield Ok(ResponseEvent::partial(&self.agent_name, piece));
                        }

                        if let Some(finish_reason) = parsed.finish_reason {
                            if !answer.is_empty() {
                                session
                                    .record_turn(Content::user(text.as_str()), Content::model(answer.as_str()))
                                    .await;
                            }
                            yield Ok(ResponseEvent::final_response(
                                &self.agent_name,
                                answer.clone(),
                                Some(finish_reason),
                            ));
                            return;
                        }
                    }
                }
            }

            debug!(model = %self.model, "gemini stream ended without finish reason");
        })
    }
}
