use async_trait::async_trait;
use futures::StreamExt;
use log::debug;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};
use std::error::Error as StdError;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use super::{ChatClient, ChunkStream};
use crate::models::chat::{ChatMessage, Role};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Streaming client for OpenAI-compatible chat completion endpoints.
pub struct OpenAiChatClient {
    http: HttpClient,
    model: String,
    base_url: String,
    temperature: f32,
}

#[derive(Serialize)]
struct WireMessage {
    role: &'static str,
    content: String,
}

#[derive(Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<WireMessage>,
    temperature: f32,
    stream: bool,
}

#[derive(Deserialize)]
struct StreamResponse {
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Default)]
struct StreamDelta {
    content: Option<String>,
}

/// Outcome of one `data:` line of the upstream SSE body.
#[derive(Debug, PartialEq)]
enum SseEvent {
    Delta(String),
    Done,
    Skip,
}

fn role_name(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::System => "system",
    }
}

fn parse_sse_line(line: &str) -> SseEvent {
    let line = line.trim_end_matches('\r');
    let Some(data) = line.strip_prefix("data: ") else {
        return SseEvent::Skip;
    };
    if data == "[DONE]" {
        return SseEvent::Done;
    }

    match serde_json::from_str::<StreamResponse>(data) {
        Ok(resp) => {
            for choice in resp.choices {
                if let Some(content) = choice.delta.content {
                    // Role-only and finish-reason-only frames carry no text
                    // and must not become output frames.
                    if !content.is_empty() {
                        return SseEvent::Delta(content);
                    }
                }
                if choice.finish_reason.as_deref() == Some("stop") {
                    return SseEvent::Done;
                }
            }
            SseEvent::Skip
        }
        Err(e) => {
            debug!("Skipping unparseable stream line: {} ({})", data, e);
            SseEvent::Skip
        }
    }
}

impl OpenAiChatClient {
    pub fn new(
        api_key: String,
        model: String,
        base_url: String,
        temperature: f32,
    ) -> Result<Self, Box<dyn StdError + Send + Sync>> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", api_key))
            .map_err(|e| format!("Invalid API key format: {}", e))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let http = HttpClient::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| Box::new(e) as Box<dyn StdError + Send + Sync>)?;

        Ok(Self {
            http,
            model,
            base_url,
            temperature,
        })
    }
}

#[async_trait]
impl ChatClient for OpenAiChatClient {
    async fn stream_chat(
        &self,
        messages: &[ChatMessage],
    ) -> Result<ChunkStream, Box<dyn StdError + Send + Sync>> {
        let req = ChatCompletionRequest {
            model: self.model.clone(),
            messages: messages
                .iter()
                .map(|m| WireMessage {
                    role: role_name(m.role),
                    content: m.content.clone(),
                })
                .collect(),
            temperature: self.temperature,
            stream: true,
        };

        // Dispatch and status check happen before any stream is handed out,
        // so auth/network failures stay on the pre-stream error path.
        let resp = self
            .http
            .post(&self.base_url)
            .json(&req)
            .send()
            .await
            .map_err(|e| Box::new(e) as Box<dyn StdError + Send + Sync>)?
            .error_for_status()
            .map_err(|e| Box::new(e) as Box<dyn StdError + Send + Sync>)?;

        let (tx, rx) = mpsc::channel::<Result<String, Box<dyn StdError + Send + Sync>>>(32);

        tokio::spawn(async move {
            let mut stream = resp.bytes_stream();
            // SSE lines can be split across network chunks, including in the
            // middle of a UTF-8 sequence; carry the tail over between reads.
            let mut buf: Vec<u8> = Vec::new();

            while let Some(chunk) = stream.next().await {
                let bytes = match chunk {
                    Ok(b) => b,
                    Err(e) => {
                        let _ = tx.send(Err(Box::new(e) as _)).await;
                        return;
                    }
                };
                buf.extend_from_slice(&bytes);

                while let Some(pos) = buf.iter().position(|&b| b == b'\n') {
                    let line: Vec<u8> = buf.drain(..=pos).collect();
                    let line = String::from_utf8_lossy(&line[..line.len() - 1]);
                    match parse_sse_line(&line) {
                        SseEvent::Delta(text) => {
                            if tx.send(Ok(text)).await.is_err() {
                                // Receiver dropped: the client is gone, stop
                                // draining the upstream connection.
                                return;
                            }
                        }
                        SseEvent::Done => return,
                        SseEvent::Skip => {}
                    }
                }
            }
        });

        Ok(Box::pin(ReceiverStream::new(rx)))
    }
}
