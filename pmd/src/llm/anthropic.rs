//! Anthropic Messages API client

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use reqwest_eventsource::{Event, EventSource};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::{CompletionRequest, CompletionResponse, LlmClient, LlmError, StopReason, StreamChunk, TokenUsage, ToolCall};
use crate::config::LlmConfig;

const API_VERSION: &str = "2023-06-01";

/// Retries after the first attempt for retryable failures
const MAX_RETRIES: u32 = 3;

const INITIAL_BACKOFF_MS: u64 = 1000;

/// Longest we honour a server-provided retry-after
const MAX_RETRY_AFTER: Duration = Duration::from_secs(60);

pub struct AnthropicClient {
    model: String,
    api_key: String,
    base_url: String,
    http: Client,
    max_tokens: u32,
}

impl AnthropicClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        debug!(model = %config.model, base_url = %config.base_url, "AnthropicClient::from_config: called");
        let api_key = config.get_api_key().map_err(|e| LlmError::Config(e.to_string()))?;
        let http = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;

        Ok(Self {
            model: config.model.clone(),
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http,
            max_tokens: config.max_tokens,
        })
    }

    fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.base_url)
    }

    fn build_request_body(&self, request: &CompletionRequest, stream: bool) -> Result<Value, LlmError> {
        let mut body = json!({
            "model": self.model,
            "max_tokens": request.max_tokens.min(self.max_tokens),
            "system": request.system_prompt,
            "messages": serde_json::to_value(&request.messages)?,
        });
        if !request.tools.is_empty() {
            body["tools"] = serde_json::to_value(&request.tools)?;
        }
        if stream {
            body["stream"] = json!(true);
        }
        Ok(body)
    }

    fn request_builder(&self, body: &Value) -> reqwest::RequestBuilder {
        self.http
            .post(self.messages_url())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(body)
    }

    /// One POST, mapped to a typed error on non-success
    async fn send_once(&self, body: &Value) -> Result<reqwest::Response, LlmError> {
        let response = self.request_builder(body).send().await?;
        let status = response.status().as_u16();

        if status == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(MAX_RETRY_AFTER);
            return Err(LlmError::RateLimited { retry_after });
        }

        if !response.status().is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(LlmError::ApiError { status, message });
        }

        Ok(response)
    }

    async fn send_with_retry(&self, body: &Value) -> Result<reqwest::Response, LlmError> {
        let mut attempt = 0;
        loop {
            match self.send_once(body).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_retryable() && attempt < MAX_RETRIES => {
                    let backoff = e
                        .retry_after()
                        .map(|d| d.min(MAX_RETRY_AFTER))
                        .unwrap_or_else(|| Duration::from_millis(INITIAL_BACKOFF_MS * 2u64.pow(attempt)));
                    attempt += 1;
                    warn!(attempt, ?backoff, error = %e, "AnthropicClient: retrying after transient error");
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        debug!(model = %self.model, messages = request.messages.len(), "AnthropicClient::complete: called");
        let body = self.build_request_body(&request, false)?;
        let response = self.send_with_retry(&body).await?;
        let api_response: AnthropicResponse = response.json().await?;
        Ok(api_response.into_completion())
    }

    async fn stream(
        &self,
        request: CompletionRequest,
        chunk_tx: mpsc::Sender<StreamChunk>,
    ) -> Result<CompletionResponse, LlmError> {
        debug!(model = %self.model, messages = request.messages.len(), "AnthropicClient::stream: called");
        let body = self.build_request_body(&request, true)?;
        let mut es = EventSource::new(self.request_builder(&body))
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        let mut acc = StreamAccumulator::default();
        while let Some(event) = es.next().await {
            match event {
                Ok(Event::Open) => debug!("AnthropicClient::stream: opened"),
                Ok(Event::Message(msg)) => {
                    let data: Value = serde_json::from_str(&msg.data)?;
                    for chunk in acc.apply(&data) {
                        let _ = chunk_tx.send(chunk).await;
                    }
                    if acc.is_done() {
                        break;
                    }
                }
                Err(reqwest_eventsource::Error::StreamEnded) => break,
                Err(e) => {
                    let _ = chunk_tx.send(StreamChunk::Error(e.to_string())).await;
                    es.close();
                    return Err(LlmError::InvalidResponse(e.to_string()));
                }
            }
        }
        es.close();

        let response = acc.finish();
        let _ = chunk_tx
            .send(StreamChunk::MessageDone {
                stop_reason: response.stop_reason,
                usage: response.usage,
            })
            .await;
        Ok(response)
    }
}

/// Folds server-sent events into a completion
#[derive(Debug, Default)]
struct StreamAccumulator {
    text: String,
    tool_calls: Vec<ToolCall>,
    /// (id, name, accumulated input json)
    current_tool: Option<(String, String, String)>,
    stop_reason: Option<StopReason>,
    usage: TokenUsage,
    done: bool,
}

impl StreamAccumulator {
    fn apply(&mut self, data: &Value) -> Vec<StreamChunk> {
        let mut chunks = Vec::new();
        match data["type"].as_str() {
            Some("message_start") => {
                let u = &data["message"]["usage"];
                self.usage.input_tokens = u["input_tokens"].as_u64().unwrap_or(0);
                self.usage.cache_read_tokens = u["cache_read_input_tokens"].as_u64().unwrap_or(0);
                self.usage.cache_creation_tokens = u["cache_creation_input_tokens"].as_u64().unwrap_or(0);
            }
            Some("content_block_start") => {
                let block = &data["content_block"];
                if block["type"] == "tool_use" {
                    let id = block["id"].as_str().unwrap_or_default().to_string();
                    let name = block["name"].as_str().unwrap_or_default().to_string();
                    chunks.push(StreamChunk::ToolUseStart {
                        id: id.clone(),
                        name: name.clone(),
                    });
                    self.current_tool = Some((id, name, String::new()));
                }
            }
            Some("content_block_delta") => {
                let delta = &data["delta"];
                if let Some(text) = delta["text"].as_str() {
                    self.text.push_str(text);
                    chunks.push(StreamChunk::TextDelta(text.to_string()));
                }
                if let (Some(partial), Some((_, _, acc))) = (delta["partial_json"].as_str(), self.current_tool.as_mut()) {
                    acc.push_str(partial);
                }
            }
            Some("content_block_stop") => {
                if let Some((id, name, json)) = self.current_tool.take() {
                    let input = if json.trim().is_empty() {
                        json!({})
                    } else {
                        serde_json::from_str(&json).unwrap_or_else(|e| {
                            warn!(%id, %name, error = %e, "StreamAccumulator: unparseable tool input");
                            json!({})
                        })
                    };
                    chunks.push(StreamChunk::ToolUseEnd { id: id.clone() });
                    self.tool_calls.push(ToolCall { id, name, input });
                }
            }
            Some("message_delta") => {
                if let Some(sr) = data["delta"]["stop_reason"].as_str() {
                    self.stop_reason = Some(StopReason::from_anthropic(sr));
                }
                if let Some(out) = data["usage"]["output_tokens"].as_u64() {
                    self.usage.output_tokens = out;
                }
            }
            Some("message_stop") => self.done = true,
            Some("error") => {
                let message = data["error"]["message"].as_str().unwrap_or("stream error");
                chunks.push(StreamChunk::Error(message.to_string()));
                self.done = true;
            }
            _ => {}
        }
        chunks
    }

    fn is_done(&self) -> bool {
        self.done
    }

    fn finish(self) -> CompletionResponse {
        let stop_reason = self.stop_reason.unwrap_or(if self.tool_calls.is_empty() {
            StopReason::EndTurn
        } else {
            StopReason::ToolUse
        });
        CompletionResponse {
            content: if self.text.is_empty() { None } else { Some(self.text) },
            tool_calls: self.tool_calls,
            stop_reason,
            usage: self.usage,
        }
    }
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContentBlock>,
    stop_reason: Option<String>,
    usage: AnthropicUsage,
}

impl AnthropicResponse {
    fn into_completion(self) -> CompletionResponse {
        let mut texts = Vec::new();
        let mut tool_calls = Vec::new();
        for block in self.content {
            match block {
                AnthropicContentBlock::Text { text } => texts.push(text),
                AnthropicContentBlock::ToolUse { id, name, input } => tool_calls.push(ToolCall { id, name, input }),
                AnthropicContentBlock::Other => debug!("AnthropicResponse: skipping unsupported block"),
            }
        }

        CompletionResponse {
            content: if texts.is_empty() { None } else { Some(texts.join("\n")) },
            tool_calls,
            stop_reason: self
                .stop_reason
                .as_deref()
                .map(StopReason::from_anthropic)
                .unwrap_or(StopReason::EndTurn),
            usage: TokenUsage {
                input_tokens: self.usage.input_tokens,
                output_tokens: self.usage.output_tokens,
                cache_read_tokens: self.usage.cache_read_input_tokens.unwrap_or(0),
                cache_creation_tokens: self.usage.cache_creation_input_tokens.unwrap_or(0),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u64,
    output_tokens: u64,
    cache_read_input_tokens: Option<u64>,
    cache_creation_input_tokens: Option<u64>,
}
