//! LLM client layer

use std::sync::Arc;

use tracing::debug;

mod anthropic;
pub mod client;
mod error;
mod types;

pub use anthropic::AnthropicClient;
pub use client::LlmClient;
pub use error::LlmError;
pub use types::{
    CompletionRequest, CompletionResponse, ContentBlock, Message, MessageContent, Role, StopReason, StreamChunk,
    TokenUsage, ToolCall, ToolDefinition,
};

use crate::config::LlmConfig;

/// Create the client named by `config.provider`
pub fn create_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>, LlmError> {
    debug!(provider = %config.provider, model = %config.model, "create_client: called");
    match config.provider.as_str() {
        "anthropic" => Ok(Arc::new(AnthropicClient::from_config(config)?)),
        other => Err(LlmError::Config(format!(
            "Unknown LLM provider: '{}'. Supported: anthropic",
            other
        ))),
    }
}
