//! AgentLoop - multi-turn tool-calling conversation
//!
//! Each turn is one model call. Tool calls in a response are dispatched in
//! order and their results are appended as a single `tool_result` message
//! before the next call. The loop ends on the first turn that requests no
//! tools and stops with `end_turn` (or a stop sequence).

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::AgentError;
use crate::config::{AgentConfig, LlmConfig};
use crate::llm::{
    CompletionRequest, CompletionResponse, ContentBlock, LlmClient, LlmError, Message, StopReason, StreamChunk,
    TokenUsage,
};
use crate::tools::{ToolContext, ToolRegistry};

const CONTINUE_PROMPT: &str = "Continue from where you left off. Your previous response was truncated.";
const LOG_PREVIEW_CHARS: usize = 200;

#[derive(Debug, Clone)]
pub struct AgentLoopConfig {
    /// Unbounded when `None`
    pub max_turns: Option<u32>,
    pub max_tokens: u32,
    pub stream: bool,
}

impl AgentLoopConfig {
    pub fn from_config(agent: &AgentConfig, llm: &LlmConfig) -> Self {
        Self {
            max_turns: agent.max_turns,
            max_tokens: llm.max_tokens,
            stream: agent.stream,
        }
    }
}

impl Default for AgentLoopConfig {
    fn default() -> Self {
        Self {
            max_turns: None,
            max_tokens: 8192,
            stream: false,
        }
    }
}

/// Why a run stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopCause {
    /// The model finished without requesting tools
    EndTurn,
    /// The configured turn bound was hit
    MaxTurns,
    /// `tool_use` stop reason but no tool call came through
    EmptyToolUse,
}

#[derive(Debug, Clone)]
pub struct AgentRun {
    /// All text blocks of the run, in order
    pub text: String,
    pub turns: u32,
    pub tool_calls: usize,
    pub usage: TokenUsage,
    /// Actions queued for approval during the run
    pub pending_actions: Vec<String>,
    pub stop: StopCause,
}

impl AgentRun {
    fn new() -> Self {
        Self {
            text: String::new(),
            turns: 0,
            tool_calls: 0,
            usage: TokenUsage::default(),
            pending_actions: Vec::new(),
            stop: StopCause::EndTurn,
        }
    }

    fn push_text(&mut self, text: &str) {
        if !self.text.is_empty() {
            self.text.push('\n');
        }
        self.text.push_str(text);
    }
}

pub struct AgentLoop {
    llm: Arc<dyn LlmClient>,
    tools: Arc<ToolRegistry>,
    config: AgentLoopConfig,
}

impl AgentLoop {
    pub fn new(llm: Arc<dyn LlmClient>, tools: Arc<ToolRegistry>, config: AgentLoopConfig) -> Self {
        debug!(?config, "AgentLoop::new: called");
        Self { llm, tools, config }
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Drive the conversation until the model stops asking for tools
    pub async fn run(&self, system_prompt: &str, prompt: &str, ctx: &ToolContext) -> Result<AgentRun, AgentError> {
        debug!(run_id = %ctx.run_id, prompt_len = prompt.len(), "AgentLoop::run: called");
        let tool_defs = self.tools.definitions();
        let mut messages = vec![Message::user(prompt)];
        let mut run = AgentRun::new();

        loop {
            if let Some(max) = self.config.max_turns {
                if run.turns >= max {
                    warn!(run_id = %ctx.run_id, max_turns = max, "Agent run hit its turn limit");
                    ctx.log("warn", &format!("Stopped after {} turns", max));
                    run.stop = StopCause::MaxTurns;
                    break;
                }
            }
            run.turns += 1;
            let turn = run.turns;
            debug!(run_id = %ctx.run_id, turn, "AgentLoop::run: turn start");

            let request = CompletionRequest {
                system_prompt: system_prompt.to_string(),
                messages: messages.clone(),
                tools: tool_defs.clone(),
                max_tokens: self.config.max_tokens,
            };
            let response = self
                .call(request, ctx)
                .await
                .map_err(|source| AgentError::Llm { turn, source })?;
            debug!(run_id = %ctx.run_id, turn, stop_reason = ?response.stop_reason, tool_count = response.tool_calls.len(), "AgentLoop::run: response received");
            run.usage.add(&response.usage);

            if let Some(text) = response.content.as_deref().filter(|t| !t.trim().is_empty()) {
                ctx.log("info", text);
                run.push_text(text);
            }

            let blocks = assistant_blocks(&response);
            if !blocks.is_empty() {
                messages.push(Message::assistant_blocks(blocks));
            }

            if !response.tool_calls.is_empty() {
                let mut results = Vec::with_capacity(response.tool_calls.len());
                for call in &response.tool_calls {
                    ctx.log("info", &format!("Calling {} {}", call.name, preview(&call.input.to_string())));
                    let result = self.tools.dispatch(call, ctx).await;
                    run.tool_calls += 1;

                    let content = result.to_content();
                    let level = if result.is_error() { "warn" } else { "info" };
                    ctx.log(level, &format!("{} returned {}", call.name, preview(&content)));
                    if let Some(id) = &result.pending_action_id {
                        run.pending_actions.push(id.clone());
                    }
                    results.push(ContentBlock::tool_result(&call.id, content, result.is_error()));
                }
                messages.push(Message::user_blocks(results));
                continue;
            }

            match response.stop_reason {
                StopReason::EndTurn | StopReason::StopSequence => {
                    debug!(run_id = %ctx.run_id, turn, "AgentLoop::run: model ended turn");
                    run.stop = StopCause::EndTurn;
                    break;
                }
                StopReason::MaxTokens => {
                    debug!(run_id = %ctx.run_id, turn, "AgentLoop::run: output truncated, continuing");
                    messages.push(Message::user(CONTINUE_PROMPT));
                }
                StopReason::ToolUse => {
                    warn!(run_id = %ctx.run_id, turn, "Model stopped for tool use without a tool call");
                    ctx.log("warn", "Model requested tool use but sent no tool call");
                    run.stop = StopCause::EmptyToolUse;
                    break;
                }
            }
        }

        info!(
            run_id = %ctx.run_id,
            turns = run.turns,
            tool_calls = run.tool_calls,
            pending = run.pending_actions.len(),
            tokens = run.usage.total(),
            "Agent run finished"
        );
        Ok(run)
    }

    /// One model call; in stream mode text deltas go to observers as they arrive
    async fn call(&self, request: CompletionRequest, ctx: &ToolContext) -> Result<CompletionResponse, LlmError> {
        if !self.config.stream {
            return self.llm.complete(request).await;
        }

        let (tx, mut rx) = mpsc::channel(64);
        let forward = async {
            while let Some(chunk) = rx.recv().await {
                match chunk {
                    StreamChunk::TextDelta(delta) => ctx.log("delta", &delta),
                    StreamChunk::Error(e) => warn!(run_id = %ctx.run_id, error = %e, "Stream error"),
                    _ => {}
                }
            }
        };
        let (response, ()) = tokio::join!(self.llm.stream(request, tx), forward);
        response
    }
}

fn assistant_blocks(response: &CompletionResponse) -> Vec<ContentBlock> {
    let mut blocks = Vec::new();
    if let Some(text) = response.content.as_deref().filter(|t| !t.is_empty()) {
        blocks.push(ContentBlock::text(text));
    }
    for call in &response.tool_calls {
        blocks.push(ContentBlock::ToolUse {
            id: call.id.clone(),
            name: call.name.clone(),
            input: call.input.clone(),
        });
    }
    blocks
}

fn preview(s: &str) -> String {
    if s.chars().count() <= LOG_PREVIEW_CHARS {
        s.to_string()
    } else {
        let head: String = s.chars().take(LOG_PREVIEW_CHARS).collect();
        format!("{}...", head)
    }
}
