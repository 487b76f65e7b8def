//! Agent error types

use std::time::Duration;

use thiserror::Error;

use crate::llm::LlmError;
use crate::state::StateError;
use crate::tasks::TaskError;

use super::prompts::PromptError;

/// Failure of one agent loop run
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("LLM call failed on turn {turn}: {source}")]
    Llm {
        turn: u32,
        #[source]
        source: LlmError,
    },
}

/// Model output that could not be turned into a report
#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    #[error("No JSON object found in model output")]
    NoJson,

    #[error("Invalid JSON in model output: {0}")]
    InvalidJson(String),

    #[error("JSON has neither findings nor projects: {0}")]
    UnexpectedShape(String),
}

/// Failure of a full analysis run
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("{kind} analysis timed out after {timeout:?}")]
    Timeout { kind: String, timeout: Duration },

    #[error(transparent)]
    Agent(#[from] AgentError),

    #[error(transparent)]
    Prompt(#[from] PromptError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Task(#[from] TaskError),
}
