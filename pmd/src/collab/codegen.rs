//! Code-generation collaborator

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use super::{CollabError, run_command};
use crate::config::CodegenConfig;

#[derive(Debug, Clone, PartialEq)]
pub struct CodegenOutput {
    /// What the generator reported doing, used in commit messages
    pub summary: String,
}

#[async_trait]
pub trait CodeGenerator: Send + Sync {
    /// Apply `prompt` to the working copy at `workdir`
    async fn generate(&self, workdir: &Path, prompt: &str) -> Result<CodegenOutput, CollabError>;
}

/// Runs `<program> <args...> <prompt>` inside the working copy
pub struct CliCodeGenerator {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CliCodeGenerator {
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
        }
    }

    pub fn from_config(config: &CodegenConfig) -> Self {
        Self::new(
            config.program.clone(),
            config.args.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }
}

#[async_trait]
impl CodeGenerator for CliCodeGenerator {
    async fn generate(&self, workdir: &Path, prompt: &str) -> Result<CodegenOutput, CollabError> {
        debug!(program = %self.program, ?workdir, prompt_len = prompt.len(), "CliCodeGenerator::generate: called");
        let mut args = self.args.clone();
        args.push(prompt.to_string());

        let output = run_command(&self.program, &args, Some(workdir), self.timeout).await?;
        let duration_ms = output.duration_ms;
        let stdout = output.into_stdout(&self.program)?;
        info!(program = %self.program, duration_ms, "Code generation finished");

        Ok(CodegenOutput {
            summary: stdout.trim().to_string(),
        })
    }
}
