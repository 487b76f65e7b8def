//! TaskExecutor - implement the next approved backlog task
//!
//! One task per call: pick, mark in progress, generate code in the
//! project's working copy, commit, optionally push, close. Any failure
//! marks the task failed and stops; nothing is retried and nothing already
//! done (a commit, say) is rolled back.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::agent::PromptLoader;
use crate::collab::{CodeGenerator, Vcs};
use crate::domain::{ProjectRegistry, Task};
use crate::tasks::{TaskError, TaskStore};

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error(transparent)]
    Task(#[from] TaskError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// `commit` is `None` when code generation left the tree clean
    Completed { commit: Option<String> },
    Failed(String),
}

/// `task(<id>): <title>` subject, summary body and a `Task-Id` trailer
pub fn commit_message(task: &Task, summary: &str) -> String {
    format!(
        "task({}): {}\n\n{}\n\nTask-Id: {}",
        task.id,
        task.title,
        summary.trim(),
        task.id
    )
}

pub struct TaskExecutor {
    tasks: TaskStore,
    projects: ProjectRegistry,
    prompts: Arc<PromptLoader>,
    codegen: Arc<dyn CodeGenerator>,
    vcs: Arc<dyn Vcs>,
    push: bool,
}

impl TaskExecutor {
    pub fn new(
        tasks: TaskStore,
        projects: ProjectRegistry,
        prompts: Arc<PromptLoader>,
        codegen: Arc<dyn CodeGenerator>,
        vcs: Arc<dyn Vcs>,
    ) -> Self {
        Self {
            tasks,
            projects,
            prompts,
            codegen,
            vcs,
            push: false,
        }
    }

    pub fn with_push(mut self, push: bool) -> Self {
        self.push = push;
        self
    }

    /// Execute the next executable task; `false` when there is none
    pub async fn execute_next_task(&self) -> Result<bool, ExecutorError> {
        debug!("TaskExecutor::execute_next_task: called");
        let Some(task) = self.tasks.find_next_executable().await? else {
            debug!("TaskExecutor::execute_next_task: nothing to do");
            return Ok(false);
        };
        self.execute_task(task).await?;
        Ok(true)
    }

    pub async fn execute_task(&self, task: Task) -> Result<TaskOutcome, ExecutorError> {
        info!(id = %task.id, title = %task.title, priority = %task.priority, "Executing task");

        let project = self.projects.get(&task.project_id);
        let workdir: PathBuf = match project {
            None => {
                return self
                    .fail(&task, format!("Unknown project: {}", task.project_id))
                    .await;
            }
            Some(p) => match &p.path {
                Some(path) => path.clone(),
                None => {
                    return self
                        .fail(&task, format!("Project {} has no local path", p.id))
                        .await;
                }
            },
        };

        self.tasks.mark_in_progress(&task.id).await?;

        let prompt = match self.prompts.task_prompt(&task, project) {
            Ok(prompt) => prompt,
            Err(e) => return self.fail(&task, e.to_string()).await,
        };

        debug!(id = %task.id, ?workdir, "TaskExecutor::execute_task: running code generation");
        let output = match self.codegen.generate(&workdir, &prompt).await {
            Ok(output) => output,
            Err(e) => return self.fail(&task, format!("Code generation failed: {}", e)).await,
        };

        let message = commit_message(&task, &output.summary);
        let commit = match self.vcs.commit_all(&workdir, &message).await {
            Ok(commit) => commit,
            Err(e) => return self.fail(&task, format!("Commit failed: {}", e)).await,
        };

        match &commit {
            Some(sha) => {
                info!(id = %task.id, %sha, "Task committed");
                if self.push {
                    if let Err(e) = self.vcs.push(&workdir).await {
                        return self
                            .fail(&task, format!("Push failed, commit {} kept locally: {}", sha, e))
                            .await;
                    }
                    info!(id = %task.id, %sha, "Task pushed");
                }
            }
            None => info!(id = %task.id, "Code generation left no changes to commit"),
        }

        self.tasks.mark_completed(&task.id, &output.summary).await?;
        info!(id = %task.id, "Task completed");
        Ok(TaskOutcome::Completed { commit })
    }

    async fn fail(&self, task: &Task, reason: String) -> Result<TaskOutcome, ExecutorError> {
        warn!(id = %task.id, %reason, "Task execution failed");
        self.tasks.mark_failed(&task.id, &reason).await?;
        Ok(TaskOutcome::Failed(reason))
    }
}
