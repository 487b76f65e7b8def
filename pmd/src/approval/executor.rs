//! Carries out approved actions

use std::sync::Arc;

use serde_json::{Value, json};
use tracing::{debug, info};

use crate::collab::GitHub;
use crate::domain::{ActionType, IdeaStatus};
use crate::events::EventBus;
use crate::state::StateManager;
use crate::tools::{ToolError, ToolResult, optional_str, required_str, required_u64, string_list};

pub struct ActionExecutor {
    github: Arc<dyn GitHub>,
    state: StateManager,
    bus: EventBus,
}

impl ActionExecutor {
    pub fn new(github: Arc<dyn GitHub>, state: StateManager, bus: EventBus) -> Self {
        Self { github, state, bus }
    }

    /// Dispatch by action type to the concrete mutation
    pub async fn execute_approved_action(&self, action_type: ActionType, payload: &Value) -> ToolResult {
        debug!(%action_type, "ActionExecutor::execute_approved_action: called");
        let result = match action_type {
            ActionType::CreateIssue => self.create_issue(payload).await,
            ActionType::CommentIssue => self.comment_issue(payload).await,
            ActionType::CreateRepo => self.create_repo(payload).await,
        };
        result.into()
    }

    async fn create_issue(&self, payload: &Value) -> Result<Value, ToolError> {
        let repo = required_str(payload, "repo")?;
        let title = required_str(payload, "title")?;
        let body = required_str(payload, "body")?;
        let labels = string_list(payload, "labels");
        Ok(self.github.create_issue(repo, title, body, &labels).await?)
    }

    async fn comment_issue(&self, payload: &Value) -> Result<Value, ToolError> {
        let repo = required_str(payload, "repo")?;
        let issue_number = required_u64(payload, "issue_number")?;
        let body = required_str(payload, "body")?;
        Ok(self.github.comment_issue(repo, issue_number, body).await?)
    }

    async fn create_repo(&self, payload: &Value) -> Result<Value, ToolError> {
        let idea_id = required_str(payload, "ideaId")?;
        let repo_name = required_str(payload, "repoName")?.to_string();
        let description = optional_str(payload, "description");
        let private = payload["private"].as_bool().unwrap_or(true);

        let created = self.github.create_repo(&repo_name, description, private).await?;

        // The repository exists from here on; a state failure is reported
        // but does not undo it
        let name = repo_name.clone();
        let idea = self
            .state
            .modify_idea(idea_id, move |idea| {
                idea.repo_name = Some(name);
                idea.set_status(IdeaStatus::RepoCreated);
            })
            .await?;
        info!(idea_id = %idea.id, %repo_name, "Repository created for idea");
        self.bus.idea_updated(&idea);
        Ok(json!({"repo": created, "ideaId": idea.id}))
    }
}
