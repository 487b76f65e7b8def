//! GitHub tools: four reads and two approval-gated mutations

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::debug;

use crate::collab::{GitHub, IssueQuery};
use crate::domain::{ActionType, ProposedAction};
use crate::state::WriteQueue;
use crate::tools::{
    Tool, ToolContext, ToolEffect, ToolError, ToolName, ToolResult, optional_str, optional_u32, required_str,
    required_u64, string_list,
};

fn repo_schema(extra: Value, required: &[&str]) -> Value {
    let mut properties = json!({
        "repo": {"type": "string", "description": "Repository as owner/name"}
    });
    if let (Some(props), Some(extra)) = (properties.as_object_mut(), extra.as_object()) {
        props.extend(extra.clone());
    }
    json!({"type": "object", "properties": properties, "required": required})
}

pub struct RepoStatusTool {
    github: Arc<dyn GitHub>,
    /// Latest snapshot per repo is written behind to `cache:repo_status:<repo>`
    cache: Option<WriteQueue>,
}

impl RepoStatusTool {
    pub fn new(github: Arc<dyn GitHub>, cache: Option<WriteQueue>) -> Self {
        Self { github, cache }
    }
}

#[async_trait]
impl Tool for RepoStatusTool {
    fn name(&self) -> ToolName {
        ToolName::RepoStatus
    }

    fn description(&self) -> &'static str {
        "Get repository metadata: default branch, last push, archive state, stars."
    }

    fn input_schema(&self) -> Value {
        repo_schema(json!({}), &["repo"])
    }

    async fn execute(&self, input: Value, _ctx: &ToolContext) -> ToolResult {
        let repo = match required_str(&input, "repo") {
            Ok(r) => r,
            Err(e) => return ToolResult::error(e.to_string()),
        };
        debug!(%repo, "RepoStatusTool::execute: called");
        match self.github.repo_status(repo).await {
            Ok(status) => {
                if let Some(cache) = &self.cache {
                    cache.set(format!("cache:repo_status:{}", repo), status.to_string());
                }
                ToolResult::success(status)
            }
            Err(e) => ToolResult::error(e.to_string()),
        }
    }
}

pub struct ListIssuesTool {
    github: Arc<dyn GitHub>,
}

impl ListIssuesTool {
    pub fn new(github: Arc<dyn GitHub>) -> Self {
        Self { github }
    }
}

#[async_trait]
impl Tool for ListIssuesTool {
    fn name(&self) -> ToolName {
        ToolName::ListIssues
    }

    fn description(&self) -> &'static str {
        "List issues in a repository, optionally filtered by state and labels."
    }

    fn input_schema(&self) -> Value {
        repo_schema(
            json!({
                "state": {"type": "string", "enum": ["open", "closed", "all"]},
                "labels": {"type": "array", "items": {"type": "string"}},
                "limit": {"type": "integer", "minimum": 1}
            }),
            &["repo"],
        )
    }

    async fn execute(&self, input: Value, _ctx: &ToolContext) -> ToolResult {
        let repo = match required_str(&input, "repo") {
            Ok(r) => r,
            Err(e) => return ToolResult::error(e.to_string()),
        };
        let query = IssueQuery {
            state: optional_str(&input, "state").map(str::to_string),
            labels: string_list(&input, "labels"),
            limit: optional_u32(&input, "limit"),
        };
        self.github.list_issues(repo, &query).await.into()
    }
}

pub struct ListPrsTool {
    github: Arc<dyn GitHub>,
}

impl ListPrsTool {
    pub fn new(github: Arc<dyn GitHub>) -> Self {
        Self { github }
    }
}

#[async_trait]
impl Tool for ListPrsTool {
    fn name(&self) -> ToolName {
        ToolName::ListPrs
    }

    fn description(&self) -> &'static str {
        "List pull requests in a repository."
    }

    fn input_schema(&self) -> Value {
        repo_schema(
            json!({
                "state": {"type": "string", "enum": ["open", "closed", "merged", "all"]},
                "limit": {"type": "integer", "minimum": 1}
            }),
            &["repo"],
        )
    }

    async fn execute(&self, input: Value, _ctx: &ToolContext) -> ToolResult {
        let repo = match required_str(&input, "repo") {
            Ok(r) => r,
            Err(e) => return ToolResult::error(e.to_string()),
        };
        self.github
            .list_prs(repo, optional_str(&input, "state"), optional_u32(&input, "limit"))
            .await
            .into()
    }
}

pub struct RunStatusTool {
    github: Arc<dyn GitHub>,
}

impl RunStatusTool {
    pub fn new(github: Arc<dyn GitHub>) -> Self {
        Self { github }
    }
}

#[async_trait]
impl Tool for RunStatusTool {
    fn name(&self) -> ToolName {
        ToolName::RunStatus
    }

    fn description(&self) -> &'static str {
        "Recent CI workflow runs with their status and conclusion."
    }

    fn input_schema(&self) -> Value {
        repo_schema(json!({"limit": {"type": "integer", "minimum": 1}}), &["repo"])
    }

    async fn execute(&self, input: Value, _ctx: &ToolContext) -> ToolResult {
        let repo = match required_str(&input, "repo") {
            Ok(r) => r,
            Err(e) => return ToolResult::error(e.to_string()),
        };
        self.github.run_status(repo, optional_u32(&input, "limit")).await.into()
    }
}

fn gated_execute(name: ToolName) -> ToolResult {
    ToolResult::error(format!("{} requires approval and cannot run directly", name))
}

pub struct CreateIssueTool;

#[async_trait]
impl Tool for CreateIssueTool {
    fn name(&self) -> ToolName {
        ToolName::CreateIssue
    }

    fn description(&self) -> &'static str {
        "Propose opening an issue. A human must approve before it is created."
    }

    fn input_schema(&self) -> Value {
        repo_schema(
            json!({
                "title": {"type": "string"},
                "body": {"type": "string"},
                "labels": {"type": "array", "items": {"type": "string"}}
            }),
            &["repo", "title", "body"],
        )
    }

    fn effect(&self) -> ToolEffect {
        ToolEffect::ApprovalGated
    }

    fn propose(&self, input: &Value) -> Result<ProposedAction, ToolError> {
        let repo = required_str(input, "repo")?;
        let title = required_str(input, "title")?;
        let body = required_str(input, "body")?;
        let labels = string_list(input, "labels");
        Ok(ProposedAction::new(
            ActionType::CreateIssue,
            format!("Create issue in {}: {}", repo, title),
            json!({"repo": repo, "title": title, "body": body, "labels": labels}),
        ))
    }

    async fn execute(&self, _input: Value, _ctx: &ToolContext) -> ToolResult {
        gated_execute(self.name())
    }
}

pub struct CommentIssueTool;

#[async_trait]
impl Tool for CommentIssueTool {
    fn name(&self) -> ToolName {
        ToolName::CommentIssue
    }

    fn description(&self) -> &'static str {
        "Propose a comment on an issue. A human must approve before it is posted."
    }

    fn input_schema(&self) -> Value {
        repo_schema(
            json!({
                "issue_number": {"type": "integer", "minimum": 1},
                "body": {"type": "string"}
            }),
            &["repo", "issue_number", "body"],
        )
    }

    fn effect(&self) -> ToolEffect {
        ToolEffect::ApprovalGated
    }

    fn propose(&self, input: &Value) -> Result<ProposedAction, ToolError> {
        let repo = required_str(input, "repo")?;
        let issue_number = required_u64(input, "issue_number")?;
        let body = required_str(input, "body")?;
        Ok(ProposedAction::new(
            ActionType::CommentIssue,
            format!("Comment on {}#{}", repo, issue_number),
            json!({"repo": repo, "issue_number": issue_number, "body": body}),
        ))
    }

    async fn execute(&self, _input: Value, _ctx: &ToolContext) -> ToolResult {
        gated_execute(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::CollabError;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeGitHub {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl GitHub for FakeGitHub {
        async fn repo_status(&self, repo: &str) -> Result<Value, CollabError> {
            self.calls.lock().unwrap().push(format!("repo_status {}", repo));
            Ok(json!({"nameWithOwner": repo}))
        }

        async fn list_issues(&self, repo: &str, query: &IssueQuery) -> Result<Value, CollabError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("list_issues {} {:?} {:?}", repo, query.labels, query.limit));
            Ok(json!([]))
        }

        async fn list_prs(&self, _repo: &str, _state: Option<&str>, _limit: Option<u32>) -> Result<Value, CollabError> {
            Ok(json!([]))
        }

        async fn run_status(&self, _repo: &str, _limit: Option<u32>) -> Result<Value, CollabError> {
            Err(CollabError::Failed {
                program: "gh".to_string(),
                exit_code: 1,
                stderr: "no runs".to_string(),
            })
        }

        async fn create_issue(&self, _: &str, _: &str, _: &str, _: &[String]) -> Result<Value, CollabError> {
            panic!("gated tools never mutate directly");
        }

        async fn comment_issue(&self, _: &str, _: u64, _: &str) -> Result<Value, CollabError> {
            panic!("gated tools never mutate directly");
        }

        async fn create_repo(&self, _: &str, _: Option<&str>, _: bool) -> Result<Value, CollabError> {
            panic!("gated tools never mutate directly");
        }
    }

    #[tokio::test]
    async fn test_read_tools_call_collaborator() {
        let github = Arc::new(FakeGitHub::default());
        let ctx = ToolContext::new("run");

        let result = RepoStatusTool::new(github.clone(), None)
            .execute(json!({"repo": "acme/api"}), &ctx)
            .await;
        assert!(result.success);
        assert_eq!(result.data.unwrap()["nameWithOwner"], "acme/api");

        let result = ListIssuesTool::new(github.clone())
            .execute(json!({"repo": "acme/api", "labels": ["bug"], "limit": 3}), &ctx)
            .await;
        assert!(result.success);
        assert_eq!(
            github.calls.lock().unwrap().last().unwrap(),
            "list_issues acme/api [\"bug\"] Some(3)"
        );
    }

    #[tokio::test]
    async fn test_collaborator_failure_becomes_failed_result() {
        let github = Arc::new(FakeGitHub::default());
        let result = RunStatusTool::new(github)
            .execute(json!({"repo": "acme/api"}), &ToolContext::new("run"))
            .await;
        assert!(result.is_error());
        assert!(result.error.unwrap().contains("no runs"));
    }

    #[tokio::test]
    async fn test_missing_repo_is_failed_result() {
        let result = ListPrsTool::new(Arc::new(FakeGitHub::default()))
            .execute(json!({}), &ToolContext::new("run"))
            .await;
        assert_eq!(result.error.as_deref(), Some("Missing required input: repo"));
    }

    #[test]
    fn test_create_issue_proposal() {
        let action = CreateIssueTool
            .propose(&json!({"repo": "acme/api", "title": "Flaky CI", "body": "details", "labels": ["ci"]}))
            .unwrap();
        assert_eq!(action.action_type, ActionType::CreateIssue);
        assert_eq!(action.description, "Create issue in acme/api: Flaky CI");
        assert_eq!(action.payload["labels"], json!(["ci"]));
    }

    #[test]
    fn test_comment_proposal_validates_inputs() {
        assert!(matches!(
            CommentIssueTool.propose(&json!({"repo": "acme/api", "body": "x"})),
            Err(ToolError::MissingInput("issue_number"))
        ));
        let action = CommentIssueTool
            .propose(&json!({"repo": "acme/api", "issue_number": "12", "body": "ping"}))
            .unwrap();
        assert_eq!(action.payload["issue_number"], 12);
    }

    #[tokio::test]
    async fn test_gated_tool_refuses_direct_execution() {
        let result = CreateIssueTool.execute(json!({}), &ToolContext::new("run")).await;
        assert!(result.is_error());
    }
}
