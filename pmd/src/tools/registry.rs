//! ToolRegistry - exact-name dispatch with the approval gate

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::builtin::{
    CommentIssueTool, CreateIssueTool, IdeaAnalyzeTool, IdeaCreateRepoTool, IdeaGenerateCodeTool, IdeaSavePlanTool,
    ListIssuesTool, ListPrsTool, RepoStatusTool, RunStatusTool,
};
use super::{Tool, ToolContext, ToolEffect, ToolName, ToolResult};
use crate::approval::ApprovalQueue;
use crate::collab::{CodeGenerator, GitHub};
use crate::events::EventBus;
use crate::llm::{ToolCall, ToolDefinition};
use crate::state::{StateManager, WriteQueue};

/// Collaborators the standard tool set is built from
pub struct ToolDeps {
    pub github: Arc<dyn GitHub>,
    pub codegen: Arc<dyn CodeGenerator>,
    pub state: StateManager,
    pub bus: EventBus,
    pub cache: Option<WriteQueue>,
}

pub struct ToolRegistry {
    tools: BTreeMap<ToolName, Box<dyn Tool>>,
    approvals: ApprovalQueue,
}

impl ToolRegistry {
    /// Registry with no tools
    pub fn new(approvals: ApprovalQueue) -> Self {
        Self {
            tools: BTreeMap::new(),
            approvals,
        }
    }

    /// Registry with every builtin tool
    pub fn standard(deps: ToolDeps, approvals: ApprovalQueue) -> Self {
        let mut registry = Self::new(approvals);

        // GitHub reads
        registry.register(Box::new(RepoStatusTool::new(deps.github.clone(), deps.cache)));
        registry.register(Box::new(ListIssuesTool::new(deps.github.clone())));
        registry.register(Box::new(ListPrsTool::new(deps.github.clone())));
        registry.register(Box::new(RunStatusTool::new(deps.github)));

        // Approval-gated mutations
        registry.register(Box::new(CreateIssueTool));
        registry.register(Box::new(CommentIssueTool));
        registry.register(Box::new(IdeaCreateRepoTool));

        // Ideas
        registry.register(Box::new(IdeaAnalyzeTool::new(deps.state.clone(), deps.bus.clone())));
        registry.register(Box::new(IdeaSavePlanTool::new(deps.state.clone(), deps.bus.clone())));
        registry.register(Box::new(IdeaGenerateCodeTool::new(deps.state, deps.bus, deps.codegen)));

        registry
    }

    pub fn register(&mut self, tool: Box<dyn Tool>) {
        debug!(tool = %tool.name(), effect = ?tool.effect(), "ToolRegistry::register: called");
        self.tools.insert(tool.name(), tool);
    }

    /// Definitions sent to the model, in name order
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .values()
            .map(|t| ToolDefinition::new(t.name().as_str(), t.description(), t.input_schema()))
            .collect()
    }

    pub fn effect_of(&self, name: ToolName) -> Option<ToolEffect> {
        self.tools.get(&name).map(|t| t.effect())
    }

    pub fn has_tool(&self, name: ToolName) -> bool {
        self.tools.contains_key(&name)
    }

    pub fn approvals(&self) -> &ApprovalQueue {
        &self.approvals
    }

    /// Run one tool call; failures come back as failed results, never errors
    pub async fn dispatch(&self, call: &ToolCall, ctx: &ToolContext) -> ToolResult {
        debug!(tool = %call.name, call_id = %call.id, "ToolRegistry::dispatch: called");
        let tool = match call.name.parse::<ToolName>().ok().and_then(|name| self.tools.get(&name)) {
            Some(tool) => tool,
            None => {
                warn!(tool = %call.name, "Model called an unknown tool");
                return ToolResult::error(format!("unknown tool: {}", call.name));
            }
        };

        match tool.effect() {
            ToolEffect::ApprovalGated => self.propose(tool.as_ref(), call, ctx).await,
            _ => tool.execute(call.input.clone(), ctx).await,
        }
    }

    async fn propose(&self, tool: &dyn Tool, call: &ToolCall, ctx: &ToolContext) -> ToolResult {
        let proposal = match tool.propose(&call.input) {
            Ok(p) => p,
            Err(e) => {
                debug!(tool = %call.name, error = %e, "ToolRegistry::propose: invalid input");
                return ToolResult::error(e.to_string());
            }
        };

        match self.approvals.enqueue(proposal, ctx.task_id.clone()).await {
            Ok(action) => {
                info!(tool = %call.name, action_id = %action.id, "Action queued for approval");
                ctx.log("info", &format!("{} queued for approval as {}", call.name, action.id));
                ToolResult::pending(action.id)
            }
            Err(e) => ToolResult::error(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::fakes::{FakeCodegen, FakeGitHub, RecordingNotifier};
    use crate::domain::{ActionStatus, ActionType};
    use serde_json::json;

    struct Fixture {
        registry: ToolRegistry,
        github: Arc<FakeGitHub>,
    }

    fn fixture() -> Fixture {
        let state = StateManager::spawn_in_memory().unwrap();
        let bus = EventBus::default();
        let github = Arc::new(FakeGitHub::default());
        let approvals = ApprovalQueue::new(
            state.clone(),
            bus.clone(),
            Arc::new(RecordingNotifier::default()),
            chrono::Duration::hours(24),
        );
        let deps = ToolDeps {
            github: github.clone(),
            codegen: Arc::new(FakeCodegen::default()),
            state,
            bus,
            cache: None,
        };
        Fixture {
            registry: ToolRegistry::standard(deps, approvals),
            github,
        }
    }

    #[tokio::test]
    async fn test_standard_registry_covers_catalog() {
        let f = fixture();
        let names: Vec<String> = f.registry.definitions().into_iter().map(|d| d.name).collect();
        let expected: Vec<String> = ToolName::ALL.iter().map(|n| n.as_str().to_string()).collect();
        assert_eq!(names, expected);

        assert_eq!(f.registry.effect_of(ToolName::RepoStatus), Some(ToolEffect::ReadOnly));
        assert_eq!(f.registry.effect_of(ToolName::CreateIssue), Some(ToolEffect::ApprovalGated));
        assert_eq!(f.registry.effect_of(ToolName::CommentIssue), Some(ToolEffect::ApprovalGated));
        assert_eq!(f.registry.effect_of(ToolName::IdeaCreateRepo), Some(ToolEffect::ApprovalGated));
        assert_eq!(f.registry.effect_of(ToolName::IdeaGenerateCode), Some(ToolEffect::Triggers));
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let f = fixture();
        let call = ToolCall::new("c1", "github_create_issue", json!({}));
        let result = f.registry.dispatch(&call, &ToolContext::new("run")).await;
        assert_eq!(result.error.as_deref(), Some("unknown tool: github_create_issue"));
    }

    #[tokio::test]
    async fn test_read_tool_runs_immediately() {
        let f = fixture();
        let call = ToolCall::new("c1", "run_status", json!({"repo": "acme/api"}));
        let result = f.registry.dispatch(&call, &ToolContext::new("run")).await;
        assert!(result.success);
        assert!(result.requires_approval.is_none());
        assert_eq!(f.github.calls(), vec!["run_status acme/api"]);
    }

    #[tokio::test]
    async fn test_gated_tool_enqueues_instead_of_mutating() {
        let f = fixture();
        let call = ToolCall::new(
            "c1",
            "create_issue",
            json!({"repo": "acme/api", "title": "Flaky CI", "body": "details"}),
        );
        let ctx = ToolContext::new("run").with_task("t1");
        let result = f.registry.dispatch(&call, &ctx).await;

        assert!(result.success);
        assert!(result.is_pending());
        let id = result.pending_action_id.unwrap();
        let action = f.registry.approvals().get(&id).await.unwrap();
        assert_eq!(action.status, ActionStatus::Pending);
        assert_eq!(action.action.action_type, ActionType::CreateIssue);
        assert_eq!(action.task_id.as_deref(), Some("t1"));

        // Nothing reached GitHub
        assert!(f.github.calls().is_empty());
    }

    #[tokio::test]
    async fn test_gated_tool_with_missing_input_queues_nothing() {
        let f = fixture();
        let call = ToolCall::new("c1", "comment_issue", json!({"repo": "acme/api", "body": "hi"}));
        let result = f.registry.dispatch(&call, &ToolContext::new("run")).await;
        assert!(result.is_error());
        assert!(f.registry.approvals().list_all().await.unwrap().is_empty());
    }
}
