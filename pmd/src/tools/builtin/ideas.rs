//! Idea incubation tools

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::collab::CodeGenerator;
use crate::domain::{ActionType, Idea, IdeaStatus, ProposedAction};
use crate::events::EventBus;
use crate::state::StateManager;
use crate::tools::{Tool, ToolContext, ToolEffect, ToolError, ToolName, ToolResult, optional_str, required_str};

fn idea_json(idea: &Idea) -> Value {
    serde_json::to_value(idea).unwrap_or(Value::Null)
}

async fn load_idea(state: &StateManager, id: &str) -> Result<Idea, ToolError> {
    state
        .get_idea(id)
        .await?
        .ok_or_else(|| ToolError::NotFound(format!("idea {}", id)))
}

pub struct IdeaAnalyzeTool {
    state: StateManager,
    bus: EventBus,
}

impl IdeaAnalyzeTool {
    pub fn new(state: StateManager, bus: EventBus) -> Self {
        Self { state, bus }
    }

    async fn run(&self, input: &Value) -> Result<Value, ToolError> {
        let id = required_str(input, "ideaId")?;
        let idea = load_idea(&self.state, id).await?;

        let analysis = match &input["analysis"] {
            Value::Null => return Ok(idea_json(&idea)),
            Value::String(s) if s.trim().is_empty() => return Ok(idea_json(&idea)),
            other => other.clone(),
        };

        let idea = self
            .state
            .modify_idea(id, move |idea| {
                idea.analysis = Some(analysis);
                idea.set_status(IdeaStatus::Analyzed);
            })
            .await?;
        info!(idea_id = %idea.id, "Idea analyzed");
        self.bus.idea_updated(&idea);
        Ok(idea_json(&idea))
    }
}

#[async_trait]
impl Tool for IdeaAnalyzeTool {
    fn name(&self) -> ToolName {
        ToolName::IdeaAnalyze
    }

    fn description(&self) -> &'static str {
        "Fetch an idea. Pass `analysis` to store your analysis and mark the idea analyzed."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "ideaId": {"type": "string"},
                "analysis": {"description": "Market, feasibility and risk analysis (text or object)"}
            },
            "required": ["ideaId"]
        })
    }

    fn effect(&self) -> ToolEffect {
        ToolEffect::WritesState
    }

    async fn execute(&self, input: Value, _ctx: &ToolContext) -> ToolResult {
        debug!("IdeaAnalyzeTool::execute: called");
        self.run(&input).await.into()
    }
}

pub struct IdeaSavePlanTool {
    state: StateManager,
    bus: EventBus,
}

impl IdeaSavePlanTool {
    pub fn new(state: StateManager, bus: EventBus) -> Self {
        Self { state, bus }
    }

    async fn run(&self, input: &Value) -> Result<Value, ToolError> {
        let id = required_str(input, "ideaId")?;
        let plan = required_str(input, "plan")?.to_string();
        load_idea(&self.state, id).await?;

        let idea = self
            .state
            .modify_idea(id, move |idea| {
                idea.plan = Some(plan);
                idea.set_status(IdeaStatus::Planned);
            })
            .await?;
        info!(idea_id = %idea.id, "Idea plan saved");
        self.bus.idea_plan_ready(&idea);
        Ok(idea_json(&idea))
    }
}

#[async_trait]
impl Tool for IdeaSavePlanTool {
    fn name(&self) -> ToolName {
        ToolName::IdeaSavePlan
    }

    fn description(&self) -> &'static str {
        "Save an implementation plan for an idea and mark it planned."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "ideaId": {"type": "string"},
                "plan": {"type": "string", "description": "Markdown implementation plan"}
            },
            "required": ["ideaId", "plan"]
        })
    }

    fn effect(&self) -> ToolEffect {
        ToolEffect::WritesState
    }

    async fn execute(&self, input: Value, _ctx: &ToolContext) -> ToolResult {
        debug!("IdeaSavePlanTool::execute: called");
        self.run(&input).await.into()
    }
}

pub struct IdeaCreateRepoTool;

#[async_trait]
impl Tool for IdeaCreateRepoTool {
    fn name(&self) -> ToolName {
        ToolName::IdeaCreateRepo
    }

    fn description(&self) -> &'static str {
        "Propose creating a GitHub repository for an idea. A human must approve first."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "ideaId": {"type": "string"},
                "repoName": {"type": "string"},
                "description": {"type": "string"},
                "private": {"type": "boolean", "default": true}
            },
            "required": ["ideaId", "repoName"]
        })
    }

    fn effect(&self) -> ToolEffect {
        ToolEffect::ApprovalGated
    }

    fn propose(&self, input: &Value) -> Result<ProposedAction, ToolError> {
        let idea_id = required_str(input, "ideaId")?;
        let repo_name = required_str(input, "repoName")?;
        let description = optional_str(input, "description");
        let private = input["private"].as_bool().unwrap_or(true);
        Ok(ProposedAction::new(
            ActionType::CreateRepo,
            format!("Create repository {} for idea {}", repo_name, idea_id),
            json!({
                "ideaId": idea_id,
                "repoName": repo_name,
                "description": description,
                "private": private,
            }),
        ))
    }

    async fn execute(&self, _input: Value, _ctx: &ToolContext) -> ToolResult {
        ToolResult::error(format!("{} requires approval and cannot run directly", self.name()))
    }
}

pub struct IdeaGenerateCodeTool {
    state: StateManager,
    bus: EventBus,
    codegen: Arc<dyn CodeGenerator>,
}

impl IdeaGenerateCodeTool {
    pub fn new(state: StateManager, bus: EventBus, codegen: Arc<dyn CodeGenerator>) -> Self {
        Self { state, bus, codegen }
    }

    async fn run(&self, input: &Value, ctx: &ToolContext) -> Result<Value, ToolError> {
        let id = required_str(input, "ideaId")?;
        let repo_path = PathBuf::from(required_str(input, "repoPath")?);
        let prompt = required_str(input, "prompt")?;
        load_idea(&self.state, id).await?;

        ctx.log("info", &format!("Generating code for idea {} in {}", id, repo_path.display()));
        let output = self.codegen.generate(&repo_path, prompt).await?;

        let path = repo_path.clone();
        let idea = self
            .state
            .modify_idea(id, move |idea| {
                idea.repo_path = Some(path);
                idea.set_status(IdeaStatus::Launched);
            })
            .await?;
        info!(idea_id = %idea.id, ?repo_path, "Idea launched");
        self.bus.idea_launched(&idea);
        Ok(json!({"summary": output.summary, "idea": idea_json(&idea)}))
    }
}

#[async_trait]
impl Tool for IdeaGenerateCodeTool {
    fn name(&self) -> ToolName {
        ToolName::IdeaGenerateCode
    }

    fn description(&self) -> &'static str {
        "Run the code generator for an idea inside its local repository checkout."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "ideaId": {"type": "string"},
                "repoPath": {"type": "string", "description": "Local checkout of the idea's repository"},
                "prompt": {"type": "string"}
            },
            "required": ["ideaId", "repoPath", "prompt"]
        })
    }

    fn effect(&self) -> ToolEffect {
        ToolEffect::Triggers
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> ToolResult {
        debug!("IdeaGenerateCodeTool::execute: called");
        self.run(&input, ctx).await.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::{CodegenOutput, CollabError};
    use crate::events::EventKind;
    use std::path::Path;

    struct EchoCodegen;

    #[async_trait]
    impl CodeGenerator for EchoCodegen {
        async fn generate(&self, workdir: &Path, prompt: &str) -> Result<CodegenOutput, CollabError> {
            Ok(CodegenOutput {
                summary: format!("{} in {}", prompt, workdir.display()),
            })
        }
    }

    async fn setup() -> (StateManager, EventBus, Idea) {
        let state = StateManager::spawn_in_memory().unwrap();
        let idea = Idea::new("Habit tracker", "Track habits");
        state.put_idea(idea.clone()).await.unwrap();
        (state, EventBus::default(), idea)
    }

    #[tokio::test]
    async fn test_analyze_reads_without_analysis() {
        let (state, bus, idea) = setup().await;
        let mut rx = bus.subscribe();
        let tool = IdeaAnalyzeTool::new(state.clone(), bus);

        let result = tool.execute(json!({"ideaId": idea.id}), &ToolContext::new("r")).await;
        assert!(result.success);
        assert_eq!(result.data.unwrap()["status"], "draft");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_analyze_stores_analysis_and_emits() {
        let (state, bus, idea) = setup().await;
        let mut rx = bus.subscribe();
        let tool = IdeaAnalyzeTool::new(state.clone(), bus);

        let result = tool
            .execute(json!({"ideaId": idea.id, "analysis": {"market": "crowded"}}), &ToolContext::new("r"))
            .await;
        assert!(result.success);

        let stored = state.get_idea(&idea.id).await.unwrap().unwrap();
        assert_eq!(stored.status, IdeaStatus::Analyzed);
        assert_eq!(stored.analysis.unwrap()["market"], "crowded");
        assert_eq!(rx.recv().await.unwrap().kind, EventKind::IdeaUpdated);
    }

    #[tokio::test]
    async fn test_save_plan_emits_plan_ready() {
        let (state, bus, idea) = setup().await;
        let mut rx = bus.subscribe();
        let tool = IdeaSavePlanTool::new(state.clone(), bus);

        let result = tool
            .execute(json!({"ideaId": idea.id, "plan": "1. build"}), &ToolContext::new("r"))
            .await;
        assert!(result.success);
        assert_eq!(rx.recv().await.unwrap().kind, EventKind::IdeaPlanReady);
        assert_eq!(
            state.get_idea(&idea.id).await.unwrap().unwrap().plan.as_deref(),
            Some("1. build")
        );
    }

    #[tokio::test]
    async fn test_unknown_idea_is_failed_result() {
        let (state, bus, _) = setup().await;
        let tool = IdeaSavePlanTool::new(state, bus);
        let result = tool
            .execute(json!({"ideaId": "nope", "plan": "x"}), &ToolContext::new("r"))
            .await;
        assert_eq!(result.error.as_deref(), Some("Not found: idea nope"));
    }

    #[tokio::test]
    async fn test_generate_code_launches_idea() {
        let (state, bus, idea) = setup().await;
        let mut rx = bus.subscribe();
        let tool = IdeaGenerateCodeTool::new(state.clone(), bus, Arc::new(EchoCodegen));

        let result = tool
            .execute(
                json!({"ideaId": idea.id, "repoPath": "/tmp/habits", "prompt": "scaffold"}),
                &ToolContext::new("r"),
            )
            .await;
        assert!(result.success);
        assert_eq!(result.data.unwrap()["summary"], "scaffold in /tmp/habits");

        let stored = state.get_idea(&idea.id).await.unwrap().unwrap();
        assert_eq!(stored.status, IdeaStatus::Launched);
        assert_eq!(stored.repo_path, Some(PathBuf::from("/tmp/habits")));
        assert_eq!(rx.recv().await.unwrap().kind, EventKind::IdeaLaunched);
    }

    #[test]
    fn test_create_repo_proposal_defaults_private() {
        let action = IdeaCreateRepoTool
            .propose(&json!({"ideaId": "i1", "repoName": "habits"}))
            .unwrap();
        assert_eq!(action.action_type, ActionType::CreateRepo);
        assert_eq!(action.payload["private"], true);
        assert!(IdeaCreateRepoTool.propose(&json!({"ideaId": "i1"})).is_err());
    }
}
