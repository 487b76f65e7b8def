//! Event types broadcast to observers
//!
//! Every event serializes as `{"type": ..., "timestamp": ..., "data": {...}}`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::domain::{AnalysisReport, Idea, PendingAction, Task};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    AnalysisStarted,
    AgentLog,
    ActionPending,
    TaskCreated,
    AnalysisCompleted,
    IdeaUpdated,
    IdeaPlanReady,
    IdeaLaunched,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AnalysisStarted => "analysis_started",
            Self::AgentLog => "agent_log",
            Self::ActionPending => "action_pending",
            Self::TaskCreated => "task_created",
            Self::AnalysisCompleted => "analysis_completed",
            Self::IdeaUpdated => "idea_updated",
            Self::IdeaPlanReady => "idea_plan_ready",
            Self::IdeaLaunched => "idea_launched",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PmEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub timestamp: DateTime<Utc>,
    pub data: Value,
}

impl PmEvent {
    pub fn new(kind: EventKind, data: Value) -> Self {
        Self {
            kind,
            timestamp: Utc::now(),
            data,
        }
    }

    pub fn event_type(&self) -> &'static str {
        self.kind.as_str()
    }

    pub fn analysis_started(report: &AnalysisReport) -> Self {
        Self::new(
            EventKind::AnalysisStarted,
            json!({
                "reportId": report.id,
                "reportType": report.report_type,
                "projectIds": report.project_ids,
            }),
        )
    }

    pub fn analysis_completed(report: &AnalysisReport) -> Self {
        Self::new(
            EventKind::AnalysisCompleted,
            json!({
                "reportId": report.id,
                "reportType": report.report_type,
                "summary": report.summary,
                "findings": report.findings.len(),
                "generatedTasks": report.generated_tasks,
            }),
        )
    }

    pub fn agent_log(run_id: &str, level: &str, message: &str) -> Self {
        Self::new(
            EventKind::AgentLog,
            json!({ "runId": run_id, "level": level, "message": message }),
        )
    }

    pub fn action_pending(action: &PendingAction) -> Self {
        Self::new(
            EventKind::ActionPending,
            json!({
                "actionId": action.id,
                "taskId": action.task_id,
                "actionType": action.action.action_type,
                "description": action.action.description,
                "expiresAt": action.expires_at,
            }),
        )
    }

    pub fn task_created(task: &Task) -> Self {
        Self::new(
            EventKind::TaskCreated,
            json!({
                "taskId": task.id,
                "projectId": task.project_id,
                "title": task.title,
                "priority": task.priority,
                "generatedBy": task.generated_by,
            }),
        )
    }

    pub fn idea(kind: EventKind, idea: &Idea) -> Self {
        Self::new(
            kind,
            json!({
                "ideaId": idea.id,
                "title": idea.title,
                "status": idea.status,
                "repoName": idea.repo_name,
            }),
        )
    }
}
