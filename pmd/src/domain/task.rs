//! Task record
//!
//! A task carries two independent state axes: `status` (approval and
//! execution outcome) and `kanban_status` (board column). Nothing couples
//! them except the executability rule in [`Task::is_executable`].

use chrono::{DateTime, Utc};
use kvstore::Record;
use serde::{Deserialize, Serialize};

use super::id::generate_id;
use super::priority::Priority;

pub const TASKS_COLLECTION: &str = "tasks";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
    InProgress,
    Completed,
    Failed,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Approved => write!(f, "approved"),
            Self::Rejected => write!(f, "rejected"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Unknown task status: {}", s)),
        }
    }
}

/// Board column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum KanbanStatus {
    #[default]
    NotStarted,
    Backlog,
    InProgress,
    Review,
    Done,
}

impl KanbanStatus {
    /// Columns a task may be picked up from
    pub fn is_backlog_eligible(&self) -> bool {
        matches!(self, Self::Backlog | Self::NotStarted)
    }
}

impl std::fmt::Display for KanbanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotStarted => write!(f, "not_started"),
            Self::Backlog => write!(f, "backlog"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Review => write!(f, "review"),
            Self::Done => write!(f, "done"),
        }
    }
}

impl std::str::FromStr for KanbanStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "not_started" => Ok(Self::NotStarted),
            "backlog" => Ok(Self::Backlog),
            "in_progress" => Ok(Self::InProgress),
            "review" => Ok(Self::Review),
            "done" => Ok(Self::Done),
            _ => Err(format!("Unknown kanban status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    #[default]
    Development,
    Review,
    Planning,
    Bugfix,
    Documentation,
    Maintenance,
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Development => write!(f, "development"),
            Self::Review => write!(f, "review"),
            Self::Planning => write!(f, "planning"),
            Self::Bugfix => write!(f, "bugfix"),
            Self::Documentation => write!(f, "documentation"),
            Self::Maintenance => write!(f, "maintenance"),
        }
    }
}

impl std::str::FromStr for TaskType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "development" | "dev" | "feature" => Ok(Self::Development),
            "review" => Ok(Self::Review),
            "planning" => Ok(Self::Planning),
            "bugfix" | "bug" | "fix" => Ok(Self::Bugfix),
            "documentation" | "docs" => Ok(Self::Documentation),
            "maintenance" | "chore" => Ok(Self::Maintenance),
            _ => Err(format!("Unknown task type: {}", s)),
        }
    }
}

/// Where a task came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GeneratedBy {
    #[default]
    Manual,
    HealthCheck,
    DeepAnalysis,
    Chat,
    PlanSync,
}

impl std::fmt::Display for GeneratedBy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Manual => write!(f, "manual"),
            Self::HealthCheck => write!(f, "health_check"),
            Self::DeepAnalysis => write!(f, "deep_analysis"),
            Self::Chat => write!(f, "chat"),
            Self::PlanSync => write!(f, "plan_sync"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,

    /// Owning project
    pub project_id: String,

    #[serde(rename = "type")]
    pub task_type: TaskType,

    pub priority: Priority,

    pub title: String,

    pub description: String,

    pub status: TaskStatus,

    pub kanban_status: KanbanStatus,

    pub generated_at: DateTime<Utc>,

    pub completed_at: Option<DateTime<Utc>>,

    pub generated_by: GeneratedBy,

    /// Free-form context passed through to the implementation prompt
    #[serde(default)]
    pub context: serde_json::Value,

    /// Execution summary or failure reason
    #[serde(default)]
    pub result: Option<String>,

    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// A new pending, not-started task
    pub fn new(
        project_id: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
        generated_by: GeneratedBy,
    ) -> Self {
        let title = title.into();
        let now = Utc::now();
        Self {
            id: generate_id("task", &title),
            project_id: project_id.into(),
            task_type: TaskType::default(),
            priority: Priority::default(),
            title,
            description: description.into(),
            status: TaskStatus::Pending,
            kanban_status: KanbanStatus::NotStarted,
            generated_at: now,
            completed_at: None,
            generated_by,
            context: serde_json::Value::Null,
            result: None,
            updated_at: now,
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_type(mut self, task_type: TaskType) -> Self {
        self.task_type = task_type;
        self
    }

    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = context;
        self
    }

    /// Approved and sitting in a backlog-eligible column
    pub fn is_executable(&self) -> bool {
        self.status == TaskStatus::Approved && self.kanban_status.is_backlog_eligible()
    }

    pub fn set_status(&mut self, status: TaskStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }

    pub fn set_kanban_status(&mut self, kanban_status: KanbanStatus) {
        self.kanban_status = kanban_status;
        self.updated_at = Utc::now();
    }
}

impl Record for Task {
    fn id(&self) -> &str {
        &self.id
    }

    fn collection_name() -> &'static str {
        TASKS_COLLECTION
    }
}
