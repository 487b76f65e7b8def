//! Domain records

pub mod action;
pub mod id;
pub mod idea;
pub mod priority;
pub mod project;
pub mod report;
pub mod task;

pub use action::{
    ACTIONS_COLLECTION, ActionExecution, ActionStatus, ActionType, DEFAULT_ACTION_TTL_HOURS, PendingAction,
    ProposedAction,
};
pub use id::{IdMatch, generate_id, resolve_id};
pub use idea::{IDEAS_COLLECTION, Idea, IdeaStatus};
pub use priority::Priority;
pub use project::{Project, ProjectRegistry};
pub use report::{AnalysisReport, Finding, ProjectReport, REPORTS_COLLECTION, ReportType, Severity};
pub use task::{GeneratedBy, KanbanStatus, TASKS_COLLECTION, Task, TaskStatus, TaskType};
