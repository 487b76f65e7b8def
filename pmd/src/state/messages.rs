//! State manager messages
//!
//! Commands and responses for the actor pattern.

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::oneshot;

use crate::domain::{ActionExecution, ActionStatus, AnalysisReport, Idea, PendingAction, Task};

/// Errors from state operations
#[derive(Debug, Error)]
pub enum StateError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Action {id} already decided: {status}")]
    Conflict { id: String, status: ActionStatus },

    #[error("Store error: {0}")]
    StoreError(String),

    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    #[error("Channel error")]
    ChannelError,
}

impl From<kvstore::StoreError> for StateError {
    fn from(e: kvstore::StoreError) -> Self {
        match e {
            kvstore::StoreError::Json(e) => Self::DeserializationError(e.to_string()),
            other => Self::StoreError(other.to_string()),
        }
    }
}

/// Response from state operations
pub type StateResponse<T> = Result<T, StateError>;

/// In-place edit applied atomically inside the actor
pub type Mutator<T> = Box<dyn FnOnce(&mut T) + Send>;

/// Commands sent to the StateManager actor
pub enum StateCommand {
    // Task operations
    PutTask {
        task: Task,
        reply: oneshot::Sender<StateResponse<()>>,
    },
    GetTask {
        id: String,
        reply: oneshot::Sender<StateResponse<Option<Task>>>,
    },
    ListTasks {
        reply: oneshot::Sender<StateResponse<Vec<Task>>>,
    },
    ModifyTask {
        id: String,
        apply: Mutator<Task>,
        reply: oneshot::Sender<StateResponse<Task>>,
    },

    // Pending action operations
    PutAction {
        action: PendingAction,
        reply: oneshot::Sender<StateResponse<()>>,
    },
    GetAction {
        id: String,
        reply: oneshot::Sender<StateResponse<Option<PendingAction>>>,
    },
    ListActions {
        reply: oneshot::Sender<StateResponse<Vec<PendingAction>>>,
    },
    /// Compare-and-swap: succeeds only while the action is still pending
    DecideAction {
        id: String,
        to: ActionStatus,
        decided_by: String,
        at: DateTime<Utc>,
        reply: oneshot::Sender<StateResponse<PendingAction>>,
    },
    ExpireActions {
        now: DateTime<Utc>,
        reply: oneshot::Sender<StateResponse<Vec<String>>>,
    },
    RecordExecution {
        id: String,
        execution: ActionExecution,
        reply: oneshot::Sender<StateResponse<PendingAction>>,
    },

    // Report operations
    PutReport {
        report: Box<AnalysisReport>,
        reply: oneshot::Sender<StateResponse<()>>,
    },
    GetReport {
        id: String,
        reply: oneshot::Sender<StateResponse<Option<AnalysisReport>>>,
    },
    ListReports {
        reply: oneshot::Sender<StateResponse<Vec<AnalysisReport>>>,
    },

    // Idea operations
    PutIdea {
        idea: Idea,
        reply: oneshot::Sender<StateResponse<()>>,
    },
    GetIdea {
        id: String,
        reply: oneshot::Sender<StateResponse<Option<Idea>>>,
    },
    ListIdeas {
        reply: oneshot::Sender<StateResponse<Vec<Idea>>>,
    },
    ModifyIdea {
        id: String,
        apply: Mutator<Idea>,
        reply: oneshot::Sender<StateResponse<Idea>>,
    },

    // Raw keyed access (caches)
    GetValue {
        key: String,
        reply: oneshot::Sender<StateResponse<Option<String>>>,
    },
    SetValue {
        key: String,
        value: String,
        reply: oneshot::Sender<StateResponse<()>>,
    },
    DeleteValue {
        key: String,
        reply: oneshot::Sender<StateResponse<bool>>,
    },
    Invalidate {
        pattern: String,
        reply: oneshot::Sender<StateResponse<usize>>,
    },

    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

impl StateCommand {
    /// Short name for logging
    pub fn name(&self) -> &'static str {
        match self {
            Self::PutTask { .. } => "PutTask",
            Self::GetTask { .. } => "GetTask",
            Self::ListTasks { .. } => "ListTasks",
            Self::ModifyTask { .. } => "ModifyTask",
            Self::PutAction { .. } => "PutAction",
            Self::GetAction { .. } => "GetAction",
            Self::ListActions { .. } => "ListActions",
            Self::DecideAction { .. } => "DecideAction",
            Self::ExpireActions { .. } => "ExpireActions",
            Self::RecordExecution { .. } => "RecordExecution",
            Self::PutReport { .. } => "PutReport",
            Self::GetReport { .. } => "GetReport",
            Self::ListReports { .. } => "ListReports",
            Self::PutIdea { .. } => "PutIdea",
            Self::GetIdea { .. } => "GetIdea",
            Self::ListIdeas { .. } => "ListIdeas",
            Self::ModifyIdea { .. } => "ModifyIdea",
            Self::GetValue { .. } => "GetValue",
            Self::SetValue { .. } => "SetValue",
            Self::DeleteValue { .. } => "DeleteValue",
            Self::Invalidate { .. } => "Invalidate",
            Self::Shutdown { .. } => "Shutdown",
        }
    }
}
