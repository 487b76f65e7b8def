//! Pending actions awaiting a human decision

use chrono::{DateTime, Duration, Utc};
use kvstore::Record;
use serde::{Deserialize, Serialize};

use super::id::generate_id;

pub const ACTIONS_COLLECTION: &str = "pending_actions";

/// Default time a proposal waits for a decision
pub const DEFAULT_ACTION_TTL_HOURS: i64 = 24;

/// Side-effecting operations that can be proposed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    CreateIssue,
    CommentIssue,
    CreateRepo,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateIssue => "create_issue",
            Self::CommentIssue => "comment_issue",
            Self::CreateRepo => "create_repo",
        }
    }
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ActionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create_issue" => Ok(Self::CreateIssue),
            "comment_issue" => Ok(Self::CommentIssue),
            "create_repo" => Ok(Self::CreateRepo),
            _ => Err(format!("Unknown action type: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
    Expired,
}

impl ActionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl std::fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Approved => write!(f, "approved"),
            Self::Rejected => write!(f, "rejected"),
            Self::Expired => write!(f, "expired"),
        }
    }
}

impl std::str::FromStr for ActionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            "expired" => Ok(Self::Expired),
            _ => Err(format!("Unknown action status: {}", s)),
        }
    }
}

/// What the tool wants to do
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposedAction {
    #[serde(rename = "type")]
    pub action_type: ActionType,
    pub description: String,
    pub payload: serde_json::Value,
}

impl ProposedAction {
    pub fn new(action_type: ActionType, description: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            action_type,
            description: description.into(),
            payload,
        }
    }
}

/// Result of the most recent execution attempt of an approved action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionExecution {
    pub at: DateTime<Utc>,
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingAction {
    pub id: String,
    pub task_id: Option<String>,
    pub action: ProposedAction,
    pub created_at: DateTime<Utc>,
    /// Fixed at creation, never extended
    pub expires_at: DateTime<Utc>,
    pub status: ActionStatus,
    pub decided_at: Option<DateTime<Utc>>,
    pub decided_by: Option<String>,
    #[serde(default)]
    pub last_execution: Option<ActionExecution>,
}

impl PendingAction {
    /// New pending action; a non-positive ttl is raised to one second
    pub fn new(action: ProposedAction, task_id: Option<String>, ttl: Duration, now: DateTime<Utc>) -> Self {
        let ttl = ttl.max(Duration::seconds(1));
        Self {
            id: generate_id("action", action.action_type.as_str()),
            task_id,
            action,
            created_at: now,
            expires_at: now + ttl,
            status: ActionStatus::Pending,
            decided_at: None,
            decided_by: None,
            last_execution: None,
        }
    }

    /// Pending and past its deadline
    pub fn is_expirable(&self, now: DateTime<Utc>) -> bool {
        self.status == ActionStatus::Pending && self.expires_at < now
    }
}

impl Record for PendingAction {
    fn id(&self) -> &str {
        &self.id
    }

    fn collection_name() -> &'static str {
        ACTIONS_COLLECTION
    }
}
