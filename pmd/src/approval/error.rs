//! Approval errors

use thiserror::Error;

use crate::domain::ActionStatus;
use crate::state::StateError;

#[derive(Debug, Error)]
pub enum ApprovalError {
    #[error("Pending action not found: {0}")]
    NotFound(String),

    #[error("'{input}' matches several actions: {}", matches.join(", "))]
    Ambiguous { input: String, matches: Vec<String> },

    #[error("Action {id} already {status}")]
    AlreadyDecided { id: String, status: ActionStatus },

    #[error("Action {id} is {status}, only approved actions can be executed")]
    NotApproved { id: String, status: ActionStatus },

    #[error(transparent)]
    State(StateError),
}

impl From<StateError> for ApprovalError {
    fn from(e: StateError) -> Self {
        match e {
            StateError::NotFound(id) => Self::NotFound(id),
            StateError::Conflict { id, status } => Self::AlreadyDecided { id, status },
            other => Self::State(other),
        }
    }
}
