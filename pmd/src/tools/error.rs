//! Tool error types

use thiserror::Error;

use super::ToolName;
use crate::collab::CollabError;
use crate::state::StateError;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Missing required input: {0}")]
    MissingInput(&'static str),

    #[error("Invalid input {field}: {message}")]
    InvalidInput { field: &'static str, message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("{0} is not approval-gated")]
    NotGated(ToolName),

    #[error(transparent)]
    Collab(#[from] CollabError),

    #[error(transparent)]
    State(#[from] StateError),
}
