//! Tool trait definition

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::{ToolContext, ToolError, ToolName};
use crate::domain::ProposedAction;

/// How a tool touches the outside world
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolEffect {
    /// Returns data, changes nothing
    ReadOnly,
    /// Changes local idea state only
    WritesState,
    /// Mutates external state; only ever proposed, never run directly
    ApprovalGated,
    /// Kicks off an external collaborator
    Triggers,
}

/// A tool that can be called by the LLM
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> ToolName;

    fn description(&self) -> &'static str;

    /// JSON Schema for input parameters
    fn input_schema(&self) -> Value;

    fn effect(&self) -> ToolEffect {
        ToolEffect::ReadOnly
    }

    /// Validate input and describe the mutation an approval-gated tool
    /// wants performed
    fn propose(&self, _input: &Value) -> Result<ProposedAction, ToolError> {
        Err(ToolError::NotGated(self.name()))
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> ToolResult;
}

/// Result of a tool invocation, serialized back to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requires_approval: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_action_id: Option<String>,
}

impl ToolResult {
    pub fn success(data: Value) -> Self {
        debug!("ToolResult::success: called");
        Self {
            success: true,
            data: Some(data),
            error: None,
            requires_approval: None,
            pending_action_id: None,
        }
    }

    pub fn error(error: impl Into<String>) -> Self {
        debug!("ToolResult::error: called");
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            requires_approval: None,
            pending_action_id: None,
        }
    }

    /// Accepted for human review; the model carries on without waiting
    pub fn pending(pending_action_id: impl Into<String>) -> Self {
        debug!("ToolResult::pending: called");
        Self {
            success: true,
            data: None,
            error: None,
            requires_approval: Some(true),
            pending_action_id: Some(pending_action_id.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        !self.success
    }

    pub fn is_pending(&self) -> bool {
        self.requires_approval == Some(true)
    }

    /// Text sent back in the `tool_result` block
    pub fn to_content(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| format!("{{\"success\":false,\"error\":\"{}\"}}", e))
    }
}

impl<E: std::fmt::Display> From<Result<Value, E>> for ToolResult {
    fn from(result: Result<Value, E>) -> Self {
        match result {
            Ok(data) => Self::success(data),
            Err(e) => Self::error(e.to_string()),
        }
    }
}

pub fn required_str<'a>(input: &'a Value, field: &'static str) -> Result<&'a str, ToolError> {
    input[field]
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(ToolError::MissingInput(field))
}

pub fn optional_str<'a>(input: &'a Value, field: &str) -> Option<&'a str> {
    input[field].as_str().map(str::trim).filter(|s| !s.is_empty())
}

pub fn optional_u32(input: &Value, field: &str) -> Option<u32> {
    input[field].as_u64().and_then(|n| u32::try_from(n).ok())
}

/// Accepts a JSON number or a numeric string
pub fn required_u64(input: &Value, field: &'static str) -> Result<u64, ToolError> {
    match &input[field] {
        Value::Number(n) => n.as_u64().ok_or_else(|| ToolError::InvalidInput {
            field,
            message: format!("expected a positive integer, got {}", n),
        }),
        Value::String(s) => s.trim().parse().map_err(|_| ToolError::InvalidInput {
            field,
            message: format!("expected a positive integer, got '{}'", s),
        }),
        Value::Null => Err(ToolError::MissingInput(field)),
        other => Err(ToolError::InvalidInput {
            field,
            message: format!("expected a positive integer, got {}", other),
        }),
    }
}

pub fn string_list(input: &Value, field: &str) -> Vec<String> {
    match &input[field] {
        Value::Array(items) => items.iter().filter_map(|v| v.as_str()).map(str::to_string).collect(),
        Value::String(s) => s.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_pending_result_wire_shape() {
        let result = ToolResult::pending("abc-action-create-issue");
        let json: Value = serde_json::from_str(&result.to_content()).unwrap();
        assert_eq!(
            json,
            json!({"success": true, "requiresApproval": true, "pendingActionId": "abc-action-create-issue"})
        );
        assert!(!result.is_error());
        assert!(result.is_pending());
    }

    #[test]
    fn test_error_result_wire_shape() {
        let result = ToolResult::error("gh exited with 1");
        let json: Value = serde_json::from_str(&result.to_content()).unwrap();
        assert_eq!(json, json!({"success": false, "error": "gh exited with 1"}));
    }

    #[test]
    fn test_input_helpers() {
        let input = json!({"repo": " acme/api ", "empty": "", "n": "42", "m": 7, "labels": "bug, p1", "neg": -1});
        assert_eq!(required_str(&input, "repo").unwrap(), "acme/api");
        assert!(matches!(required_str(&input, "empty"), Err(ToolError::MissingInput("empty"))));
        assert_eq!(required_u64(&input, "n").unwrap(), 42);
        assert_eq!(required_u64(&input, "m").unwrap(), 7);
        assert!(matches!(required_u64(&input, "neg"), Err(ToolError::InvalidInput { .. })));
        assert!(matches!(required_u64(&input, "absent"), Err(ToolError::MissingInput(_))));
        assert_eq!(string_list(&input, "labels"), vec!["bug", "p1"]);
        assert_eq!(optional_u32(&input, "m"), Some(7));
    }
}
