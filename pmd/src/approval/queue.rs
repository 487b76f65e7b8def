//! ApprovalQueue - the pending action state machine
//!
//! `pending` moves exactly once to `approved`, `rejected` or `expired`.
//! Decisions are compare-and-swap inside the state actor, so of two racing
//! decisions on one action only the first lands.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use super::{ActionExecutor, ApprovalError};
use crate::collab::Notifier;
use crate::domain::{ActionExecution, ActionStatus, IdMatch, PendingAction, ProposedAction, resolve_id};
use crate::events::EventBus;
use crate::state::StateManager;
use crate::tools::ToolResult;

#[derive(Clone)]
pub struct ApprovalQueue {
    state: StateManager,
    bus: EventBus,
    notifier: Arc<dyn Notifier>,
    ttl: Duration,
}

impl ApprovalQueue {
    pub fn new(state: StateManager, bus: EventBus, notifier: Arc<dyn Notifier>, ttl: Duration) -> Self {
        debug!(ttl_secs = ttl.num_seconds(), "ApprovalQueue::new: called");
        // expires_at must stay strictly after created_at
        let ttl = ttl.max(Duration::seconds(1));
        Self {
            state,
            bus,
            notifier,
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Persist a new pending action and ask a human about it
    pub async fn enqueue(&self, action: ProposedAction, task_id: Option<String>) -> Result<PendingAction, ApprovalError> {
        let pending = PendingAction::new(action, task_id, self.ttl, Utc::now());
        debug!(id = %pending.id, action_type = %pending.action.action_type, "ApprovalQueue::enqueue: called");
        self.state.put_action(pending.clone()).await?;
        info!(id = %pending.id, expires_at = %pending.expires_at, "Action pending approval");

        self.bus.action_pending(&pending);
        if let Err(e) = self.notifier.request_approval(&pending).await {
            warn!(id = %pending.id, error = %e, "Failed to send approval request");
        }
        Ok(pending)
    }

    pub async fn approve(&self, id: &str, decided_by: &str) -> Result<PendingAction, ApprovalError> {
        self.decide(id, ActionStatus::Approved, decided_by).await
    }

    pub async fn reject(&self, id: &str, decided_by: &str) -> Result<PendingAction, ApprovalError> {
        self.decide(id, ActionStatus::Rejected, decided_by).await
    }

    async fn decide(&self, id: &str, to: ActionStatus, decided_by: &str) -> Result<PendingAction, ApprovalError> {
        debug!(%id, ?to, %decided_by, "ApprovalQueue::decide: called");
        let action = self.state.decide_action(id, to, decided_by, Utc::now()).await?;
        info!(%id, status = %action.status, %decided_by, "Action decided");
        Ok(action)
    }

    /// Expire every pending action past its deadline; returns how many changed
    pub async fn expire_old(&self, now: DateTime<Utc>) -> Result<usize, ApprovalError> {
        debug!(%now, "ApprovalQueue::expire_old: called");
        let expired = self.state.expire_actions(now).await?;
        if !expired.is_empty() {
            info!(count = expired.len(), "Expired pending actions");
        }
        Ok(expired.len())
    }

    pub async fn get(&self, id: &str) -> Result<PendingAction, ApprovalError> {
        self.state
            .get_action(id)
            .await?
            .ok_or_else(|| ApprovalError::NotFound(id.to_string()))
    }

    /// Accept a full id or a unique prefix
    pub async fn resolve(&self, input: &str) -> Result<String, ApprovalError> {
        let actions = self.state.list_actions().await?;
        match resolve_id(input, actions.iter().map(|a| a.id.as_str())) {
            IdMatch::Exact(id) | IdMatch::Unique(id) => Ok(id),
            IdMatch::Ambiguous(matches) => Err(ApprovalError::Ambiguous {
                input: input.to_string(),
                matches,
            }),
            IdMatch::NotFound => Err(ApprovalError::NotFound(input.to_string())),
        }
    }

    /// Pending actions, oldest first
    pub async fn list_pending(&self) -> Result<Vec<PendingAction>, ApprovalError> {
        let mut actions = self.list_all().await?;
        actions.retain(|a| a.status == ActionStatus::Pending);
        actions.reverse();
        Ok(actions)
    }

    /// Every action, newest first
    pub async fn list_all(&self) -> Result<Vec<PendingAction>, ApprovalError> {
        let mut actions = self.state.list_actions().await?;
        actions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(actions)
    }

    /// Run an approved action and record the outcome on it
    ///
    /// A failed execution leaves the action approved; retrying is a manual
    /// decision.
    pub async fn execute(&self, id: &str, executor: &ActionExecutor) -> Result<ToolResult, ApprovalError> {
        debug!(%id, "ApprovalQueue::execute: called");
        let action = self.get(id).await?;
        if action.status != ActionStatus::Approved {
            return Err(ApprovalError::NotApproved {
                id: id.to_string(),
                status: action.status,
            });
        }

        let result = executor
            .execute_approved_action(action.action.action_type, &action.action.payload)
            .await;
        if result.success {
            info!(%id, "Approved action executed");
        } else {
            warn!(%id, error = ?result.error, "Approved action failed");
        }

        let execution = ActionExecution {
            at: Utc::now(),
            success: result.success,
            data: result.data.clone(),
            error: result.error.clone(),
        };
        self.state.record_execution(id, execution).await?;
        Ok(result)
    }
}
