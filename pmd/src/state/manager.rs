//! StateManager - actor that owns the keyed store
//!
//! Every command runs to completion inside one task, so each command is
//! atomic with respect to every other. Record changes are announced on the
//! store's pub/sub channels with the record id as payload.

use std::path::Path;

use chrono::{DateTime, Utc};
use kvstore::{Publication, Publisher, Record, Store};
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::domain::{ActionExecution, ActionStatus, AnalysisReport, Idea, PendingAction, Task};

use super::messages::{Mutator, StateCommand, StateError, StateResponse};

/// Cache keys derived from task data
pub const TASK_CACHE_PATTERN: &str = "cache:tasks:*";

const COMMAND_CAPACITY: usize = 256;

/// Handle to send commands to the StateManager
#[derive(Clone)]
pub struct StateManager {
    tx: mpsc::Sender<StateCommand>,
    publisher: Publisher,
}

impl StateManager {
    /// Open the store under `store_dir` and spawn the actor
    pub fn spawn(store_dir: impl AsRef<Path>) -> eyre::Result<Self> {
        debug!(store_dir = %store_dir.as_ref().display(), "StateManager::spawn: called");
        let store = Store::open(store_dir.as_ref())?;
        Ok(Self::with_store(store))
    }

    /// Spawn over an in-memory store
    pub fn spawn_in_memory() -> eyre::Result<Self> {
        debug!("StateManager::spawn_in_memory: called");
        Ok(Self::with_store(Store::open_in_memory()?))
    }

    pub fn with_store(store: Store) -> Self {
        let (tx, rx) = mpsc::channel(COMMAND_CAPACITY);
        let publisher = store.publisher();
        tokio::spawn(actor_loop(store, rx));
        info!("StateManager spawned");
        Self { tx, publisher }
    }

    /// Subscribe to record change publications
    pub fn subscribe(&self) -> broadcast::Receiver<Publication> {
        self.publisher.subscribe()
    }

    pub fn publish(&self, channel: &str, payload: impl Into<String>) -> usize {
        self.publisher.publish(channel, payload)
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<StateResponse<T>>) -> StateCommand,
    ) -> StateResponse<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(make(reply_tx))
            .await
            .map_err(|_| StateError::ChannelError)?;
        reply_rx.await.map_err(|_| StateError::ChannelError)?
    }

    // === Tasks ===

    pub async fn put_task(&self, task: Task) -> StateResponse<()> {
        debug!(task_id = %task.id, "put_task: called");
        self.request(|reply| StateCommand::PutTask { task, reply }).await
    }

    pub async fn get_task(&self, id: &str) -> StateResponse<Option<Task>> {
        debug!(%id, "get_task: called");
        let id = id.to_string();
        self.request(|reply| StateCommand::GetTask { id, reply }).await
    }

    pub async fn list_tasks(&self) -> StateResponse<Vec<Task>> {
        debug!("list_tasks: called");
        self.request(|reply| StateCommand::ListTasks { reply }).await
    }

    /// Read-modify-write a task atomically; returns the updated task
    pub async fn modify_task(&self, id: &str, apply: impl FnOnce(&mut Task) + Send + 'static) -> StateResponse<Task> {
        debug!(%id, "modify_task: called");
        let id = id.to_string();
        let apply: Mutator<Task> = Box::new(apply);
        self.request(|reply| StateCommand::ModifyTask { id, apply, reply }).await
    }

    // === Pending actions ===

    pub async fn put_action(&self, action: PendingAction) -> StateResponse<()> {
        debug!(action_id = %action.id, "put_action: called");
        self.request(|reply| StateCommand::PutAction { action, reply }).await
    }

    pub async fn get_action(&self, id: &str) -> StateResponse<Option<PendingAction>> {
        debug!(%id, "get_action: called");
        let id = id.to_string();
        self.request(|reply| StateCommand::GetAction { id, reply }).await
    }

    pub async fn list_actions(&self) -> StateResponse<Vec<PendingAction>> {
        debug!("list_actions: called");
        self.request(|reply| StateCommand::ListActions { reply }).await
    }

    /// Move a pending action to `to`; fails with `Conflict` if it is no
    /// longer pending
    pub async fn decide_action(
        &self,
        id: &str,
        to: ActionStatus,
        decided_by: &str,
        at: DateTime<Utc>,
    ) -> StateResponse<PendingAction> {
        debug!(%id, ?to, %decided_by, "decide_action: called");
        let id = id.to_string();
        let decided_by = decided_by.to_string();
        self.request(|reply| StateCommand::DecideAction {
            id,
            to,
            decided_by,
            at,
            reply,
        })
        .await
    }

    /// Expire every pending action whose deadline is before `now`;
    /// returns the ids changed
    pub async fn expire_actions(&self, now: DateTime<Utc>) -> StateResponse<Vec<String>> {
        debug!(%now, "expire_actions: called");
        self.request(|reply| StateCommand::ExpireActions { now, reply }).await
    }

    pub async fn record_execution(&self, id: &str, execution: ActionExecution) -> StateResponse<PendingAction> {
        debug!(%id, success = execution.success, "record_execution: called");
        let id = id.to_string();
        self.request(|reply| StateCommand::RecordExecution { id, execution, reply })
            .await
    }

    // === Reports ===

    pub async fn put_report(&self, report: AnalysisReport) -> StateResponse<()> {
        debug!(report_id = %report.id, "put_report: called");
        let report = Box::new(report);
        self.request(|reply| StateCommand::PutReport { report, reply }).await
    }

    pub async fn get_report(&self, id: &str) -> StateResponse<Option<AnalysisReport>> {
        debug!(%id, "get_report: called");
        let id = id.to_string();
        self.request(|reply| StateCommand::GetReport { id, reply }).await
    }

    pub async fn list_reports(&self) -> StateResponse<Vec<AnalysisReport>> {
        debug!("list_reports: called");
        self.request(|reply| StateCommand::ListReports { reply }).await
    }

    // === Ideas ===

    pub async fn put_idea(&self, idea: Idea) -> StateResponse<()> {
        debug!(idea_id = %idea.id, "put_idea: called");
        self.request(|reply| StateCommand::PutIdea { idea, reply }).await
    }

    pub async fn get_idea(&self, id: &str) -> StateResponse<Option<Idea>> {
        debug!(%id, "get_idea: called");
        let id = id.to_string();
        self.request(|reply| StateCommand::GetIdea { id, reply }).await
    }

    pub async fn list_ideas(&self) -> StateResponse<Vec<Idea>> {
        debug!("list_ideas: called");
        self.request(|reply| StateCommand::ListIdeas { reply }).await
    }

    pub async fn modify_idea(&self, id: &str, apply: impl FnOnce(&mut Idea) + Send + 'static) -> StateResponse<Idea> {
        debug!(%id, "modify_idea: called");
        let id = id.to_string();
        let apply: Mutator<Idea> = Box::new(apply);
        self.request(|reply| StateCommand::ModifyIdea { id, apply, reply }).await
    }

    // === Raw values ===

    pub async fn get_value(&self, key: &str) -> StateResponse<Option<String>> {
        debug!(%key, "get_value: called");
        let key = key.to_string();
        self.request(|reply| StateCommand::GetValue { key, reply }).await
    }

    pub async fn set_value(&self, key: &str, value: impl Into<String>) -> StateResponse<()> {
        debug!(%key, "set_value: called");
        let key = key.to_string();
        let value = value.into();
        self.request(|reply| StateCommand::SetValue { key, value, reply }).await
    }

    pub async fn delete_value(&self, key: &str) -> StateResponse<bool> {
        debug!(%key, "delete_value: called");
        let key = key.to_string();
        self.request(|reply| StateCommand::DeleteValue { key, reply }).await
    }

    /// Delete every key matching a glob pattern
    pub async fn invalidate(&self, pattern: &str) -> StateResponse<usize> {
        debug!(%pattern, "invalidate: called");
        let pattern = pattern.to_string();
        self.request(|reply| StateCommand::Invalidate { pattern, reply }).await
    }

    /// Stop the actor after draining queued commands
    pub async fn shutdown(&self) -> Result<(), StateError> {
        debug!("shutdown: called");
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(StateCommand::Shutdown { reply: reply_tx })
            .await
            .map_err(|_| StateError::ChannelError)?;
        reply_rx.await.map_err(|_| StateError::ChannelError)
    }
}

async fn actor_loop(mut store: Store, mut rx: mpsc::Receiver<StateCommand>) {
    debug!("StateManager actor started");

    while let Some(cmd) = rx.recv().await {
        debug!(command = cmd.name(), "actor_loop: received command");
        match cmd {
            StateCommand::PutTask { task, reply } => {
                let result = put_and_announce(&mut store, &task).and_then(|_| invalidate_task_cache(&mut store));
                let _ = reply.send(result);
            }
            StateCommand::GetTask { id, reply } => {
                let _ = reply.send(store.get_record::<Task>(&id).map_err(Into::into));
            }
            StateCommand::ListTasks { reply } => {
                let _ = reply.send(store.list::<Task>().map_err(Into::into));
            }
            StateCommand::ModifyTask { id, apply, reply } => {
                let result = modify(&mut store, &id, apply).and_then(|task| {
                    invalidate_task_cache(&mut store)?;
                    Ok(task)
                });
                let _ = reply.send(result);
            }

            StateCommand::PutAction { action, reply } => {
                let _ = reply.send(put_and_announce(&mut store, &action));
            }
            StateCommand::GetAction { id, reply } => {
                let _ = reply.send(store.get_record::<PendingAction>(&id).map_err(Into::into));
            }
            StateCommand::ListActions { reply } => {
                let _ = reply.send(store.list::<PendingAction>().map_err(Into::into));
            }
            StateCommand::DecideAction {
                id,
                to,
                decided_by,
                at,
                reply,
            } => {
                let _ = reply.send(decide(&mut store, &id, to, decided_by, at));
            }
            StateCommand::ExpireActions { now, reply } => {
                let _ = reply.send(expire(&mut store, now));
            }
            StateCommand::RecordExecution { id, execution, reply } => {
                let apply: Mutator<PendingAction> = Box::new(move |action| action.last_execution = Some(execution));
                let _ = reply.send(modify(&mut store, &id, apply));
            }

            StateCommand::PutReport { report, reply } => {
                let _ = reply.send(put_and_announce(&mut store, report.as_ref()));
            }
            StateCommand::GetReport { id, reply } => {
                let _ = reply.send(store.get_record::<AnalysisReport>(&id).map_err(Into::into));
            }
            StateCommand::ListReports { reply } => {
                let _ = reply.send(store.list::<AnalysisReport>().map_err(Into::into));
            }

            StateCommand::PutIdea { idea, reply } => {
                let _ = reply.send(put_and_announce(&mut store, &idea));
            }
            StateCommand::GetIdea { id, reply } => {
                let _ = reply.send(store.get_record::<Idea>(&id).map_err(Into::into));
            }
            StateCommand::ListIdeas { reply } => {
                let _ = reply.send(store.list::<Idea>().map_err(Into::into));
            }
            StateCommand::ModifyIdea { id, apply, reply } => {
                let _ = reply.send(modify(&mut store, &id, apply));
            }

            StateCommand::GetValue { key, reply } => {
                let _ = reply.send(store.get(&key).map_err(Into::into));
            }
            StateCommand::SetValue { key, value, reply } => {
                let _ = reply.send(store.set(&key, &value).map_err(Into::into));
            }
            StateCommand::DeleteValue { key, reply } => {
                let _ = reply.send(store.delete(&key).map_err(Into::into));
            }
            StateCommand::Invalidate { pattern, reply } => {
                let _ = reply.send(store.invalidate(&pattern).map_err(Into::into));
            }

            StateCommand::Shutdown { reply } => {
                info!("StateManager actor shutting down");
                let _ = reply.send(());
                break;
            }
        }
    }

    debug!("StateManager actor stopped");
}

fn put_and_announce<R: Record>(store: &mut Store, record: &R) -> StateResponse<()> {
    store.put(record)?;
    store.publish(R::collection_name(), record.id());
    Ok(())
}

fn invalidate_task_cache(store: &mut Store) -> StateResponse<()> {
    store.invalidate(TASK_CACHE_PATTERN)?;
    Ok(())
}

fn modify<R: Record>(store: &mut Store, id: &str, apply: Mutator<R>) -> StateResponse<R> {
    let mut record = store
        .get_record::<R>(id)?
        .ok_or_else(|| StateError::NotFound(format!("{}:{}", R::collection_name(), id)))?;
    apply(&mut record);
    put_and_announce(store, &record)?;
    Ok(record)
}

fn decide(
    store: &mut Store,
    id: &str,
    to: ActionStatus,
    decided_by: String,
    at: DateTime<Utc>,
) -> StateResponse<PendingAction> {
    let mut action = store
        .get_record::<PendingAction>(id)?
        .ok_or_else(|| StateError::NotFound(id.to_string()))?;

    if action.status != ActionStatus::Pending {
        debug!(%id, current = %action.status, requested = %to, "decide: action no longer pending");
        return Err(StateError::Conflict {
            id: id.to_string(),
            status: action.status,
        });
    }

    action.status = to;
    action.decided_at = Some(at);
    action.decided_by = Some(decided_by);
    put_and_announce(store, &action)?;
    Ok(action)
}

fn expire(store: &mut Store, now: DateTime<Utc>) -> StateResponse<Vec<String>> {
    let mut expired = Vec::new();
    for mut action in store.list::<PendingAction>()? {
        if !action.is_expirable(now) {
            continue;
        }
        action.status = ActionStatus::Expired;
        action.decided_at = Some(now);
        if let Err(e) = put_and_announce(store, &action) {
            warn!(action_id = %action.id, error = %e, "expire: failed to persist expired action");
            continue;
        }
        expired.push(action.id);
    }
    if !expired.is_empty() {
        info!(count = expired.len(), "Expired pending actions");
    }
    Ok(expired)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ActionType, GeneratedBy, ProposedAction, TaskStatus};
    use chrono::Duration;
    use tempfile::tempdir;

    fn action(ttl: Duration, now: DateTime<Utc>) -> PendingAction {
        PendingAction::new(
            ProposedAction::new(ActionType::CommentIssue, "comment", serde_json::json!({})),
            None,
            ttl,
            now,
        )
    }

    #[tokio::test]
    async fn test_task_put_get_modify() {
        let state = StateManager::spawn_in_memory().unwrap();
        let task = Task::new("proj", "Write docs", "d", GeneratedBy::Manual);
        let id = task.id.clone();

        state.put_task(task).await.unwrap();
        let got = state.get_task(&id).await.unwrap().unwrap();
        assert_eq!(got.title, "Write docs");

        let updated = state
            .modify_task(&id, |t| t.set_status(TaskStatus::Approved))
            .await
            .unwrap();
        assert_eq!(updated.status, TaskStatus::Approved);
        assert_eq!(state.list_tasks().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_modify_missing_task() {
        let state = StateManager::spawn_in_memory().unwrap();
        let result = state.modify_task("nope", |_| {}).await;
        assert!(matches!(result, Err(StateError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_task_write_invalidates_cache() {
        let state = StateManager::spawn_in_memory().unwrap();
        state.set_value("cache:tasks:all", "[]").await.unwrap();
        state.set_value("cache:other", "x").await.unwrap();

        state
            .put_task(Task::new("p", "t", "d", GeneratedBy::Manual))
            .await
            .unwrap();

        assert!(state.get_value("cache:tasks:all").await.unwrap().is_none());
        assert_eq!(state.get_value("cache:other").await.unwrap().as_deref(), Some("x"));
    }

    #[tokio::test]
    async fn test_decide_is_compare_and_swap() {
        let state = StateManager::spawn_in_memory().unwrap();
        let now = Utc::now();
        let a = action(Duration::hours(1), now);
        let id = a.id.clone();
        state.put_action(a).await.unwrap();

        let approved = state
            .decide_action(&id, ActionStatus::Approved, "alice", now)
            .await
            .unwrap();
        assert_eq!(approved.status, ActionStatus::Approved);
        assert_eq!(approved.decided_by.as_deref(), Some("alice"));

        let second = state.decide_action(&id, ActionStatus::Rejected, "bob", now).await;
        assert!(matches!(
            second,
            Err(StateError::Conflict {
                status: ActionStatus::Approved,
                ..
            })
        ));
        let stored = state.get_action(&id).await.unwrap().unwrap();
        assert_eq!(stored.status, ActionStatus::Approved);
    }

    #[tokio::test]
    async fn test_concurrent_decisions_only_one_wins() {
        let state = StateManager::spawn_in_memory().unwrap();
        let now = Utc::now();
        let a = action(Duration::hours(1), now);
        let id = a.id.clone();
        state.put_action(a).await.unwrap();

        let (s1, s2) = (state.clone(), state.clone());
        let (id1, id2) = (id.clone(), id.clone());
        let approve = tokio::spawn(async move { s1.decide_action(&id1, ActionStatus::Approved, "a", now).await });
        let reject = tokio::spawn(async move { s2.decide_action(&id2, ActionStatus::Rejected, "b", now).await });

        let results = [approve.await.unwrap(), reject.await.unwrap()];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert_eq!(
            results
                .iter()
                .filter(|r| matches!(r, Err(StateError::Conflict { .. })))
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn test_expire_only_pending_past_deadline() {
        let state = StateManager::spawn_in_memory().unwrap();
        let now = Utc::now();

        let stale = action(Duration::minutes(1), now - Duration::hours(2));
        let fresh = action(Duration::hours(1), now);
        let decided = {
            let mut a = action(Duration::minutes(1), now - Duration::hours(2));
            a.status = ActionStatus::Rejected;
            a
        };
        let stale_id = stale.id.clone();
        for a in [stale, fresh, decided] {
            state.put_action(a).await.unwrap();
        }

        let expired = state.expire_actions(now).await.unwrap();
        assert_eq!(expired, vec![stale_id.clone()]);
        assert!(state.expire_actions(now).await.unwrap().is_empty());

        let stored = state.get_action(&stale_id).await.unwrap().unwrap();
        assert_eq!(stored.status, ActionStatus::Expired);
    }

    #[tokio::test]
    async fn test_record_changes_are_published() {
        let state = StateManager::spawn_in_memory().unwrap();
        let mut rx = state.subscribe();
        let task = Task::new("p", "t", "d", GeneratedBy::Manual);
        let id = task.id.clone();
        state.put_task(task).await.unwrap();

        let publication = rx.recv().await.unwrap();
        assert_eq!(publication.channel, "tasks");
        assert_eq!(publication.payload, id);
    }

    #[tokio::test]
    async fn test_persists_on_disk() {
        let dir = tempdir().unwrap();
        let id = {
            let state = StateManager::spawn(dir.path()).unwrap();
            let task = Task::new("p", "t", "d", GeneratedBy::Manual);
            let id = task.id.clone();
            state.put_task(task).await.unwrap();
            state.shutdown().await.unwrap();
            id
        };
        let state = StateManager::spawn(dir.path()).unwrap();
        assert!(state.get_task(&id).await.unwrap().is_some());
    }
}
