//! TaskStore - task persistence and lifecycle transitions

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::select_next_executable;
use crate::domain::{IdMatch, KanbanStatus, Task, TaskStatus, resolve_id};
use crate::events::EventBus;
use crate::state::{StateError, StateManager};

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("Task not found: {0}")]
    NotFound(String),

    #[error("'{input}' matches several tasks: {}", matches.join(", "))]
    Ambiguous { input: String, matches: Vec<String> },

    #[error(transparent)]
    State(StateError),
}

impl From<StateError> for TaskError {
    fn from(e: StateError) -> Self {
        match e {
            StateError::NotFound(id) => Self::NotFound(id),
            other => Self::State(other),
        }
    }
}

/// Optional listing filters; `None` matches everything
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub project_id: Option<String>,
    pub status: Option<TaskStatus>,
    pub kanban_status: Option<KanbanStatus>,
}

impl TaskFilter {
    fn matches(&self, task: &Task) -> bool {
        self.project_id.as_ref().is_none_or(|p| &task.project_id == p)
            && self.status.is_none_or(|s| task.status == s)
            && self.kanban_status.is_none_or(|k| task.kanban_status == k)
    }
}

#[derive(Clone)]
pub struct TaskStore {
    state: StateManager,
    bus: EventBus,
}

impl TaskStore {
    pub fn new(state: StateManager, bus: EventBus) -> Self {
        Self { state, bus }
    }

    /// Persist a new task and announce it
    pub async fn create(&self, task: Task) -> Result<Task, TaskError> {
        debug!(id = %task.id, project = %task.project_id, "TaskStore::create: called");
        self.state.put_task(task.clone()).await?;
        info!(id = %task.id, title = %task.title, generated_by = %task.generated_by, "Task created");
        self.bus.task_created(&task);
        Ok(task)
    }

    pub async fn get(&self, id: &str) -> Result<Task, TaskError> {
        self.state
            .get_task(id)
            .await?
            .ok_or_else(|| TaskError::NotFound(id.to_string()))
    }

    /// Accept a full id or a unique prefix
    pub async fn resolve(&self, input: &str) -> Result<String, TaskError> {
        let tasks = self.state.list_tasks().await?;
        match resolve_id(input, tasks.iter().map(|t| t.id.as_str())) {
            IdMatch::Exact(id) | IdMatch::Unique(id) => Ok(id),
            IdMatch::Ambiguous(matches) => Err(TaskError::Ambiguous {
                input: input.to_string(),
                matches,
            }),
            IdMatch::NotFound => Err(TaskError::NotFound(input.to_string())),
        }
    }

    /// Matching tasks, newest first
    pub async fn list(&self, filter: &TaskFilter) -> Result<Vec<Task>, TaskError> {
        debug!(?filter, "TaskStore::list: called");
        let mut tasks: Vec<Task> = self
            .state
            .list_tasks()
            .await?
            .into_iter()
            .filter(|t| filter.matches(t))
            .collect();
        tasks.sort_by(|a, b| b.generated_at.cmp(&a.generated_at));
        Ok(tasks)
    }

    pub async fn find_next_executable(&self) -> Result<Option<Task>, TaskError> {
        let tasks = self.state.list_tasks().await?;
        let next = select_next_executable(&tasks).cloned();
        debug!(next = ?next.as_ref().map(|t| &t.id), "TaskStore::find_next_executable: returning");
        Ok(next)
    }

    /// Human approval; the kanban column is left alone
    pub async fn approve_task(&self, id: &str) -> Result<Task, TaskError> {
        self.transition(id, "approve", |t| t.set_status(TaskStatus::Approved)).await
    }

    /// Human rejection; the kanban column is left alone
    pub async fn reject_task(&self, id: &str) -> Result<Task, TaskError> {
        self.transition(id, "reject", |t| t.set_status(TaskStatus::Rejected)).await
    }

    pub async fn mark_in_progress(&self, id: &str) -> Result<Task, TaskError> {
        self.transition(id, "start", |t| {
            t.set_status(TaskStatus::InProgress);
            t.set_kanban_status(KanbanStatus::InProgress);
        })
        .await
    }

    pub async fn mark_completed(&self, id: &str, summary: &str) -> Result<Task, TaskError> {
        let summary = summary.to_string();
        self.transition(id, "complete", move |t| {
            t.set_status(TaskStatus::Completed);
            t.set_kanban_status(KanbanStatus::Done);
            t.completed_at = Some(Utc::now());
            t.result = Some(summary);
        })
        .await
    }

    /// A task that failed mid-run goes back to the backlog column, so a
    /// human re-approval makes it executable again
    pub async fn mark_failed(&self, id: &str, error: &str) -> Result<Task, TaskError> {
        warn!(%id, %error, "Task failed");
        let error = error.to_string();
        self.transition(id, "fail", move |t| {
            t.set_status(TaskStatus::Failed);
            if t.kanban_status == KanbanStatus::InProgress {
                t.set_kanban_status(KanbanStatus::Backlog);
            }
            t.result = Some(error);
        })
        .await
    }

    pub async fn set_kanban(&self, id: &str, kanban_status: KanbanStatus) -> Result<Task, TaskError> {
        self.transition(id, "move", move |t| t.set_kanban_status(kanban_status)).await
    }

    async fn transition(
        &self,
        id: &str,
        verb: &'static str,
        apply: impl FnOnce(&mut Task) + Send + 'static,
    ) -> Result<Task, TaskError> {
        debug!(%id, %verb, "TaskStore::transition: called");
        let task = self.state.modify_task(id, apply).await?;
        info!(%id, %verb, status = %task.status, kanban = %task.kanban_status, "Task updated");
        Ok(task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{GeneratedBy, Priority};
    use crate::events::EventKind;

    fn store() -> TaskStore {
        TaskStore::new(StateManager::spawn_in_memory().unwrap(), EventBus::default())
    }

    fn task(title: &str) -> Task {
        Task::new("acme", title, "desc", GeneratedBy::HealthCheck)
    }

    #[tokio::test]
    async fn test_create_emits_task_created() {
        let store = store();
        let mut rx = store.bus.subscribe();
        let created = store.create(task("Fix CI")).await.unwrap();
        assert_eq!(store.get(&created.id).await.unwrap(), created);
        assert_eq!(rx.recv().await.unwrap().kind, EventKind::TaskCreated);
    }

    #[tokio::test]
    async fn test_approve_and_reject_leave_kanban_alone() {
        let store = store();
        let mut t = task("A");
        t.kanban_status = KanbanStatus::Done;
        let t = store.create(t).await.unwrap();

        let rejected = store.reject_task(&t.id).await.unwrap();
        assert_eq!(rejected.status, TaskStatus::Rejected);
        assert_eq!(rejected.kanban_status, KanbanStatus::Done);

        let approved = store.approve_task(&t.id).await.unwrap();
        assert_eq!(approved.status, TaskStatus::Approved);
        assert_eq!(approved.kanban_status, KanbanStatus::Done);
    }

    #[tokio::test]
    async fn test_lifecycle_transitions() {
        let store = store();
        let t = store.create(task("A")).await.unwrap();

        let started = store.mark_in_progress(&t.id).await.unwrap();
        assert_eq!(
            (started.status, started.kanban_status),
            (TaskStatus::InProgress, KanbanStatus::InProgress)
        );

        let done = store.mark_completed(&t.id, "shipped").await.unwrap();
        assert_eq!((done.status, done.kanban_status), (TaskStatus::Completed, KanbanStatus::Done));
        assert!(done.completed_at.is_some());
        assert_eq!(done.result.as_deref(), Some("shipped"));

        let t2 = store.create(task("B")).await.unwrap();
        store.mark_in_progress(&t2.id).await.unwrap();
        let failed = store.mark_failed(&t2.id, "codegen exited 1").await.unwrap();
        assert_eq!(failed.status, TaskStatus::Failed);
        assert_eq!(failed.kanban_status, KanbanStatus::Backlog);
        assert!(failed.completed_at.is_none());
    }

    #[tokio::test]
    async fn test_failed_before_start_keeps_column() {
        let store = store();
        let t = store.create(task("A")).await.unwrap();
        let failed = store.mark_failed(&t.id, "unknown project").await.unwrap();
        assert_eq!(failed.status, TaskStatus::Failed);
        assert_eq!(failed.kanban_status, t.kanban_status);
    }

    #[tokio::test]
    async fn test_set_kanban_moves_column_only() {
        let store = store();
        let t = store.create(task("A")).await.unwrap();
        let moved = store.set_kanban(&t.id, KanbanStatus::Review).await.unwrap();
        assert_eq!(moved.kanban_status, KanbanStatus::Review);
        assert_eq!(moved.status, t.status);
    }

    #[tokio::test]
    async fn test_unknown_task() {
        let store = store();
        assert!(matches!(store.approve_task("nope").await, Err(TaskError::NotFound(_))));
        assert!(matches!(store.get("nope").await, Err(TaskError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_list_filters_newest_first() {
        let store = store();
        let a = store.create(task("A")).await.unwrap();
        let mut other = Task::new("other", "B", "", GeneratedBy::Manual);
        other.generated_at = a.generated_at + chrono::Duration::seconds(1);
        let b = store.create(other).await.unwrap();
        let mut newest = task("C");
        newest.generated_at = a.generated_at + chrono::Duration::seconds(2);
        let c = store.create(newest).await.unwrap();
        store.approve_task(&c.id).await.unwrap();

        let all = store.list(&TaskFilter::default()).await.unwrap();
        let ids: Vec<&str> = all.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec![c.id.as_str(), b.id.as_str(), a.id.as_str()]);

        let acme = TaskFilter {
            project_id: Some("acme".to_string()),
            ..Default::default()
        };
        assert_eq!(store.list(&acme).await.unwrap().len(), 2);

        let approved = TaskFilter {
            status: Some(TaskStatus::Approved),
            ..Default::default()
        };
        assert_eq!(store.list(&approved).await.unwrap()[0].id, c.id);
    }

    #[tokio::test]
    async fn test_find_next_executable() {
        let store = store();
        assert!(store.find_next_executable().await.unwrap().is_none());

        let low = store.create(task("low").with_priority(Priority::Low)).await.unwrap();
        let high = store.create(task("high").with_priority(Priority::High)).await.unwrap();
        assert!(store.find_next_executable().await.unwrap().is_none());

        store.approve_task(&low.id).await.unwrap();
        store.approve_task(&high.id).await.unwrap();
        assert_eq!(store.find_next_executable().await.unwrap().unwrap().id, high.id);

        store.mark_in_progress(&high.id).await.unwrap();
        assert_eq!(store.find_next_executable().await.unwrap().unwrap().id, low.id);
    }

    #[tokio::test]
    async fn test_resolve_prefix() {
        let store = store();
        let t = store.create(task("Only one")).await.unwrap();
        assert_eq!(store.resolve(&t.id[..6]).await.unwrap(), t.id);
        assert!(matches!(store.resolve("zzzz").await, Err(TaskError::NotFound(_))));
    }
}
