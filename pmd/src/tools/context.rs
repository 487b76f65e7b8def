//! ToolContext - per-run context handed to tools

use tracing::debug;

use crate::events::EventEmitter;

/// Scoped to a single agent run
#[derive(Clone)]
pub struct ToolContext {
    pub run_id: String,

    /// Task the run is working on, attached to any proposed action
    pub task_id: Option<String>,

    pub emitter: Option<EventEmitter>,
}

impl ToolContext {
    pub fn new(run_id: impl Into<String>) -> Self {
        let run_id = run_id.into();
        debug!(%run_id, "ToolContext::new: called");
        Self {
            run_id,
            task_id: None,
            emitter: None,
        }
    }

    pub fn with_task(mut self, task_id: impl Into<String>) -> Self {
        self.task_id = Some(task_id.into());
        self
    }

    pub fn with_emitter(mut self, emitter: EventEmitter) -> Self {
        self.emitter = Some(emitter);
        self
    }

    pub fn log(&self, level: &str, message: &str) {
        if let Some(emitter) = &self.emitter {
            emitter.log(level, message);
        }
    }
}

impl std::fmt::Debug for ToolContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolContext")
            .field("run_id", &self.run_id)
            .field("task_id", &self.task_id)
            .finish()
    }
}
