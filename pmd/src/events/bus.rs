//! Event Bus - broadcast of agent activity to observers
//!
//! Fire-and-forget: with no subscribers an event is simply dropped, and a
//! slow subscriber loses the oldest events rather than blocking emitters.

use tokio::sync::broadcast;
use tracing::debug;

use crate::domain::{AnalysisReport, Idea, PendingAction, Task};

use super::types::{EventKind, PmEvent};

pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Cheap to clone; all clones share one channel
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<PmEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        debug!(capacity, "EventBus::new: creating event bus");
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn emit(&self, event: PmEvent) {
        debug!(event_type = event.event_type(), "EventBus::emit");
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PmEvent> {
        debug!("EventBus::subscribe: new subscriber");
        self.tx.subscribe()
    }

    /// Emitter bound to one agent run
    pub fn emitter_for(&self, run_id: impl Into<String>) -> EventEmitter {
        let run_id = run_id.into();
        debug!(%run_id, "EventBus::emitter_for: creating emitter");
        EventEmitter {
            bus: self.clone(),
            run_id,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    // === Convenience methods ===

    pub fn analysis_started(&self, report: &AnalysisReport) {
        self.emit(PmEvent::analysis_started(report));
    }

    pub fn analysis_completed(&self, report: &AnalysisReport) {
        self.emit(PmEvent::analysis_completed(report));
    }

    pub fn action_pending(&self, action: &PendingAction) {
        self.emit(PmEvent::action_pending(action));
    }

    pub fn task_created(&self, task: &Task) {
        self.emit(PmEvent::task_created(task));
    }

    pub fn idea_updated(&self, idea: &Idea) {
        self.emit(PmEvent::idea(EventKind::IdeaUpdated, idea));
    }

    pub fn idea_plan_ready(&self, idea: &Idea) {
        self.emit(PmEvent::idea(EventKind::IdeaPlanReady, idea));
    }

    pub fn idea_launched(&self, idea: &Idea) {
        self.emit(PmEvent::idea(EventKind::IdeaLaunched, idea));
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

/// Handle bound to a run id for `agent_log` events
#[derive(Clone)]
pub struct EventEmitter {
    bus: EventBus,
    run_id: String,
}

impl EventEmitter {
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn log(&self, level: &str, message: &str) {
        self.bus.emit(PmEvent::agent_log(&self.run_id, level, message));
    }

    pub fn info(&self, message: &str) {
        self.log("info", message);
    }

    pub fn warn(&self, message: &str) {
        self.log("warn", message);
    }
}
