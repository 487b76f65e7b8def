//! Persistent state: the store actor and the write-behind queue

mod manager;
mod messages;
mod write_behind;

pub use manager::{StateManager, TASK_CACHE_PATTERN};
pub use messages::{Mutator, StateCommand, StateError, StateResponse};
pub use write_behind::{WriteOp, WriteQueue, WriteQueueConfig, WriteQueueStats, WriteSink};
