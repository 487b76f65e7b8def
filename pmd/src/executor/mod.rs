//! Task execution through the code-generation collaborator

mod task_executor;

pub use task_executor::{ExecutorError, TaskExecutor, TaskOutcome, commit_message};
