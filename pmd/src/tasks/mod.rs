//! Task lifecycle and backlog selection

mod selection;
mod store;

pub use selection::select_next_executable;
pub use store::{TaskError, TaskFilter, TaskStore};
