//! Backlog selection

use std::cmp::Ordering;

use crate::domain::Task;

/// Highest priority first, then oldest; the id breaks exact ties so the
/// choice is deterministic
fn execution_order(a: &Task, b: &Task) -> Ordering {
    a.priority
        .rank()
        .cmp(&b.priority.rank())
        .then_with(|| a.generated_at.cmp(&b.generated_at))
        .then_with(|| a.id.cmp(&b.id))
}

/// Next task to execute, or `None` when nothing is approved and in a
/// backlog-eligible column
pub fn select_next_executable<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> Option<&'a Task> {
    tasks
        .into_iter()
        .filter(|t| t.is_executable())
        .min_by(|a, b| execution_order(a, b))
}
