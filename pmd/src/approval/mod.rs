//! Human approval gate for side-effecting actions

mod error;
mod executor;
mod queue;

pub use error::ApprovalError;
pub use executor::ActionExecutor;
pub use queue::ApprovalQueue;
