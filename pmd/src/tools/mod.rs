//! Tools the model can call

pub mod builtin;
mod context;
mod error;
mod name;
mod registry;
mod traits;

pub use context::ToolContext;
pub use error::ToolError;
pub use name::ToolName;
pub use registry::{ToolDeps, ToolRegistry};
pub use traits::{
    Tool, ToolEffect, ToolResult, optional_str, optional_u32, required_str, required_u64, string_list,
};
