//! Builtin tool implementations

mod github;
mod ideas;

pub use github::{CommentIssueTool, CreateIssueTool, ListIssuesTool, ListPrsTool, RepoStatusTool, RunStatusTool};
pub use ideas::{IdeaAnalyzeTool, IdeaCreateRepoTool, IdeaGenerateCodeTool, IdeaSavePlanTool};
