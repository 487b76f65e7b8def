//! External command collaborators
//!
//! Everything the agent reaches outside the process for: the GitHub CLI,
//! the code-generation CLI, git, the approval notification channel, and
//! crawlers. Each is a trait so components can be wired with fakes.

mod codegen;
mod command;
mod crawler;
mod error;
mod git;
mod github;
mod notify;

pub use codegen::{CliCodeGenerator, CodeGenerator, CodegenOutput};
pub use command::{CommandOutput, run_command, run_shell};
pub use crawler::{CommandCrawler, CrawlSummary, Crawler, CrawlerService};
pub use error::CollabError;
pub use git::{GitCli, Vcs};
pub use github::{GhCli, GitHub, IssueQuery};
pub use notify::{LogNotifier, Notifier};

#[cfg(test)]
pub mod fakes;
