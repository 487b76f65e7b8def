//! CLI command definitions and subcommands

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::debug;

/// pmd - autonomous project manager agent
#[derive(Parser)]
#[command(
    name = "pmd",
    about = "Repository health analysis, approval-gated actions and task execution",
    version
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Output format for listings
    #[arg(short, long, global = true, default_value = "text")]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the scheduler and run until Ctrl-C
    Run,

    /// Run one analysis now
    Analyze {
        /// Deep analysis instead of a health check
        #[arg(long)]
        deep: bool,
    },

    /// Execute the next approved backlog task
    ExecuteNext,

    /// Manage tasks
    Task {
        #[command(subcommand)]
        command: TaskCommand,
    },

    /// Manage actions awaiting approval
    Action {
        #[command(subcommand)]
        command: ActionCommand,
    },
}

#[derive(Debug, Subcommand)]
pub enum TaskCommand {
    /// List tasks, newest first
    List {
        /// Filter by project id
        #[arg(short, long)]
        project: Option<String>,

        /// Filter by status (pending, approved, rejected, in_progress, completed, failed)
        #[arg(short, long)]
        status: Option<String>,

        /// Filter by kanban column (not_started, backlog, in_progress, review, done)
        #[arg(short, long)]
        kanban: Option<String>,
    },

    /// Create a task by hand
    Add {
        /// Owning project id
        #[arg(short, long)]
        project: String,

        /// Task title
        title: String,

        #[arg(short, long, default_value = "")]
        description: String,

        /// critical, high, medium or low
        #[arg(long, default_value = "medium")]
        priority: String,

        /// development, bugfix, review, planning, documentation, maintenance
        #[arg(short = 't', long = "type", default_value = "development")]
        task_type: String,
    },

    /// Approve a task for execution
    Approve {
        /// Task ID (or unique prefix)
        id: String,
    },

    /// Reject a task
    Reject {
        /// Task ID (or unique prefix)
        id: String,
    },

    /// Move a task to another kanban column
    Move {
        /// Task ID (or unique prefix)
        id: String,

        /// not_started, backlog, in_progress, review or done
        column: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum ActionCommand {
    /// List pending actions
    List {
        /// Include decided and expired actions
        #[arg(short, long)]
        all: bool,
    },

    /// Approve a pending action
    Approve {
        /// Action ID (or unique prefix)
        id: String,

        /// Execute the action right away
        #[arg(short, long)]
        execute: bool,
    },

    /// Reject a pending action
    Reject {
        /// Action ID (or unique prefix)
        id: String,
    },

    /// Expire overdue pending actions now
    Expire,

    /// Execute an approved action
    Execute {
        /// Action ID (or unique prefix)
        id: String,
    },
}

/// Output format for listings
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        debug!(%s, "OutputFormat::from_str: called");
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format: {}. Use: text or json", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}

/// Result of checking an external program
pub struct ToolCheck {
    pub name: String,
    pub available: bool,
    pub version: Option<String>,
}

impl ToolCheck {
    pub fn check(name: &str, version_args: &[&str]) -> Self {
        debug!(name, ?version_args, "ToolCheck::check: called");
        match std::process::Command::new(name).args(version_args).output() {
            Ok(output) if output.status.success() => Self {
                name: name.to_string(),
                available: true,
                version: Some(parse_version(&String::from_utf8_lossy(&output.stdout))),
            },
            _ => Self {
                name: name.to_string(),
                available: false,
                version: None,
            },
        }
    }
}

/// First version-like word of a `--version` output
fn parse_version(output: &str) -> String {
    for word in output.split_whitespace() {
        let word = word.trim_start_matches('v');
        if word.chars().next().is_some_and(|c| c.is_ascii_digit()) {
            let version: String = word.chars().take_while(|c| c.is_ascii_digit() || *c == '.').collect();
            if !version.is_empty() {
                return version;
            }
        }
    }
    "unknown".to_string()
}

pub fn get_log_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(crate::config::APP_DIR)
        .join("logs")
        .join("pmagent.log")
}

/// After-help text: external programs and the log location
pub fn generate_after_help() -> String {
    debug!("generate_after_help: called");
    let tools = [ToolCheck::check("gh", &["--version"]), ToolCheck::check("git", &["--version"])];

    let mut help = String::from("External programs:\n");
    for tool in &tools {
        let icon = if tool.available { "\u{2705}" } else { "\u{274C}" };
        let version = tool.version.as_deref().unwrap_or("not found");
        help.push_str(&format!("  {} {:<10} {}\n", icon, tool.name, version));
    }
    help.push('\n');
    help.push_str(&format!("Logs are written to: {}\n", get_log_path().display()));
    help
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_nested_commands() {
        let cli = Cli::try_parse_from(["pmd", "--format", "json", "action", "approve", "abc", "--execute"]).unwrap();
        assert_eq!(cli.format, OutputFormat::Json);
        match cli.command {
            Command::Action {
                command: ActionCommand::Approve { id, execute },
            } => {
                assert_eq!(id, "abc");
                assert!(execute);
            }
            other => panic!("unexpected command {:?}", other),
        }

        let cli = Cli::try_parse_from(["pmd", "analyze", "--deep", "-l", "debug"]).unwrap();
        assert!(matches!(cli.command, Command::Analyze { deep: true }));
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_task_add_defaults() {
        let cli = Cli::try_parse_from(["pmd", "task", "add", "--project", "api", "Fix it"]).unwrap();
        match cli.command {
            Command::Task {
                command:
                    TaskCommand::Add {
                        project,
                        title,
                        priority,
                        task_type,
                        ..
                    },
            } => {
                assert_eq!(project, "api");
                assert_eq!(title, "Fix it");
                assert_eq!(priority, "medium");
                assert_eq!(task_type, "development");
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_task_move() {
        let cli = Cli::try_parse_from(["pmd", "task", "move", "abc", "backlog"]).unwrap();
        match cli.command {
            Command::Task {
                command: TaskCommand::Move { id, column },
            } => {
                assert_eq!(id, "abc");
                assert_eq!(column, "backlog");
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_output_format_parse() {
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("plain".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert!("table".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_parse_version() {
        assert_eq!(parse_version("gh version 2.45.0 (2024-03-04)"), "2.45.0");
        assert_eq!(parse_version("git version 2.43.0"), "2.43.0");
        assert_eq!(parse_version("nothing here"), "unknown");
    }
}
