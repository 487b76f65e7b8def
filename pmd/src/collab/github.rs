//! GitHub collaborator backed by the `gh` CLI

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{debug, info};

use super::{CollabError, run_command};
use crate::config::GithubConfig;

const ISSUE_FIELDS: &str = "number,title,state,labels,author,createdAt,url";
const PR_FIELDS: &str = "number,title,state,author,isDraft,createdAt,url";
const RUN_FIELDS: &str = "databaseId,name,status,conclusion,headBranch,event,createdAt,url";
const REPO_FIELDS: &str = "nameWithOwner,description,defaultBranchRef,isArchived,pushedAt,stargazerCount,url";

/// Filters for issue listing
#[derive(Debug, Clone, Default)]
pub struct IssueQuery {
    pub state: Option<String>,
    pub labels: Vec<String>,
    pub limit: Option<u32>,
}

#[async_trait]
pub trait GitHub: Send + Sync {
    async fn repo_status(&self, repo: &str) -> Result<Value, CollabError>;

    async fn list_issues(&self, repo: &str, query: &IssueQuery) -> Result<Value, CollabError>;

    async fn list_prs(&self, repo: &str, state: Option<&str>, limit: Option<u32>) -> Result<Value, CollabError>;

    async fn run_status(&self, repo: &str, limit: Option<u32>) -> Result<Value, CollabError>;

    async fn create_issue(&self, repo: &str, title: &str, body: &str, labels: &[String]) -> Result<Value, CollabError>;

    async fn comment_issue(&self, repo: &str, issue_number: u64, body: &str) -> Result<Value, CollabError>;

    async fn create_repo(&self, name: &str, description: Option<&str>, private: bool) -> Result<Value, CollabError>;
}

/// Shells out to `gh`, asking for `--json` output on reads
pub struct GhCli {
    program: String,
    timeout: Duration,
}

impl GhCli {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    pub fn from_config(config: &GithubConfig) -> Self {
        Self::new(config.program.clone(), Duration::from_secs(config.timeout_secs))
    }

    async fn run(&self, args: Vec<String>) -> Result<String, CollabError> {
        debug!(program = %self.program, subcommand = ?args.first(), "GhCli::run: called");
        run_command(&self.program, &args, None, self.timeout)
            .await?
            .into_stdout(&self.program)
    }

    async fn run_json(&self, args: Vec<String>) -> Result<Value, CollabError> {
        let stdout = self.run(args).await?;
        if stdout.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&stdout).map_err(|e| CollabError::InvalidOutput {
            program: self.program.clone(),
            message: e.to_string(),
        })
    }

    /// Mutating subcommands print the created URL
    async fn run_url(&self, args: Vec<String>) -> Result<Value, CollabError> {
        let stdout = self.run(args).await?;
        Ok(json!({ "url": stdout.trim() }))
    }
}

fn args(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

fn issue_list_args(repo: &str, query: &IssueQuery) -> Vec<String> {
    let mut out = args(&["issue", "list", "--repo", repo, "--json", ISSUE_FIELDS]);
    out.extend(["--state".to_string(), query.state.clone().unwrap_or_else(|| "open".to_string())]);
    out.extend(["--limit".to_string(), query.limit.unwrap_or(30).to_string()]);
    for label in &query.labels {
        out.extend(["--label".to_string(), label.clone()]);
    }
    out
}

fn pr_list_args(repo: &str, state: Option<&str>, limit: Option<u32>) -> Vec<String> {
    let mut out = args(&["pr", "list", "--repo", repo, "--json", PR_FIELDS]);
    out.extend(["--state".to_string(), state.unwrap_or("open").to_string()]);
    out.extend(["--limit".to_string(), limit.unwrap_or(30).to_string()]);
    out
}

fn run_list_args(repo: &str, limit: Option<u32>) -> Vec<String> {
    let mut out = args(&["run", "list", "--repo", repo, "--json", RUN_FIELDS]);
    out.extend(["--limit".to_string(), limit.unwrap_or(10).to_string()]);
    out
}

fn issue_create_args(repo: &str, title: &str, body: &str, labels: &[String]) -> Vec<String> {
    let mut out = args(&["issue", "create", "--repo", repo, "--title", title, "--body", body]);
    for label in labels {
        out.extend(["--label".to_string(), label.clone()]);
    }
    out
}

fn repo_create_args(name: &str, description: Option<&str>, private: bool) -> Vec<String> {
    let visibility = if private { "--private" } else { "--public" };
    let mut out = args(&["repo", "create", name, visibility]);
    if let Some(description) = description {
        out.extend(["--description".to_string(), description.to_string()]);
    }
    out
}

#[async_trait]
impl GitHub for GhCli {
    async fn repo_status(&self, repo: &str) -> Result<Value, CollabError> {
        debug!(%repo, "GhCli::repo_status: called");
        self.run_json(args(&["repo", "view", repo, "--json", REPO_FIELDS])).await
    }

    async fn list_issues(&self, repo: &str, query: &IssueQuery) -> Result<Value, CollabError> {
        debug!(%repo, ?query, "GhCli::list_issues: called");
        self.run_json(issue_list_args(repo, query)).await
    }

    async fn list_prs(&self, repo: &str, state: Option<&str>, limit: Option<u32>) -> Result<Value, CollabError> {
        debug!(%repo, ?state, ?limit, "GhCli::list_prs: called");
        self.run_json(pr_list_args(repo, state, limit)).await
    }

    async fn run_status(&self, repo: &str, limit: Option<u32>) -> Result<Value, CollabError> {
        debug!(%repo, ?limit, "GhCli::run_status: called");
        self.run_json(run_list_args(repo, limit)).await
    }

    async fn create_issue(&self, repo: &str, title: &str, body: &str, labels: &[String]) -> Result<Value, CollabError> {
        info!(%repo, %title, "Creating issue");
        self.run_url(issue_create_args(repo, title, body, labels)).await
    }

    async fn comment_issue(&self, repo: &str, issue_number: u64, body: &str) -> Result<Value, CollabError> {
        info!(%repo, issue_number, "Commenting on issue");
        let number = issue_number.to_string();
        self.run_url(args(&["issue", "comment", number.as_str(), "--repo", repo, "--body", body]))
            .await
    }

    async fn create_repo(&self, name: &str, description: Option<&str>, private: bool) -> Result<Value, CollabError> {
        info!(%name, private, "Creating repository");
        self.run_url(repo_create_args(name, description, private)).await
    }
}
