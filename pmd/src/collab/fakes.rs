//! In-memory collaborators for tests

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Value, json};

use super::{CodeGenerator, CodegenOutput, CollabError, CrawlSummary, Crawler, GitHub, IssueQuery, Notifier, Vcs};
use crate::domain::PendingAction;

fn failed(program: &str, stderr: &str) -> CollabError {
    CollabError::Failed {
        program: program.to_string(),
        exit_code: 1,
        stderr: stderr.to_string(),
    }
}

/// Records every call; mutations fail when `fail_mutations` is set
#[derive(Default)]
pub struct FakeGitHub {
    pub calls: Mutex<Vec<String>>,
    pub fail_mutations: bool,
}

impl FakeGitHub {
    pub fn failing() -> Self {
        Self {
            fail_mutations: true,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn mutation(&self, call: String, url: &str) -> Result<Value, CollabError> {
        self.record(call);
        if self.fail_mutations {
            Err(failed("gh", "HTTP 403"))
        } else {
            Ok(json!({ "url": url }))
        }
    }
}

#[async_trait]
impl GitHub for FakeGitHub {
    async fn repo_status(&self, repo: &str) -> Result<Value, CollabError> {
        self.record(format!("repo_status {}", repo));
        Ok(json!({"nameWithOwner": repo, "isArchived": false}))
    }

    async fn list_issues(&self, repo: &str, _query: &IssueQuery) -> Result<Value, CollabError> {
        self.record(format!("list_issues {}", repo));
        Ok(json!([{"number": 1, "title": "Broken build"}]))
    }

    async fn list_prs(&self, repo: &str, _state: Option<&str>, _limit: Option<u32>) -> Result<Value, CollabError> {
        self.record(format!("list_prs {}", repo));
        Ok(json!([]))
    }

    async fn run_status(&self, repo: &str, _limit: Option<u32>) -> Result<Value, CollabError> {
        self.record(format!("run_status {}", repo));
        Ok(json!([{"status": "completed", "conclusion": "failure"}]))
    }

    async fn create_issue(&self, repo: &str, title: &str, _body: &str, _labels: &[String]) -> Result<Value, CollabError> {
        self.mutation(
            format!("create_issue {} {}", repo, title),
            &format!("https://github.com/{}/issues/7", repo),
        )
    }

    async fn comment_issue(&self, repo: &str, issue_number: u64, _body: &str) -> Result<Value, CollabError> {
        self.mutation(
            format!("comment_issue {} {}", repo, issue_number),
            &format!("https://github.com/{}/issues/{}#comment", repo, issue_number),
        )
    }

    async fn create_repo(&self, name: &str, _description: Option<&str>, private: bool) -> Result<Value, CollabError> {
        self.mutation(
            format!("create_repo {} {}", name, private),
            &format!("https://github.com/me/{}", name),
        )
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub notifications: Mutex<Vec<(String, String)>>,
    pub approval_requests: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn notifications(&self) -> Vec<(String, String)> {
        self.notifications.lock().unwrap().clone()
    }

    pub fn approval_requests(&self) -> Vec<String> {
        self.approval_requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, title: &str, message: &str) -> Result<(), CollabError> {
        self.notifications
            .lock()
            .unwrap()
            .push((title.to_string(), message.to_string()));
        Ok(())
    }

    async fn request_approval(&self, action: &PendingAction) -> Result<(), CollabError> {
        self.approval_requests.lock().unwrap().push(action.id.clone());
        Ok(())
    }
}

/// Returns a fixed summary, or fails with `error`
#[derive(Default)]
pub struct FakeCodegen {
    pub error: Option<String>,
    pub prompts: Mutex<Vec<(PathBuf, String)>>,
}

impl FakeCodegen {
    pub fn failing(error: &str) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Default::default()
        }
    }

    pub fn prompts(&self) -> Vec<(PathBuf, String)> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl CodeGenerator for FakeCodegen {
    async fn generate(&self, workdir: &Path, prompt: &str) -> Result<CodegenOutput, CollabError> {
        self.prompts
            .lock()
            .unwrap()
            .push((workdir.to_path_buf(), prompt.to_string()));
        match &self.error {
            Some(e) => Err(failed("codegen", e)),
            None => Ok(CodegenOutput {
                summary: "Implemented the change".to_string(),
            }),
        }
    }
}

/// Commits unless `clean`; push fails when `fail_push`
#[derive(Default)]
pub struct FakeVcs {
    pub clean: bool,
    pub fail_push: bool,
    pub commits: Mutex<Vec<String>>,
    pub pushes: Mutex<usize>,
}

impl FakeVcs {
    pub fn commits(&self) -> Vec<String> {
        self.commits.lock().unwrap().clone()
    }

    pub fn pushes(&self) -> usize {
        *self.pushes.lock().unwrap()
    }
}

#[async_trait]
impl Vcs for FakeVcs {
    async fn commit_all(&self, _workdir: &Path, message: &str) -> Result<Option<String>, CollabError> {
        if self.clean {
            return Ok(None);
        }
        let mut commits = self.commits.lock().unwrap();
        commits.push(message.to_string());
        Ok(Some(format!("sha{}", commits.len())))
    }

    async fn push(&self, _workdir: &Path) -> Result<(), CollabError> {
        *self.pushes.lock().unwrap() += 1;
        if self.fail_push {
            Err(failed("git", "rejected"))
        } else {
            Ok(())
        }
    }
}

/// Crawler with fixed due sources
#[derive(Default)]
pub struct FakeCrawler {
    pub due: Vec<String>,
    pub crawled: Mutex<Vec<String>>,
}

#[async_trait]
impl Crawler for FakeCrawler {
    async fn crawl_news(&self) -> Result<CrawlSummary, CollabError> {
        self.crawl_source("news").await
    }

    async fn due_sources(&self, _now: DateTime<Utc>) -> Result<Vec<String>, CollabError> {
        Ok(self.due.clone())
    }

    async fn crawl_source(&self, id: &str) -> Result<CrawlSummary, CollabError> {
        self.crawled.lock().unwrap().push(id.to_string());
        Ok(CrawlSummary {
            source: id.to_string(),
            output: "ok".to_string(),
        })
    }
}
