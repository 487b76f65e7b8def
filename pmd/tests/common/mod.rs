//! Shared fakes for integration tests

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use tokio::sync::mpsc;

use pmagent::agent::PromptLoader;
use pmagent::app::{App, Collaborators};
use pmagent::collab::{CodeGenerator, CodegenOutput, CollabError, CrawlSummary, Crawler, GitHub, IssueQuery, Notifier, Vcs};
use pmagent::config::Config;
use pmagent::domain::{PendingAction, Project};
use pmagent::llm::{CompletionRequest, CompletionResponse, LlmClient, LlmError, StreamChunk};
use pmagent::state::StateManager;

/// Replays canned responses in order and records every request
#[derive(Default)]
pub struct ScriptedLlm {
    responses: Mutex<VecDeque<CompletionResponse>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedLlm {
    pub fn new(responses: Vec<CompletionResponse>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.requests.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| LlmError::InvalidResponse("script exhausted".to_string()))
    }

    async fn stream(
        &self,
        request: CompletionRequest,
        _chunk_tx: mpsc::Sender<StreamChunk>,
    ) -> Result<CompletionResponse, LlmError> {
        self.complete(request).await
    }
}

#[derive(Default)]
pub struct RecordingGitHub {
    calls: Mutex<Vec<String>>,
}

impl RecordingGitHub {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl GitHub for RecordingGitHub {
    async fn repo_status(&self, repo: &str) -> Result<Value, CollabError> {
        self.record(format!("repo_status {}", repo));
        Ok(json!({"nameWithOwner": repo}))
    }

    async fn list_issues(&self, repo: &str, _query: &IssueQuery) -> Result<Value, CollabError> {
        self.record(format!("list_issues {}", repo));
        Ok(json!([{"number": 3, "title": "CI flaky on main"}]))
    }

    async fn list_prs(&self, repo: &str, _state: Option<&str>, _limit: Option<u32>) -> Result<Value, CollabError> {
        self.record(format!("list_prs {}", repo));
        Ok(json!([]))
    }

    async fn run_status(&self, repo: &str, _limit: Option<u32>) -> Result<Value, CollabError> {
        self.record(format!("run_status {}", repo));
        Ok(json!([{"conclusion": "failure"}]))
    }

    async fn create_issue(&self, repo: &str, title: &str, _body: &str, _labels: &[String]) -> Result<Value, CollabError> {
        self.record(format!("create_issue {} {}", repo, title));
        Ok(json!({"url": format!("https://github.com/{}/issues/4", repo)}))
    }

    async fn comment_issue(&self, repo: &str, issue_number: u64, _body: &str) -> Result<Value, CollabError> {
        self.record(format!("comment_issue {} {}", repo, issue_number));
        Ok(json!({"url": format!("https://github.com/{}/issues/{}", repo, issue_number)}))
    }

    async fn create_repo(&self, name: &str, _description: Option<&str>, private: bool) -> Result<Value, CollabError> {
        self.record(format!("create_repo {} {}", name, private));
        Ok(json!({"url": format!("https://github.com/me/{}", name)}))
    }
}

#[derive(Default)]
pub struct RecordingCodegen {
    prompts: Mutex<Vec<(PathBuf, String)>>,
}

impl RecordingCodegen {
    pub fn prompts(&self) -> Vec<(PathBuf, String)> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl CodeGenerator for RecordingCodegen {
    async fn generate(&self, workdir: &Path, prompt: &str) -> Result<CodegenOutput, CollabError> {
        self.prompts
            .lock()
            .unwrap()
            .push((workdir.to_path_buf(), prompt.to_string()));
        Ok(CodegenOutput {
            summary: "Made the change".to_string(),
        })
    }
}

#[derive(Default)]
pub struct RecordingVcs {
    commits: Mutex<Vec<String>>,
}

impl RecordingVcs {
    pub fn commits(&self) -> Vec<String> {
        self.commits.lock().unwrap().clone()
    }
}

#[async_trait]
impl Vcs for RecordingVcs {
    async fn commit_all(&self, _workdir: &Path, message: &str) -> Result<Option<String>, CollabError> {
        let mut commits = self.commits.lock().unwrap();
        commits.push(message.to_string());
        Ok(Some(format!("c{}", commits.len())))
    }

    async fn push(&self, _workdir: &Path) -> Result<(), CollabError> {
        Ok(())
    }
}

pub struct IdleCrawler;

#[async_trait]
impl Crawler for IdleCrawler {
    async fn crawl_news(&self) -> Result<CrawlSummary, CollabError> {
        self.crawl_source("news").await
    }

    async fn due_sources(&self, _now: DateTime<Utc>) -> Result<Vec<String>, CollabError> {
        Ok(Vec::new())
    }

    async fn crawl_source(&self, id: &str) -> Result<CrawlSummary, CollabError> {
        Ok(CrawlSummary {
            source: id.to_string(),
            output: String::new(),
        })
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    approval_requests: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn approval_requests(&self) -> Vec<String> {
        self.approval_requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, _title: &str, _message: &str) -> Result<(), CollabError> {
        Ok(())
    }

    async fn request_approval(&self, action: &PendingAction) -> Result<(), CollabError> {
        self.approval_requests.lock().unwrap().push(action.id.clone());
        Ok(())
    }
}

/// An app over fake collaborators, with handles to inspect them
pub struct Harness {
    pub app: App,
    pub github: Arc<RecordingGitHub>,
    pub codegen: Arc<RecordingCodegen>,
    pub vcs: Arc<RecordingVcs>,
    pub notifier: Arc<RecordingNotifier>,
}

pub fn project(id: &str, path: Option<&Path>) -> Project {
    Project {
        id: id.to_string(),
        name: format!("Acme {}", id),
        repo: format!("acme/{}", id),
        path: path.map(Path::to_path_buf),
        enabled: true,
    }
}

pub fn harness(config: Config, state: StateManager) -> Harness {
    let github = Arc::new(RecordingGitHub::default());
    let codegen = Arc::new(RecordingCodegen::default());
    let vcs = Arc::new(RecordingVcs::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let collaborators = Collaborators {
        github: github.clone(),
        codegen: codegen.clone(),
        vcs: vcs.clone(),
        crawler: Arc::new(IdleCrawler),
        notifier: notifier.clone(),
    };
    let app = App::new(config, state, collaborators, PromptLoader::embedded_only());
    Harness {
        app,
        github,
        codegen,
        vcs,
        notifier,
    }
}
