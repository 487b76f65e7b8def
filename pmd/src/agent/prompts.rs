//! Prompt templates
//!
//! Templates are handlebars `.pmt` files. A file in the override directory
//! wins over the copy compiled into the binary.

use std::path::{Path, PathBuf};

use handlebars::Handlebars;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::domain::{Project, ReportType, Task};

pub const SYSTEM: &str = include_str!("../../prompts/system.pmt");
pub const HEALTH_CHECK: &str = include_str!("../../prompts/health-check.pmt");
pub const DEEP_ANALYSIS: &str = include_str!("../../prompts/deep-analysis.pmt");
pub const TASK_IMPLEMENTATION: &str = include_str!("../../prompts/task-implementation.pmt");

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("Prompt template not found: {0}")]
    NotFound(String),

    #[error("Failed to read prompt {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to render template {name}: {message}")]
    Render { name: String, message: String },
}

fn get_embedded(name: &str) -> Option<&'static str> {
    match name {
        "system" => Some(SYSTEM),
        "health-check" => Some(HEALTH_CHECK),
        "deep-analysis" => Some(DEEP_ANALYSIS),
        "task-implementation" => Some(TASK_IMPLEMENTATION),
        _ => None,
    }
}

/// Template used for an analysis kind
pub fn analysis_template(kind: ReportType) -> &'static str {
    match kind {
        ReportType::DeepAnalysis => "deep-analysis",
        ReportType::HealthCheck | ReportType::Manual => "health-check",
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectSummary {
    pub id: String,
    pub name: String,
    pub repo: String,
}

impl From<&Project> for ProjectSummary {
    fn from(p: &Project) -> Self {
        Self {
            id: p.id.clone(),
            name: p.display_name().to_string(),
            repo: p.repo.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisPromptContext {
    pub projects: Vec<ProjectSummary>,
    pub date: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskPromptContext {
    pub id: String,
    pub title: String,
    pub description: String,
    pub task_type: String,
    pub priority: String,
    pub project: String,
    pub repo: Option<String>,
    pub context: Option<String>,
}

impl TaskPromptContext {
    pub fn new(task: &Task, project: Option<&Project>) -> Self {
        let context = match &task.context {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) if s.trim().is_empty() => None,
            serde_json::Value::String(s) => Some(s.clone()),
            other => serde_json::to_string_pretty(other).ok(),
        };
        Self {
            id: task.id.clone(),
            title: task.title.clone(),
            description: task.description.clone(),
            task_type: task.task_type.to_string(),
            priority: task.priority.to_string(),
            project: project
                .map(|p| p.display_name().to_string())
                .unwrap_or_else(|| task.project_id.clone()),
            repo: project.map(|p| p.repo.clone()),
            context,
        }
    }
}

/// Loads and renders prompt templates
pub struct PromptLoader {
    hbs: Handlebars<'static>,
    override_dir: Option<PathBuf>,
}

impl PromptLoader {
    /// Loader that checks `dir` before the embedded templates
    pub fn new(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        let exists = dir.is_dir();
        debug!(?dir, %exists, "PromptLoader::new: called");
        Self {
            hbs: Self::engine(),
            override_dir: exists.then(|| dir.to_path_buf()),
        }
    }

    pub fn embedded_only() -> Self {
        Self {
            hbs: Self::engine(),
            override_dir: None,
        }
    }

    fn engine() -> Handlebars<'static> {
        let mut hbs = Handlebars::new();
        // Prompts are plain text, not HTML
        hbs.register_escape_fn(handlebars::no_escape);
        hbs
    }

    fn load_template(&self, name: &str) -> Result<String, PromptError> {
        debug!(%name, "PromptLoader::load_template: called");
        if let Some(dir) = &self.override_dir {
            let path = dir.join(format!("{}.pmt", name));
            if path.exists() {
                debug!(?path, "PromptLoader::load_template: using override");
                return std::fs::read_to_string(&path).map_err(|source| PromptError::Read { path, source });
            }
        }

        get_embedded(name)
            .map(str::to_string)
            .ok_or_else(|| PromptError::NotFound(name.to_string()))
    }

    pub fn render<T: Serialize>(&self, name: &str, context: &T) -> Result<String, PromptError> {
        let template = self.load_template(name)?;
        self.hbs
            .render_template(&template, context)
            .map_err(|e| PromptError::Render {
                name: name.to_string(),
                message: e.to_string(),
            })
    }

    pub fn system_prompt(&self) -> Result<String, PromptError> {
        self.load_template("system")
    }

    pub fn analysis_prompt(&self, kind: ReportType, projects: &[&Project]) -> Result<String, PromptError> {
        debug!(%kind, project_count = projects.len(), "PromptLoader::analysis_prompt: called");
        let context = AnalysisPromptContext {
            projects: projects.iter().map(|p| ProjectSummary::from(*p)).collect(),
            date: Some(chrono::Utc::now().format("%Y-%m-%d").to_string()),
        };
        self.render(analysis_template(kind), &context)
    }

    pub fn task_prompt(&self, task: &Task, project: Option<&Project>) -> Result<String, PromptError> {
        self.render("task-implementation", &TaskPromptContext::new(task, project))
    }
}

impl Default for PromptLoader {
    fn default() -> Self {
        Self::embedded_only()
    }
}
