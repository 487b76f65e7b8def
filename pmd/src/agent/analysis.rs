//! Analyzer - one full analysis run
//!
//! Prompt, agent loop under a timeout, extraction, task creation, report.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use super::{AgentLoop, AnalysisError, ParsedReport, PromptLoader, ReportExtractor};
use crate::config::AgentConfig;
use crate::domain::{AnalysisReport, GeneratedBy, Project, ProjectRegistry, ReportType, Task};
use crate::events::EventBus;
use crate::state::{StateManager, WriteQueue};
use crate::tasks::TaskStore;
use crate::tools::ToolContext;

const SUMMARY_FALLBACK_CHARS: usize = 500;

#[derive(Debug, Clone, Copy)]
pub struct AnalysisTimeouts {
    pub health_check: Duration,
    pub deep_analysis: Duration,
}

impl AnalysisTimeouts {
    pub fn from_config(config: &AgentConfig) -> Self {
        Self {
            health_check: Duration::from_secs(config.health_check_timeout_secs),
            deep_analysis: Duration::from_secs(config.deep_analysis_timeout_secs),
        }
    }

    pub fn for_kind(&self, kind: ReportType) -> Duration {
        match kind {
            ReportType::DeepAnalysis => self.deep_analysis,
            ReportType::HealthCheck | ReportType::Manual => self.health_check,
        }
    }
}

impl Default for AnalysisTimeouts {
    fn default() -> Self {
        Self::from_config(&AgentConfig::default())
    }
}

/// Cache key of the latest report of a kind
pub fn last_report_key(kind: ReportType) -> String {
    format!("cache:last_report:{}", kind)
}

fn generated_by(kind: ReportType) -> GeneratedBy {
    match kind {
        ReportType::HealthCheck => GeneratedBy::HealthCheck,
        ReportType::DeepAnalysis => GeneratedBy::DeepAnalysis,
        ReportType::Manual => GeneratedBy::Manual,
    }
}

/// Prose before the JSON block, or the opening of the text
fn fallback_summary(text: &str) -> String {
    let prose = text.split("```").next().unwrap_or_default().trim();
    let source = if prose.is_empty() { text.trim() } else { prose };
    if source.is_empty() {
        return "No summary provided".to_string();
    }
    source.chars().take(SUMMARY_FALLBACK_CHARS).collect()
}

pub struct Analyzer {
    agent: Arc<AgentLoop>,
    prompts: Arc<PromptLoader>,
    extractor: ReportExtractor,
    projects: ProjectRegistry,
    tasks: TaskStore,
    state: StateManager,
    bus: EventBus,
    cache: Option<WriteQueue>,
    timeouts: AnalysisTimeouts,
}

impl Analyzer {
    pub fn new(
        agent: Arc<AgentLoop>,
        prompts: Arc<PromptLoader>,
        projects: ProjectRegistry,
        tasks: TaskStore,
        state: StateManager,
        bus: EventBus,
    ) -> Self {
        Self {
            agent,
            prompts,
            extractor: ReportExtractor::new(projects.clone()),
            projects,
            tasks,
            state,
            bus,
            cache: None,
            timeouts: AnalysisTimeouts::default(),
        }
    }

    pub fn with_cache(mut self, cache: WriteQueue) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_timeouts(mut self, timeouts: AnalysisTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub async fn run(&self, kind: ReportType) -> Result<AnalysisReport, AnalysisError> {
        debug!(%kind, "Analyzer::run: called");
        let projects: Vec<&Project> = self.projects.enabled().collect();
        let project_ids = projects.iter().map(|p| p.id.clone()).collect();

        let mut report = AnalysisReport::start(kind, project_ids);
        self.state.put_report(report.clone()).await?;
        self.bus.analysis_started(&report);
        info!(report_id = %report.id, %kind, projects = projects.len(), "Analysis started");

        let system_prompt = self.prompts.system_prompt()?;
        let prompt = self.prompts.analysis_prompt(kind, &projects)?;
        let ctx = ToolContext::new(report.id.clone()).with_emitter(self.bus.emitter_for(report.id.clone()));

        let timeout = self.timeouts.for_kind(kind);
        let run = match tokio::time::timeout(timeout, self.agent.run(&system_prompt, &prompt, &ctx)).await {
            Ok(result) => result?,
            Err(_) => {
                error!(report_id = %report.id, %kind, ?timeout, "Analysis timed out");
                return Err(AnalysisError::Timeout {
                    kind: kind.to_string(),
                    timeout,
                });
            }
        };

        let parsed = match self.extractor.extract(&run.text) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(report_id = %report.id, error = %e, "Could not extract a report from model output");
                ctx.log("warn", &format!("Report extraction failed: {}", e));
                ParsedReport::default()
            }
        };

        let mut task_ids = Vec::with_capacity(parsed.tasks.len());
        for candidate in parsed.tasks {
            let task = Task::new(
                candidate.project_id,
                candidate.title,
                candidate.description,
                generated_by(kind),
            )
            .with_priority(candidate.priority)
            .with_type(candidate.task_type)
            .with_context(candidate.context);
            let task = self.tasks.create(task).await?;
            task_ids.push(task.id);
        }

        let summary = parsed.summary.unwrap_or_else(|| fallback_summary(&run.text));
        report.complete(summary, parsed.findings, task_ids, parsed.project_reports);
        self.state.put_report(report.clone()).await?;
        self.bus.analysis_completed(&report);

        if let Some(cache) = &self.cache {
            match serde_json::to_string(&report) {
                Ok(json) => {
                    cache.set(last_report_key(kind), json);
                }
                Err(e) => warn!(report_id = %report.id, error = %e, "Failed to serialize report for cache"),
            }
        }

        info!(
            report_id = %report.id,
            %kind,
            findings = report.findings.len(),
            tasks = report.generated_tasks.len(),
            pending_actions = run.pending_actions.len(),
            "Analysis completed"
        );
        Ok(report)
    }
}
