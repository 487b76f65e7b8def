//! App - builds the long-lived components from configuration
//!
//! Everything except the model client is built up front, so commands that
//! only touch tasks and actions work without an API key.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use eyre::{Context, Result};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::agent::{AgentLoop, AgentLoopConfig, AnalysisTimeouts, Analyzer, PromptLoader};
use crate::approval::ActionExecutor;
use crate::approval::ApprovalQueue;
use crate::collab::{
    CliCodeGenerator, CodeGenerator, CommandCrawler, Crawler, CrawlerService, GhCli, GitCli, GitHub, LogNotifier,
    Notifier, Vcs,
};
use crate::config::{APP_DIR, Config};
use crate::domain::ProjectRegistry;
use crate::events::{EventBus, EventLogger};
use crate::executor::TaskExecutor;
use crate::llm::LlmClient;
use crate::scheduler::{JobComponents, Scheduler, build_scheduler};
use crate::state::{StateManager, WriteQueue, WriteQueueConfig};
use crate::tasks::TaskStore;
use crate::tools::{ToolDeps, ToolRegistry};

/// How long shutdown waits for queued cache writes
const CACHE_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// `<config_dir>/pmagent/prompts`; templates found here replace the
/// built-in ones
pub fn default_prompt_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join("prompts")
}

/// External programs the agent drives
pub struct Collaborators {
    pub github: Arc<dyn GitHub>,
    pub codegen: Arc<dyn CodeGenerator>,
    pub vcs: Arc<dyn Vcs>,
    pub crawler: Arc<dyn Crawler>,
    pub notifier: Arc<dyn Notifier>,
}

impl Collaborators {
    /// CLI-backed collaborators and the log notifier
    pub fn from_config(config: &Config) -> Self {
        debug!("Collaborators::from_config: called");
        Self {
            github: Arc::new(GhCli::from_config(&config.github)),
            codegen: Arc::new(CliCodeGenerator::from_config(&config.codegen)),
            vcs: Arc::new(GitCli::default()),
            crawler: Arc::new(CommandCrawler::from_config(&config.crawler)),
            notifier: Arc::new(LogNotifier),
        }
    }
}

pub struct App {
    config: Config,
    state: StateManager,
    bus: EventBus,
    projects: ProjectRegistry,
    tasks: TaskStore,
    approvals: ApprovalQueue,
    actions: ActionExecutor,
    tools: Arc<ToolRegistry>,
    prompts: Arc<PromptLoader>,
    executor: Arc<TaskExecutor>,
    crawler: Arc<CrawlerService>,
    notifier: Arc<dyn Notifier>,
    cache: WriteQueue,
    cache_worker: JoinHandle<()>,
}

impl App {
    /// Open the configured store and build with the real collaborators
    pub fn open(config: Config) -> Result<Self> {
        let store_dir = config.storage.store_dir();
        info!(?store_dir, "Opening store");
        let state = StateManager::spawn(&store_dir)
            .context(format!("Failed to open store at {}", store_dir.display()))?;
        let collaborators = Collaborators::from_config(&config);
        let app = Self::new(config, state, collaborators, PromptLoader::new(default_prompt_dir()));

        match EventLogger::with_default_path() {
            Ok(logger) => {
                debug!(path = ?logger.path(), "App::open: event log enabled");
                tokio::spawn(logger.run(app.bus.clone()));
            }
            Err(e) => warn!(error = %e, "Event log disabled"),
        }
        Ok(app)
    }

    /// Must be called inside a tokio runtime; the cache worker is spawned
    pub fn new(config: Config, state: StateManager, collaborators: Collaborators, prompts: PromptLoader) -> Self {
        debug!(projects = config.projects.len(), "App::new: called");
        let bus = EventBus::default();
        let (cache, cache_worker) = WriteQueue::spawn(Arc::new(state.clone()), WriteQueueConfig::default());

        let projects = ProjectRegistry::new(config.projects.clone());
        let tasks = TaskStore::new(state.clone(), bus.clone());
        let approvals = ApprovalQueue::new(
            state.clone(),
            bus.clone(),
            collaborators.notifier.clone(),
            chrono::Duration::hours(config.approval.ttl_hours),
        );
        let actions = ActionExecutor::new(collaborators.github.clone(), state.clone(), bus.clone());

        let tools = Arc::new(ToolRegistry::standard(
            ToolDeps {
                github: collaborators.github,
                codegen: collaborators.codegen.clone(),
                state: state.clone(),
                bus: bus.clone(),
                cache: Some(cache.clone()),
            },
            approvals.clone(),
        ));

        let prompts = Arc::new(prompts);
        let executor = Arc::new(
            TaskExecutor::new(
                tasks.clone(),
                projects.clone(),
                prompts.clone(),
                collaborators.codegen,
                collaborators.vcs,
            )
            .with_push(config.executor.push),
        );
        let crawler = Arc::new(CrawlerService::new(collaborators.crawler));

        Self {
            config,
            state,
            bus,
            projects,
            tasks,
            approvals,
            actions,
            tools,
            prompts,
            executor,
            crawler,
            notifier: collaborators.notifier,
            cache,
            cache_worker,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn state(&self) -> &StateManager {
        &self.state
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn projects(&self) -> &ProjectRegistry {
        &self.projects
    }

    pub fn tasks(&self) -> &TaskStore {
        &self.tasks
    }

    pub fn approvals(&self) -> &ApprovalQueue {
        &self.approvals
    }

    pub fn actions(&self) -> &ActionExecutor {
        &self.actions
    }

    pub fn executor(&self) -> &TaskExecutor {
        &self.executor
    }

    /// Analyzer driving `llm` with the standard tool set
    pub fn analyzer(&self, llm: Arc<dyn LlmClient>) -> Analyzer {
        debug!("App::analyzer: called");
        let agent = AgentLoop::new(
            llm,
            self.tools.clone(),
            AgentLoopConfig::from_config(&self.config.agent, &self.config.llm),
        );
        Analyzer::new(
            Arc::new(agent),
            self.prompts.clone(),
            self.projects.clone(),
            self.tasks.clone(),
            self.state.clone(),
            self.bus.clone(),
        )
        .with_cache(self.cache.clone())
        .with_timeouts(AnalysisTimeouts::from_config(&self.config.agent))
    }

    /// Scheduler with every configured job, not yet started
    pub fn scheduler(&self, llm: Arc<dyn LlmClient>) -> Result<Scheduler> {
        debug!("App::scheduler: called");
        let components = JobComponents {
            analyzer: Arc::new(self.analyzer(llm)),
            executor: self.executor.clone(),
            approvals: self.approvals.clone(),
            crawler: self.crawler.clone(),
        };
        build_scheduler(&self.config.schedule, components, self.notifier.clone())
            .context("Failed to build scheduler")
    }

    /// Drain queued cache writes, then stop the store
    ///
    /// Analyzers and schedulers built from this app should be dropped
    /// first; their cache handles otherwise keep the worker alive until the
    /// drain timeout.
    pub async fn shutdown(self) -> Result<()> {
        debug!("App::shutdown: called");
        let Self {
            state,
            tools,
            cache,
            cache_worker,
            ..
        } = self;
        drop(tools);
        drop(cache);
        if tokio::time::timeout(CACHE_DRAIN_TIMEOUT, cache_worker).await.is_err() {
            warn!("Cache writes still queued at shutdown");
        }
        state.shutdown().await.context("Failed to stop store")?;
        info!("Shutdown complete");
        Ok(())
    }
}
