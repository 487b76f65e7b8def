//! The scheduled jobs and their cadences

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use eyre::{Context, Result, bail};
use tracing::{debug, info, warn};

use super::core::{Scheduler, SchedulerError};
use super::cron::{HOURLY, daily_at, every_hours, every_minutes, parse_timezone, weekdays_at};
use super::interval::{parse_interval, parse_time};
use super::job::Job;
use crate::agent::Analyzer;
use crate::approval::ApprovalQueue;
use crate::collab::{CrawlerService, Notifier};
use crate::config::ScheduleConfig;
use crate::domain::ReportType;
use crate::executor::TaskExecutor;

pub struct HealthCheckJob {
    analyzer: Arc<Analyzer>,
}

impl HealthCheckJob {
    pub const NAME: &'static str = "health-check";

    pub fn new(analyzer: Arc<Analyzer>) -> Self {
        Self { analyzer }
    }
}

#[async_trait]
impl Job for HealthCheckJob {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn notify_on_failure(&self) -> bool {
        true
    }

    async fn run(&self) -> Result<()> {
        let report = self
            .analyzer
            .run(ReportType::HealthCheck)
            .await
            .context("Health check failed")?;
        debug!(report_id = %report.id, "HealthCheckJob::run: done");
        Ok(())
    }
}

pub struct DeepAnalysisJob {
    analyzer: Arc<Analyzer>,
}

impl DeepAnalysisJob {
    pub const NAME: &'static str = "deep-analysis";

    pub fn new(analyzer: Arc<Analyzer>) -> Self {
        Self { analyzer }
    }
}

#[async_trait]
impl Job for DeepAnalysisJob {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn notify_on_failure(&self) -> bool {
        true
    }

    async fn run(&self) -> Result<()> {
        let report = self
            .analyzer
            .run(ReportType::DeepAnalysis)
            .await
            .context("Deep analysis failed")?;
        debug!(report_id = %report.id, "DeepAnalysisJob::run: done");
        Ok(())
    }
}

pub struct NewsCrawlJob {
    crawler: Arc<CrawlerService>,
}

impl NewsCrawlJob {
    pub const NAME: &'static str = "news-crawl";

    pub fn new(crawler: Arc<CrawlerService>) -> Self {
        Self { crawler }
    }
}

#[async_trait]
impl Job for NewsCrawlJob {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn run(&self) -> Result<()> {
        let summary = self.crawler.crawl_news().await.context("News crawl failed")?;
        info!(source = %summary.source, output_len = summary.output.len(), "News crawl finished");
        Ok(())
    }
}

/// Crawls every source that is due
pub struct UniversalCrawlJob {
    crawler: Arc<CrawlerService>,
}

impl UniversalCrawlJob {
    pub const NAME: &'static str = "universal-crawler";

    pub fn new(crawler: Arc<CrawlerService>) -> Self {
        Self { crawler }
    }
}

#[async_trait]
impl Job for UniversalCrawlJob {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn run(&self) -> Result<()> {
        let results = self
            .crawler
            .run_due(Utc::now())
            .await
            .context("Listing due crawl sources failed")?;
        let failed: Vec<&str> = results
            .iter()
            .filter(|(_, r)| r.is_err())
            .map(|(id, _)| id.as_str())
            .collect();
        if !failed.is_empty() {
            bail!("{} of {} crawls failed: {}", failed.len(), results.len(), failed.join(", "));
        }
        Ok(())
    }
}

pub struct TaskExecutorJob {
    executor: Arc<TaskExecutor>,
}

impl TaskExecutorJob {
    pub const NAME: &'static str = "task-executor";

    pub fn new(executor: Arc<TaskExecutor>) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl Job for TaskExecutorJob {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn run(&self) -> Result<()> {
        let executed = self
            .executor
            .execute_next_task()
            .await
            .context("Task execution failed")?;
        debug!(%executed, "TaskExecutorJob::run: done");
        Ok(())
    }
}

/// Moves overdue pending actions to expired
pub struct ApprovalExpiryJob {
    approvals: ApprovalQueue,
}

impl ApprovalExpiryJob {
    pub const NAME: &'static str = "approval-expiry";

    pub fn new(approvals: ApprovalQueue) -> Self {
        Self { approvals }
    }
}

#[async_trait]
impl Job for ApprovalExpiryJob {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn run(&self) -> Result<()> {
        let expired = self
            .approvals
            .expire_old(Utc::now())
            .await
            .context("Approval expiry sweep failed")?;
        if expired > 0 {
            info!(%expired, "Expired pending actions");
        }
        Ok(())
    }
}

/// What the standard jobs run against
pub struct JobComponents {
    pub analyzer: Arc<Analyzer>,
    pub executor: Arc<TaskExecutor>,
    pub approvals: ApprovalQueue,
    pub crawler: Arc<CrawlerService>,
}

/// Register the standard jobs on their configured cadences
pub fn build_scheduler(
    config: &ScheduleConfig,
    components: JobComponents,
    notifier: Arc<dyn Notifier>,
) -> Result<Scheduler, SchedulerError> {
    debug!(?config, "build_scheduler: called");
    let mut scheduler = Scheduler::new(parse_timezone(&config.timezone), notifier);

    scheduler.add(
        Arc::new(HealthCheckJob::new(components.analyzer.clone())),
        &every_hours(parse_interval(&config.health_check_interval)),
    )?;
    scheduler.add(
        Arc::new(DeepAnalysisJob::new(components.analyzer)),
        &weekdays_at(parse_time(&config.deep_analysis_time)),
    )?;

    if config.news_crawl_enabled {
        scheduler.add(
            Arc::new(NewsCrawlJob::new(components.crawler.clone())),
            &daily_at(parse_time(&config.news_crawl_time)),
        )?;
    } else {
        debug!("build_scheduler: news crawl disabled");
    }

    if config.universal_crawler_enabled {
        scheduler.add(Arc::new(UniversalCrawlJob::new(components.crawler)), HOURLY)?;
    } else {
        debug!("build_scheduler: universal crawler disabled");
    }

    if config.task_executor_enabled {
        scheduler.add(
            Arc::new(TaskExecutorJob::new(components.executor)),
            &every_minutes(parse_interval(&config.task_executor_interval)),
        )?;
    } else {
        debug!("build_scheduler: task executor disabled");
    }

    scheduler.add(
        Arc::new(ApprovalExpiryJob::new(components.approvals)),
        &every_minutes(parse_interval(&config.approval_sweep_interval)),
    )?;

    if scheduler.jobs().is_empty() {
        warn!("No jobs scheduled");
    }
    Ok(scheduler)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{AgentLoop, AgentLoopConfig, PromptLoader};
    use crate::collab::fakes::{FakeCodegen, FakeCrawler, FakeGitHub, FakeVcs, RecordingNotifier};
    use crate::domain::{ActionStatus, ActionType, ProjectRegistry, ProposedAction};
    use crate::events::EventBus;
    use crate::llm::client::mock::MockLlmClient;
    use crate::scheduler::JobOutcome;
    use crate::state::StateManager;
    use crate::tasks::TaskStore;
    use crate::tools::{ToolDeps, ToolRegistry};
    use serde_json::json;

    struct Fixture {
        components: JobComponents,
        approvals: ApprovalQueue,
        notifier: Arc<RecordingNotifier>,
        crawler: Arc<FakeCrawler>,
    }

    fn fixture(ttl: chrono::Duration, due: Vec<String>) -> Fixture {
        let state = StateManager::spawn_in_memory().unwrap();
        let bus = EventBus::default();
        let notifier = Arc::new(RecordingNotifier::default());
        let approvals = ApprovalQueue::new(state.clone(), bus.clone(), notifier.clone(), ttl);
        let tasks = TaskStore::new(state.clone(), bus.clone());
        let prompts = Arc::new(PromptLoader::embedded_only());
        let deps = ToolDeps {
            github: Arc::new(FakeGitHub::default()),
            codegen: Arc::new(FakeCodegen::default()),
            state: state.clone(),
            bus: bus.clone(),
            cache: None,
        };
        let tools = Arc::new(ToolRegistry::standard(deps, approvals.clone()));
        // No scripted responses: every analysis fails
        let agent = Arc::new(AgentLoop::new(
            Arc::new(MockLlmClient::new(vec![])),
            tools,
            AgentLoopConfig::default(),
        ));
        let analyzer = Arc::new(Analyzer::new(
            agent,
            prompts.clone(),
            ProjectRegistry::default(),
            tasks.clone(),
            state,
            bus,
        ));
        let executor = Arc::new(TaskExecutor::new(
            tasks,
            ProjectRegistry::default(),
            prompts,
            Arc::new(FakeCodegen::default()),
            Arc::new(FakeVcs::default()),
        ));
        let crawler = Arc::new(FakeCrawler {
            due,
            ..Default::default()
        });
        Fixture {
            components: JobComponents {
                analyzer,
                executor,
                approvals: approvals.clone(),
                crawler: Arc::new(CrawlerService::new(crawler.clone())),
            },
            approvals,
            notifier,
            crawler,
        }
    }

    #[tokio::test]
    async fn test_default_cadences() {
        let f = fixture(chrono::Duration::hours(24), vec![]);
        let scheduler = build_scheduler(&ScheduleConfig::default(), f.components, f.notifier).unwrap();
        assert_eq!(
            scheduler.jobs(),
            vec![
                ("health-check".to_string(), "0 0 */4 * * *".to_string()),
                ("deep-analysis".to_string(), "0 0 9 * * Mon-Fri".to_string()),
                ("approval-expiry".to_string(), "0 */15 * * * *".to_string()),
            ]
        );
        assert_eq!(scheduler.timezone(), chrono_tz::Tz::UTC);
    }

    #[tokio::test]
    async fn test_feature_flags_add_jobs() {
        let f = fixture(chrono::Duration::hours(24), vec![]);
        let config = ScheduleConfig {
            health_check_interval: "garbage".to_string(),
            deep_analysis_time: "07:30".to_string(),
            timezone: "Europe/Berlin".to_string(),
            task_executor_enabled: true,
            news_crawl_enabled: true,
            universal_crawler_enabled: true,
            ..Default::default()
        };
        let scheduler = build_scheduler(&config, f.components, f.notifier).unwrap();
        let jobs = scheduler.jobs();
        assert_eq!(jobs.len(), 6);
        assert!(jobs.contains(&("health-check".to_string(), "0 0 */4 * * *".to_string())));
        assert!(jobs.contains(&("deep-analysis".to_string(), "0 30 7 * * Mon-Fri".to_string())));
        assert!(jobs.contains(&("news-crawl".to_string(), "0 0 8 * * *".to_string())));
        assert!(jobs.contains(&("universal-crawler".to_string(), HOURLY.to_string())));
        assert!(jobs.contains(&("task-executor".to_string(), "0 */5 * * * *".to_string())));
        assert_eq!(scheduler.timezone(), chrono_tz::Europe::Berlin);
    }

    #[tokio::test]
    async fn test_analysis_failure_is_isolated_and_notified() {
        let f = fixture(chrono::Duration::hours(24), vec![]);
        let notifier = f.notifier.clone();
        let scheduler = build_scheduler(&ScheduleConfig::default(), f.components, f.notifier).unwrap();

        let outcome = scheduler.run_now(DeepAnalysisJob::NAME).await.unwrap();
        assert!(matches!(outcome, JobOutcome::Failed(ref msg) if msg.contains("Deep analysis failed")));
        let notes = notifier.notifications();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].0, "deep-analysis failed");

        // Other jobs still run
        let outcome = scheduler.run_now(ApprovalExpiryJob::NAME).await.unwrap();
        assert_eq!(outcome, JobOutcome::Succeeded);
    }

    #[tokio::test]
    async fn test_expiry_job_sweeps() {
        let f = fixture(chrono::Duration::seconds(1), vec![]);
        let action = f
            .approvals
            .enqueue(
                ProposedAction::new(ActionType::CreateIssue, "issue", json!({"repo": "a/b", "title": "t"})),
                None,
            )
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(1100)).await;

        let job = ApprovalExpiryJob::new(f.approvals.clone());
        job.run().await.unwrap();
        assert_eq!(f.approvals.get(&action.id).await.unwrap().status, ActionStatus::Expired);
    }

    #[tokio::test]
    async fn test_universal_crawl_runs_due_sources() {
        let f = fixture(chrono::Duration::hours(24), vec!["blog".to_string(), "forum".to_string()]);
        let job = UniversalCrawlJob::new(f.components.crawler.clone());
        job.run().await.unwrap();
        assert_eq!(*f.crawler.crawled.lock().unwrap(), vec!["blog", "forum"]);

        let news = NewsCrawlJob::new(f.components.crawler.clone());
        news.run().await.unwrap();
        assert_eq!(f.crawler.crawled.lock().unwrap().last().map(String::as_str), Some("news"));
    }
}
