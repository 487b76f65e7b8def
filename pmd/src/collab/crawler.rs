//! Crawler collaborator and the per-source running guard

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::{CollabError, run_shell};
use crate::config::{CrawlSourceConfig, CrawlerConfig};
use crate::scheduler::parse_interval;

/// Reserved source id for the daily news crawl
pub const NEWS_SOURCE: &str = "news";

#[derive(Debug, Clone, PartialEq)]
pub struct CrawlSummary {
    pub source: String,
    pub output: String,
}

#[async_trait]
pub trait Crawler: Send + Sync {
    async fn crawl_news(&self) -> Result<CrawlSummary, CollabError>;

    /// Sources whose interval has elapsed since their last crawl
    async fn due_sources(&self, now: DateTime<Utc>) -> Result<Vec<String>, CollabError>;

    async fn crawl_source(&self, id: &str) -> Result<CrawlSummary, CollabError>;
}

/// Crawls by running configured shell commands
pub struct CommandCrawler {
    news_command: Option<String>,
    sources: Vec<CrawlSourceConfig>,
    timeout: Duration,
    last_run: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl CommandCrawler {
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self {
            news_command: config.news_command.clone(),
            sources: config.sources.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            last_run: Mutex::new(HashMap::new()),
        }
    }

    async fn run(&self, source: &str, command: &str) -> Result<CrawlSummary, CollabError> {
        let output = run_shell(command, None, self.timeout).await?.into_stdout("sh")?;
        Ok(CrawlSummary {
            source: source.to_string(),
            output: output.trim().to_string(),
        })
    }

    fn mark_run(&self, id: &str, at: DateTime<Utc>) {
        if let Ok(mut last_run) = self.last_run.lock() {
            last_run.insert(id.to_string(), at);
        }
    }
}

#[async_trait]
impl Crawler for CommandCrawler {
    async fn crawl_news(&self) -> Result<CrawlSummary, CollabError> {
        debug!("CommandCrawler::crawl_news: called");
        let command = self
            .news_command
            .as_deref()
            .ok_or_else(|| CollabError::NotConfigured("crawler.news-command".to_string()))?;
        self.run(NEWS_SOURCE, command).await
    }

    async fn due_sources(&self, now: DateTime<Utc>) -> Result<Vec<String>, CollabError> {
        debug!(%now, "CommandCrawler::due_sources: called");
        let last_run = self.last_run.lock().map(|m| m.clone()).unwrap_or_default();
        let due = self
            .sources
            .iter()
            .filter(|source| match last_run.get(&source.id) {
                None => true,
                Some(at) => (now - *at).num_milliseconds() >= parse_interval(&source.interval) as i64,
            })
            .map(|source| source.id.clone())
            .collect();
        Ok(due)
    }

    async fn crawl_source(&self, id: &str) -> Result<CrawlSummary, CollabError> {
        debug!(%id, "CommandCrawler::crawl_source: called");
        let source = self
            .sources
            .iter()
            .find(|s| s.id == id)
            .ok_or_else(|| CollabError::UnknownSource(id.to_string()))?;
        let summary = self.run(id, &source.command).await?;
        self.mark_run(id, Utc::now());
        Ok(summary)
    }
}

/// Refuses a second concurrent crawl of the same source
pub struct CrawlerService {
    crawler: Arc<dyn Crawler>,
    running: Arc<Mutex<HashSet<String>>>,
}

/// Clears the running flag when the crawl ends, however it ends
struct RunningGuard {
    running: Arc<Mutex<HashSet<String>>>,
    id: String,
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        if let Ok(mut running) = self.running.lock() {
            running.remove(&self.id);
        }
    }
}

impl CrawlerService {
    pub fn new(crawler: Arc<dyn Crawler>) -> Self {
        Self {
            crawler,
            running: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    fn acquire(&self, id: &str) -> Result<RunningGuard, CollabError> {
        let mut running = self
            .running
            .lock()
            .map_err(|_| CollabError::AlreadyRunning(id.to_string()))?;
        if !running.insert(id.to_string()) {
            warn!(%id, "Crawl already running, refusing");
            return Err(CollabError::AlreadyRunning(id.to_string()));
        }
        Ok(RunningGuard {
            running: self.running.clone(),
            id: id.to_string(),
        })
    }

    pub fn is_running(&self, id: &str) -> bool {
        self.running.lock().map(|r| r.contains(id)).unwrap_or(false)
    }

    pub async fn crawl_news(&self) -> Result<CrawlSummary, CollabError> {
        let _guard = self.acquire(NEWS_SOURCE)?;
        self.crawler.crawl_news().await
    }

    pub async fn crawl(&self, id: &str) -> Result<CrawlSummary, CollabError> {
        let _guard = self.acquire(id)?;
        self.crawler.crawl_source(id).await
    }

    /// Crawl every due source; one failing source does not stop the rest
    pub async fn run_due(&self, now: DateTime<Utc>) -> Result<Vec<(String, Result<CrawlSummary, CollabError>)>, CollabError> {
        let due = self.crawler.due_sources(now).await?;
        info!(count = due.len(), "Crawling due sources");
        let mut results = Vec::with_capacity(due.len());
        for id in due {
            let result = self.crawl(&id).await;
            if let Err(e) = &result {
                warn!(%id, error = %e, "Crawl failed");
            }
            results.push((id, result));
        }
        Ok(results)
    }
}
