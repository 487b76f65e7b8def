//! Configuration
//!
//! YAML file (kebab-case keys) found through a fallback chain, then
//! overridden by the scheduling environment variables.

use std::fs;
use std::path::{Path, PathBuf};

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::domain::{DEFAULT_ACTION_TTL_HOURS, Project};

const LOCAL_CONFIG: &str = "pmagent.yml";
pub const APP_DIR: &str = "pmagent";

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,

    pub llm: LlmConfig,
    pub schedule: ScheduleConfig,
    pub agent: AgentConfig,
    pub approval: ApprovalConfig,
    pub executor: ExecutorConfig,
    pub github: GithubConfig,
    pub codegen: CodegenConfig,
    pub crawler: CrawlerConfig,
    pub storage: StorageConfig,
    pub projects: Vec<Project>,
}

impl Config {
    /// Load configuration with fallback chain, then apply environment
    /// overrides
    ///
    /// 1. Explicit path (if provided)
    /// 2. ./pmagent.yml
    /// 3. ~/.config/pmagent/pmagent.yml
    /// 4. Built-in defaults
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        let mut config = Self::load_file_chain(config_path)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn load_file_chain(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        let local_config = PathBuf::from(LOCAL_CONFIG);
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        if let Some(user_config) = Self::user_config_path()
            && user_config.exists()
        {
            match Self::load_from_file(&user_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_DIR).join(LOCAL_CONFIG))
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Read only the log level, before logging is initialised
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        let candidates = config_path
            .cloned()
            .into_iter()
            .chain(std::iter::once(PathBuf::from(LOCAL_CONFIG)))
            .chain(Self::user_config_path());
        for path in candidates {
            if let Ok(content) = fs::read_to_string(&path) {
                return serde_yaml::from_str::<Self>(&content).ok().and_then(|c| c.log_level);
            }
        }
        None
    }

    /// Apply the scheduling environment variables through `lookup`
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let s = &mut self.schedule;
        if let Some(v) = lookup("HEALTH_CHECK_INTERVAL") {
            s.health_check_interval = v;
        }
        if let Some(v) = lookup("DEEP_ANALYSIS_TIME") {
            s.deep_analysis_time = v;
        }
        if let Some(v) = lookup("TIMEZONE") {
            s.timezone = v;
        }
        if let Some(v) = lookup("TASK_EXECUTOR_ENABLED") {
            s.task_executor_enabled = parse_flag(&v);
        }
        if let Some(v) = lookup("TASK_EXECUTOR_INTERVAL") {
            s.task_executor_interval = v;
        }
        if let Some(v) = lookup("NEWS_CRAWL_ENABLED") {
            s.news_crawl_enabled = parse_flag(&v);
        }
        if let Some(v) = lookup("NEWS_CRAWL_TIME") {
            s.news_crawl_time = v;
        }
        if let Some(v) = lookup("UNIVERSAL_CRAWLER_ENABLED") {
            s.universal_crawler_enabled = parse_flag(&v);
        }
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "true" | "1" | "yes" | "on")
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider name (only "anthropic" is supported)
    pub provider: String,

    pub model: String,

    /// Environment variable containing the API key
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Maximum tokens per response
    #[serde(rename = "max-tokens")]
    pub max_tokens: u32,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl LlmConfig {
    pub fn get_api_key(&self) -> Result<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| eyre::eyre!("API key not set: export {}", self.api_key_env))
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "anthropic".to_string(),
            model: "claude-sonnet-4-20250514".to_string(),
            api_key_env: "ANTHROPIC_API_KEY".to_string(),
            base_url: "https://api.anthropic.com".to_string(),
            max_tokens: 16384,
            timeout_ms: 300_000,
        }
    }
}

/// Job cadences; interval strings look like `30m`, `4h`, `1d`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ScheduleConfig {
    pub health_check_interval: String,
    /// `HH:MM`, weekdays only
    pub deep_analysis_time: String,
    /// IANA zone name
    pub timezone: String,
    pub task_executor_enabled: bool,
    pub task_executor_interval: String,
    pub news_crawl_enabled: bool,
    pub news_crawl_time: String,
    pub universal_crawler_enabled: bool,
    pub approval_sweep_interval: String,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            health_check_interval: "4h".to_string(),
            deep_analysis_time: "09:00".to_string(),
            timezone: "UTC".to_string(),
            task_executor_enabled: false,
            task_executor_interval: "5m".to_string(),
            news_crawl_enabled: false,
            news_crawl_time: "08:00".to_string(),
            universal_crawler_enabled: false,
            approval_sweep_interval: "15m".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct AgentConfig {
    /// Upper bound on model calls per run; unbounded when unset
    pub max_turns: Option<u32>,
    pub health_check_timeout_secs: u64,
    pub deep_analysis_timeout_secs: u64,
    /// Stream text deltas to observers as they arrive
    pub stream: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_turns: None,
            health_check_timeout_secs: 180,
            deep_analysis_timeout_secs: 300,
            stream: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ApprovalConfig {
    pub ttl_hours: i64,
}

impl Default for ApprovalConfig {
    fn default() -> Self {
        Self {
            ttl_hours: DEFAULT_ACTION_TTL_HOURS,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ExecutorConfig {
    /// Push after a successful commit
    pub push: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct GithubConfig {
    pub program: String,
    pub timeout_secs: u64,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            program: "gh".to_string(),
            timeout_secs: 60,
        }
    }
}

/// External code-generation CLI; the prompt is appended as the last argument
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CodegenConfig {
    pub program: String,
    pub args: Vec<String>,
    pub timeout_secs: u64,
}

impl Default for CodegenConfig {
    fn default() -> Self {
        Self {
            program: "claude".to_string(),
            args: vec!["--print".to_string()],
            timeout_secs: 1800,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Shell command run by the news crawl job
    pub news_command: Option<String>,
    pub sources: Vec<CrawlSourceConfig>,
    pub timeout_secs: u64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            news_command: None,
            sources: Vec::new(),
            timeout_secs: 600,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CrawlSourceConfig {
    pub id: String,
    pub command: String,
    /// How often the source becomes due, e.g. `6h`
    #[serde(default = "default_source_interval")]
    pub interval: String,
}

fn default_source_interval() -> String {
    "24h".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct StorageConfig {
    /// Store directory; defaults to `<data_local_dir>/pmagent/store`
    pub dir: Option<PathBuf>,
}

impl StorageConfig {
    pub fn store_dir(&self) -> PathBuf {
        self.dir.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(APP_DIR)
                .join("store")
        })
    }
}
