//! Cron-driven job scheduling

pub mod cron;
mod core;
mod interval;
mod job;
mod jobs;

pub use core::{Scheduler, SchedulerError, SchedulerHandle, run_guarded};
pub use interval::{DEFAULT_INTERVAL_MS, TimeOfDay, parse_interval, parse_time};
pub use job::{Job, JobOutcome};
pub use jobs::{
    ApprovalExpiryJob, DeepAnalysisJob, HealthCheckJob, JobComponents, NewsCrawlJob, TaskExecutorJob,
    UniversalCrawlJob, build_scheduler,
};
