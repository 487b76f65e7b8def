//! Scheduler implementation

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use chrono_tz::Tz;
use cron::Schedule;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::cron::{next_fire, parse_schedule};
use super::job::{Job, JobOutcome};
use crate::collab::Notifier;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("Invalid cron expression '{expression}' for job {job}: {message}")]
    InvalidCron {
        job: String,
        expression: String,
        message: String,
    },

    #[error("Job already registered: {0}")]
    DuplicateJob(String),
}

struct ScheduledJob {
    job: Arc<dyn Job>,
    expression: String,
    schedule: Schedule,
}

/// Fires registered jobs on their cron schedules, each firing isolated
/// from every other
pub struct Scheduler {
    jobs: Vec<ScheduledJob>,
    timezone: Tz,
    notifier: Arc<dyn Notifier>,
}

impl Scheduler {
    pub fn new(timezone: Tz, notifier: Arc<dyn Notifier>) -> Self {
        debug!(%timezone, "Scheduler::new: called");
        Self {
            jobs: Vec::new(),
            timezone,
            notifier,
        }
    }

    pub fn add(&mut self, job: Arc<dyn Job>, expression: &str) -> Result<(), SchedulerError> {
        debug!(job = %job.name(), %expression, "Scheduler::add: called");
        if self.jobs.iter().any(|j| j.job.name() == job.name()) {
            return Err(SchedulerError::DuplicateJob(job.name().to_string()));
        }
        let schedule = parse_schedule(expression).map_err(|e| SchedulerError::InvalidCron {
            job: job.name().to_string(),
            expression: expression.to_string(),
            message: e.to_string(),
        })?;
        self.jobs.push(ScheduledJob {
            job,
            expression: expression.to_string(),
            schedule,
        });
        Ok(())
    }

    /// (name, cron expression) of every registered job
    pub fn jobs(&self) -> Vec<(String, String)> {
        self.jobs
            .iter()
            .map(|j| (j.job.name().to_string(), j.expression.clone()))
            .collect()
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// Fire `name` immediately with the same isolation as a scheduled firing
    pub async fn run_now(&self, name: &str) -> Option<JobOutcome> {
        let job = self.jobs.iter().find(|j| j.job.name() == name)?.job.clone();
        Some(run_guarded(job, self.notifier.clone()).await)
    }

    /// Spawn one loop per job
    pub fn start(self) -> SchedulerHandle {
        info!(job_count = self.jobs.len(), timezone = %self.timezone, "Starting scheduler");
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut jobs = HashMap::new();
        let mut tasks = Vec::with_capacity(self.jobs.len());

        for scheduled in self.jobs {
            info!(job = %scheduled.job.name(), cron = %scheduled.expression, "Job scheduled");
            jobs.insert(scheduled.job.name().to_string(), scheduled.job.clone());
            tasks.push(tokio::spawn(job_loop(
                scheduled.job,
                scheduled.schedule,
                self.timezone,
                self.notifier.clone(),
                shutdown_rx.clone(),
            )));
        }

        SchedulerHandle {
            shutdown_tx,
            tasks,
            jobs,
            notifier: self.notifier,
        }
    }
}

/// Running scheduler
pub struct SchedulerHandle {
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
    jobs: HashMap<String, Arc<dyn Job>>,
    notifier: Arc<dyn Notifier>,
}

impl SchedulerHandle {
    pub async fn run_now(&self, name: &str) -> Option<JobOutcome> {
        let job = self.jobs.get(name)?.clone();
        Some(run_guarded(job, self.notifier.clone()).await)
    }

    /// Stop every job loop; firings already in flight run to completion
    pub async fn shutdown(self) {
        info!("Stopping scheduler");
        let _ = self.shutdown_tx.send(true);
        for task in self.tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "Job loop ended abnormally");
            }
        }
    }
}

async fn job_loop(
    job: Arc<dyn Job>,
    schedule: Schedule,
    timezone: Tz,
    notifier: Arc<dyn Notifier>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let now = Utc::now();
        let Some(next) = next_fire(&schedule, &timezone, now) else {
            warn!(job = %job.name(), "No upcoming firing, job loop ending");
            return;
        };
        let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
        debug!(job = %job.name(), %next, "job_loop: sleeping until next firing");

        tokio::select! {
            _ = tokio::time::sleep(wait) => {
                // Not awaited: a slow firing must not delay the next one
                let job = job.clone();
                let notifier = notifier.clone();
                tokio::spawn(async move {
                    run_guarded(job, notifier).await;
                });
            }
            _ = shutdown.changed() => {
                debug!(job = %job.name(), "job_loop: shutdown");
                return;
            }
        }
    }
}

/// Run one firing, turning errors and panics into an outcome
pub async fn run_guarded(job: Arc<dyn Job>, notifier: Arc<dyn Notifier>) -> JobOutcome {
    let name = job.name().to_string();
    info!(job = %name, "Job starting");
    let start = Instant::now();

    let runner = job.clone();
    let outcome = match tokio::spawn(async move { runner.run().await }).await {
        Ok(Ok(())) => JobOutcome::Succeeded,
        Ok(Err(e)) => JobOutcome::Failed(format!("{:#}", e)),
        Err(e) if e.is_panic() => JobOutcome::Panicked(panic_message(e.into_panic())),
        Err(e) => JobOutcome::Failed(e.to_string()),
    };

    let duration_ms = start.elapsed().as_millis() as u64;
    match &outcome {
        JobOutcome::Succeeded => info!(job = %name, duration_ms, "Job succeeded"),
        JobOutcome::Failed(msg) => error!(job = %name, duration_ms, error = %msg, "Job failed"),
        JobOutcome::Panicked(msg) => error!(job = %name, duration_ms, panic = %msg, "Job panicked"),
    }

    if let Some(msg) = outcome.message() {
        if job.notify_on_failure() {
            if let Err(e) = notifier.notify(&format!("{} failed", name), msg).await {
                warn!(job = %name, error = %e, "Failed to send job failure notification");
            }
        }
    }

    outcome
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
