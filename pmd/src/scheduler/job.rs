//! Scheduled job trait and outcome

use async_trait::async_trait;

/// Something the scheduler fires on a cadence
#[async_trait]
pub trait Job: Send + Sync {
    fn name(&self) -> &str;

    /// Failures are also sent to the notifier when true
    fn notify_on_failure(&self) -> bool {
        false
    }

    async fn run(&self) -> eyre::Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Succeeded,
    Failed(String),
    Panicked(String),
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Succeeded => None,
            Self::Failed(msg) | Self::Panicked(msg) => Some(msg),
        }
    }
}

impl std::fmt::Display for JobOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed(msg) => write!(f, "failed: {}", msg),
            Self::Panicked(msg) => write!(f, "panicked: {}", msg),
        }
    }
}
