//! Human notification channel

use async_trait::async_trait;
use tracing::info;

use super::CollabError;
use crate::domain::PendingAction;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, title: &str, message: &str) -> Result<(), CollabError>;

    /// Ask a human to approve or reject `action`
    async fn request_approval(&self, action: &PendingAction) -> Result<(), CollabError>;
}

/// Writes notifications to the log; decisions come in through the CLI
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, title: &str, message: &str) -> Result<(), CollabError> {
        info!(%title, %message, "Notification");
        Ok(())
    }

    async fn request_approval(&self, action: &PendingAction) -> Result<(), CollabError> {
        info!(
            id = %action.id,
            action_type = %action.action.action_type,
            expires_at = %action.expires_at,
            "Approval requested: {}",
            action.action.description
        );
        Ok(())
    }
}
