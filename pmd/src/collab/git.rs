//! Version control collaborator

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use super::{CollabError, run_command};

#[async_trait]
pub trait Vcs: Send + Sync {
    /// Stage everything and commit; `None` when the tree was clean
    async fn commit_all(&self, workdir: &Path, message: &str) -> Result<Option<String>, CollabError>;

    async fn push(&self, workdir: &Path) -> Result<(), CollabError>;
}

/// Plain `git` on the PATH
pub struct GitCli {
    timeout: Duration,
}

impl GitCli {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    async fn git(&self, workdir: &Path, args: &[&str]) -> Result<String, CollabError> {
        run_command("git", args, Some(workdir), self.timeout)
            .await?
            .into_stdout("git")
    }
}

impl Default for GitCli {
    fn default() -> Self {
        Self::new(Duration::from_secs(120))
    }
}

#[async_trait]
impl Vcs for GitCli {
    async fn commit_all(&self, workdir: &Path, message: &str) -> Result<Option<String>, CollabError> {
        debug!(?workdir, "GitCli::commit_all: called");
        let status = self.git(workdir, &["status", "--porcelain"]).await?;
        if status.trim().is_empty() {
            debug!("GitCli::commit_all: working tree clean");
            return Ok(None);
        }

        self.git(workdir, &["add", "-A"]).await?;
        self.git(workdir, &["commit", "-m", message]).await?;
        let sha = self.git(workdir, &["rev-parse", "HEAD"]).await?.trim().to_string();
        info!(%sha, "Committed changes");
        Ok(Some(sha))
    }

    async fn push(&self, workdir: &Path) -> Result<(), CollabError> {
        debug!(?workdir, "GitCli::push: called");
        self.git(workdir, &["push"]).await?;
        info!(?workdir, "Pushed to remote");
        Ok(())
    }
}
