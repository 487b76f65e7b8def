//! Collaborator errors

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CollabError {
    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} timed out after {timeout:?}")]
    Timeout { program: String, timeout: Duration },

    #[error("{program} exited with {exit_code}: {stderr}")]
    Failed {
        program: String,
        exit_code: i32,
        stderr: String,
    },

    #[error("Invalid output from {program}: {message}")]
    InvalidOutput { program: String, message: String },

    #[error("Crawl already running for source: {0}")]
    AlreadyRunning(String),

    #[error("Unknown crawl source: {0}")]
    UnknownSource(String),

    #[error("Not configured: {0}")]
    NotConfigured(String),
}
