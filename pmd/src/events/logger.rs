//! Event Logger - persists events to a JSONL file

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tokio::sync::broadcast;
use tracing::{debug, error, warn};

use super::bus::EventBus;
use super::types::PmEvent;

/// Appends every event as one JSON line
pub struct EventLogger {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
}

impl EventLogger {
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        debug!(?path, "EventLogger::new: creating logger");
        Self { path, writer: None }
    }

    /// Logger writing to `<data_local_dir>/pmagent/events.jsonl`
    pub fn with_default_path() -> eyre::Result<Self> {
        let dir = dirs::data_local_dir()
            .ok_or_else(|| eyre::eyre!("Could not determine local data directory"))?
            .join(crate::config::APP_DIR);
        fs::create_dir_all(&dir)?;
        Ok(Self::new(dir.join("events.jsonl")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write_event(&mut self, event: &PmEvent) -> eyre::Result<()> {
        debug!(event_type = event.event_type(), "EventLogger::write_event");
        let writer = match self.writer.take() {
            Some(w) => w,
            None => {
                if let Some(parent) = self.path.parent() {
                    fs::create_dir_all(parent)?;
                }
                let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
                BufWriter::new(file)
            }
        };
        let writer = self.writer.insert(writer);

        let json = serde_json::to_string(event)?;
        writeln!(writer, "{}", json)?;
        writer.flush()?;
        Ok(())
    }

    /// Consume events from the bus until it closes
    pub async fn run(mut self, bus: EventBus) {
        debug!("EventLogger::run: starting event logger");
        let mut rx = bus.subscribe();
        drop(bus);

        loop {
            match rx.recv().await {
                Ok(event) => {
                    if let Err(e) = self.write_event(&event) {
                        error!(error = %e, "EventLogger: failed to write event");
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(missed = n, "EventLogger: lagged behind, missed events");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("EventLogger: channel closed, shutting down");
                    break;
                }
            }
        }
    }
}
