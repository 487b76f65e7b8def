use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

/// A message published on a named channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Publication {
    pub channel: String,
    pub payload: String,
}

/// Cloneable publishing handle
///
/// Subscribers receive every publication and filter by channel themselves.
#[derive(Debug, Clone)]
pub struct Publisher {
    tx: broadcast::Sender<Publication>,
}

impl Publisher {
    pub(crate) fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish a payload; returns the number of subscribers reached
    pub fn publish(&self, channel: &str, payload: impl Into<String>) -> usize {
        let publication = Publication {
            channel: channel.to_string(),
            payload: payload.into(),
        };
        match self.tx.send(publication) {
            Ok(n) => {
                debug!(%channel, receivers = n, "Publisher::publish: delivered");
                n
            }
            Err(_) => {
                debug!(%channel, "Publisher::publish: no subscribers");
                0
            }
        }
    }

    /// Subscribe to all channels
    pub fn subscribe(&self) -> broadcast::Receiver<Publication> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
