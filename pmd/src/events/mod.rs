//! Broadcast events for observers

mod bus;
mod logger;
mod types;

pub use bus::{DEFAULT_CHANNEL_CAPACITY, EventBus, EventEmitter};
pub use logger::EventLogger;
pub use types::{EventKind, PmEvent};
