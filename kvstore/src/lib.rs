//! kvstore - keyed persistence with pattern invalidation and pub/sub
//!
//! Values are JSON strings stored in a single SQLite table keyed by
//! `<collection>:<id>` (for records) or free-form keys (for caches).
//! Pattern operations use SQLite `GLOB` semantics (`*`, `?`, `[...]`).

mod error;
mod pubsub;
mod record;
mod store;

pub use error::{Result, StoreError};
pub use pubsub::{Publication, Publisher};
pub use record::{Record, record_key};
pub use store::Store;

/// Milliseconds since the Unix epoch
pub fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
