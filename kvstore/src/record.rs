use serde::Serialize;
use serde::de::DeserializeOwned;

/// A typed value persisted under `<collection>:<id>`
pub trait Record: Serialize + DeserializeOwned + Send + 'static {
    /// Unique id within the collection
    fn id(&self) -> &str;

    /// Collection name used as the key prefix
    fn collection_name() -> &'static str;
}

/// Build the storage key for a record id
pub fn record_key(collection: &str, id: &str) -> String {
    format!("{}:{}", collection, id)
}
