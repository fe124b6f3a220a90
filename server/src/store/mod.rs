use dashmap::DashMap;
use thiserror::Error;
use tracing::{debug, instrument};

mod redis_store;

pub use redis_store::RedisStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store backend unavailable: {0}")]
    Backend(String),
    #[error("unable to encode value: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("unable to decode value stored under {key}: {reason}")]
    Decode { key: String, reason: String },
}

/// Key-value persistence used by the game service.
///
/// Values are opaque bytes; encoding games and users is the caller's job.
pub trait Store: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;
    fn put(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError>;
    fn exists(&self, key: &str) -> Result<bool, StoreError>;
    /// Returns whether a value was present.
    fn delete(&self, key: &str) -> Result<bool, StoreError>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Store for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    #[instrument(level = "trace", skip(self, value), fields(bytes = value.len()))]
    fn put(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value);
        debug!("Stored {}", key);
        Ok(())
    }

    fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.entries.contains_key(key))
    }

    #[instrument(level = "trace", skip(self))]
    fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let removed = self.entries.remove(key).is_some();
        if removed {
            debug!("Deleted {}", key);
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_get_delete() {
        let store = MemoryStore::new();
        assert!(store.is_empty());
        assert_eq!(store.get("game:a").unwrap(), None);
        assert!(!store.exists("game:a").unwrap());

        store.put("game:a", b"one".to_vec()).unwrap();
        store.put("game:a", b"two".to_vec()).unwrap();
        assert_eq!(store.len(), 1);
        assert!(store.exists("game:a").unwrap());
        assert_eq!(store.get("game:a").unwrap().as_deref(), Some(&b"two"[..]));

        assert!(store.delete("game:a").unwrap());
        assert!(!store.delete("game:a").unwrap());
        assert!(!store.exists("game:a").unwrap());
    }
}
