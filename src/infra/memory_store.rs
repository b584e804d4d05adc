use crate::app::ports::{ObjectStorePort, StoredObject};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

/// In-memory object store for dry runs and tests
#[derive(Clone, Default)]
pub struct InMemoryObjectStore {
    objects: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    writes: Arc<AtomicUsize>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of `store` calls so far, overwrites included.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStorePort for InMemoryObjectStore {
    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self
            .objects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key))
    }

    async fn store(&self, object: &StoredObject) -> Result<()> {
        let mut objects = self.objects.lock().unwrap_or_else(PoisonError::into_inner);
        objects.insert(object.key.clone(), object.payload.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        crate::metrics::store::write(self.backend_name(), object.size());
        debug!("Stored object: {} ({} bytes)", object.key, object.size());
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_absent_present_overwrite() {
        let store = InMemoryObjectStore::new();
        assert!(!store.exists("matches/BR1_1").await.unwrap());

        store.store(&StoredObject::new("matches/BR1_1", b"v1".to_vec())).await.unwrap();
        assert!(store.exists("matches/BR1_1").await.unwrap());

        store.store(&StoredObject::new("matches/BR1_1", b"v2".to_vec())).await.unwrap();
        assert_eq!(store.get("matches/BR1_1").unwrap(), b"v2");
        assert_eq!(store.len(), 1);
        assert_eq!(store.write_count(), 2);
    }
}
