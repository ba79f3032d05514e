//! In-memory entity store
//!
//! Default backend when no database is configured, and the test double for the
//! workflow coordinators.

use crate::error::AppError;
use crate::store::{EntityStore, Namespace};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Thread-safe in-memory store. Ids are kept ordered within a namespace.
#[derive(Clone, Default)]
pub struct MemoryEntityStore {
    namespaces: Arc<RwLock<HashMap<Namespace, BTreeMap<String, Value>>>>,
}

impl MemoryEntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records held in a namespace
    pub async fn count(&self, namespace: &Namespace) -> usize {
        let namespaces = self.namespaces.read().await;
        namespaces.get(namespace).map(|m| m.len()).unwrap_or(0)
    }
}

#[async_trait]
impl EntityStore for MemoryEntityStore {
    async fn get(&self, namespace: &Namespace, id: &str) -> Result<Option<Value>, AppError> {
        let namespaces = self.namespaces.read().await;
        Ok(namespaces.get(namespace).and_then(|m| m.get(id)).cloned())
    }

    async fn set(&self, namespace: &Namespace, id: &str, value: Value) -> Result<(), AppError> {
        let mut namespaces = self.namespaces.write().await;
        namespaces
            .entry(namespace.clone())
            .or_default()
            .insert(id.to_string(), value);
        Ok(())
    }

    async fn delete(&self, namespace: &Namespace, id: &str) -> Result<(), AppError> {
        let mut namespaces = self.namespaces.write().await;
        if let Some(records) = namespaces.get_mut(namespace) {
            records.remove(id);
        }
        Ok(())
    }

    async fn list(&self, namespace: &Namespace) -> Result<Vec<Value>, AppError> {
        let namespaces = self.namespaces.read().await;
        Ok(namespaces
            .get(namespace)
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_set_get_delete() {
        let store = MemoryEntityStore::new();
        let ns = Namespace::entities("TELEMETRY_PROFILE");

        store.set(&ns, "p1", json!({"id": "p1"})).await.unwrap();
        assert_eq!(store.get(&ns, "p1").await.unwrap(), Some(json!({"id": "p1"})));
        assert_eq!(store.get(&Namespace::PendingChanges, "p1").await.unwrap(), None);

        store.delete(&ns, "p1").await.unwrap();
        assert_eq!(store.get(&ns, "p1").await.unwrap(), None);
        // absent key
        store.delete(&ns, "p1").await.unwrap();
    }

    #[tokio::test]
    async fn test_list_filtered() {
        let store = MemoryEntityStore::new();
        let ns = Namespace::PendingChanges;
        store.set(&ns, "b", json!({"n": 2})).await.unwrap();
        store.set(&ns, "a", json!({"n": 1})).await.unwrap();

        let all = store.list(&ns).await.unwrap();
        assert_eq!(all, vec![json!({"n": 1}), json!({"n": 2})]);

        let filtered = store
            .list_filtered(&ns, &|v| v["n"] == json!(2))
            .await
            .unwrap();
        assert_eq!(filtered, vec![json!({"n": 2})]);
        assert_eq!(store.count(&ns).await, 2);
    }
}
