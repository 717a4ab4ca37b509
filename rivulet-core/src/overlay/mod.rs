//! Overlay metadata store: document CRUD behind an injectable seam.
//!
//! Overlays are arbitrary JSON documents (text, logos, positions) the
//! frontend layers on top of a stream. The store carries no core logic;
//! it exists so the web layer has something to dispatch into and tests
//! have something cheap to run against.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

/// Keyed document store for overlay records.
#[async_trait]
pub trait OverlayStore: Send + Sync {
    /// Stores a document, returning its generated identifier.
    async fn create(&self, document: Value) -> String;

    /// All documents, each with its identifier injected as `_id`.
    async fn list(&self) -> Vec<Value>;

    /// One document by identifier, with `_id` injected.
    async fn fetch(&self, id: &str) -> Option<Value>;

    /// Shallow-merges `changes` into an existing document.
    async fn update(&self, id: &str, changes: Value) -> bool;

    /// Removes a document; `false` when it did not exist.
    async fn delete(&self, id: &str) -> bool;
}

/// In-memory document store.
#[derive(Default)]
pub struct MemoryOverlayStore {
    documents: RwLock<HashMap<String, Value>>,
}

impl MemoryOverlayStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn with_id(id: &str, document: &Value) -> Value {
    let mut tagged = document.clone();
    if let Value::Object(map) = &mut tagged {
        map.insert("_id".to_string(), Value::String(id.to_string()));
    }
    tagged
}

#[async_trait]
impl OverlayStore for MemoryOverlayStore {
    async fn create(&self, document: Value) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        self.documents.write().await.insert(id.clone(), document);
        id
    }

    async fn list(&self) -> Vec<Value> {
        let documents = self.documents.read().await;
        let mut all: Vec<Value> = documents
            .iter()
            .map(|(id, document)| with_id(id, document))
            .collect();
        all.sort_by_key(|document| {
            document
                .get("_id")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        });
        all
    }

    async fn fetch(&self, id: &str) -> Option<Value> {
        self.documents
            .read()
            .await
            .get(id)
            .map(|document| with_id(id, document))
    }

    async fn update(&self, id: &str, changes: Value) -> bool {
        let mut documents = self.documents.write().await;
        let Some(existing) = documents.get_mut(id) else {
            return false;
        };

        match (existing, changes) {
            (Value::Object(current), Value::Object(changes)) => {
                for (key, value) in changes {
                    current.insert(key, value);
                }
            }
            (existing, changes) => *existing = changes,
        }
        true
    }

    async fn delete(&self, id: &str) -> bool {
        self.documents.write().await.remove(id).is_some()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn test_crud_roundtrip() {
        let store = MemoryOverlayStore::new();

        let id = store
            .create(json!({"type": "text", "content": "LIVE", "x": 10, "y": 20}))
            .await;

        let fetched = store.fetch(&id).await.unwrap();
        assert_eq!(fetched["content"], "LIVE");
        assert_eq!(fetched["_id"], Value::String(id.clone()));

        assert!(store.update(&id, json!({"content": "OFFLINE"})).await);
        let updated = store.fetch(&id).await.unwrap();
        assert_eq!(updated["content"], "OFFLINE");
        // Untouched fields survive a partial update
        assert_eq!(updated["x"], 10);

        assert_eq!(store.list().await.len(), 1);

        assert!(store.delete(&id).await);
        assert!(!store.delete(&id).await);
        assert!(store.fetch(&id).await.is_none());
    }

    #[tokio::test]
    async fn test_update_missing_document() {
        let store = MemoryOverlayStore::new();
        assert!(!store.update("missing", json!({"a": 1})).await);
    }
}
