use std::collections::HashMap;

use async_trait::async_trait;
use futures::stream::{
    self,
    BoxStream,
    StreamExt,
};
use parking_lot::Mutex;
use serde_json::Value;

use crate::{
    conflict_exhausted,
    merge_patch,
    not_found,
    Document,
    IndexGateway,
    Query,
};

struct Entry {
    version: u64,
    source: serde_json::Map<String, Value>,
}

#[derive(Default)]
struct Store {
    indices: HashMap<String, HashMap<String, Entry>>,
    /// Remaining forced conflicts per (index, id), consumed one per update
    /// attempt. Lets tests exercise the `retry_on_conflict` path
    /// deterministically without real concurrent writers.
    injected_conflicts: HashMap<(String, String), u32>,
}

/// Reference implementation of [`IndexGateway`] over an in-process map.
/// Stands in for the real search cluster transport, which is out of scope
/// (§1): this is what the rest of the crate is tested against.
pub struct InMemoryIndexGateway {
    store: Mutex<Store>,
}

impl Default for InMemoryIndexGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryIndexGateway {
    pub fn new() -> Self {
        Self {
            store: Mutex::new(Store::default()),
        }
    }

    /// Seeds `index` with a document at a caller-chosen id, bypassing
    /// `index()`'s server-assigned-id contract. Test-only convenience.
    pub fn seed(&self, index: &str, id: impl Into<String>, source: Value) {
        let Value::Object(source) = source else {
            panic!("seed() requires a JSON object");
        };
        let mut store = self.store.lock();
        store
            .indices
            .entry(index.to_string())
            .or_default()
            .insert(id.into(), Entry { version: 0, source });
    }

    /// Forces the next `count` `update()` attempts against `(index, id)` to
    /// observe a version conflict, regardless of actual concurrent writers.
    /// Used to test the `retry_on_conflict` / `ConflictExhausted` paths.
    pub fn inject_conflicts(&self, index: &str, id: &str, count: u32) {
        self.store
            .lock()
            .injected_conflicts
            .insert((index.to_string(), id.to_string()), count);
    }

    fn take_injected_conflict(store: &mut Store, index: &str, id: &str) -> bool {
        let key = (index.to_string(), id.to_string());
        match store.injected_conflicts.get_mut(&key) {
            Some(count) if *count > 0 => {
                *count -= 1;
                true
            },
            _ => false,
        }
    }
}

#[async_trait]
impl IndexGateway for InMemoryIndexGateway {
    async fn get(&self, index: &str, id: &str) -> anyhow::Result<Option<Document>> {
        let store = self.store.lock();
        Ok(store
            .indices
            .get(index)
            .and_then(|docs| docs.get(id))
            .map(|entry| Document::new(id, Value::Object(entry.source.clone()))))
    }

    async fn update(
        &self,
        index: &str,
        id: &str,
        patch: Value,
        retry_on_conflict: u32,
    ) -> anyhow::Result<()> {
        let Value::Object(patch) = patch else {
            anyhow::bail!("update patch must be a JSON object");
        };

        let max_attempts = retry_on_conflict + 1;
        for attempt in 0..max_attempts {
            let mut store = self.store.lock();
            if Self::take_injected_conflict(&mut store, index, id) {
                if attempt + 1 == max_attempts {
                    return Err(conflict_exhausted(id, max_attempts));
                }
                continue;
            }
            let docs = store.indices.entry(index.to_string()).or_default();
            let Some(entry) = docs.get_mut(id) else {
                return Err(not_found(id));
            };
            merge_patch(&mut entry.source, patch.clone());
            entry.version += 1;
            return Ok(());
        }
        Err(conflict_exhausted(id, max_attempts))
    }

    async fn index(&self, index: &str, doc: Value) -> anyhow::Result<String> {
        let Value::Object(source) = doc else {
            anyhow::bail!("indexed document must be a JSON object");
        };
        let id = uuid::Uuid::new_v4().to_string();
        let mut store = self.store.lock();
        store
            .indices
            .entry(index.to_string())
            .or_default()
            .insert(id.clone(), Entry { version: 0, source });
        Ok(id)
    }

    fn query(&self, index: &str, query: Query) -> BoxStream<'static, anyhow::Result<Document>> {
        let matches: Vec<Document> = {
            let store = self.store.lock();
            store
                .indices
                .get(index)
                .map(|docs| {
                    docs.iter()
                        .map(|(id, entry)| Document::new(id.clone(), Value::Object(entry.source.clone())))
                        .filter(|doc| query.matches(doc))
                        .collect()
                })
                .unwrap_or_default()
        };
        stream::iter(matches.into_iter().map(Ok)).boxed()
    }

    async fn delete_by_query(&self, index: &str, query: Query) -> anyhow::Result<u64> {
        let mut store = self.store.lock();
        let Some(docs) = store.indices.get_mut(index) else {
            return Ok(0);
        };
        let to_delete: Vec<String> = docs
            .iter()
            .filter(|(id, entry)| query.matches(&Document::new((*id).clone(), Value::Object(entry.source.clone()))))
            .map(|(id, _)| id.clone())
            .collect();
        for id in &to_delete {
            docs.remove(id);
        }
        Ok(to_delete.len() as u64)
    }

    async fn refresh(&self, _index: &str) -> anyhow::Result<()> {
        // In-memory writes are immediately visible; nothing to do.
        Ok(())
    }

    async fn count(&self, index: &str) -> anyhow::Result<u64> {
        let store = self.store.lock();
        Ok(store.indices.get(index).map(|docs| docs.len() as u64).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn get_returns_none_for_missing_doc() {
        let gw = InMemoryIndexGateway::new();
        assert!(gw.get("connectors", "missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_preserves_unknown_fields() {
        let gw = InMemoryIndexGateway::new();
        gw.seed("connectors", "c1", json!({"a": 1, "b": 2}));
        gw.update("connectors", "c1", json!({"b": 3, "c": 4}), 0).await.unwrap();
        let doc = gw.get("connectors", "c1").await.unwrap().unwrap();
        assert_eq!(doc.source, json!({"a": 1, "b": 3, "c": 4}));
    }

    #[tokio::test]
    async fn update_null_removes_field() {
        let gw = InMemoryIndexGateway::new();
        gw.seed("connectors", "c1", json!({"a": 1, "error": "boom"}));
        gw.update("connectors", "c1", json!({"error": null}), 0).await.unwrap();
        let doc = gw.get("connectors", "c1").await.unwrap().unwrap();
        assert_eq!(doc.source, json!({"a": 1}));
    }

    #[tokio::test]
    async fn update_missing_doc_is_not_found() {
        let gw = InMemoryIndexGateway::new();
        let err = gw.update("connectors", "missing", json!({}), 3).await.unwrap_err();
        assert!(err.to_string().contains("missing"));
    }

    #[tokio::test]
    async fn update_retries_then_succeeds_within_budget() {
        let gw = InMemoryIndexGateway::new();
        gw.seed("connectors", "c1", json!({"a": 1}));
        gw.inject_conflicts("connectors", "c1", 2);
        gw.update("connectors", "c1", json!({"a": 2}), 3).await.unwrap();
        let doc = gw.get("connectors", "c1").await.unwrap().unwrap();
        assert_eq!(doc.source, json!({"a": 2}));
    }

    #[tokio::test]
    async fn update_exhausts_retry_budget() {
        let gw = InMemoryIndexGateway::new();
        gw.seed("connectors", "c1", json!({"a": 1}));
        gw.inject_conflicts("connectors", "c1", 10);
        let err = gw.update("connectors", "c1", json!({"a": 2}), 3).await.unwrap_err();
        assert!(err.to_string().contains("conflicting writes"));
        // The document is untouched since every attempt was a conflict.
        let doc = gw.get("connectors", "c1").await.unwrap().unwrap();
        assert_eq!(doc.source, json!({"a": 1}));
    }

    #[tokio::test]
    async fn index_assigns_unique_ids() {
        let gw = InMemoryIndexGateway::new();
        let id1 = gw.index("sync-jobs", json!({"status": "pending"})).await.unwrap();
        let id2 = gw.index("sync-jobs", json!({"status": "pending"})).await.unwrap();
        assert_ne!(id1, id2);
        assert_eq!(gw.count("sync-jobs").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn query_filters_by_predicate() {
        let gw = InMemoryIndexGateway::new();
        gw.seed("connectors", "c1", json!({"is_native": true}));
        gw.seed("connectors", "c2", json!({"is_native": false}));
        let q = Query::new("native only", |doc| doc.source["is_native"] == json!(true));
        let mut results: Vec<String> = gw
            .query("connectors", q)
            .map(|r| r.unwrap().id)
            .collect()
            .await;
        results.sort();
        assert_eq!(results, vec!["c1".to_string()]);
    }

    #[tokio::test]
    async fn delete_by_query_removes_matches_and_returns_count() {
        let gw = InMemoryIndexGateway::new();
        gw.seed("sync-jobs", "j1", json!({"connector": {"id": "gone"}}));
        gw.seed("sync-jobs", "j2", json!({"connector": {"id": "known"}}));
        let q = Query::new("orphans", |doc| doc.source["connector"]["id"] == json!("gone"));
        let deleted = gw.delete_by_query("sync-jobs", q).await.unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(gw.count("sync-jobs").await.unwrap(), 1);
    }
}
