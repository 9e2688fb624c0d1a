use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

/// The document-ingestion collaborator the runtime hands processed
/// documents to — explicitly out of scope (§1: "The document-ingestion
/// layer that actually writes result documents into the target data
/// index"). Only this contract belongs to the core; what a real
/// implementation does with a document (bulk index request, queue publish,
/// whatever) is a deployment concern.
#[async_trait]
pub trait IngestSink: Send + Sync {
    async fn index_document(&self, index_name: &str, document: Value) -> anyhow::Result<()>;
}

/// An in-memory stand-in for the real ingestion layer, used to exercise the
/// pipeline runtime and orchestrator in tests without a live ingestion
/// pipeline, the way `InMemorySourceAdapter` stands in for a real adapter.
#[derive(Default)]
pub struct InMemoryIngestSink {
    documents: Mutex<Vec<(String, Value)>>,
}

impl InMemoryIngestSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn documents(&self) -> Vec<(String, Value)> {
        self.documents.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.documents.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl IngestSink for InMemoryIngestSink {
    async fn index_document(&self, index_name: &str, document: Value) -> anyhow::Result<()> {
        self.documents.lock().push((index_name.to_string(), document));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn records_documents_in_order() {
        let sink = InMemoryIngestSink::new();
        sink.index_document("idx-1", json!({"id": "a"})).await.unwrap();
        sink.index_document("idx-1", json!({"id": "b"})).await.unwrap();
        assert_eq!(
            sink.documents(),
            vec![
                ("idx-1".to_string(), json!({"id": "a"})),
                ("idx-1".to_string(), json!({"id": "b"})),
            ]
        );
    }
}
