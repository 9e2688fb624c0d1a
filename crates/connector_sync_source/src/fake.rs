use async_trait::async_trait;
use connector_sync_model::{
    Configuration,
    Filter,
};
use futures::stream::{
    self,
    BoxStream,
    StreamExt,
};
use parking_lot::Mutex;
use serde_json::Value;

use crate::{
    AdapterDocument,
    BulkOptions,
    SourceAdapter,
};

/// An in-memory stand-in for a real source adapter, used to exercise the
/// pipeline runtime and orchestrator without a live upstream (real
/// adapters like Jira are explicitly out of scope, §1). Documents are
/// seeded up front and replayed verbatim on every `get_docs` call; no
/// filtering is applied since `filtering` translation is adapter-specific
/// and therefore untestable in the abstract.
pub struct InMemorySourceAdapter {
    documents: Vec<Value>,
    default_configuration: Configuration,
    ping_failure: Mutex<Option<String>>,
    closed: Mutex<bool>,
}

impl InMemorySourceAdapter {
    pub fn new(documents: Vec<Value>) -> Self {
        Self {
            documents,
            default_configuration: Configuration::default(),
            ping_failure: Mutex::new(None),
            closed: Mutex::new(false),
        }
    }

    pub fn with_default_configuration(mut self, configuration: Configuration) -> Self {
        self.default_configuration = configuration;
        self
    }

    /// Test hook: makes the next `ping()` fail with `message`.
    pub fn fail_next_ping(&self, message: impl Into<String>) {
        *self.ping_failure.lock() = Some(message.into());
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.lock()
    }
}

#[async_trait]
impl SourceAdapter for InMemorySourceAdapter {
    fn get_default_configuration(&self) -> Configuration {
        self.default_configuration.clone()
    }

    async fn validate_config(&self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn ping(&self) -> anyhow::Result<()> {
        if let Some(message) = self.ping_failure.lock().take() {
            anyhow::bail!(message);
        }
        Ok(())
    }

    fn get_docs(&self, _filtering: Option<Filter>) -> BoxStream<'static, anyhow::Result<AdapterDocument>> {
        let documents = self.documents.clone();
        stream::iter(documents.into_iter().map(|doc| Ok(AdapterDocument::new(doc)))).boxed()
    }

    fn tweak_bulk_options(&self, options: &mut BulkOptions) {
        options.concurrent_downloads = options.concurrent_downloads.min(self.documents.len().max(1));
    }

    async fn close(&self) -> anyhow::Result<()> {
        *self.closed.lock() = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use futures::StreamExt as _;
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn get_docs_replays_seeded_documents() {
        let adapter = InMemorySourceAdapter::new(vec![json!({"id": "a"}), json!({"id": "b"})]);
        let docs: Vec<_> = adapter
            .get_docs(None)
            .map(|result| result.unwrap().source)
            .collect()
            .await;
        assert_eq!(docs, vec![json!({"id": "a"}), json!({"id": "b"})]);
    }

    #[tokio::test]
    async fn ping_failure_hook_fires_once() {
        let adapter = InMemorySourceAdapter::new(vec![]);
        adapter.fail_next_ping("upstream unreachable");
        assert!(adapter.ping().await.is_err());
        assert!(adapter.ping().await.is_ok());
    }

    #[tokio::test]
    async fn close_marks_adapter_closed() {
        let adapter = InMemorySourceAdapter::new(vec![]);
        assert!(!adapter.is_closed());
        adapter.close().await.unwrap();
        assert!(adapter.is_closed());
    }
}
