//! The contract every data-source adapter implements (§4.7), plus a small
//! in-memory adapter exercising that contract in tests — real adapters
//! (Jira, MongoDB, MySQL, …) are out of scope (§1).

mod fake;
mod validator;

pub use fake::InMemorySourceAdapter;
pub use validator::{
    AcceptAllValidator,
    FilteringValidator,
};

use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
};

use async_trait::async_trait;
use chrono::{
    DateTime,
    Utc,
};
use connector_sync_model::{
    Configuration,
    Filter,
};
use futures::stream::BoxStream;
use serde_json::Value;

/// Bulk-ingestion knobs an adapter may want to tune for its own shape of
/// data (attachment-heavy vs. metadata-only sources, §4.7
/// `tweak_bulk_options`).
#[derive(Debug, Clone, Copy)]
pub struct BulkOptions {
    pub queue_max_mem_size: usize,
    pub concurrent_downloads: usize,
}

impl Default for BulkOptions {
    fn default() -> Self {
        Self {
            queue_max_mem_size: connector_sync_common::QUEUE_MEM_SIZE,
            concurrent_downloads: 10,
        }
    }
}

type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// A callable that lazily materializes a document's enriched body (e.g. an
/// attachment download + text extraction), given a watermark timestamp and
/// a `force` flag, returning `None` if the content is unchanged since the
/// watermark (§4.7 `fetch_content`).
pub type FetchContent = Arc<dyn Fn(Option<DateTime<Utc>>, bool) -> BoxFuture<anyhow::Result<Option<Value>>> + Send + Sync>;

/// One item an adapter yields from `get_docs`: the document itself, plus an
/// optional lazy content fetcher the orchestrator invokes only if the
/// downstream pipeline has capacity (§4.7).
pub struct AdapterDocument {
    pub source: Value,
    pub fetch_content: Option<FetchContent>,
}

impl AdapterDocument {
    pub fn new(source: Value) -> Self {
        Self {
            source,
            fetch_content: None,
        }
    }

    pub fn with_fetch_content(source: Value, fetch_content: FetchContent) -> Self {
        Self {
            source,
            fetch_content: Some(fetch_content),
        }
    }
}

/// The contract every data-source adapter implements (§4.7). Adapters fan
/// out internally via [`connector_sync_pipeline::ConcurrentTasks`] and
/// stream through [`connector_sync_pipeline::MemQueue`] to bound memory;
/// `get_docs` itself just exposes the resulting async stream.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// The option descriptors a freshly-configured connector of this
    /// service type should be seeded with (§4.2 `prepare`, §6).
    fn get_default_configuration(&self) -> Configuration;

    /// Raises if the adapter's current configuration is unusable.
    async fn validate_config(&self) -> anyhow::Result<()>;

    /// Liveness probe against the upstream service.
    async fn ping(&self) -> anyhow::Result<()>;

    /// Streams documents matching `filtering`, paired with an optional lazy
    /// content fetcher per document (§4.7).
    fn get_docs(&self, filtering: Option<Filter>) -> BoxStream<'static, anyhow::Result<AdapterDocument>>;

    /// Lets the adapter adjust downstream bulk-ingestion concurrency to
    /// its own data shape; the default is a no-op.
    fn tweak_bulk_options(&self, _options: &mut BulkOptions) {}

    /// Releases adapter-owned resources (connection pools, etc).
    async fn close(&self) -> anyhow::Result<()>;
}
