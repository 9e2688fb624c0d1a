//! Thin abstraction over the search cluster that backs the *connectors* and
//! *sync-jobs* control-plane indices (§4.1). The wire transport (HTTP, auth,
//! retries at the transport layer) is explicitly out of scope (§1); this
//! crate specifies only the operations the core needs and gives
//! at-most-one-in-flight-per-id optimistic-concurrency semantics.

mod memory;
mod query;

pub use memory::InMemoryIndexGateway;
pub use query::Query;

use async_trait::async_trait;
use connector_sync_common::ConnectorError;
use futures::stream::BoxStream;
use serde_json::Value;

/// A raw control-plane document as stored in the index: an opaque id plus a
/// JSON object of fields. Field names match §3/§6 exactly; callers build
/// typed views (`Connector`, `SyncJob`) on top.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub id: String,
    pub source: Value,
}

impl Document {
    pub fn new(id: impl Into<String>, source: Value) -> Self {
        debug_assert!(source.is_object(), "document source must be a JSON object");
        Self {
            id: id.into(),
            source,
        }
    }
}

/// Operations exposed by the Index Gateway (§4.1). All operations are async
/// suspension points (§5); implementations must give at-most-one-in-flight
/// write per id.
#[async_trait]
pub trait IndexGateway: Send + Sync {
    /// Fetches a document by id. Returns `Ok(None)` if absent.
    async fn get(&self, index: &str, id: &str) -> anyhow::Result<Option<Document>>;

    /// Merges `patch` into the stored document (unknown fields preserved,
    /// §6). Retries on optimistic-concurrency conflict up to
    /// `retry_on_conflict` times before surfacing
    /// `ErrorCode::ConflictExhausted`.
    async fn update(
        &self,
        index: &str,
        id: &str,
        patch: Value,
        retry_on_conflict: u32,
    ) -> anyhow::Result<()>;

    /// Creates a new document with a server-assigned id, returning that id.
    async fn index(&self, index: &str, doc: Value) -> anyhow::Result<String>;

    /// Streams every document matching `query`. Implementations may
    /// paginate internally; documents are yielded in an unspecified but
    /// stable-per-page order (§4.1).
    fn query(&self, index: &str, query: Query) -> BoxStream<'static, anyhow::Result<Document>>;

    /// Deletes every document matching `query`, returning the number
    /// deleted.
    async fn delete_by_query(&self, index: &str, query: Query) -> anyhow::Result<u64>;

    /// Makes recently written documents visible to subsequent queries.
    async fn refresh(&self, index: &str) -> anyhow::Result<()>;

    /// Total document count in `index`.
    async fn count(&self, index: &str) -> anyhow::Result<u64>;
}

/// Merges `patch`'s top-level fields into `original`: a `null` value deletes
/// the field, anything else overwrites it, and fields absent from `patch`
/// are left untouched. This is the partial-merge semantics required of
/// every `update` (§6): delete-on-null, overwrite-on-present, preserve
/// otherwise.
pub fn merge_patch(original: &mut serde_json::Map<String, Value>, patch: serde_json::Map<String, Value>) {
    for (key, value) in patch {
        if value.is_null() {
            original.remove(&key);
        } else {
            original.insert(key, value);
        }
    }
}

pub(crate) fn conflict_exhausted(id: &str, attempts: u32) -> anyhow::Error {
    anyhow::Error::new(ConnectorError::conflict_exhausted(id, attempts))
}

pub(crate) fn not_found(id: &str) -> anyhow::Error {
    anyhow::Error::new(ConnectorError::not_found(id))
}
