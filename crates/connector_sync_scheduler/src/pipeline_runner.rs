use std::{
    sync::Arc,
    time::Duration,
};

use connector_sync_common::ConnectorError;
use connector_sync_model::{
    Filter,
    Pipeline,
};
use connector_sync_pipeline::{
    CancellableSleeps,
    ConcurrentTasks,
    MemQueue,
    MemSized,
    QueueItem,
};
use connector_sync_source::{
    AdapterDocument,
    BulkOptions,
    SourceAdapter,
};
use futures::StreamExt;
use serde_json::{
    json,
    Map,
    Value,
};

use crate::ingest::IngestSink;

/// Counters accumulated while driving one adapter through the bounded
/// pipeline runtime (§4.8 — "updating `indexed_*` on the job as it
/// progresses"). `deleted_document_count` stays at zero here: detecting and
/// deleting documents no longer present upstream is an adapter-specific
/// concern this runtime doesn't drive (no adapter contract operation
/// surfaces deletions, §4.7).
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncOutcome {
    pub indexed_document_count: i64,
    pub indexed_document_volume: i64,
    pub deleted_document_count: i64,
}

impl SyncOutcome {
    /// The shape `SyncJob::terminate` merges at the top level of a
    /// terminal-status update (§4.3).
    pub fn into_ingestion_stats(self) -> Map<String, Value> {
        let mut stats = Map::new();
        stats.insert("indexed_document_count".to_string(), json!(self.indexed_document_count));
        stats.insert("indexed_document_volume".to_string(), json!(self.indexed_document_volume));
        stats.insert("deleted_document_count".to_string(), json!(self.deleted_document_count));
        stats
    }
}

/// A document en route through the bounded queue, charged against its
/// byte budget by its serialized size (§4.6).
#[derive(Debug, Clone)]
struct PipelineItem {
    document: Value,
}

impl MemSized for PipelineItem {
    fn mem_size(&self) -> usize {
        serde_json::to_vec(&self.document).map(|bytes| bytes.len()).unwrap_or(0)
    }
}

/// Drives one adapter's `get_docs` stream through a bounded [`MemQueue`]
/// into `sink`, fanning attachment downloads out across a
/// [`ConcurrentTasks`] pool sized per the adapter's tuned [`BulkOptions`]
/// (§4.6, §4.7). The single producer task issues one `EndOfStream`
/// sentinel once the adapter's stream is exhausted; this function is the
/// sole consumer, decrementing a pending-producer counter on that sentinel
/// (§4.7, §6) — which for the one-stream-per-`get_docs`-call contract here
/// never needs to start above one.
///
/// Racing the consume loop against `cancellation` lets a cooperative
/// shutdown (§5) interrupt a sync mid-stream: the in-flight producer is
/// aborted and `Err` carrying [`ErrorCode::Cancelled`](connector_sync_common::ErrorCode::Cancelled)
/// is returned so the caller can suspend rather than fail the job.
pub async fn run_sync(
    adapter: Arc<dyn SourceAdapter>,
    sink: Arc<dyn IngestSink>,
    index_name: String,
    pipeline: Pipeline,
    filtering: Option<Filter>,
    cancellation: CancellableSleeps,
) -> anyhow::Result<SyncOutcome> {
    let mut bulk_options = BulkOptions::default();
    adapter.tweak_bulk_options(&mut bulk_options);
    let extract_binary_content = pipeline.extract_binary_content();

    let queue = Arc::new(MemQueue::<QueueItem<PipelineItem>>::new(
        bulk_options.queue_max_mem_size,
        Duration::from_millis(100),
    ));

    let producer = {
        let adapter = adapter.clone();
        let queue = queue.clone();
        let cancellation = cancellation.clone();
        let concurrency = bulk_options.concurrent_downloads;
        tokio::spawn(async move { produce(adapter, filtering, queue, concurrency, extract_binary_content, cancellation).await })
    };

    let mut pending_producers = 1u32;
    let mut outcome = SyncOutcome::default();
    loop {
        if pending_producers == 0 {
            break;
        }
        tokio::select! {
            item = queue.get() => {
                match item {
                    QueueItem::EndOfStream => pending_producers -= 1,
                    QueueItem::Item(item) => {
                        let volume = item.mem_size() as i64;
                        sink.index_document(&index_name, item.document).await?;
                        outcome.indexed_document_count += 1;
                        outcome.indexed_document_volume += volume;
                    },
                }
            },
            _ = cancellation.cancelled() => {
                producer.abort();
                return Err(anyhow::Error::new(ConnectorError::cancelled()));
            },
        }
    }

    match producer.await {
        Ok(result) => result?,
        Err(join_err) => return Err(anyhow::Error::new(ConnectorError::adapter_error(join_err))),
    }
    Ok(outcome)
}

/// The sole producer task: streams `adapter.get_docs`, fanning attachment
/// fetches out across a bounded worker pool when the pipeline wants binary
/// content extracted, and always terminates by enqueueing exactly one
/// `EndOfStream` sentinel (§4.7).
async fn produce(
    adapter: Arc<dyn SourceAdapter>,
    filtering: Option<Filter>,
    queue: Arc<MemQueue<QueueItem<PipelineItem>>>,
    concurrency: usize,
    extract_binary_content: bool,
    cancellation: CancellableSleeps,
) -> anyhow::Result<()> {
    let mut stream = adapter.get_docs(filtering);
    let mut downloads = ConcurrentTasks::new(concurrency.max(1));
    while let Some(next) = stream.next().await {
        if cancellation.is_cancelled() {
            break;
        }
        let AdapterDocument { source, fetch_content } = next?;
        match fetch_content {
            Some(fetch) if extract_binary_content => {
                let queue = queue.clone();
                downloads
                    .put(async move {
                        let enriched = fetch(None, false).await?;
                        let document = enriched.unwrap_or(source);
                        queue.put(QueueItem::Item(PipelineItem { document })).await;
                        Ok(())
                    })
                    .await;
            },
            _ => {
                queue.put(QueueItem::Item(PipelineItem { document: source })).await;
            },
        }
    }
    downloads.join().await?;
    queue.put(QueueItem::EndOfStream).await;
    Ok(())
}
