use std::sync::Arc;

use connector_sync_common::{
    iso_utc,
    now,
    ConnectorError,
    JOBS_INDEX,
};
use connector_sync_gateway::{
    Document,
    IndexGateway,
};
use gethostname::gethostname;
use serde_json::{
    json,
    Map,
    Value,
};

use crate::{
    configuration::Configuration,
    filtering::Filter,
    pipeline::Pipeline,
    status::JobStatus,
};

/// A validator's verdict on a [`Filter`], returned by whatever validates
/// sync-job-scoped filtering before a run starts (§4.3).
pub struct FilteringValidationResult {
    pub state: crate::status::FilteringValidationState,
    pub errors: Vec<String>,
}

/// A typed view over one `.elastic-connectors-sync-jobs` document (§3, §4.3).
/// Reads project fields out of the raw source; writes go through `update`
/// on the backing gateway so every mutation gets the patch-merge and
/// optimistic-concurrency-retry semantics of §4.1/§6.
pub struct SyncJob {
    gateway: Arc<dyn IndexGateway>,
    pub id: String,
    source: Map<String, Value>,
    retry_on_conflict: u32,
}

impl SyncJob {
    pub fn new(gateway: Arc<dyn IndexGateway>, document: Document, retry_on_conflict: u32) -> Self {
        let Value::Object(source) = document.source else {
            panic!("sync job document source must be a JSON object");
        };
        Self {
            gateway,
            id: document.id,
            source,
            retry_on_conflict,
        }
    }

    fn get(&self, key: &str) -> Option<&Value> {
        self.source.get(key)
    }

    fn connector_field(&self, key: &str) -> Option<&Value> {
        self.source.get("connector")?.get(key)
    }

    pub fn status(&self) -> JobStatus {
        JobStatus::from_opt_str(self.get("status").and_then(Value::as_str))
    }

    pub fn error(&self) -> Option<String> {
        self.get("error").and_then(Value::as_str).map(str::to_string)
    }

    pub fn connector_id(&self) -> Option<&str> {
        self.connector_field("id").and_then(Value::as_str)
    }

    pub fn index_name(&self) -> Option<&str> {
        self.connector_field("index_name").and_then(Value::as_str)
    }

    pub fn language(&self) -> Option<&str> {
        self.connector_field("language").and_then(Value::as_str)
    }

    pub fn service_type(&self) -> Option<&str> {
        self.connector_field("service_type").and_then(Value::as_str)
    }

    pub fn configuration(&self) -> Configuration {
        Configuration::from_value(self.connector_field("configuration"))
    }

    pub fn filtering(&self) -> Filter {
        Filter::from_value(self.connector_field("filtering").cloned())
    }

    pub fn pipeline(&self) -> Pipeline {
        Pipeline::from_value(self.connector_field("pipeline").cloned())
    }

    /// A job is terminal iff its status is one of these three (§3, §8).
    pub fn terminated(&self) -> bool {
        self.status().is_terminal()
    }

    pub fn indexed_document_count(&self) -> i64 {
        self.get("indexed_document_count").and_then(Value::as_i64).unwrap_or(0)
    }

    pub fn indexed_document_volume(&self) -> i64 {
        self.get("indexed_document_volume").and_then(Value::as_i64).unwrap_or(0)
    }

    pub fn deleted_document_count(&self) -> i64 {
        self.get("deleted_document_count").and_then(Value::as_i64).unwrap_or(0)
    }

    pub fn total_document_count(&self) -> i64 {
        self.get("total_document_count").and_then(Value::as_i64).unwrap_or(0)
    }

    /// Rejects the run up front if validation of this job's captured
    /// filtering snapshot didn't come back `Valid` (§4.3).
    pub fn validate_filtering(&self, result: &FilteringValidationResult) -> Result<(), anyhow::Error> {
        use crate::status::FilteringValidationState;

        if result.state != FilteringValidationState::Valid {
            return Err(anyhow::Error::new(ConnectorError::invalid_filtering(
                result.state.as_str().unwrap_or("unset"),
                result.errors.join(", "),
            )));
        }
        Ok(())
    }

    /// Claims this pending job for the current worker (§4.3, §6).
    pub async fn claim(&self) -> anyhow::Result<()> {
        let hostname = gethostname().to_string_lossy().into_owned();
        let doc = json!({
            "status": JobStatus::InProgress.as_str(),
            "started_at": iso_utc(now()),
            "last_seen": iso_utc(now()),
            "worker_hostname": hostname,
        });
        self.gateway
            .update(JOBS_INDEX, &self.id, doc, self.retry_on_conflict)
            .await
    }

    pub async fn done(&self, ingestion_stats: Option<Map<String, Value>>, connector_metadata: Option<Map<String, Value>>) -> anyhow::Result<()> {
        self.terminate(JobStatus::Completed, None, ingestion_stats, connector_metadata).await
    }

    pub async fn fail(
        &self,
        message: impl std::fmt::Display,
        ingestion_stats: Option<Map<String, Value>>,
        connector_metadata: Option<Map<String, Value>>,
    ) -> anyhow::Result<()> {
        self.terminate(JobStatus::Error, Some(message.to_string()), ingestion_stats, connector_metadata)
            .await
    }

    pub async fn cancel(&self, ingestion_stats: Option<Map<String, Value>>, connector_metadata: Option<Map<String, Value>>) -> anyhow::Result<()> {
        self.terminate(JobStatus::Canceled, None, ingestion_stats, connector_metadata).await
    }

    pub async fn suspend(&self, ingestion_stats: Option<Map<String, Value>>, connector_metadata: Option<Map<String, Value>>) -> anyhow::Result<()> {
        self.terminate(JobStatus::Suspended, None, ingestion_stats, connector_metadata).await
    }

    /// Common tail of `done`/`fail`/`cancel`/`suspend` (§4.3, §9). Records
    /// `completed_at` for every terminal status, and additionally
    /// `canceled_at` for `Canceled` — the open question of whether a
    /// cancellation should also stamp `completed_at` is resolved in favor
    /// of "yes, both", matching the source this was distilled from.
    async fn terminate(
        &self,
        status: JobStatus,
        error: Option<String>,
        ingestion_stats: Option<Map<String, Value>>,
        connector_metadata: Option<Map<String, Value>>,
    ) -> anyhow::Result<()> {
        let mut doc = Map::new();
        doc.insert("last_seen".to_string(), Value::String(iso_utc(now())));
        doc.insert(
            "status".to_string(),
            status.as_str().map(|s| Value::String(s.to_string())).unwrap_or(Value::Null),
        );
        doc.insert("error".to_string(), error.map(Value::String).unwrap_or(Value::Null));

        if status.is_terminal() {
            doc.insert("completed_at".to_string(), Value::String(iso_utc(now())));
        }
        if status == JobStatus::Canceled {
            doc.insert("canceled_at".to_string(), Value::String(iso_utc(now())));
        }
        if let Some(stats) = ingestion_stats {
            doc.extend(stats);
        }
        if let Some(metadata) = connector_metadata {
            if !metadata.is_empty() {
                doc.insert("metadata".to_string(), Value::Object(metadata));
            }
        }

        self.gateway
            .update(JOBS_INDEX, &self.id, Value::Object(doc), self.retry_on_conflict)
            .await
    }
}
