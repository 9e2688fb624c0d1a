use std::sync::Arc;

use chrono::{
    DateTime,
    Utc,
};
use connector_sync_common::{
    iso_utc,
    now,
    ConnectorError,
    CONNECTORS_INDEX,
    JOB_NOT_FOUND_ERROR,
    SYNC_DISABLED,
    UNKNOWN_ERROR,
};
use connector_sync_gateway::{
    Document,
    IndexGateway,
};
use serde_json::{
    json,
    Map,
    Value,
};

use crate::{
    configuration::Configuration,
    features::Features,
    filtering::{
        Filtering,
        DEFAULT_DOMAIN,
    },
    pipeline::Pipeline,
    scheduling,
    status::{
        FilteringValidationState,
        JobStatus,
        Status,
    },
    sync_job::{
        FilteringValidationResult,
        SyncJob,
    },
};

/// Everything `Connector::prepare` needs about the orchestrator's static
/// configuration: which connector id/service type this worker is
/// responsible for, and where to look up that service type's default
/// configuration descriptors (§4.2).
pub struct PrepareConfig {
    pub connector_id: String,
    pub service_type: String,
    pub default_configuration: Configuration,
}

/// A typed view over one `.elastic-connectors` document (§3, §4.2). Like
/// [`SyncJob`], reads are plain field accessors and writes go through the
/// backing gateway's `update`, which supplies patch-merge and
/// optimistic-concurrency-retry semantics (§4.1/§6).
pub struct Connector {
    gateway: Arc<dyn IndexGateway>,
    pub id: String,
    source: Map<String, Value>,
    retry_on_conflict: u32,
}

impl Connector {
    pub fn new(gateway: Arc<dyn IndexGateway>, document: Document, retry_on_conflict: u32) -> Self {
        let Value::Object(source) = document.source else {
            panic!("connector document source must be a JSON object");
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

    pub fn status(&self) -> Status {
        Status::from_opt_str(self.get("status").and_then(Value::as_str))
    }

    pub fn service_type(&self) -> Option<&str> {
        self.get("service_type").and_then(Value::as_str)
    }

    pub fn last_seen(&self) -> Option<DateTime<Utc>> {
        self.get("last_seen")
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }

    pub fn native(&self) -> bool {
        self.get("is_native").and_then(Value::as_bool).unwrap_or(false)
    }

    pub fn sync_now(&self) -> bool {
        self.get("sync_now").and_then(Value::as_bool).unwrap_or(false)
    }

    pub fn scheduling(&self) -> Value {
        self.get("scheduling").cloned().unwrap_or_else(|| json!({}))
    }

    pub fn configuration(&self) -> Configuration {
        Configuration::from_value(self.get("configuration"))
    }

    pub fn index_name(&self) -> Option<&str> {
        self.get("index_name").and_then(Value::as_str)
    }

    pub fn language(&self) -> Option<&str> {
        self.get("language").and_then(Value::as_str)
    }

    pub fn filtering(&self) -> Filtering {
        Filtering::from_value(self.get("filtering"))
    }

    pub fn pipeline(&self) -> Pipeline {
        Pipeline::from_value(self.get("pipeline").cloned())
    }

    pub fn features(&self) -> Features {
        Features::from_value(self.get("features").cloned())
    }

    pub fn last_sync_status(&self) -> JobStatus {
        JobStatus::from_opt_str(self.get("last_sync_status").and_then(Value::as_str))
    }

    /// Sends a heartbeat iff `last_seen` is absent or older than `interval`
    /// seconds (§4.2, §6 — a connector that hasn't checked in is treated as
    /// needing one even before the orchestrator has ever seen it).
    pub async fn heartbeat(&self, interval_seconds: i64) -> anyhow::Result<()> {
        let due = match self.last_seen() {
            None => true,
            Some(last_seen) => (now() - last_seen).num_seconds() > interval_seconds,
        };
        if !due {
            return Ok(());
        }
        self.gateway
            .update(CONNECTORS_INDEX, &self.id, json!({"last_seen": iso_utc(now())}), self.retry_on_conflict)
            .await
    }

    /// Seconds until the next sync should start, or [`SYNC_DISABLED`] if
    /// none is scheduled (§4.2, §6).
    pub fn next_sync(&self) -> anyhow::Result<i64> {
        if self.sync_now() {
            return Ok(0);
        }
        let scheduling = self.scheduling();
        if !scheduling.get("enabled").and_then(Value::as_bool).unwrap_or(false) {
            return Ok(SYNC_DISABLED);
        }
        scheduling::next_sync(&scheduling, now())
    }

    pub async fn reset_sync_now_flag(&self) -> anyhow::Result<()> {
        self.gateway
            .update(CONNECTORS_INDEX, &self.id, json!({"sync_now": false}), self.retry_on_conflict)
            .await
    }

    pub async fn sync_starts(&self) -> anyhow::Result<()> {
        let doc = json!({
            "last_sync_status": JobStatus::InProgress.as_str(),
            "last_sync_error": Value::Null,
            "status": Status::Connected.as_str(),
        });
        self.gateway.update(CONNECTORS_INDEX, &self.id, doc, self.retry_on_conflict).await
    }

    pub async fn error(&self, error: impl std::fmt::Display) -> anyhow::Result<()> {
        let doc = json!({
            "status": Status::Error.as_str(),
            "error": error.to_string(),
        });
        self.gateway.update(CONNECTORS_INDEX, &self.id, doc, self.retry_on_conflict).await
    }

    /// Records the outcome of a finished sync job on the owning connector
    /// (§4.2, §8). `job` is `None` when the job document the connector
    /// pointed at no longer exists.
    pub async fn sync_done(&self, job: Option<&SyncJob>) -> anyhow::Result<()> {
        let job_status = job.map(SyncJob::status).unwrap_or(JobStatus::Error);
        let mut job_error = match job {
            None => Some(JOB_NOT_FOUND_ERROR.to_string()),
            Some(job) => job.error(),
        };
        if job_error.is_none() && job_status == JobStatus::Error {
            job_error = Some(UNKNOWN_ERROR.to_string());
        }
        let connector_status = if job_status == JobStatus::Error { Status::Error } else { Status::Connected };

        let mut doc = Map::new();
        doc.insert(
            "last_sync_status".to_string(),
            job_status.as_str().map(|s| Value::String(s.to_string())).unwrap_or(Value::Null),
        );
        doc.insert("last_synced".to_string(), Value::String(iso_utc(now())));
        doc.insert("last_sync_error".to_string(), job_error.clone().map(Value::String).unwrap_or(Value::Null));
        doc.insert(
            "status".to_string(),
            connector_status.as_str().map(|s| Value::String(s.to_string())).unwrap_or(Value::Null),
        );
        doc.insert("error".to_string(), job_error.map(Value::String).unwrap_or(Value::Null));

        if let Some(job) = job {
            if job.terminated() {
                doc.insert("last_indexed_document_count".to_string(), json!(job.indexed_document_count()));
                doc.insert("last_deleted_document_count".to_string(), json!(job.deleted_document_count()));
            }
        }

        self.gateway
            .update(CONNECTORS_INDEX, &self.id, Value::Object(doc), self.retry_on_conflict)
            .await
    }

    /// Populates `service_type`/`configuration` the first time a worker
    /// claims a configured-by-deployment connector id (§4.2). A no-op once
    /// both fields are already populated, or for any connector id other
    /// than the one this worker is configured for.
    pub async fn prepare(&self, config: &PrepareConfig) -> anyhow::Result<()> {
        if self.id != config.connector_id {
            return Ok(());
        }
        if self.service_type().is_some() && !self.configuration().is_empty() {
            return Ok(());
        }

        let mut doc = Map::new();
        if self.service_type().is_none() {
            if config.service_type.is_empty() {
                return Err(anyhow::Error::new(ConnectorError::service_type_not_configured()));
            }
            doc.insert("service_type".to_string(), Value::String(config.service_type.clone()));
        }

        if self.configuration().is_empty() {
            if config.default_configuration.is_empty() {
                return Err(anyhow::Error::new(ConnectorError::service_type_not_supported(&config.service_type)));
            }
            doc.insert("configuration".to_string(), config.default_configuration.to_value());
            doc.insert("status".to_string(), Value::String(Status::NeedsConfiguration.as_str().unwrap().to_string()));
        }

        self.gateway
            .update(CONNECTORS_INDEX, &self.id, Value::Object(doc), self.retry_on_conflict)
            .await
            .map_err(|e| anyhow::Error::new(ConnectorError::connector_update_error(e)))
    }

    /// Validates this connector's draft filtering if (and only if) it's
    /// sitting in `Edited` state, and promotes draft to active on a
    /// `Valid` verdict (§4.2, §4.4).
    pub async fn validate_filtering(&self, result: FilteringValidationResult) -> anyhow::Result<()> {
        let draft = self.filtering().get_draft_filter(DEFAULT_DOMAIN);
        if !draft.has_validation_state(FilteringValidationState::Edited) {
            return Ok(());
        }

        let mut filtering = self.filtering();
        filtering.apply_validation(DEFAULT_DOMAIN, result.state, result.errors);
        self.gateway
            .update(CONNECTORS_INDEX, &self.id, json!({"filtering": filtering.to_value()}), self.retry_on_conflict)
            .await
    }

    /// Document count of this connector's backing content index, refreshed
    /// first so recently-indexed documents are reflected (§4.2, §6).
    pub async fn document_count(&self) -> anyhow::Result<u64> {
        let Some(index_name) = self.index_name() else {
            return Ok(0);
        };
        self.gateway.refresh(index_name).await?;
        self.gateway.count(index_name).await
    }
}
