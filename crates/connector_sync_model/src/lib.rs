//! The control-plane data model: typed [`Connector`]/[`SyncJob`] document
//! views, the filtering/features/pipeline/configuration value objects they
//! expose, and the index-scoped helpers ([`ConnectorIndex`], [`SyncJobIndex`])
//! the orchestrator drives its tick loop through (§3, §4.2-§4.4).

mod configuration;
mod connector;
mod features;
mod filtering;
mod pipeline;
mod scheduling;
mod status;
mod sync_job;

pub use configuration::{
    validate_configuration,
    Configuration,
    OptionDescriptor,
};
pub use connector::{
    Connector,
    PrepareConfig,
};
pub use features::{
    Feature,
    Features,
};
pub use filtering::{
    Filter,
    FilterBundle,
    FilterState,
    Filtering,
    DEFAULT_DOMAIN,
};
pub use pipeline::{
    pipeline_defaults,
    Pipeline,
};
pub use scheduling::next_sync;
pub use status::{
    FilteringValidationState,
    JobStatus,
    JobTriggerMethod,
    Status,
};
pub use sync_job::{
    FilteringValidationResult,
    SyncJob,
};

use std::sync::Arc;

use connector_sync_common::{
    now,
    CONNECTORS_INDEX,
    IDLE_JOBS_THRESHOLD_SECONDS,
    JOBS_INDEX,
};
use connector_sync_gateway::{
    IndexGateway,
    Query,
};
use futures::stream::{
    StreamExt,
    TryStreamExt,
};
use serde_json::json;

/// Index-scoped helpers over the `.elastic-connectors` index: enumerating
/// the connectors this deployment is responsible for (§4.1, §6).
pub struct ConnectorIndex {
    gateway: Arc<dyn IndexGateway>,
    retry_on_conflict: u32,
}

impl ConnectorIndex {
    pub fn new(gateway: Arc<dyn IndexGateway>, retry_on_conflict: u32) -> Self {
        Self {
            gateway,
            retry_on_conflict,
        }
    }

    /// Sends a heartbeat directly by id, without loading the document first
    /// (§4.1 `ConnectorIndex.heartbeat`).
    pub async fn heartbeat(&self, connector_id: &str) -> anyhow::Result<()> {
        self.gateway
            .update(CONNECTORS_INDEX, connector_id, json!({"last_seen": connector_sync_common::iso_utc(now())}), self.retry_on_conflict)
            .await
    }

    /// Loads one connector by id as a typed [`Connector`].
    pub async fn get(&self, connector_id: &str) -> anyhow::Result<Option<Connector>> {
        let document = self.gateway.get(CONNECTORS_INDEX, connector_id).await?;
        Ok(document.map(|doc| Connector::new(self.gateway.clone(), doc, self.retry_on_conflict)))
    }

    /// The connectors this deployment is responsible for: every connector
    /// whose `service_type` is in `native_service_types` and is natively
    /// managed, plus every explicitly-listed custom connector id (§4.1
    /// `ConnectorIndex.supported_connectors`). Returns nothing if both
    /// filters are empty, matching the source this was distilled from.
    pub async fn supported_connectors(&self, native_service_types: &[String], connector_ids: &[String]) -> anyhow::Result<Vec<Connector>> {
        if native_service_types.is_empty() && connector_ids.is_empty() {
            return Ok(Vec::new());
        }
        let native_service_types = native_service_types.to_vec();
        let connector_ids = connector_ids.to_vec();
        let query = Query::new("supported_connectors", move |doc| {
            let is_native = doc.source.get("is_native").and_then(|v| v.as_bool()).unwrap_or(false);
            let service_type = doc.source.get("service_type").and_then(|v| v.as_str());
            let native_match = is_native && service_type.is_some_and(|st| native_service_types.iter().any(|n| n == st));
            let custom_match = !is_native && connector_ids.iter().any(|id| id == &doc.id);
            native_match || custom_match
        });
        self.gateway
            .query(CONNECTORS_INDEX, query)
            .map(|result| result.map(|doc| Connector::new(self.gateway.clone(), doc, self.retry_on_conflict)))
            .try_collect()
            .await
    }

    /// Every connector document, unfiltered (§4.1 `ConnectorIndex.all_connectors`).
    pub async fn all_connectors(&self) -> anyhow::Result<Vec<Connector>> {
        self.gateway
            .query(CONNECTORS_INDEX, Query::all())
            .map(|result| result.map(|doc| Connector::new(self.gateway.clone(), doc, self.retry_on_conflict)))
            .try_collect()
            .await
    }
}

/// Index-scoped helpers over the `.elastic-connectors-sync-jobs` index:
/// job creation and the three reaper queries the scheduler's tick loop
/// drives (§4.1, §4.8, §6).
pub struct SyncJobIndex {
    gateway: Arc<dyn IndexGateway>,
    retry_on_conflict: u32,
}

impl SyncJobIndex {
    pub fn new(gateway: Arc<dyn IndexGateway>, retry_on_conflict: u32) -> Self {
        Self {
            gateway,
            retry_on_conflict,
        }
    }

    /// Loads one sync job by id as a typed [`SyncJob`].
    pub async fn get(&self, job_id: &str) -> anyhow::Result<Option<SyncJob>> {
        let document = self.gateway.get(JOBS_INDEX, job_id).await?;
        Ok(document.map(|doc| SyncJob::new(self.gateway.clone(), doc, self.retry_on_conflict)))
    }

    /// Snapshots a connector's current active filtering/configuration/
    /// pipeline into a new pending job (§4.1 `SyncJobIndex.create`, §4.3a).
    /// The snapshot is taken now so a later edit to the connector's draft
    /// filtering can't retroactively change a job already queued or running.
    pub async fn create(&self, connector: &Connector) -> anyhow::Result<String> {
        let trigger_method = if connector.sync_now() { JobTriggerMethod::OnDemand } else { JobTriggerMethod::Scheduled };
        let filtering = connector.filtering().get_active_filter(DEFAULT_DOMAIN).transform_filtering();
        let job_def = json!({
            "connector": {
                "id": connector.id,
                "filtering": filtering,
                "index_name": connector.index_name(),
                "language": connector.language(),
                "service_type": connector.service_type(),
                "pipeline": connector.pipeline().as_value(),
                "configuration": connector.configuration().to_value(),
            },
            "trigger_method": trigger_method.as_str(),
            "status": JobStatus::Pending.as_str(),
            "created_at": connector_sync_common::iso_utc(now()),
            "last_seen": connector_sync_common::iso_utc(now()),
        });
        self.gateway.index(JOBS_INDEX, job_def).await
    }

    /// Jobs that are runnable right now for one of `connector_ids`: pending
    /// or previously-suspended (§4.1 `SyncJobIndex.pending_jobs`).
    pub async fn pending_jobs(&self, connector_ids: &[String]) -> anyhow::Result<Vec<SyncJob>> {
        let connector_ids = connector_ids.to_vec();
        let query = Query::new("pending_jobs", move |doc| {
            let status = JobStatus::from_opt_str(doc.source.get("status").and_then(|v| v.as_str()));
            let connector_id = doc.source.get("connector").and_then(|c| c.get("id")).and_then(|v| v.as_str());
            matches!(status, JobStatus::Pending | JobStatus::Suspended) && connector_id.is_some_and(|id| connector_ids.iter().any(|c| c == id))
        });
        self.gateway
            .query(JOBS_INDEX, query)
            .map(|result| result.map(|doc| SyncJob::new(self.gateway.clone(), doc, self.retry_on_conflict)))
            .try_collect()
            .await
    }

    /// Jobs whose connector no longer belongs to `connector_ids` (§4.1
    /// `SyncJobIndex.orphaned_jobs`, §9 — deletion is unconditional on job
    /// status, including `in_progress`).
    pub async fn orphaned_jobs(&self, connector_ids: &[String]) -> anyhow::Result<Vec<SyncJob>> {
        let connector_ids = connector_ids.to_vec();
        let query = Query::new("orphaned_jobs", move |doc| {
            let connector_id = doc.source.get("connector").and_then(|c| c.get("id")).and_then(|v| v.as_str());
            !connector_id.is_some_and(|id| connector_ids.iter().any(|c| c == id))
        });
        self.gateway
            .query(JOBS_INDEX, query)
            .map(|result| result.map(|doc| SyncJob::new(self.gateway.clone(), doc, self.retry_on_conflict)))
            .try_collect()
            .await
    }

    /// Jobs for one of `connector_ids` that are in progress or canceling
    /// but haven't reported a heartbeat in `idle_threshold_seconds`
    /// (§4.1 `SyncJobIndex.idle_jobs`, §4.8; defaults to
    /// [`IDLE_JOBS_THRESHOLD_SECONDS`], but callers may tune it).
    pub async fn idle_jobs(&self, connector_ids: &[String], idle_threshold_seconds: i64) -> anyhow::Result<Vec<SyncJob>> {
        let connector_ids = connector_ids.to_vec();
        let cutoff = now() - chrono::Duration::seconds(idle_threshold_seconds);
        let query = Query::new("idle_jobs", move |doc| {
            let connector_id = doc.source.get("connector").and_then(|c| c.get("id")).and_then(|v| v.as_str());
            let status = JobStatus::from_opt_str(doc.source.get("status").and_then(|v| v.as_str()));
            let last_seen = doc
                .source
                .get("last_seen")
                .and_then(|v| v.as_str())
                .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
                .map(|dt| dt.with_timezone(&chrono::Utc));
            connector_id.is_some_and(|id| connector_ids.iter().any(|c| c == id))
                && matches!(status, JobStatus::InProgress | JobStatus::Canceling)
                && last_seen.is_some_and(|seen| seen <= cutoff)
        });
        self.gateway
            .query(JOBS_INDEX, query)
            .map(|result| result.map(|doc| SyncJob::new(self.gateway.clone(), doc, self.retry_on_conflict)))
            .try_collect()
            .await
    }

    /// Deletes a batch of jobs by id, returning the number deleted (§4.1
    /// `SyncJobIndex.delete_jobs`).
    pub async fn delete_jobs(&self, job_ids: &[String]) -> anyhow::Result<u64> {
        let job_ids = job_ids.to_vec();
        let query = Query::new("delete_jobs", move |doc| job_ids.iter().any(|id| id == &doc.id));
        self.gateway.delete_by_query(JOBS_INDEX, query).await
    }
}

#[cfg(test)]
mod tests {
    use connector_sync_gateway::InMemoryIndexGateway;
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn supported_connectors_matches_native_and_custom() {
        let gateway = Arc::new(InMemoryIndexGateway::new());
        gateway.seed(CONNECTORS_INDEX, "native-1", json!({"is_native": true, "service_type": "jira"}));
        gateway.seed(CONNECTORS_INDEX, "custom-1", json!({"is_native": false}));
        gateway.seed(CONNECTORS_INDEX, "other", json!({"is_native": true, "service_type": "sharepoint"}));

        let index = ConnectorIndex::new(gateway, 3);
        let mut found: Vec<String> = index
            .supported_connectors(&["jira".to_string()], &["custom-1".to_string()])
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.id)
            .collect();
        found.sort();
        assert_eq!(found, vec!["custom-1".to_string(), "native-1".to_string()]);
    }

    #[tokio::test]
    async fn supported_connectors_empty_filters_yield_nothing() {
        let gateway = Arc::new(InMemoryIndexGateway::new());
        gateway.seed(CONNECTORS_INDEX, "native-1", json!({"is_native": true, "service_type": "jira"}));
        let index = ConnectorIndex::new(gateway, 3);
        assert!(index.supported_connectors(&[], &[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn create_snapshots_active_filter_and_pending_status() {
        let gateway = Arc::new(InMemoryIndexGateway::new());
        gateway.seed(
            CONNECTORS_INDEX,
            "conn-1",
            json!({
                "index_name": "idx-1",
                "service_type": "jira",
                "pipeline": {},
                "configuration": {},
                "filtering": [
                    {"domain": DEFAULT_DOMAIN, "active": {"rules": [{"field": "a"}]}},
                ],
            }),
        );
        let connector_document = gateway.get(CONNECTORS_INDEX, "conn-1").await.unwrap().unwrap();
        let connector = Connector::new(gateway.clone(), connector_document, 3);

        let jobs = SyncJobIndex::new(gateway.clone(), 3);
        let job_id = jobs.create(&connector).await.unwrap();
        let job = jobs.get(&job_id).await.unwrap().unwrap();
        assert_eq!(job.status(), JobStatus::Pending);
        assert_eq!(job.filtering().into_value(), json!({"rules": [{"field": "a"}]}));
    }

    #[tokio::test]
    async fn orphaned_jobs_excludes_known_connector_ids() {
        let gateway = Arc::new(InMemoryIndexGateway::new());
        gateway.seed(JOBS_INDEX, "job-known", json!({"connector": {"id": "conn-1"}}));
        gateway.seed(JOBS_INDEX, "job-orphan", json!({"connector": {"id": "conn-deleted"}}));
        let jobs = SyncJobIndex::new(gateway, 3);
        let orphaned = jobs.orphaned_jobs(&["conn-1".to_string()]).await.unwrap();
        assert_eq!(orphaned.len(), 1);
        assert_eq!(orphaned[0].connector_id(), Some("conn-deleted"));
    }

    #[tokio::test]
    async fn idle_jobs_requires_stale_heartbeat_and_active_status() {
        let gateway = Arc::new(InMemoryIndexGateway::new());
        let stale = now() - chrono::Duration::seconds(IDLE_JOBS_THRESHOLD_SECONDS + 10);
        gateway.seed(
            JOBS_INDEX,
            "job-idle",
            json!({"connector": {"id": "conn-1"}, "status": "in_progress", "last_seen": connector_sync_common::iso_utc(stale)}),
        );
        gateway.seed(
            JOBS_INDEX,
            "job-fresh",
            json!({"connector": {"id": "conn-1"}, "status": "in_progress", "last_seen": connector_sync_common::iso_utc(now())}),
        );
        let jobs = SyncJobIndex::new(gateway, 3);
        let idle = jobs.idle_jobs(&["conn-1".to_string()], IDLE_JOBS_THRESHOLD_SECONDS).await.unwrap();
        assert_eq!(idle.len(), 1);
    }
}
