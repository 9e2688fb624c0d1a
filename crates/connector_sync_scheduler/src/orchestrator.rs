use std::{
    collections::HashSet,
    sync::Arc,
    time::Duration,
};

use connector_sync_common::{
    ConnectorError,
    ErrorCode,
};
use connector_sync_gateway::IndexGateway;
use connector_sync_model::{
    Connector,
    ConnectorIndex,
    PrepareConfig,
    SyncJob,
    SyncJobIndex,
};
use connector_sync_pipeline::CancellableSleeps;
use futures::stream::StreamExt;
use tracing::instrument;

use crate::{
    config::OrchestratorConfig,
    ingest::IngestSink,
    pipeline_runner::run_sync,
    services::ConnectorServices,
};

/// Recorded on a job the idle reaper gives up on (§4.8's idle reaper, §6).
const STALLED_WORKER_MESSAGE: &str = "Sync job reaped: worker stopped reporting a heartbeat";

/// The top-level tick loop (§4.8): enumerates the connectors this worker is
/// responsible for, drives due syncs through the bounded pipeline runtime,
/// and reaps orphaned/idle jobs every tick. One `Orchestrator` owns the
/// cancellation group shared by every sync it drives (§5).
pub struct Orchestrator {
    connectors: ConnectorIndex,
    jobs: SyncJobIndex,
    services: Arc<dyn ConnectorServices>,
    sink: Arc<dyn IngestSink>,
    config: OrchestratorConfig,
    cancellation: CancellableSleeps,
}

impl Orchestrator {
    pub fn new(gateway: Arc<dyn IndexGateway>, services: Arc<dyn ConnectorServices>, sink: Arc<dyn IngestSink>, config: OrchestratorConfig) -> Self {
        let connectors = ConnectorIndex::new(gateway.clone(), config.retry_on_conflict);
        let jobs = SyncJobIndex::new(gateway, config.retry_on_conflict);
        Self {
            connectors,
            jobs,
            services,
            sink,
            config,
            cancellation: CancellableSleeps::new(),
        }
    }

    /// The cancellation handle shared by every in-flight sync (§4.6, §5).
    /// Calling `cancel()` on it wakes every outstanding sleep and aborts
    /// every sync currently mid-stream, suspending their jobs.
    pub fn cancellation(&self) -> CancellableSleeps {
        self.cancellation.clone()
    }

    /// Runs ticks `tick_interval_seconds` apart until `shutdown` resolves,
    /// at which point the shared cancellation group is fired so any sync
    /// still in flight suspends rather than is abandoned (§5, §7).
    pub async fn run(&self, mut shutdown: tokio::sync::oneshot::Receiver<()>) -> anyhow::Result<()> {
        loop {
            if let Err(err) = self.tick().await {
                tracing::error!(error = %err, "orchestrator tick failed");
            }
            tokio::select! {
                _ = &mut shutdown => {
                    self.cancellation.cancel();
                    return Ok(());
                },
                _ = tokio::time::sleep(Duration::from_secs(self.config.tick_interval_seconds)) => {},
            }
        }
    }

    /// One pass of §4.8's scheduler loop.
    #[instrument(skip(self))]
    pub async fn tick(&self) -> anyhow::Result<()> {
        let connectors = self
            .connectors
            .supported_connectors(&self.config.native_service_types, &self.config.configured_connector_ids)
            .await?;
        if connectors.is_empty() {
            return Ok(());
        }

        let known_ids: Vec<String> = connectors.iter().map(|c| c.id.clone()).collect();

        // Each connector id appears at most once in `connectors`, so driving
        // them concurrently here never races two syncs for the same
        // connector (§4.8, §5); the cap just bounds how many run at once.
        futures::stream::iter(&connectors)
            .for_each_concurrent(self.config.max_concurrent_syncs.max(1), |connector| async move {
                if let Err(err) = self.sync_if_due(connector).await {
                    tracing::error!(connector_id = %connector.id, error = %err, "connector sync failed");
                }
            })
            .await;

        if let Err(err) = self.reap_orphaned_jobs(&known_ids).await {
            tracing::error!(error = %err, "orphan reaper failed");
        }
        if let Err(err) = self.reap_idle_jobs(&known_ids).await {
            tracing::error!(error = %err, "idle reaper failed");
        }
        if let Err(err) = self.run_pending_jobs(&connectors, &known_ids).await {
            tracing::error!(error = %err, "pending job picker failed");
        }
        Ok(())
    }

    /// `prepare()`, heartbeat, then a job if (and only if) one is due
    /// (§4.2, §4.8).
    async fn sync_if_due(&self, connector: &Connector) -> anyhow::Result<()> {
        let reloaded = self.prepare(connector).await?;
        let connector = reloaded.as_ref().unwrap_or(connector);
        connector.heartbeat(self.config.heartbeat_interval_seconds).await?;

        let due_in = connector.next_sync()?;
        if due_in != 0 {
            return Ok(());
        }

        let job_id = self.jobs.create(connector).await?;
        connector.reset_sync_now_flag().await?;
        connector.sync_starts().await?;

        let job = self
            .jobs
            .get(&job_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("sync job {job_id} vanished immediately after creation"))?;
        self.drive_job(connector, &job).await
    }

    /// `Connector::prepare` needs a deployment-supplied target id/service
    /// type to populate; a worker driving only natively-managed connectors
    /// has none configured, in which case this is a no-op (§4.2).
    ///
    /// A wrapper never reflects its own writes (§9), so on success this
    /// reloads the connector from the index and returns it; callers must
    /// use the returned value (when `Some`) instead of the one they passed
    /// in, or they'll keep seeing the pre-prepare `service_type`/
    /// `configuration`.
    async fn prepare(&self, connector: &Connector) -> anyhow::Result<Option<Connector>> {
        let (Some(connector_id), Some(service_type)) = (self.config.prepare_connector_id.as_deref(), self.config.prepare_service_type.as_deref())
        else {
            return Ok(None);
        };
        if connector.id != connector_id {
            return Ok(None);
        }
        let default_configuration = self.services.default_configuration(service_type).unwrap_or_default();
        let prepare_config = PrepareConfig {
            connector_id: connector_id.to_string(),
            service_type: service_type.to_string(),
            default_configuration,
        };
        connector.prepare(&prepare_config).await?;
        self.connectors.get(connector_id).await
    }

    /// Claims `job`, validates its captured filtering snapshot, drives the
    /// adapter through the pipeline runtime, then records the outcome on
    /// both the job and its owning connector (§4.3, §4.8).
    async fn drive_job(&self, connector: &Connector, job: &SyncJob) -> anyhow::Result<()> {
        job.claim().await?;

        let filter = job.filtering();
        let validation = self.services.validator(connector).validate_filtering(&filter).await;
        if let Err(err) = job.validate_filtering(&validation) {
            job.fail(format!("{err:#}"), None, None).await?;
            return self.finish(connector, &job.id).await;
        }

        let adapter = match self.services.adapter(connector) {
            Ok(adapter) => adapter,
            Err(err) => {
                job.fail(format!("{err:#}"), None, None).await?;
                return self.finish(connector, &job.id).await;
            },
        };

        let index_name = job.index_name().unwrap_or_default().to_string();
        let pipeline = job.pipeline();
        let outcome = run_sync(adapter.clone(), self.sink.clone(), index_name, pipeline, Some(filter), self.cancellation.clone()).await;
        let _ = adapter.close().await;

        match outcome {
            Ok(outcome) => {
                job.done(Some(outcome.into_ingestion_stats()), None).await?;
            },
            Err(err) if is_cancelled(&err) => {
                job.suspend(None, None).await?;
            },
            Err(err) => {
                job.fail(format!("{err:#}"), None, None).await?;
            },
        }

        self.finish(connector, &job.id).await
    }

    /// Reloads `job_id` (a wrapper never reflects its own writes, §9) and
    /// records the reloaded outcome on the connector (§4.2 `sync_done`).
    async fn finish(&self, connector: &Connector, job_id: &str) -> anyhow::Result<()> {
        let job = self.jobs.get(job_id).await?;
        connector.sync_done(job.as_ref()).await
    }

    /// Deletes every job whose connector id has fallen out of the
    /// known-connectors set, unconditional on the job's own status (§4.8,
    /// §9's open question resolved in favor of best-effort cleanup).
    async fn reap_orphaned_jobs(&self, known_ids: &[String]) -> anyhow::Result<()> {
        let orphaned = self.jobs.orphaned_jobs(known_ids).await?;
        if orphaned.is_empty() {
            return Ok(());
        }
        let ids: Vec<String> = orphaned.iter().map(|job| job.id.clone()).collect();
        let deleted = self.jobs.delete_jobs(&ids).await?;
        tracing::info!(deleted, "reaped orphaned sync jobs");
        Ok(())
    }

    /// Marks every job whose heartbeat has gone stale for
    /// `config.idle_jobs_threshold_seconds` as errored, and updates the
    /// owning connector to match (§4.8).
    async fn reap_idle_jobs(&self, known_ids: &[String]) -> anyhow::Result<()> {
        let idle = self.jobs.idle_jobs(known_ids, self.config.idle_jobs_threshold_seconds).await?;
        for job in idle {
            tracing::warn!(job_id = %job.id, "marking idle sync job as errored");
            job.fail(STALLED_WORKER_MESSAGE, None, None).await?;
            if let Some(connector_id) = job.connector_id() {
                if let Some(connector) = self.connectors.get(connector_id).await? {
                    self.finish(&connector, &job.id).await?;
                }
            }
        }
        Ok(())
    }

    /// Drives any job left sitting in `pending`/`suspended` that wasn't
    /// just created by `sync_if_due` this tick — e.g. one queued by an API
    /// handler out-of-band (§4.8's pending picker).
    async fn run_pending_jobs(&self, connectors: &[Connector], known_ids: &[String]) -> anyhow::Result<()> {
        let pending = self.jobs.pending_jobs(known_ids).await?;
        for job in pending {
            let Some(connector_id) = job.connector_id() else {
                continue;
            };
            let Some(connector) = connectors.iter().find(|c| c.id == connector_id) else {
                continue;
            };
            if let Err(err) = self.drive_job(connector, &job).await {
                tracing::error!(job_id = %job.id, error = %err, "pending sync job failed");
            }
        }
        Ok(())
    }
}

fn is_cancelled(err: &anyhow::Error) -> bool {
    err.downcast_ref::<ConnectorError>().map(ConnectorError::code) == Some(ErrorCode::Cancelled)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use connector_sync_common::{
        iso_utc,
        now,
        CONNECTORS_INDEX,
        JOBS_INDEX,
    };
    use connector_sync_gateway::InMemoryIndexGateway;
    use connector_sync_model::{
        Configuration,
        Status,
    };
    use connector_sync_source::{
        AcceptAllValidator,
        InMemorySourceAdapter,
    };
    use serde_json::{
        json,
        Value,
    };

    use super::*;
    use crate::{
        ingest::InMemoryIngestSink,
        services::StaticServiceRegistry,
    };

    fn config() -> OrchestratorConfig {
        OrchestratorConfig {
            tick_interval_seconds: 30,
            heartbeat_interval_seconds: 300,
            idle_jobs_threshold_seconds: 60,
            retry_on_conflict: 3,
            native_service_types: vec!["jira".to_string()],
            configured_connector_ids: vec![],
            max_concurrent_syncs: 10,
            prepare_connector_id: None,
            prepare_service_type: None,
        }
    }

    fn registry(documents: Vec<Value>) -> Arc<StaticServiceRegistry> {
        Arc::new(
            StaticServiceRegistry::new(Arc::new(AcceptAllValidator)).register("jira", Configuration::default(), move |_connector| {
                Arc::new(InMemorySourceAdapter::new(documents.clone()))
            }),
        )
    }

    #[tokio::test]
    async fn due_connector_gets_a_completed_job_and_connector_goes_connected() {
        let gateway = Arc::new(InMemoryIndexGateway::new());
        gateway.seed(
            CONNECTORS_INDEX,
            "conn-1",
            json!({
                "is_native": true,
                "service_type": "jira",
                "sync_now": true,
                "index_name": "idx-1",
                "configuration": {},
                "pipeline": {},
                "filtering": [],
            }),
        );
        let sink = Arc::new(InMemoryIngestSink::new());
        let orchestrator = Orchestrator::new(gateway.clone(), registry(vec![json!({"id": "a"})]), sink.clone(), config());

        orchestrator.tick().await.unwrap();

        assert_eq!(sink.len(), 1);
        let connector = gateway.get(CONNECTORS_INDEX, "conn-1").await.unwrap().unwrap();
        assert_eq!(connector.source.get("status").unwrap(), Status::Connected.as_str().unwrap());
        assert_eq!(connector.source.get("last_sync_status").unwrap(), "completed");
        assert_eq!(connector.source.get("sync_now").unwrap(), false);

        let jobs = gateway.query(JOBS_INDEX, connector_sync_gateway::Query::all());
        use futures::StreamExt;
        let jobs: Vec<_> = jobs.collect().await;
        assert_eq!(jobs.len(), 1);
        let job = jobs[0].as_ref().unwrap();
        assert_eq!(job.source.get("status").unwrap(), "completed");
        assert_eq!(job.source.get("indexed_document_count").unwrap(), 1);
    }

    #[tokio::test]
    async fn disabled_connector_never_gets_a_job() {
        let gateway = Arc::new(InMemoryIndexGateway::new());
        gateway.seed(
            CONNECTORS_INDEX,
            "conn-1",
            json!({"is_native": true, "service_type": "jira", "scheduling": {"enabled": false}}),
        );
        let sink = Arc::new(InMemoryIngestSink::new());
        let orchestrator = Orchestrator::new(gateway.clone(), registry(vec![]), sink, config());

        orchestrator.tick().await.unwrap();

        assert_eq!(gateway.count(JOBS_INDEX).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn prepared_connector_job_snapshot_sees_populated_service_type() {
        let gateway = Arc::new(InMemoryIndexGateway::new());
        gateway.seed(
            CONNECTORS_INDEX,
            "conn-1",
            json!({
                "is_native": false,
                "sync_now": true,
                "index_name": "idx-1",
                "pipeline": {},
                "filtering": [],
            }),
        );
        let sink = Arc::new(InMemoryIngestSink::new());
        let registry = Arc::new(
            StaticServiceRegistry::new(Arc::new(AcceptAllValidator)).register(
                "jira",
                Configuration::from_value(Some(&json!({"url": {"value": ""}}))),
                |_connector| Arc::new(InMemorySourceAdapter::new(vec![json!({"id": "a"})])),
            ),
        );
        let mut cfg = config();
        cfg.configured_connector_ids = vec!["conn-1".to_string()];
        cfg.prepare_connector_id = Some("conn-1".to_string());
        cfg.prepare_service_type = Some("jira".to_string());
        let orchestrator = Orchestrator::new(gateway.clone(), registry, sink.clone(), cfg);

        orchestrator.tick().await.unwrap();

        assert_eq!(sink.len(), 1);
        let connector = gateway.get(CONNECTORS_INDEX, "conn-1").await.unwrap().unwrap();
        assert_eq!(connector.source.get("service_type").unwrap(), "jira");

        let jobs = gateway.query(JOBS_INDEX, connector_sync_gateway::Query::all());
        use futures::StreamExt;
        let jobs: Vec<_> = jobs.collect().await;
        assert_eq!(jobs.len(), 1);
        let job = jobs[0].as_ref().unwrap();
        assert_eq!(job.source.get("connector").unwrap().get("service_type").unwrap(), "jira");
    }

    #[tokio::test]
    async fn orphaned_job_is_deleted() {
        let gateway = Arc::new(InMemoryIndexGateway::new());
        gateway.seed(CONNECTORS_INDEX, "conn-1", json!({"is_native": true, "service_type": "jira"}));
        gateway.seed(JOBS_INDEX, "job-orphan", json!({"connector": {"id": "conn-gone"}, "status": "completed"}));
        let sink = Arc::new(InMemoryIngestSink::new());
        let orchestrator = Orchestrator::new(gateway.clone(), registry(vec![]), sink, config());

        orchestrator.tick().await.unwrap();

        assert_eq!(gateway.get(JOBS_INDEX, "job-orphan").await.unwrap(), None);
    }

    #[tokio::test]
    async fn idle_job_is_errored_and_connector_updated() {
        let gateway = Arc::new(InMemoryIndexGateway::new());
        gateway.seed(CONNECTORS_INDEX, "conn-1", json!({"is_native": true, "service_type": "jira"}));
        let stale = now() - chrono::Duration::seconds(120);
        gateway.seed(
            JOBS_INDEX,
            "job-idle",
            json!({
                "connector": {"id": "conn-1"},
                "status": "in_progress",
                "last_seen": iso_utc(stale),
            }),
        );
        let sink = Arc::new(InMemoryIngestSink::new());
        let orchestrator = Orchestrator::new(gateway.clone(), registry(vec![]), sink, config());

        orchestrator.tick().await.unwrap();

        let job = gateway.get(JOBS_INDEX, "job-idle").await.unwrap().unwrap();
        assert_eq!(job.source.get("status").unwrap(), "error");
        assert_eq!(job.source.get("error").unwrap(), STALLED_WORKER_MESSAGE);

        let connector = gateway.get(CONNECTORS_INDEX, "conn-1").await.unwrap().unwrap();
        assert_eq!(connector.source.get("status").unwrap(), "error");
    }

    #[tokio::test]
    async fn out_of_band_pending_job_is_picked_up_and_completed() {
        let gateway = Arc::new(InMemoryIndexGateway::new());
        gateway.seed(
            CONNECTORS_INDEX,
            "conn-1",
            json!({"is_native": true, "service_type": "jira", "index_name": "idx-1"}),
        );
        gateway.seed(
            JOBS_INDEX,
            "job-pending",
            json!({
                "connector": {"id": "conn-1", "index_name": "idx-1", "service_type": "jira", "configuration": {}, "pipeline": {}, "filtering": {}},
                "status": "pending",
            }),
        );
        let sink = Arc::new(InMemoryIngestSink::new());
        let orchestrator = Orchestrator::new(gateway.clone(), registry(vec![json!({"id": "a"})]), sink.clone(), config());

        orchestrator.tick().await.unwrap();

        let job = gateway.get(JOBS_INDEX, "job-pending").await.unwrap().unwrap();
        assert_eq!(job.source.get("status").unwrap(), "completed");
        assert_eq!(sink.len(), 1);
    }

    #[tokio::test]
    async fn invalid_filtering_fails_the_job_without_running_the_adapter() {
        struct RejectValidator;
        #[async_trait::async_trait]
        impl connector_sync_source::FilteringValidator for RejectValidator {
            async fn validate_filtering(&self, _filter: &connector_sync_model::Filter) -> connector_sync_model::FilteringValidationResult {
                connector_sync_model::FilteringValidationResult {
                    state: connector_sync_model::FilteringValidationState::Invalid,
                    errors: vec!["bad rule".to_string()],
                }
            }
        }

        let gateway = Arc::new(InMemoryIndexGateway::new());
        gateway.seed(
            CONNECTORS_INDEX,
            "conn-1",
            json!({"is_native": true, "service_type": "jira", "sync_now": true, "index_name": "idx-1", "configuration": {}, "pipeline": {}, "filtering": []}),
        );
        let sink = Arc::new(InMemoryIngestSink::new());
        let services = Arc::new(
            StaticServiceRegistry::new(Arc::new(RejectValidator))
                .register("jira", Configuration::default(), |_connector| Arc::new(InMemorySourceAdapter::new(vec![json!({"id": "a"})]))),
        );
        let orchestrator = Orchestrator::new(gateway.clone(), services, sink.clone(), config());

        orchestrator.tick().await.unwrap();

        assert!(sink.is_empty());
        let connector = gateway.get(CONNECTORS_INDEX, "conn-1").await.unwrap().unwrap();
        assert_eq!(connector.source.get("status").unwrap(), "error");
    }
}
