use std::sync::Arc;

use clap::Parser;
use connector_sync_gateway::InMemoryIndexGateway;
use connector_sync_scheduler::{
    InMemoryIngestSink,
    Orchestrator,
    OrchestratorConfig,
    StaticServiceRegistry,
};
use connector_sync_source::AcceptAllValidator;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _tracing_guard = connector_sync_common::init_tracing();
    let config = OrchestratorConfig::parse();

    // The real search-cluster client and the per-deployment service-type ->
    // adapter wiring are both out of scope for this core (§1): the wire
    // transport is a collaborator behind `IndexGateway`, and the adapters
    // themselves are registered with `StaticServiceRegistry` at deploy
    // time. Swap these two lines for a real gateway and a registry seeded
    // with real adapters when standing this binary up against a live
    // cluster.
    let gateway = Arc::new(InMemoryIndexGateway::new());
    let services = Arc::new(StaticServiceRegistry::new(Arc::new(AcceptAllValidator)));
    let sink = Arc::new(InMemoryIngestSink::new());

    let orchestrator = Orchestrator::new(gateway, services, sink, config);

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("shutdown signal received, draining in-flight syncs");
        let _ = shutdown_tx.send(());
    });

    orchestrator.run(shutdown_rx).await
}
