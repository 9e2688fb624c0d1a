//! The top-level tick loop (§4.8): enumerates the connectors this worker
//! is responsible for, issues heartbeats, decides what's due, drives
//! adapters through the bounded pipeline runtime, and reaps orphaned/idle
//! jobs every pass.

mod config;
mod ingest;
mod orchestrator;
mod pipeline_runner;
mod services;

pub use config::OrchestratorConfig;
pub use ingest::{
    IngestSink,
    InMemoryIngestSink,
};
pub use orchestrator::Orchestrator;
pub use pipeline_runner::{
    run_sync,
    SyncOutcome,
};
pub use services::{
    ConnectorServices,
    StaticServiceRegistry,
};
