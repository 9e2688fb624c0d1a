use clap::Parser;
use connector_sync_common::{
    IDLE_JOBS_THRESHOLD_SECONDS,
    RETRY_ON_CONFLICT,
};

/// The flags this binary needs to drive a tick loop — not a generic
/// config-file loader (that remains out of scope, §1); mirrors
/// `fivetran_source::main::Args` and the `akamaotto` scheduler's
/// `SchedulerConfig` in shape: a flat, `clap`-derived struct with
/// environment-variable fallbacks for anything an operator would want to
/// set without editing a unit file.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Connector sync control-plane orchestrator", long_about = None)]
pub struct OrchestratorConfig {
    /// Seconds between ticks of the scheduler loop.
    #[arg(long, env = "TICK_INTERVAL_SECONDS", default_value_t = 30)]
    pub tick_interval_seconds: u64,

    /// Seconds a connector may go without a heartbeat before one is sent.
    #[arg(long, env = "HEARTBEAT_INTERVAL_SECONDS", default_value_t = 300)]
    pub heartbeat_interval_seconds: i64,

    /// Seconds an in-progress/canceling job may go without a heartbeat
    /// before the idle reaper marks it errored.
    #[arg(long, env = "IDLE_JOBS_THRESHOLD_SECONDS", default_value_t = IDLE_JOBS_THRESHOLD_SECONDS)]
    pub idle_jobs_threshold_seconds: i64,

    /// Number of optimistic-concurrency retries before a Gateway write
    /// gives up.
    #[arg(long, env = "RETRY_ON_CONFLICT", default_value_t = RETRY_ON_CONFLICT)]
    pub retry_on_conflict: u32,

    /// Native service types this worker is responsible for.
    #[arg(long = "native-service-type", env = "NATIVE_SERVICE_TYPES", value_delimiter = ',')]
    pub native_service_types: Vec<String>,

    /// Externally (non-natively) managed connector ids this worker is
    /// responsible for.
    #[arg(long = "configured-connector-id", env = "CONFIGURED_CONNECTOR_IDS", value_delimiter = ',')]
    pub configured_connector_ids: Vec<String>,

    /// Upper bound on concurrently in-flight connector syncs per tick.
    #[arg(long, env = "MAX_CONCURRENT_SYNCS", default_value_t = 10)]
    pub max_concurrent_syncs: usize,

    /// The connector id this worker is responsible for `prepare()`-ing
    /// (§4.2, §4.8) — the deploy-one-worker-per-externally-managed-connector
    /// pattern. Absent for workers that only drive natively-managed
    /// connectors, which never need `prepare()`.
    #[arg(long, env = "PREPARE_CONNECTOR_ID")]
    pub prepare_connector_id: Option<String>,

    /// The service type `prepare()` should populate onto
    /// `prepare_connector_id` the first time this worker sees it unconfigured.
    #[arg(long, env = "PREPARE_SERVICE_TYPE")]
    pub prepare_service_type: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_well_known_constants() {
        let config = OrchestratorConfig::parse_from(["orchestrator"]);
        assert_eq!(config.idle_jobs_threshold_seconds, IDLE_JOBS_THRESHOLD_SECONDS);
        assert_eq!(config.retry_on_conflict, RETRY_ON_CONFLICT);
        assert!(config.native_service_types.is_empty());
    }

    #[test]
    fn comma_separated_lists_parse_into_vecs() {
        let config = OrchestratorConfig::parse_from([
            "orchestrator",
            "--native-service-type",
            "jira,sharepoint",
            "--configured-connector-id",
            "conn-1,conn-2",
        ]);
        assert_eq!(config.native_service_types, vec!["jira", "sharepoint"]);
        assert_eq!(config.configured_connector_ids, vec!["conn-1", "conn-2"]);
    }
}
