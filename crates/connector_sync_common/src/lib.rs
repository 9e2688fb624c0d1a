//! Ambient stack shared by every crate in the connector sync control plane:
//! the error taxonomy (§7), well-known constants (§6), timestamp helpers,
//! retry-with-backoff, and tracing setup for the orchestrator binary.

mod constants;
mod error;
mod logging;
mod retry;
mod time;

pub use constants::{
    CHUNK_SIZE,
    CONNECTORS_INDEX,
    DEFAULT_TRANSPORT_RETRIES,
    FILE_SIZE_LIMIT,
    FINISHED_SENTINEL,
    IDLE_JOBS_THRESHOLD_SECONDS,
    JOBS_INDEX,
    JOB_NOT_FOUND_ERROR,
    QUEUE_MEM_SIZE,
    RETRY_INTERVAL_SECONDS,
    RETRY_ON_CONFLICT,
    SYNC_DISABLED,
    UNKNOWN_ERROR,
};
pub use error::{
    ConnectorError,
    ErrorCode,
};
pub use logging::init_tracing;
pub use retry::retry_with_backoff;
pub use time::{
    iso_utc,
    now,
};
