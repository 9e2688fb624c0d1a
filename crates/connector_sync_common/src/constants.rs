/// Number of times an optimistic-concurrency write is retried before the
/// conflict is surfaced to the caller (§4.1, §6).
pub const RETRY_ON_CONFLICT: u32 = 3;

/// Sentinel returned by `Connector::next_sync` when scheduling is disabled
/// and `sync_now` is not set (§4.2, §6).
pub const SYNC_DISABLED: i64 = -1;

/// A job whose `last_seen` has not advanced within this many seconds is
/// considered idle and reaped (§4.8, §6).
pub const IDLE_JOBS_THRESHOLD_SECONDS: i64 = 60;

/// Adapter-local gate on attachment size, in bytes (§6).
pub const FILE_SIZE_LIMIT: u64 = 10 * 1024 * 1024;

/// Adapter-local streaming chunk size, in bytes (§6).
pub const CHUNK_SIZE: usize = 1024;

/// Default byte budget for `MemQueue` (§4.6, §6).
pub const QUEUE_MEM_SIZE: usize = 5 * 1024 * 1024;

/// Base, in seconds, of the exponential backoff applied between adapter
/// transport retries: wait is `RETRY_INTERVAL_SECONDS ** attempt` (§5).
pub const RETRY_INTERVAL_SECONDS: u64 = 2;

/// Default number of adapter transport retry attempts (§5).
pub const DEFAULT_TRANSPORT_RETRIES: u32 = 3;

/// The literal end-of-stream marker used by the bounded pipeline (§6).
pub const FINISHED_SENTINEL: &str = "FINISHED";

/// Name of the control-plane index holding connector documents (§4.1, §6).
pub const CONNECTORS_INDEX: &str = ".elastic-connectors";

/// Name of the control-plane index holding sync-job documents (§4.1, §6).
pub const JOBS_INDEX: &str = ".elastic-connectors-sync-jobs";

/// Placeholder job error recorded when a job referenced by id no longer
/// exists at sync-completion time (§4.2, §8).
pub const JOB_NOT_FOUND_ERROR: &str = "Couldn't find the job";

/// Placeholder job error recorded when a job ended in `Error` status with no
/// error message attached (§4.2, §8).
pub const UNKNOWN_ERROR: &str = "unknown error";
