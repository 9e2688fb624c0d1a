//! Bounded-memory producer/consumer primitives an adapter is driven through
//! by the orchestrator (§4.6): a byte-budgeted FIFO queue, a fixed-capacity
//! worker pool, and group-cancellable sleeps.

mod cancellable_sleeps;
mod concurrent_tasks;
mod mem_queue;

pub use cancellable_sleeps::CancellableSleeps;
pub use concurrent_tasks::ConcurrentTasks;
pub use mem_queue::{
    MemQueue,
    MemSized,
    QueueItem,
};
