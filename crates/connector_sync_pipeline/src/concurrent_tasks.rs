use std::{
    future::Future,
    sync::Arc,
};

use tokio::{
    sync::Semaphore,
    task::JoinSet,
};

/// Fixed-capacity worker pool (§4.6). `put` blocks until a slot is free,
/// then spawns the task; `join` waits for everything submitted so far and
/// propagates the first task failure/panic to the caller, the way the
/// teacher's `JoinSet` wrapper surfaces `JoinError`s rather than dropping
/// them (`common::runtime::join_set::JoinSet`), trimmed of the tracing-span
/// instrumentation that crate layers on top since that's an ambient
/// concern this crate doesn't own.
pub struct ConcurrentTasks {
    semaphore: Arc<Semaphore>,
    tasks: JoinSet<()>,
}

impl ConcurrentTasks {
    pub fn new(capacity: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            tasks: JoinSet::new(),
        }
    }

    /// Schedules `task`, blocking until a worker slot is free (§4.6).
    pub async fn put<F>(&mut self, task: F)
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .expect("semaphore is never closed");
        self.tasks.spawn(async move {
            let result = task.await;
            drop(permit);
            result
        });
    }

    /// Waits for every submitted task to complete, returning the first
    /// error encountered (a task's own `Err`, or a panic surfaced as an
    /// error) — errors from other still-running tasks are discarded for
    /// the first bad apple's sake, matching `join()` raising on the first
    /// exception it observes (§4.6).
    pub async fn join(mut self) -> anyhow::Result<()> {
        let mut first_error = None;
        while let Some(result) = self.tasks.join_next().await {
            match result {
                Ok(Ok(())) => {},
                Ok(Err(err)) => first_error.get_or_insert(err),
                Err(join_err) => first_error.get_or_insert(anyhow::Error::new(join_err)),
            };
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
