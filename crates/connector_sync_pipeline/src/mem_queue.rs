use std::{
    collections::VecDeque,
    time::Duration,
};

use connector_sync_common::QUEUE_MEM_SIZE;
use tokio::sync::{
    Mutex,
    Notify,
};

/// One slot in a [`MemQueue`]: either a produced item, or the end-of-stream
/// sentinel a producer enqueues when it has nothing left to send (§4.6, §6 —
/// replaces the bare `"FINISHED"` string sentinel with a typed variant so a
/// consumer can't mistake a real item for it).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueItem<T> {
    Item(T),
    EndOfStream,
}

/// How much memory one queued item is charged against the budget. Producers
/// implement this to report an item's approximate footprint (serialized
/// size, attachment byte length, …); the queue never inspects item contents.
pub trait MemSized {
    fn mem_size(&self) -> usize;
}

impl<T: MemSized> MemSized for QueueItem<T> {
    fn mem_size(&self) -> usize {
        match self {
            QueueItem::Item(item) => item.mem_size(),
            QueueItem::EndOfStream => 0,
        }
    }
}

struct State<T> {
    items: VecDeque<T>,
    used_bytes: usize,
}

/// FIFO queue bounded by an approximate in-memory byte budget rather than
/// item count (§4.6). `put` blocks cooperatively until the item fits,
/// re-checking admission every `refresh_timeout` rather than waking
/// precisely on every `get` — mirrors the source this was distilled from,
/// which polls admission on a timer instead of a tight wakeup channel.
pub struct MemQueue<T: MemSized> {
    state: Mutex<State<T>>,
    notify: Notify,
    budget_bytes: usize,
    refresh_timeout: Duration,
}

impl<T: MemSized> MemQueue<T> {
    pub fn new(budget_bytes: usize, refresh_timeout: Duration) -> Self {
        Self {
            state: Mutex::new(State {
                items: VecDeque::new(),
                used_bytes: 0,
            }),
            notify: Notify::new(),
            budget_bytes,
            refresh_timeout,
        }
    }

    pub fn with_default_budget() -> Self {
        Self::new(QUEUE_MEM_SIZE, Duration::from_millis(100))
    }

    /// Enqueues `item`, blocking until the queue's used bytes plus the
    /// item's size fits the budget (§4.6). An item larger than the whole
    /// budget is still admitted once the queue is empty, so a single
    /// oversized item can never deadlock the producer.
    pub async fn put(&self, item: T) {
        let size = item.mem_size();
        loop {
            {
                let mut state = self.state.lock().await;
                if state.items.is_empty() || state.used_bytes + size <= self.budget_bytes {
                    state.used_bytes += size;
                    state.items.push_back(item);
                    self.notify.notify_waiters();
                    return;
                }
            }
            tokio::select! {
                _ = self.notify.notified() => {},
                _ = tokio::time::sleep(self.refresh_timeout) => {},
            }
        }
    }

    /// Dequeues the next item in FIFO order, waiting if the queue is
    /// currently empty.
    pub async fn get(&self) -> T {
        loop {
            {
                let mut state = self.state.lock().await;
                if let Some(item) = state.items.pop_front() {
                    state.used_bytes = state.used_bytes.saturating_sub(item.mem_size());
                    self.notify.notify_waiters();
                    return item;
                }
            }
            self.notify.notified().await;
        }
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.items.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Blob(usize);

    impl MemSized for Blob {
        fn mem_size(&self) -> usize {
            self.0
        }
    }

    #[tokio::test]
    async fn fifo_order_preserved() {
        let queue: MemQueue<Blob> = MemQueue::new(1024, Duration::from_millis(10));
        queue.put(Blob(10)).await;
        queue.put(Blob(20)).await;
        assert_eq!(queue.get().await, Blob(10));
        assert_eq!(queue.get().await, Blob(20));
    }

    #[tokio::test]
    async fn oversized_item_admitted_when_queue_empty() {
        let queue: MemQueue<Blob> = MemQueue::new(8, Duration::from_millis(10));
        queue.put(Blob(1000)).await;
        assert_eq!(queue.len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn put_blocks_until_budget_frees_up() {
        let queue = Arc::new(MemQueue::<Blob>::new(10, Duration::from_millis(5)));
        queue.put(Blob(8)).await;

        let producer = {
            let queue = queue.clone();
            tokio::spawn(async move {
                queue.put(Blob(8)).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!producer.is_finished());

        let drained = queue.get().await;
        assert_eq!(drained, Blob(8));
        producer.await.unwrap();
        assert_eq!(queue.len().await, 1);
    }

    #[tokio::test]
    async fn end_of_stream_sentinel_round_trips() {
        let queue: MemQueue<QueueItem<Blob>> = MemQueue::new(1024, Duration::from_millis(10));
        queue.put(QueueItem::Item(Blob(1))).await;
        queue.put(QueueItem::EndOfStream).await;
        assert_eq!(queue.get().await, QueueItem::Item(Blob(1)));
        assert_eq!(queue.get().await, QueueItem::EndOfStream);
    }
}
